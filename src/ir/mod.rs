pub mod analysis;
pub mod graph;
pub mod graph_builder;
pub mod logic;
pub mod node;
pub mod phases;

mod graph_printer;
mod graph_vizualizer;
mod lowering;
mod verify;

#[cfg(test)]
mod tests;

pub use graph::Graph;
pub use graph_builder::GraphBuilder;
pub use graph_printer::{graph_to_string, node_label};
pub use graph_vizualizer::{graph_to_dot, graph_to_svg};
pub use lowering::{build_graph, lower_script};
pub use node::{DeoptAction, DeoptReason, Node, NodeId, NodeKind, PhiType, Probability};
pub use verify::{verify, verify_with, VerifyError, VerifyOptions};
