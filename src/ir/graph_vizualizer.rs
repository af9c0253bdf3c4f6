use graphviz_rust::{
    cmd::{CommandArg, Format},
    dot_generator::*,
    dot_structures::*,
    exec,
    printer::{DotPrinter, PrinterContext},
};
use std::io;

use super::graph::Graph as IrGraph;
use super::graph_printer::node_label;
use crate::location_map::LocationMap;

/// Control edges are solid, data edges dashed and dependency edges dotted.
/// Data and dependency edges point from the used node to its user.
pub fn graph_to_dot(graph: &IrGraph, locations: &LocationMap) -> String {
    build_dot(graph, locations).print(&mut PrinterContext::default())
}

pub fn graph_to_svg(graph: &IrGraph, locations: &LocationMap, path: &str) -> io::Result<()> {
    let g = build_dot(graph, locations);

    exec(
        g,
        &mut PrinterContext::default(),
        vec![
            CommandArg::Format(Format::Svg),
            CommandArg::Output(path.to_string()),
        ],
    )?;

    Ok(())
}

fn build_dot(graph: &IrGraph, locations: &LocationMap) -> graphviz_rust::dot_structures::Graph {
    let mut g = graph!(strict di id!("seanode"));

    for id in graph.node_ids() {
        let node = graph.node(id);
        let label = format!("{id} {}", node_label(graph, locations, id));
        let shape = if node.is_fixed() { "box" } else { "ellipse" };

        g.add_stmt(stmt!(node!(id; attr!("shape", shape), attr!("label", esc label))));

        for successor in node.successors().iter() {
            g.add_stmt(stmt!(styled_edge(id, *successor, "solid")));
        }

        for input in node.inputs().iter() {
            g.add_stmt(stmt!(styled_edge(*input, id, "dashed")));
        }

        for dependency in node.dependencies().iter() {
            g.add_stmt(stmt!(styled_edge(*dependency, id, "dotted")));
        }
    }

    g
}

fn styled_edge(from: impl ToString, to: impl ToString, style: &str) -> Edge {
    Edge {
        ty: EdgeTy::Pair(
            Vertex::N(node_id!(from.to_string())),
            Vertex::N(node_id!(to.to_string())),
        ),
        attributes: vec![attr!("style", style)],
    }
}
