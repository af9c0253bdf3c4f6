use super::graph::Graph;
use super::node::{NodeId, NodeKind, PhiType};
use crate::location_map::{Location, LocationMap};

struct GraphPrinter<'a> {
    graph: &'a Graph,
    locations: &'a LocationMap,
    result: String,
}

/// One line per live node, in id order:
/// `nID Kind(args) [inputs] {dependencies} -> successors`.
pub fn graph_to_string(graph: &Graph, locations: &LocationMap) -> String {
    let printer = GraphPrinter {
        graph,
        locations,
        result: String::new(),
    };

    printer.stringify()
}

/// The label of a single node, as used by the printer and the visualizer.
pub fn node_label(graph: &Graph, locations: &LocationMap, node: NodeId) -> String {
    let mut printer = GraphPrinter {
        graph,
        locations,
        result: String::new(),
    };

    printer.push_kind(graph.kind(node));
    printer.result
}

impl<'a> GraphPrinter<'a> {
    fn stringify(mut self) -> String {
        for node in self.graph.node_ids() {
            self.stringify_node(node);
        }

        self.result
    }

    fn stringify_node(&mut self, id: NodeId) {
        let node = self.graph.node(id);

        self.result.push_str(&id.to_string());
        self.result.push(' ');
        self.push_kind(*node.kind());

        if !node.inputs().is_empty() {
            self.result.push_str(" [");
            self.push_ids(node.inputs());
            self.result.push(']');
        }

        if !node.dependencies().is_empty() {
            self.result.push_str(" {");
            self.push_ids(node.dependencies());
            self.result.push('}');
        }

        if !node.successors().is_empty() {
            self.result.push_str(" -> ");
            self.push_ids(node.successors());
        }

        self.result.push('\n');
    }

    fn push_kind(&mut self, kind: NodeKind) {
        self.result.push_str(kind.name());

        let args = match kind {
            NodeKind::If { true_probability } => format!("p={}", true_probability.value()),
            NodeKind::Read {
                location,
                null_check,
            }
            | NodeKind::Write {
                location,
                null_check,
            } => {
                if null_check {
                    format!("{}, null_check", self.location(location))
                } else {
                    self.location(location)
                }
            }
            NodeKind::FloatingRead { location } => self.location(location),
            NodeKind::Deoptimize { action, reason } => format!("{action}, {reason}"),
            NodeKind::Parameter { index } => index.to_string(),
            NodeKind::Constant { value } => value.to_string(),
            NodeKind::ShortCircuitOr {
                negate_x,
                negate_y,
                probability,
            } => format!(
                "{}x, {}y, p={}",
                if negate_x { "!" } else { "" },
                if negate_y { "!" } else { "" },
                probability.value()
            ),
            NodeKind::Phi { ty } | NodeKind::ValueProxy { ty } => match ty {
                PhiType::Value => "value".to_string(),
                PhiType::Memory => "memory".to_string(),
            },
            NodeKind::Guard {
                reason,
                action,
                negated,
            } => {
                if negated {
                    format!("!, {reason}, {action}")
                } else {
                    format!("{reason}, {action}")
                }
            }
            _ => return,
        };

        self.result.push('(');
        self.result.push_str(&args);
        self.result.push(')');
    }

    fn location(&self, location: Location) -> String {
        let name = self.locations.get_str(location.identity);

        match location.displacement {
            Some(displacement) => format!("{name}+{displacement}"),
            None => format!("{name}[]"),
        }
    }

    fn push_ids(&mut self, ids: &[NodeId]) {
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();

        self.result.push_str(&ids.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::lowering::build_graph;
    use pretty_assertions::assert_eq;

    #[test]
    fn prints_every_live_node() {
        let (graph, locations) = build_graph(
            "param p
            guard nonnull p
            x = read p.f+8
            y = read p.g
            return x",
            None,
        )
        .unwrap();

        let expected = "\
n0 Start -> n4
n1 Parameter(0)
n2 IsNull [n1]
n3 Guard(!, NullCheckException, InvalidateReprofile) [n2, n0]
n4 Read(f+8) [n1] {n3} -> n5
n5 Read(g[]) [n1] {n3} -> n6
n6 Return [n4]
";

        assert_eq!(graph_to_string(&graph, &locations), expected);
    }

    #[test]
    fn labels() {
        let (graph, locations) = build_graph("param p\nc = isnull p\nwhile c { call }\n", None).unwrap();
        let labels: Vec<String> = graph
            .node_ids()
            .map(|node| node_label(&graph, &locations, node))
            .collect();

        assert!(labels.contains(&"If(p=0.9)".to_string()));
        assert!(labels.contains(&"LoopBegin".to_string()));
    }
}
