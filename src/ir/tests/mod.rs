mod golden_tests;

use std::fs::{read_to_string, File};
use std::io::Write;
use super::analysis::BlockSchedule;
use super::graph::Graph;
use super::graph_printer::graph_to_string;
use super::lowering::build_graph;
use super::node::{NodeId, NodeKind};
use super::phases::{lower_guards, schedule_floating_reads, GuardLoweringConfig, GuardLoweringStats, TargetDescription};
use super::verify::{verify, verify_with, VerifyOptions};
use crate::location_map::LocationMap;
use pretty_assertions::assert_eq;

/// Lowers `input` and floats its reads, checking the graph on both sides.
fn float_reads(input: &str) -> (Graph, LocationMap) {
    let (mut graph, locations) = build_graph(input, None).unwrap();

    verify(&graph).unwrap();
    schedule_floating_reads(&mut graph);
    verify(&graph).unwrap();

    (graph, locations)
}

fn lower_with_limit(input: &str, limit: i64) -> (Graph, LocationMap, GuardLoweringStats) {
    let (mut graph, locations) = float_reads(input);
    let schedule = BlockSchedule::compute(&mut graph);
    let stats = lower_guards(
        &mut graph,
        &schedule,
        GuardLoweringConfig::default(),
        TargetDescription {
            implicit_null_check_limit: limit,
        },
    );

    let lowered = VerifyOptions {
        allow_guards: false,
        ..VerifyOptions::default()
    };
    verify_with(&graph, lowered).unwrap();

    (graph, locations, stats)
}

fn lower(input: &str) -> (Graph, LocationMap, GuardLoweringStats) {
    lower_with_limit(input, TargetDescription::default().implicit_null_check_limit)
}

fn nodes_of(graph: &Graph, pred: impl Fn(&NodeKind) -> bool) -> Vec<NodeId> {
    graph.node_ids().filter(|node| pred(&graph.kind(*node))).collect()
}

fn only(graph: &Graph, pred: impl Fn(&NodeKind) -> bool) -> NodeId {
    let nodes = nodes_of(graph, pred);

    assert_eq!(nodes.len(), 1, "expected exactly one match, found {nodes:?}");
    nodes[0]
}

/// Golden files hold a script and the graph it lowers to after both passes,
/// separated by `%%%%`. Set `GOLDEN_UPDATE` to rewrite the expectation.
fn test_golden_graph(filename: &str) {
    let path = format!("{}/src/ir/tests/golden/{filename}", env!("CARGO_MANIFEST_DIR"));
    let contents = read_to_string(&path).expect("golden file exists");
    let mut split_contents: Vec<&str> = contents.split("%%%%").collect();
    let expected = split_contents.pop().unwrap().trim();
    let input = split_contents.pop().unwrap().trim();

    let (graph, locations, _) = lower(input);
    let actual = graph_to_string(&graph, &locations);
    let actual = actual.trim();

    if std::env::var("GOLDEN_UPDATE").is_ok() {
        let mut new_file = File::create(&path).expect("golden file is writable");
        let mut new_contents = input.to_string();

        new_contents.push_str("\n\n%%%%\n\n");
        new_contents.push_str(actual);
        new_contents.push('\n');

        new_file.write_all(new_contents.as_bytes()).expect("write to file");

        panic!("updated {filename}");
    } else {
        assert_eq!(expected, actual);
    }
}
