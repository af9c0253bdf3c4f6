use super::test_golden_graph;

#[test]
fn implicit_null_check() {
    test_golden_graph("implicit_null_check.sea");
}

#[test]
fn explicit_null_check() {
    test_golden_graph("explicit_null_check.sea");
}

#[test]
fn null_check_node() {
    test_golden_graph("null_check_node.sea");
}
