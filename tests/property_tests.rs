use proptest::collection::vec;
use proptest::prelude::*;
use seanode::driver::{compile_script, PipelineOptions};
use seanode::ir::NodeKind;
use seanode::location_map::LocationIdentity;

const PROLOGUE: &str = "param p
param q
c = isnull p
d = isnull q
e = eq p q
";

const OBJECTS: [&str; 2] = ["p", "q"];
const FIELDS: [&str; 5] = ["f", "g", "h", "any", "final"];
const CONDITIONS: [&str; 3] = ["c", "d", "e"];

#[derive(Debug, Clone)]
enum Op {
    Read(usize, usize, Option<i64>),
    Write(usize, usize, Option<i64>),
    Call,
    Barrier,
    NullGuard(usize),
    Guard(usize, bool),
    If(usize, Vec<Op>, Vec<Op>, bool),
    While(usize, Vec<Op>),
}

fn displacement() -> impl Strategy<Value = Option<i64>> {
    prop_oneof![Just(None), (0i64..5000).prop_map(Some), Just(Some(100_000))]
}

fn op() -> impl Strategy<Value = Op> {
    let leaf = prop_oneof![
        (0..OBJECTS.len(), 0..FIELDS.len(), displacement()).prop_map(|(o, f, d)| Op::Read(o, f, d)),
        (0..OBJECTS.len(), 0..FIELDS.len() - 1, displacement()).prop_map(|(o, f, d)| Op::Write(o, f, d)),
        Just(Op::Call),
        Just(Op::Barrier),
        (0..OBJECTS.len()).prop_map(Op::NullGuard),
        (0..CONDITIONS.len(), any::<bool>()).prop_map(|(c, negated)| Op::Guard(c, negated)),
    ];

    leaf.prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            (0..CONDITIONS.len(), vec(inner.clone(), 0..4), vec(inner.clone(), 0..4), any::<bool>())
                .prop_map(|(c, then_ops, else_ops, deopt)| Op::If(c, then_ops, else_ops, deopt)),
            (0..CONDITIONS.len(), vec(inner, 0..4)).prop_map(|(c, body)| Op::While(c, body)),
        ]
    })
}

struct Renderer {
    script: String,
    reads: usize,
}

impl Renderer {
    fn render(ops: &[Op]) -> String {
        let mut renderer = Renderer {
            script: PROLOGUE.to_string(),
            reads: 0,
        };

        renderer.block(ops);
        renderer.script
    }

    fn field(field: usize, displacement: Option<i64>) -> String {
        match displacement {
            Some(displacement) => format!("{}+{}", FIELDS[field], displacement),
            None => FIELDS[field].to_string(),
        }
    }

    fn block(&mut self, ops: &[Op]) {
        for op in ops {
            self.op(op);
        }
    }

    fn op(&mut self, op: &Op) {
        match op {
            Op::Read(object, field, displacement) => {
                self.reads += 1;
                self.line(&format!(
                    "r{} = read {}.{}",
                    self.reads,
                    OBJECTS[*object],
                    Self::field(*field, *displacement)
                ));
            }
            Op::Write(object, field, displacement) => self.line(&format!(
                "write {}.{} = q",
                OBJECTS[*object],
                Self::field(*field, *displacement)
            )),
            Op::Call => self.line("call"),
            Op::Barrier => self.line("barrier"),
            Op::NullGuard(object) => self.line(&format!("guard nonnull {}", OBJECTS[*object])),
            Op::Guard(condition, negated) => self.line(&format!(
                "guard {}{} ClassCastException",
                if *negated { "!" } else { "" },
                CONDITIONS[*condition]
            )),
            Op::If(condition, then_ops, else_ops, deopt) => {
                self.line(&format!("if {} {{", CONDITIONS[*condition]));
                self.block(then_ops);

                if *deopt {
                    self.line("deopt UnreachedCode");
                }

                self.line("} else {");
                self.block(else_ops);
                self.line("}");
            }
            Op::While(condition, body) => {
                self.line(&format!("while {} {{", CONDITIONS[*condition]));
                self.block(body);
                self.line("}");
            }
        }
    }

    fn line(&mut self, line: &str) {
        self.script.push_str(line);
        self.script.push('\n');
    }
}

proptest! {
    #[test]
    fn pipeline_preserves_graph_invariants(ops in vec(op(), 0..12)) {
        let script = Renderer::render(&ops);
        let graph = match compile_script(&script, None, PipelineOptions::default()) {
            Ok(compilation) => compilation.graph,
            Err(err) => return Err(TestCaseError::fail(format!("{script}\n{err}"))),
        };

        prop_assert_eq!(graph.count(|kind| kind.is_guard()), 0);
        prop_assert_eq!(
            graph.count(|kind| matches!(kind, NodeKind::Read { null_check: false, .. })),
            0
        );
    }

    #[test]
    fn floating_reads_are_ordered(ops in vec(op(), 0..12)) {
        let script = Renderer::render(&ops);
        let options = PipelineOptions {
            guard_lowering: false,
            ..PipelineOptions::default()
        };
        let graph = compile_script(&script, None, options).unwrap().graph;

        prop_assert_eq!(graph.count(|kind| matches!(kind, NodeKind::Read { .. })), 0);

        for node in graph.node_ids() {
            if let NodeKind::FloatingRead { location } = graph.kind(node) {
                let expected = if location.identity == LocationIdentity::FINAL { 1 } else { 2 };

                prop_assert_eq!(graph.node(node).inputs().len(), expected, "{}\n{}", node, script);
            }
        }
    }
}
