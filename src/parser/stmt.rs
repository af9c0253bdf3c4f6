use super::spanned::Spanned;
use super::token::{Ctrl, KeyWord};
use super::{block, ctrl, ident, int, keyword, recursive, terminator, Parser};

pub type Name = Spanned<String>;

/// `object.location` with an optional `+displacement`.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub location: Name,
    pub displacement: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Read { object: Name, field: Field },
    IsNull(Name),
    Equals(Name, Name),
    LessThan(Name, Name),
    Not(Name),
    And(Name, Name),
    Or(Name, Name),
    Const(i64),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GuardCondition {
    NonNull(Name),
    Holds(Name),
    Fails(Name),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Param(Name),
    Assign {
        dest: Name,
        src: Spanned<Expr>,
    },
    Write {
        object: Name,
        field: Field,
        value: Name,
    },
    Call,
    Barrier,
    Guard {
        condition: GuardCondition,
        reason: Option<Name>,
    },
    If {
        cond: Name,
        stmts: Vec<Spanned<Stmt>>,
        else_stmts: Option<Vec<Spanned<Stmt>>>,
    },
    While {
        cond: Name,
        stmts: Vec<Spanned<Stmt>>,
    },
    Return(Option<Name>),
    Deopt(Name),
}

pub fn stmt<'a>() -> Parser<'a, Stmt> {
    recursive(|stmt_parser| {
        let sp = stmt_parser.spanned();

        closed_stmt()
            .or(if_or_ifelse_stmt(sp.clone()))
            .or(while_stmt(sp))
            .closed_by(terminator().expect("Expected end of line after statement"))
    })
}

fn closed_stmt<'a>() -> Parser<'a, Stmt> {
    param_stmt()
        .or(assign_stmt())
        .or(write_stmt())
        .or(keyword(KeyWord::Call).map(|_| Stmt::Call))
        .or(keyword(KeyWord::Barrier).map(|_| Stmt::Barrier))
        .or(guard_stmt())
        .or(return_stmt())
        .or(deopt_stmt())
}

fn name<'a>(error_msg: &'static str) -> Parser<'a, Name> {
    ident().spanned().expect(error_msg)
}

fn param_stmt<'a>() -> Parser<'a, Stmt> {
    keyword(KeyWord::Param)
        .then(name("Expected a name after 'param'"))
        .map(Stmt::Param)
}

fn assign_stmt<'a>() -> Parser<'a, Stmt> {
    ident()
        .spanned()
        .closed_by(ctrl(Ctrl::Equal).expect("Expected '=' after name"))
        .append(expr().spanned().expect("Expected an expression after '='"))
        .map(|(dest, src)| Stmt::Assign { dest, src })
}

fn write_stmt<'a>() -> Parser<'a, Stmt> {
    keyword(KeyWord::Write)
        .then(field_ref())
        .closed_by(ctrl(Ctrl::Equal).expect("Expected '=' after written field"))
        .append(name("Expected the written value"))
        .map(|((object, field), value)| Stmt::Write { object, field, value })
}

fn guard_stmt<'a>() -> Parser<'a, Stmt> {
    let nonnull = keyword(KeyWord::NonNull)
        .then(name("Expected an object after 'nonnull'"))
        .map(|object| Stmt::Guard {
            condition: GuardCondition::NonNull(object),
            reason: None,
        });
    let fails = ctrl(Ctrl::Bang)
        .then(name("Expected a condition after '!'"))
        .map(GuardCondition::Fails);
    let holds = ident().spanned().map(GuardCondition::Holds);
    let conditional = fails
        .or(holds)
        .append(ident().spanned().optional())
        .map(|(condition, reason)| Stmt::Guard { condition, reason });

    keyword(KeyWord::Guard).then(
        nonnull
            .or(conditional)
            .expect("Expected 'nonnull' or a condition after 'guard'"),
    )
}

fn return_stmt<'a>() -> Parser<'a, Stmt> {
    keyword(KeyWord::Return)
        .then(ident().spanned().optional())
        .map(Stmt::Return)
}

fn deopt_stmt<'a>() -> Parser<'a, Stmt> {
    keyword(KeyWord::Deopt)
        .then(name("Expected a deoptimization reason after 'deopt'"))
        .map(Stmt::Deopt)
}

fn if_or_ifelse_stmt(sp: Parser<'_, Spanned<Stmt>>) -> Parser<'_, Stmt> {
    let if_stmt = keyword(KeyWord::If)
        .then(name("Expected a condition after 'if'"))
        .append(block(sp.clone()).expect("Expected a block '{ ... }' after if condition"));
    let else_block = keyword(KeyWord::Else)
        .then(block(sp).expect("Expected a block '{ ... }' after else keyword"));

    if_stmt.mix(else_block, |(cond, stmts), else_stmts| {
        Some(Stmt::If {
            cond,
            stmts,
            else_stmts,
        })
    })
}

fn while_stmt(sp: Parser<'_, Spanned<Stmt>>) -> Parser<'_, Stmt> {
    keyword(KeyWord::While)
        .then(name("Expected a condition after 'while'"))
        .append(block(sp).expect("Expected a block '{ ... }' after while condition"))
        .map(|(cond, stmts)| Stmt::While { cond, stmts })
}

fn field_ref<'a>() -> Parser<'a, (Name, Field)> {
    let displacement = ctrl(Ctrl::Plus)
        .then(int().expect("Expected a displacement after '+'"))
        .optional();

    name("Expected an object")
        .closed_by(ctrl(Ctrl::Period).expect("Expected '.' after object"))
        .append(name("Expected a location after '.'"))
        .append(displacement)
        .map(|((object, location), displacement)| {
            (
                object,
                Field {
                    location,
                    displacement,
                },
            )
        })
}

fn expr<'a>() -> Parser<'a, Expr> {
    let operand = || name("Expected an operand");

    let read = keyword(KeyWord::Read)
        .then(field_ref())
        .map(|(object, field)| Expr::Read { object, field });
    let is_null = keyword(KeyWord::IsNull).then(operand()).map(Expr::IsNull);
    let equals = keyword(KeyWord::Eq)
        .then(operand().append(operand()))
        .map(|(x, y)| Expr::Equals(x, y));
    let less_than = keyword(KeyWord::Lt)
        .then(operand().append(operand()))
        .map(|(x, y)| Expr::LessThan(x, y));
    let not = keyword(KeyWord::Not).then(operand()).map(Expr::Not);
    let and = keyword(KeyWord::And)
        .then(operand().append(operand()))
        .map(|(x, y)| Expr::And(x, y));
    let or = keyword(KeyWord::Or)
        .then(operand().append(operand()))
        .map(|(x, y)| Expr::Or(x, y));
    let constant = keyword(KeyWord::Const)
        .then(int().expect("Expected an integer after 'const'"))
        .map(Expr::Const);
    let null = keyword(KeyWord::Null).map(|_| Expr::Null);

    read.or(is_null)
        .or(equals)
        .or(less_than)
        .or(not)
        .or(and)
        .or(or)
        .or(constant)
        .or(null)
}

#[cfg(test)]
mod tests {
    use super::super::parse_script;
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Vec<Stmt> {
        parse_script(input, None)
            .unwrap()
            .into_iter()
            .map(|stmt| stmt.item)
            .collect()
    }

    fn names(stmts: &[Stmt]) -> Vec<String> {
        stmts
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Param(name) => Some(name.item.clone()),
                Stmt::Assign { dest, .. } => Some(dest.item.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn read_with_and_without_displacement() {
        let stmts = parse("param p\nx = read p.f+8\ny = read p.g\n");

        match &stmts[1] {
            Stmt::Assign { src, .. } => match &src.item {
                Expr::Read { object, field } => {
                    assert_eq!(object.item, "p");
                    assert_eq!(field.location.item, "f");
                    assert_eq!(field.displacement, Some(8));
                }
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }

        match &stmts[2] {
            Stmt::Assign { src, .. } => {
                assert!(matches!(&src.item, Expr::Read { field, .. } if field.displacement.is_none()))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn guard_forms() {
        let stmts = parse("guard nonnull p\nguard c BoundsCheckException\nguard !c UnreachedCode\n");

        assert!(matches!(
            &stmts[0],
            Stmt::Guard { condition: GuardCondition::NonNull(p), reason: None } if p.item == "p"
        ));
        assert!(matches!(
            &stmts[1],
            Stmt::Guard { condition: GuardCondition::Holds(c), reason: Some(r) }
                if c.item == "c" && r.item == "BoundsCheckException"
        ));
        assert!(matches!(
            &stmts[2],
            Stmt::Guard { condition: GuardCondition::Fails(_), reason: Some(_) }
        ));
    }

    #[test]
    fn guard_reason_is_optional() {
        let stmts = parse("param p\nc = isnull p\nguard !c\nguard c\nreturn\n");

        assert!(matches!(
            &stmts[2],
            Stmt::Guard { condition: GuardCondition::Fails(c), reason: None } if c.item == "c"
        ));
        assert!(matches!(
            &stmts[3],
            Stmt::Guard { condition: GuardCondition::Holds(_), reason: None }
        ));
        assert_eq!(stmts[4], Stmt::Return(None));
    }

    #[test]
    fn nested_blocks() {
        let stmts = parse(
            "param p
            c = isnull p
            while c {
                if c { call } else {
                    x = read p.f+8
                    return x
                }
                barrier
            }
            return",
        );

        assert_eq!(names(&stmts), vec!["p", "c"]);
        assert_eq!(stmts[3], Stmt::Return(None));

        let body = match &stmts[2] {
            Stmt::While { stmts, .. } => stmts,
            other => panic!("unexpected {other:?}"),
        };

        assert_eq!(body.len(), 2);
        assert_eq!(body[1].item, Stmt::Barrier);

        match &body[0].item {
            Stmt::If {
                stmts,
                else_stmts: Some(else_stmts),
                ..
            } => {
                assert_eq!(stmts.len(), 1);
                assert_eq!(else_stmts.len(), 2);
                assert!(matches!(&else_stmts[1].item, Stmt::Return(Some(x)) if x.item == "x"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn write_and_logic() {
        let stmts = parse("write p.f+16 = v\nd = and a b\ne = const -4\nn = null\n");

        assert!(matches!(&stmts[0], Stmt::Write { field, value, .. }
            if field.displacement == Some(16) && value.item == "v"));
        assert!(matches!(&stmts[1], Stmt::Assign { src, .. } if matches!(src.item, Expr::And(_, _))));
        assert!(matches!(&stmts[2], Stmt::Assign { src, .. } if src.item == Expr::Const(-4)));
        assert!(matches!(&stmts[3], Stmt::Assign { src, .. } if src.item == Expr::Null));
    }

    #[test]
    fn two_statements_on_one_line() {
        assert!(parse_script("call barrier\n", None).is_err());
    }

    #[test]
    fn statement_spans() {
        let stmts = parse_script("param p\n  call\n", None).unwrap();

        assert_eq!(stmts[1].span.start, 10);
    }
}
