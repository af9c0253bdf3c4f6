use super::graph::Graph;
use super::graph_builder::GraphBuilder;
use super::node::{DeoptReason, NodeId};
use crate::location_map::{Location, LocationMap};
use crate::parser::{
    parse_script, Expr, Field, GuardCondition, Name, ParseError, ParseErrorItem, Span, Spanned, Stmt,
};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Parses and lowers a graph script in one go.
pub fn build_graph(input: &str, path: Option<String>) -> Result<(Graph, LocationMap), ParseError> {
    let stmts = parse_script(input, path.clone())?;

    lower_script(&stmts, input).map_err(|mut err| {
        err.set_path(path);
        err
    })
}

/// Lowers parsed statements into a graph. `source` is the text the
/// statements were parsed from and only serves to locate errors.
pub fn lower_script(stmts: &[Spanned<Stmt>], source: &str) -> Result<(Graph, LocationMap), ParseError> {
    let mut ctx = LoweringCtx::new();

    ctx.generate_block(stmts);

    if !ctx.errors.is_empty() {
        return Err(ParseError::new(ctx.errors, source));
    }

    let (graph, locations) = ctx.builder.into_parts();

    debug!("lowered script into {} nodes", graph.node_count());

    Ok((graph, locations))
}

struct LoweringCtx {
    builder: GraphBuilder,
    scopes: Vec<FxHashMap<String, NodeId>>,
    errors: Vec<Spanned<ParseErrorItem>>,
}

impl LoweringCtx {
    fn new() -> Self {
        Self {
            builder: GraphBuilder::new(),
            scopes: vec![FxHashMap::default()],
            errors: vec![],
        }
    }

    fn generate_block(&mut self, stmts: &[Spanned<Stmt>]) {
        for stmt in stmts.iter() {
            if !self.builder.is_reachable() {
                self.error(ParseErrorItem::Unreachable, stmt.span);
                return;
            }

            // a failed statement is skipped, the rest is still checked
            let _ = self.generate_stmt(&stmt.item);
        }
    }

    fn generate_scoped_block(&mut self, stmts: &[Spanned<Stmt>]) {
        self.scopes.push(FxHashMap::default());
        self.generate_block(stmts);
        self.scopes.pop();
    }

    fn generate_stmt(&mut self, stmt: &Stmt) -> Option<()> {
        match stmt {
            Stmt::Param(name) => {
                let param = self.builder.parameter();

                self.define(name, param);
            }
            Stmt::Assign { dest, src } => {
                let value = self.generate_expr(&src.item)?;

                self.define(dest, value);
            }
            Stmt::Write { object, field, value } => self.generate_write(object, field, value)?,
            Stmt::Call => {
                self.builder.invoke();
            }
            Stmt::Barrier => {
                self.builder.barrier();
            }
            Stmt::Guard { condition, reason } => self.generate_guard(condition, reason.as_ref())?,
            Stmt::If {
                cond,
                stmts,
                else_stmts,
            } => self.generate_if(cond, stmts, else_stmts.as_deref())?,
            Stmt::While { cond, stmts } => self.generate_while(cond, stmts)?,
            Stmt::Return(value) => {
                let value = match value {
                    Some(name) => Some(self.lookup(name)?),
                    None => None,
                };

                self.builder.return_value(value);
            }
            Stmt::Deopt(reason) => {
                let reason = self.reason(reason)?;

                self.builder.deoptimize(reason);
            }
        }

        Some(())
    }

    fn generate_expr(&mut self, expr: &Expr) -> Option<NodeId> {
        let value = match expr {
            Expr::Read { object, field } => {
                let object = self.lookup(object)?;
                let location = self.location(field);

                self.builder.read(object, location)
            }
            Expr::IsNull(object) => {
                let object = self.lookup(object)?;

                self.builder.is_null(object)
            }
            Expr::Equals(x, y) => {
                let (x, y) = self.lookup_pair(x, y)?;

                self.builder.equals(x, y)
            }
            Expr::LessThan(x, y) => {
                let (x, y) = self.lookup_pair(x, y)?;

                self.builder.less_than(x, y)
            }
            Expr::Not(x) => {
                let x = self.lookup(x)?;

                self.builder.not(x)
            }
            Expr::And(x, y) => {
                let (x, y) = self.lookup_pair(x, y)?;

                self.builder.and(x, y)
            }
            Expr::Or(x, y) => {
                let (x, y) = self.lookup_pair(x, y)?;

                self.builder.or(x, y)
            }
            Expr::Const(value) => self.builder.constant(*value),
            Expr::Null => self.builder.null(),
        };

        Some(value)
    }

    fn generate_write(&mut self, object: &Name, field: &Field, value: &Name) -> Option<()> {
        let (object, value) = self.lookup_pair(object, value)?;
        let location = self.location(field);

        if location.identity.is_final() {
            self.error(ParseErrorItem::WriteToFinal, field.location.span);
            return None;
        }

        self.builder.write(object, location, value);

        Some(())
    }

    fn generate_guard(&mut self, condition: &GuardCondition, reason: Option<&Name>) -> Option<()> {
        match condition {
            GuardCondition::NonNull(object) => {
                let object = self.lookup(object)?;

                self.builder.null_guard(object);
            }
            GuardCondition::Holds(cond) | GuardCondition::Fails(cond) => {
                let cond = self.lookup(cond)?;
                let reason = match reason {
                    Some(reason) => self.reason(reason)?,
                    None => DeoptReason::RuntimeConstraint,
                };
                let negated = matches!(condition, GuardCondition::Fails(_));

                self.builder.guard(cond, reason, negated);
            }
        }

        Some(())
    }

    fn generate_if(
        &mut self,
        cond: &Name,
        stmts: &[Spanned<Stmt>],
        else_stmts: Option<&[Spanned<Stmt>]>,
    ) -> Option<()> {
        let cond = self.lookup(cond)?;

        self.builder.begin_if(cond);
        self.generate_scoped_block(stmts);

        if let Some(else_stmts) = else_stmts {
            self.builder.begin_else();
            self.generate_scoped_block(else_stmts);
        }

        self.builder.end_if();

        Some(())
    }

    fn generate_while(&mut self, cond: &Name, stmts: &[Spanned<Stmt>]) -> Option<()> {
        let cond = self.lookup(cond)?;

        self.builder.begin_while(cond);
        self.generate_scoped_block(stmts);
        self.builder.end_while();

        Some(())
    }

    fn location(&mut self, field: &Field) -> Location {
        let identity = self.builder.location(&field.location.item);

        match field.displacement {
            Some(displacement) => Location::constant(identity, displacement),
            None => Location::indexed(identity),
        }
    }

    fn reason(&mut self, reason: &Name) -> Option<DeoptReason> {
        match reason.item.parse() {
            Ok(reason) => Some(reason),
            Err(_) => {
                self.error(ParseErrorItem::UnknownReason(reason.item.clone()), reason.span);
                None
            }
        }
    }

    fn define(&mut self, name: &Name, value: NodeId) {
        if self.resolve(&name.item).is_some() {
            self.error(ParseErrorItem::Redefined(name.item.clone()), name.span);
            return;
        }

        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.item.clone(), value);
        }
    }

    fn lookup(&mut self, name: &Name) -> Option<NodeId> {
        let value = self.resolve(&name.item);

        if value.is_none() {
            self.error(ParseErrorItem::UnknownName(name.item.clone()), name.span);
        }

        value
    }

    fn lookup_pair(&mut self, x: &Name, y: &Name) -> Option<(NodeId, NodeId)> {
        let x = self.lookup(x);
        let y = self.lookup(y);

        Some((x?, y?))
    }

    fn resolve(&self, name: &str) -> Option<NodeId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    fn error(&mut self, item: ParseErrorItem, span: Span) {
        self.errors.push(Spanned::new(item, span));
    }
}
