use crate::compiler::ast::{self, Spanned};
use crate::compiler::tokens::Span;
use crate::error::{Error, ErrorKind};
use crate::output::Output;
use crate::utils::UndefinedBehavior;
use crate::value::{Value, ValueRepr};
use crate::vm::context::{Context, Frame, LoopState};

mod context;

/// Walks a template AST and writes the result into an [`Output`].
#[derive(Debug)]
pub(crate) struct Vm<'a> {
    name: &'a str,
    undefined_behavior: UndefinedBehavior,
}

/// Per render state: the scope stack and the output sink.
struct State<'template, 'out, 'buf> {
    ctx: Context<'template>,
    out: &'out mut Output<'buf>,
}

impl<'a> Vm<'a> {
    /// Creates a new VM.
    ///
    /// `name` is only used to annotate errors.
    pub fn new(name: &'a str, undefined_behavior: UndefinedBehavior) -> Vm<'a> {
        Vm {
            name,
            undefined_behavior,
        }
    }

    /// Evaluates a template against a root context.
    pub fn eval(&self, template: &ast::Stmt, root: Value, out: &mut Output) -> Result<(), Error> {
        let mut state = State {
            ctx: Context::new(root),
            out,
        };
        self.eval_stmt(template, &mut state)
    }

    fn eval_stmt<'template>(
        &self,
        stmt: &'template ast::Stmt,
        state: &mut State<'template, '_, '_>,
    ) -> Result<(), Error> {
        match stmt {
            ast::Stmt::Template(tmpl) => self.eval_body(&tmpl.children, state),
            ast::Stmt::EmitRaw(raw) => state
                .out
                .write_str(&raw.raw)
                .map_err(|err| self.locate(err, raw.span())),
            ast::Stmt::EmitExpr(emit) => self.eval_emit(emit, state),
            ast::Stmt::ForLoop(for_loop) => self.eval_for_loop(for_loop, state),
            ast::Stmt::IfCond(cond) => {
                let value = ok!(self.eval_expr(&cond.expr, &state.ctx));
                if value.is_undefined() && self.is_strict() {
                    return Err(self.undefined(&cond.expr));
                }
                if value.is_true() {
                    self.eval_body(&cond.true_body, state)
                } else {
                    self.eval_body(&cond.false_body, state)
                }
            }
        }
    }

    fn eval_body<'template>(
        &self,
        body: &'template [ast::Stmt],
        state: &mut State<'template, '_, '_>,
    ) -> Result<(), Error> {
        for stmt in body {
            ok!(self.eval_stmt(stmt, state));
        }
        Ok(())
    }

    fn eval_emit(
        &self,
        emit: &Spanned<ast::EmitExpr>,
        state: &mut State<'_, '_, '_>,
    ) -> Result<(), Error> {
        let value = ok!(self.eval_expr(&emit.expr, &state.ctx));
        if value.is_undefined() && self.is_strict() {
            return Err(self.undefined(&emit.expr));
        }
        // none and undefined display as empty strings, skip the formatter
        if matches!(value.0, ValueRepr::None | ValueRepr::Undefined) {
            return Ok(());
        }
        let rv = match value.as_str() {
            Some(s) => state.out.write_str(s),
            None => write!(state.out, "{}", value),
        };
        rv.map_err(|err| self.locate(err, emit.span()))
    }

    fn eval_for_loop<'template>(
        &self,
        for_loop: &'template Spanned<ast::ForLoop>,
        state: &mut State<'template, '_, '_>,
    ) -> Result<(), Error> {
        let iterable = ok!(self.eval_expr(&for_loop.iter, &state.ctx));
        let len = match iterable.0 {
            ValueRepr::Seq(ref items) => items.len(),
            ValueRepr::Map(ref entries) => entries.len(),
            ValueRepr::Undefined if self.is_strict() => {
                return Err(self.undefined(&for_loop.iter));
            }
            ValueRepr::Undefined => 0,
            _ if self.is_strict() => {
                return Err(self.locate(
                    Error::new(
                        ErrorKind::InvalidOperation,
                        format!("{} is not iterable", iterable.kind()),
                    ),
                    for_loop.iter.span(),
                ));
            }
            _ => 0,
        };
        if len == 0 {
            return Ok(());
        }

        state.ctx.push_frame(Frame::default());
        let rv = match iterable.0 {
            ValueRepr::Seq(ref items) => items.iter().enumerate().try_for_each(|(idx, item)| {
                match for_loop.value_target {
                    None => state.ctx.store(&for_loop.target, item.clone()),
                    Some(ref value_target) => {
                        let (first, second) = ok!(self.unpack_pair(item, for_loop));
                        state.ctx.store(&for_loop.target, first);
                        state.ctx.store(value_target, second);
                    }
                }
                state.ctx.set_loop_state(LoopState { idx, len });
                self.eval_body(&for_loop.body, state)
            }),
            ValueRepr::Map(ref entries) => {
                entries
                    .iter()
                    .enumerate()
                    .try_for_each(|(idx, (key, value))| {
                        state.ctx.store(&for_loop.target, Value::from(key.clone()));
                        if let Some(ref value_target) = for_loop.value_target {
                            state.ctx.store(value_target, value.clone());
                        }
                        state.ctx.set_loop_state(LoopState { idx, len });
                        self.eval_body(&for_loop.body, state)
                    })
            }
            _ => Ok(()),
        };
        state.ctx.pop_frame();
        rv
    }

    /// Splits a sequence item into the two loop variables.
    ///
    /// Missing parts are bound to undefined so they still shadow outer
    /// variables of the same name.
    fn unpack_pair(
        &self,
        item: &Value,
        for_loop: &Spanned<ast::ForLoop>,
    ) -> Result<(Value, Value), Error> {
        match item.as_seq() {
            Some(items) => Ok((
                items.first().cloned().unwrap_or_default(),
                items.get(1).cloned().unwrap_or_default(),
            )),
            None if self.is_strict() => Err(self.locate(
                Error::new(
                    ErrorKind::InvalidOperation,
                    format!("cannot unpack {} into two loop variables", item.kind()),
                ),
                for_loop.span(),
            )),
            None => Ok((Value::UNDEFINED, Value::UNDEFINED)),
        }
    }

    fn eval_expr(&self, expr: &ast::Expr, ctx: &Context) -> Result<Value, Error> {
        match expr {
            ast::Expr::Path(path) => Ok(resolve_path(path, ctx)),
            ast::Expr::Not(not) => {
                let value = ok!(self.eval_expr(&not.expr, ctx));
                if value.is_undefined() && self.is_strict() {
                    return Err(self.undefined(&not.expr));
                }
                Ok(Value::from(!value.is_true()))
            }
        }
    }

    fn is_strict(&self) -> bool {
        matches!(self.undefined_behavior, UndefinedBehavior::Strict)
    }

    fn undefined(&self, expr: &ast::Expr) -> Error {
        let detail = match expr {
            ast::Expr::Path(path) => format!("`{}` is undefined", &**path),
            ast::Expr::Not(_) => "negated value is undefined".to_string(),
        };
        self.locate(Error::new(ErrorKind::UndefinedError, detail), expr.span())
    }

    fn locate(&self, mut err: Error, span: Span) -> Error {
        if err.line().is_none() {
            err.set_filename_and_line(self.name, span.start_line as usize);
        }
        err
    }
}

/// Resolves a dotted path against the scope stack.
///
/// The first segment walks the scopes from the innermost outwards, every
/// further segment must be a key of a mapping.
fn resolve_path(path: &ast::Path, ctx: &Context) -> Value {
    let mut rv = match ctx.load(&path.root) {
        Some(value) => value,
        None => return Value::UNDEFINED,
    };
    for attr in &path.attrs {
        rv = match rv.get_attr(attr) {
            Some(value) => value.clone(),
            None => return Value::UNDEFINED,
        };
    }
    rv
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    use crate::compiler::parser::parse;
    use crate::context;

    fn render(source: &str, ctx: Value, behavior: UndefinedBehavior) -> Result<String, Error> {
        let ast = ok!(parse(source, "test.md"));
        let mut rv = String::new();
        ok!(Vm::new("test.md", behavior).eval(&ast, ctx, &mut Output::new(&mut rv)));
        Ok(rv)
    }

    #[test]
    fn test_resolve_path() {
        let ctx = Context::new(context!(a => context!(b => context!(c => 42)), s => "x"));
        let path = |root: &str, attrs: &[&str]| ast::Path {
            root: root.into(),
            attrs: attrs.iter().map(|x| x.to_string()).collect(),
        };
        assert_eq!(resolve_path(&path("a", &["b", "c"]), &ctx), Value::from(42));
        assert!(resolve_path(&path("a", &["x"]), &ctx).is_undefined());
        assert!(resolve_path(&path("s", &["len"]), &ctx).is_undefined());
        assert!(resolve_path(&path("missing", &[]), &ctx).is_undefined());
    }

    #[test]
    fn test_loop_frames_are_popped() {
        let rv = render(
            "{% for x in items %}{{ x }}{% endfor %}[{{ x }}]",
            context!(items => vec![1, 2], x => "outer"),
            UndefinedBehavior::Lenient,
        )
        .unwrap();
        assert_eq!(rv, "12[outer]");
    }

    #[test]
    fn test_unpack_pairs() {
        let ctx = context!(pairs => vec![vec!["a", "1"], vec!["b"]], plain => vec!["x"]);
        let rv = render(
            "{% for k, v in pairs %}{{ k }}={{ v }};{% endfor %}",
            ctx.clone(),
            UndefinedBehavior::Lenient,
        )
        .unwrap();
        assert_eq!(rv, "a=1;b=;");

        let err = render(
            "{% for k, v in plain %}{% endfor %}",
            ctx,
            UndefinedBehavior::Strict,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert_eq!(
            err.detail(),
            Some("cannot unpack string into two loop variables")
        );
    }

    #[test]
    fn test_strict_errors_carry_location() {
        let err = render(
            "line one\n{{ person.nmae }}",
            context!(person => context!(name => "John")),
            UndefinedBehavior::Strict,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UndefinedError);
        assert_eq!(err.detail(), Some("`person.nmae` is undefined"));
        assert_eq!(err.line(), Some(2));
        assert_eq!(err.name(), Some("test.md"));
    }
}
