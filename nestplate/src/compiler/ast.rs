use std::fmt;
use std::ops::Deref;

use crate::compiler::tokens::Span;

/// Container for nodes with location info.
///
/// This container fulfills two purposes: it adds location information
/// to nodes, but it also ensures the nodes is heap allocated.  The
/// latter keeps the enums below small.
pub struct Spanned<T> {
    inner: Box<(T, Span)>,
}

impl<T> Spanned<T> {
    /// Creates a new spanned node.
    pub fn new(node: T, span: Span) -> Spanned<T> {
        Spanned {
            inner: Box::new((node, span)),
        }
    }

    /// Accesses the span.
    pub fn span(&self) -> Span {
        self.inner.1
    }
}

impl<T> Deref for Spanned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner.0
    }
}

impl<T: fmt::Debug> fmt::Debug for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ok!(fmt::Debug::fmt(&self.inner.0, f));
        write!(f, "{:?}", self.inner.1)
    }
}

/// A statement node.
pub enum Stmt {
    Template(Spanned<Template>),
    EmitRaw(Spanned<EmitRaw>),
    EmitExpr(Spanned<EmitExpr>),
    ForLoop(Spanned<ForLoop>),
    IfCond(Spanned<IfCond>),
}

impl fmt::Debug for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Template(s) => fmt::Debug::fmt(s, f),
            Stmt::EmitRaw(s) => fmt::Debug::fmt(s, f),
            Stmt::EmitExpr(s) => fmt::Debug::fmt(s, f),
            Stmt::ForLoop(s) => fmt::Debug::fmt(s, f),
            Stmt::IfCond(s) => fmt::Debug::fmt(s, f),
        }
    }
}

/// An expression node.
pub enum Expr {
    Path(Spanned<Path>),
    Not(Spanned<Not>),
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Path(s) => fmt::Debug::fmt(s, f),
            Expr::Not(s) => fmt::Debug::fmt(s, f),
        }
    }
}

impl Expr {
    /// Returns the span of the expression.
    pub fn span(&self) -> Span {
        match self {
            Expr::Path(s) => s.span(),
            Expr::Not(s) => s.span(),
        }
    }
}

/// Root template node.
#[derive(Debug)]
pub struct Template {
    pub children: Vec<Stmt>,
}

/// Outputs the template source verbatim.
#[derive(Debug)]
pub struct EmitRaw {
    pub raw: String,
}

/// Outputs the value an expression resolves to.
#[derive(Debug)]
pub struct EmitExpr {
    pub expr: Expr,
}

/// A for loop.
///
/// With a single target a sequence binds its items and a mapping binds its
/// keys.  With a second target a mapping binds key and value and a sequence
/// unpacks two element items.
#[derive(Debug)]
pub struct ForLoop {
    pub target: String,
    pub value_target: Option<String>,
    pub iter: Expr,
    pub body: Vec<Stmt>,
}

/// An if/else condition.
///
/// `elif` branches are represented as a nested condition that is the only
/// statement of the `false_body`.
#[derive(Debug)]
pub struct IfCond {
    pub expr: Expr,
    pub true_body: Vec<Stmt>,
    pub false_body: Vec<Stmt>,
}

/// A dotted lookup path (`section.subsections`, `years.2023`).
#[derive(Debug)]
pub struct Path {
    pub root: String,
    pub attrs: Vec<String>,
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ok!(f.write_str(&self.root));
        for attr in &self.attrs {
            ok!(write!(f, ".{}", attr));
        }
        Ok(())
    }
}

/// Negates the truthiness of an expression.
#[derive(Debug)]
pub struct Not {
    pub expr: Expr,
}
