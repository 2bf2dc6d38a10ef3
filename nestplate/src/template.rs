use std::sync::Arc;
use std::{fmt, io};

use serde::Serialize;

use crate::compiler::ast;
use crate::compiler::parser::parse;
use crate::environment::Environment;
use crate::error::Error;
use crate::output::{Output, WriteWrapper};
use crate::value::Value;
use crate::vm::Vm;

/// A parsed template: its name, its source and the node tree.
///
/// The tree is immutable once built and shared between all renders.
pub(crate) struct CompiledTemplate {
    name: String,
    source: String,
    ast: ast::Stmt,
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("name", &self.name)
            .field("ast", &self.ast)
            .finish()
    }
}

impl CompiledTemplate {
    pub fn new(name: &str, source: &str) -> Result<CompiledTemplate, Error> {
        let ast = ok!(parse(source, name));
        Ok(CompiledTemplate {
            name: name.to_string(),
            source: source.to_string(),
            ast,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Represents a handle to a template.
///
/// Templates are stored in the [`Environment`] as parsed node trees.  With
/// the [`Environment::get_template`] method that is looked up and returned in
/// form of this handle.  Such a template can be cheaply cloned.
///
/// To render the [`render`](Template::render) method can be used.
#[derive(Clone)]
pub struct Template<'env> {
    env: &'env Environment,
    compiled: Arc<CompiledTemplate>,
}

impl fmt::Debug for Template<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name())
            .field("undefined_behavior", &self.env.undefined_behavior())
            .finish()
    }
}

impl<'env> Template<'env> {
    pub(crate) fn new(env: &'env Environment, compiled: Arc<CompiledTemplate>) -> Template<'env> {
        Template { env, compiled }
    }

    /// Returns the name of the template.
    pub fn name(&self) -> &str {
        self.compiled.name()
    }

    /// Returns the source code of the template.
    pub fn source(&self) -> &str {
        self.compiled.source()
    }

    /// Renders the template into a string.
    ///
    /// The provided value is used as the root context for the template.  It
    /// can be any object that implements [`Serialize`](serde::Serialize).  You
    /// can either create your own struct and derive `Serialize` for it, pass a
    /// [`Value`] that was deserialized from a YAML or JSON document, or use the
    /// [`context!`](crate::context) macro to create an ad-hoc context.
    ///
    /// ```
    /// # use nestplate::{Environment, context};
    /// # let mut env = Environment::new();
    /// # env.add_template("hello", "Hello {{ name }}!").unwrap();
    /// let tmpl = env.get_template("hello").unwrap();
    /// println!("{}", tmpl.render(context!(name => "John")).unwrap());
    /// ```
    ///
    /// **Note on values:** The [`Value`] type implements `Serialize` and can be
    /// efficiently passed to render.  It does not undergo actual serialization.
    pub fn render<S: Serialize>(&self, ctx: S) -> Result<String, Error> {
        let mut rv = String::with_capacity(self.source().len());
        ok!(self._eval(ok!(Value::try_from_serialize(&ctx)), &mut Output::new(&mut rv)));
        Ok(rv)
    }

    /// Renders the template into an [`io::Write`].
    ///
    /// This works exactly like [`render`](Self::render) but instead writes the
    /// template as it's evaluating into an [`io::Write`].  I/O failures are
    /// reported as [`WriteFailure`](crate::ErrorKind::WriteFailure) with the
    /// original error as source.
    ///
    /// ```
    /// # use nestplate::{Environment, context};
    /// # let mut env = Environment::new();
    /// # env.add_template("hello", "Hello {{ name }}!").unwrap();
    /// use std::io::stdout;
    ///
    /// let tmpl = env.get_template("hello").unwrap();
    /// tmpl.render_to_write(context!(name => "John"), &mut stdout()).unwrap();
    /// ```
    pub fn render_to_write<S: Serialize, W: io::Write>(&self, ctx: S, w: W) -> Result<(), Error> {
        let root = ok!(Value::try_from_serialize(&ctx));
        let mut wrapper = WriteWrapper { w, err: None };
        self._eval(root, &mut Output::new(&mut wrapper))
            .map_err(|err| wrapper.take_err(err))
    }

    /// Renders the template into a [`fmt::Write`].
    ///
    /// ```
    /// # use nestplate::{Environment, context};
    /// # let env = Environment::new();
    /// let tmpl = env.template_from_str("- {{ skill }}\n").unwrap();
    /// let mut buf = String::from("Skills:\n");
    /// tmpl.render_to_fmt(context!(skill => "SQL"), &mut buf).unwrap();
    /// assert_eq!(buf, "Skills:\n- SQL\n");
    /// ```
    pub fn render_to_fmt<S: Serialize, W: fmt::Write>(
        &self,
        ctx: S,
        mut w: W,
    ) -> Result<(), Error> {
        let root = ok!(Value::try_from_serialize(&ctx));
        self._eval(root, &mut Output::new(&mut w))
    }

    fn _eval(&self, root: Value, out: &mut Output) -> Result<(), Error> {
        Vm::new(self.name(), self.env.undefined_behavior())
            .eval(&self.compiled.ast, root, out)
            .map_err(|mut err| {
                err.set_template_source(self.source());
                err
            })
    }
}
