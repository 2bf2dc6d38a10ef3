use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::Error;
use crate::loader::LoaderStore;
use crate::template::{CompiledTemplate, Template};
use crate::utils::UndefinedBehavior;

/// An abstraction that holds the engine configuration.
///
/// This object holds the central configuration state for templates.  It is
/// also the container for all registered templates.  Templates are parsed
/// when they are added, so syntax errors surface right away and a template
/// can then be rendered any number of times with different contexts.
///
/// ```
/// # use nestplate::{Environment, context};
/// let mut env = Environment::new();
/// env.add_template("person", "Name: {{ person.name }}\nAge: {{ person.age }}").unwrap();
/// let tmpl = env.get_template("person").unwrap();
/// let ctx = context!(person => context!(name => "John", age => 30));
/// assert_eq!(tmpl.render(ctx).unwrap(), "Name: John\nAge: 30");
/// ```
#[derive(Clone, Default)]
pub struct Environment {
    templates: LoaderStore,
    undefined_behavior: UndefinedBehavior,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("templates", &self.templates)
            .field("undefined_behavior", &self.undefined_behavior)
            .finish()
    }
}

impl Environment {
    /// Creates a new environment with lenient undefined handling.
    pub fn new() -> Environment {
        Environment::default()
    }

    /// Loads a template from a string into the environment.
    ///
    /// The `name` parameter defines the name of the template which identifies
    /// it.  To look up a loaded template use the
    /// [`get_template`](Self::get_template) method.  Adding a template under
    /// an existing name replaces it.
    ///
    /// ```
    /// # use nestplate::Environment;
    /// let mut env = Environment::new();
    /// env.add_template("index.md", "Hello {{ name }}!").unwrap();
    /// ```
    pub fn add_template(&mut self, name: &str, source: &str) -> Result<(), Error> {
        self.templates.insert(name, source)
    }

    /// Removes a template by name.
    pub fn remove_template(&mut self, name: &str) {
        self.templates.remove(name);
    }

    /// Fetches a template by name.
    ///
    /// This requires that the template has been loaded with
    /// [`add_template`](Environment::add_template) beforehand or that a loader
    /// knows about it.  If the template was not found an error of kind
    /// [`TemplateNotFound`](crate::ErrorKind::TemplateNotFound) is returned.
    pub fn get_template(&self, name: &str) -> Result<Template<'_>, Error> {
        self.templates
            .get(name)
            .map(|compiled| Template::new(self, compiled))
    }

    /// Parses a template from a string without registering it.
    ///
    /// The template is named `<string>` in error messages.
    pub fn template_from_str(&self, source: &str) -> Result<Template<'_>, Error> {
        self.template_from_named_str("<string>", source)
    }

    /// Like [`template_from_str`](Self::template_from_str) but with a name.
    pub fn template_from_named_str(
        &self,
        name: &str,
        source: &str,
    ) -> Result<Template<'_>, Error> {
        let compiled = ok!(CompiledTemplate::new(name, source));
        Ok(Template::new(self, Arc::new(compiled)))
    }

    /// Parses and renders a template from a string in one go.
    ///
    /// ```
    /// # use nestplate::{Environment, context};
    /// let env = Environment::new();
    /// let rv = env.render_str("Hello {{ name }}", context! { name => "World" });
    /// assert_eq!(rv.unwrap(), "Hello World");
    /// ```
    pub fn render_str<S: Serialize>(&self, source: &str, ctx: S) -> Result<String, Error> {
        ok!(self.template_from_str(source)).render(ctx)
    }

    /// Sets a new function to select the default undefined behavior.
    ///
    /// This changes the runtime behavior of undefined values in the template
    /// engine.  For more information see [`UndefinedBehavior`].  The
    /// default is [`UndefinedBehavior::Lenient`].
    pub fn set_undefined_behavior(&mut self, behavior: UndefinedBehavior) {
        self.undefined_behavior = behavior;
    }

    /// Returns the current undefined behavior.
    pub fn undefined_behavior(&self) -> UndefinedBehavior {
        self.undefined_behavior
    }

    /// Registers a template loader as source of templates.
    ///
    /// When a template loader is registered, the environment gains the ability
    /// to dynamically load templates.  The loader is invoked with the name of
    /// the template.  If this template exists `Ok(Some(template_source))` has
    /// to be returned, otherwise `Ok(None)`.  Once a template has been loaded
    /// it's cached in the environment.
    ///
    /// For loading templates from the file system, you can use the
    /// [`path_loader`](crate::path_loader) function.
    ///
    /// ```
    /// # use nestplate::Environment;
    /// let mut env = Environment::new();
    /// env.set_loader(|name| {
    ///     if name == "layout.md" {
    ///         Ok(Some("# {{ title }}\n".into()))
    ///     } else {
    ///         Ok(None)
    ///     }
    /// });
    /// assert!(env.get_template("layout.md").is_ok());
    /// ```
    #[cfg(feature = "loader")]
    pub fn set_loader<F>(&mut self, f: F)
    where
        F: Fn(&str) -> Result<Option<String>, Error> + Send + Sync + 'static,
    {
        self.templates.set_loader(f);
    }
}
