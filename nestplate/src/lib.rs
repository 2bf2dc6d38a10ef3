//! nestplate: a minimal template engine for hierarchical data.
//!
//! nestplate substitutes trees of mappings, sequences and scalars (the kind
//! of data a YAML or JSON document decodes into) into text.  It is built on
//! top of [`serde`]: anything that implements `Serialize` can be used as a
//! context, and documents can be deserialized straight into a
//! [`Value`](value::Value).
//!
//! ```md
//! # {{ employee.name }}
//! {% for skill in employee.skills %}
//! - {{ skill }}
//! {% endfor %}
//! ```
//!
//! # Template Syntax
//!
//! Templates are plain text with two kinds of directives:
//!
//! * `{{ path }}` outputs the value a dotted path resolves to.  The first
//!   segment is looked up in the innermost loop scope first, then in the
//!   enclosing scopes and finally in the root context.  Every further segment
//!   is a mapping key (`years.2023` looks up the key `"2023"`).
//! * `{% ... %}` blocks:
//!   * `{% for item in path %}...{% endfor %}` iterates over a sequence (or
//!     the keys of a mapping).
//!   * `{% for key, value in path %}...{% endfor %}` iterates over the entries
//!     of a mapping in insertion order.
//!   * `{% if path %}...{% elif path %}...{% else %}...{% endif %}` renders
//!     a branch depending on the truthiness of a value.  Conditions can be
//!     negated with `not`.
//!
//! Inside of loops the `loop` variable exposes `index`, `index0`,
//! `revindex`, `revindex0`, `first`, `last` and `length`.
//!
//! All text outside of directives is emitted byte for byte, including
//! whitespace around blocks and the trailing newline.
//!
//! # Undefined Values
//!
//! By default a path that does not resolve renders as an empty string, is
//! falsy in conditions and iterates zero times.  With
//! [`UndefinedBehavior::Strict`] these cases become errors instead.
//!
//! # Example
//!
//! ```
//! use nestplate::{Environment, context};
//!
//! let mut env = Environment::new();
//! env.add_template("skills", "{% for skill in employee.skills %}\n- {{ skill }}\n{% endfor %}").unwrap();
//! let tmpl = env.get_template("skills").unwrap();
//! let rv = tmpl.render(context!(employee => context!(skills => vec!["Python", "Java", "SQL"]))).unwrap();
//! assert_eq!(rv, "\n- Python\n\n- Java\n\n- SQL\n");
//! ```
//!
//! # Learn more
//!
//! - [`Environment`]: the main API entry point.  Holds templates and
//!   configuration.
//! - [`Template`]: the template object API.  Shows how templates can be
//!   rendered.
//! - [`value`]: the context value type and its serde integration.
//!
//! # Optional Features
//!
//! - `loader`: enables the [`path_loader`] and
//!   [`Environment::set_loader`] (enabled by default).
//! - `unstable_machinery`: exposes the tokenizer and parser in
//!   [`machinery`] for debugging tools.  No stability guarantees apply.
#![allow(clippy::get_first)]
#![deny(missing_docs)]

#[macro_use]
mod macros;

mod compiler;
mod environment;
mod error;
mod loader;
mod output;
mod template;
mod utils;
mod vm;

pub mod value;

#[cfg(feature = "loader")]
pub use loader::path_loader;

pub use self::environment::Environment;
pub use self::error::{Error, ErrorKind};
pub use self::template::Template;
pub use self::utils::UndefinedBehavior;

#[doc(hidden)]
pub use self::macros::__context;

/// This module gives access to the low level machinery.
///
/// This module is only provided by the `unstable_machinery` feature and does not
/// have a stable interface.  It exists for debugging, for instance to dump the
/// tokens or the node tree of a template.
#[cfg(feature = "unstable_machinery")]
pub mod machinery {
    #![allow(missing_docs)]
    pub use crate::compiler::ast;
    pub use crate::compiler::lexer::{tokenize, Tokenizer};
    pub use crate::compiler::parser::parse;
    pub use crate::compiler::tokens::{Span, Token};
}
