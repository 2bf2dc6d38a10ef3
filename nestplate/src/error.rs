use std::borrow::Cow;
use std::fmt;

/// Represents template errors.
///
/// Errors raised while parsing carry the name of the template and the line
/// the parser stopped at.  Errors raised while rendering (only possible in
/// [`Strict`](crate::UndefinedBehavior::Strict) mode or when the output sink
/// fails) carry the line of the node that failed.
///
/// # Example
///
/// Here is an example of how you might want to render errors:
///
/// ```rust
/// # let mut env = nestplate::Environment::new();
/// # env.add_template("", "").unwrap();
/// # let template = env.get_template("").unwrap(); let ctx = ();
/// match template.render(ctx) {
///     Ok(result) => println!("{}", result),
///     Err(err) => {
///         eprintln!("Could not render template: {}", err);
///         eprintln!("{}", err.display_debug_info());
///     }
/// }
/// ```
pub struct Error {
    repr: Box<ErrorRepr>,
}

struct ErrorRepr {
    kind: ErrorKind,
    detail: Option<Cow<'static, str>>,
    name: Option<String>,
    lineno: usize,
    template_source: Option<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut err = f.debug_struct("Error");
        err.field("kind", &self.kind());
        if let Some(ref detail) = self.repr.detail {
            err.field("detail", detail);
        }
        if let Some(ref name) = self.name() {
            err.field("name", name);
        }
        if let Some(line) = self.line() {
            err.field("line", &line);
        }
        if let Some(ref source) = std::error::Error::source(self) {
            err.field("source", source);
        }
        ok!(err.finish());

        if !f.alternate() && self.template_source().is_some() {
            ok!(writeln!(f));
            ok!(writeln!(f, "{}", self.display_debug_info()));
        }
        Ok(())
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
    }
}

impl Eq for Error {}

/// An enum describing the error kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A malformed or unbalanced directive was encountered while parsing.
    SyntaxError,
    /// A path did not resolve and the engine runs in strict mode.
    UndefinedError,
    /// The operation is not valid for the value it was applied to.
    InvalidOperation,
    /// A template was not found.
    TemplateNotFound,
    /// A value could not be converted from its serde representation.
    BadSerialization,
    /// The output sink failed while rendering.
    WriteFailure,
}

impl ErrorKind {
    fn description(self) -> &'static str {
        match self {
            ErrorKind::SyntaxError => "syntax error",
            ErrorKind::UndefinedError => "undefined value",
            ErrorKind::InvalidOperation => "invalid operation",
            ErrorKind::TemplateNotFound => "template not found",
            ErrorKind::BadSerialization => "could not serialize to value",
            ErrorKind::WriteFailure => "failed to write output",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref detail) = self.repr.detail {
            ok!(write!(f, "{}: {}", self.kind(), detail));
        } else {
            ok!(write!(f, "{}", self.kind()));
        }
        if let Some(ref filename) = self.name() {
            ok!(write!(f, " (in {}:{})", filename, self.repr.lineno))
        }
        Ok(())
    }
}

impl Error {
    /// Creates a new error with kind and detail.
    pub fn new<D: Into<Cow<'static, str>>>(kind: ErrorKind, detail: D) -> Error {
        Error {
            repr: Box::new(ErrorRepr {
                kind,
                detail: Some(detail.into()),
                name: None,
                lineno: 0,
                template_source: None,
                source: None,
            }),
        }
    }

    pub(crate) fn set_filename_and_line(&mut self, filename: &str, lineno: usize) {
        self.repr.name = Some(filename.into());
        self.repr.lineno = lineno;
    }

    pub(crate) fn set_template_source(&mut self, source: &str) {
        self.repr.template_source = Some(source.to_string());
    }

    /// Attaches another error as source to this error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.repr.source = Some(Box::new(source));
        self
    }

    /// Returns the error kind
    pub fn kind(&self) -> ErrorKind {
        self.repr.kind
    }

    /// Returns the error detail
    ///
    /// The detail is an error message that provides further details about
    /// the error kind.
    pub fn detail(&self) -> Option<&str> {
        self.repr.detail.as_deref()
    }

    /// Returns the filename of the template that caused the error.
    pub fn name(&self) -> Option<&str> {
        self.repr.name.as_deref()
    }

    /// Returns the line number where the error occurred.
    pub fn line(&self) -> Option<usize> {
        self.repr.name.as_ref().map(|_| self.repr.lineno)
    }

    /// Returns the template source if it was attached.
    pub fn template_source(&self) -> Option<&str> {
        self.repr.template_source.as_deref()
    }

    /// Returns an object that renders the source context of the error.
    ///
    /// The failing line is marked with `>` and up to three lines before and
    /// after it are shown.  If no source is attached this renders nothing.
    pub fn display_debug_info(&self) -> impl fmt::Display + '_ {
        struct Proxy<'a>(&'a Error);

        impl fmt::Display for Proxy<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.0.template_source() {
                    Some(source) => render_source_context(f, self.0, source),
                    None => Ok(()),
                }
            }
        }

        Proxy(self)
    }
}

fn render_source_context(f: &mut fmt::Formatter<'_>, err: &Error, source: &str) -> fmt::Result {
    let title = format!(
        " {} ",
        err.name().unwrap_or("<template>").rsplit(['/', '\\']).next().unwrap_or("")
    );
    ok!(writeln!(f, "{title:-^74}"));
    let lines: Vec<_> = source.lines().enumerate().collect();
    let idx = err.line().unwrap_or(1).saturating_sub(1);
    let skip = idx.saturating_sub(3);
    let pre = lines.iter().skip(skip).take(3.min(idx));
    let post = lines.iter().skip(idx + 1).take(3);
    for (idx, line) in pre {
        ok!(writeln!(f, "{:>4} | {}", idx + 1, line));
    }
    if let Some((_, line)) = lines.get(idx) {
        ok!(writeln!(f, "{:>4} > {}", idx + 1, line));
    }
    for (idx, line) in post {
        ok!(writeln!(f, "{:>4} | {}", idx + 1, line));
    }
    write!(f, "{:-^74}", "")
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.repr.source.as_ref().map(|err| err.as_ref() as _)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            repr: Box::new(ErrorRepr {
                kind,
                detail: None,
                name: None,
                lineno: 0,
                template_source: None,
                source: None,
            }),
        }
    }
}

impl serde::ser::Error for Error {
    fn custom<T>(msg: T) -> Self
    where
        T: fmt::Display,
    {
        Error::new(ErrorKind::BadSerialization, msg.to_string())
    }
}
