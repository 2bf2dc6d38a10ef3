use std::fmt;

/// Represents a token in the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Raw template data.
    TemplateData(&'a str),
    /// Variable block start (`{{`).
    VariableStart,
    /// Variable block end (`}}`).
    VariableEnd,
    /// Statement block start (`{%`).
    BlockStart,
    /// Statement block end (`%}`).
    BlockEnd,
    /// An identifier.
    Ident(&'a str),
    /// A run of digits, only valid as a path segment.
    Int(&'a str),
    /// A dot operator (`.`)
    Dot,
    /// The comma operator (`,`)
    Comma,
}

impl<'a> fmt::Display for Token<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::TemplateData(_) => f.write_str("template-data"),
            Token::VariableStart => f.write_str("start of variable block"),
            Token::VariableEnd => f.write_str("end of variable block"),
            Token::BlockStart => f.write_str("start of block"),
            Token::BlockEnd => f.write_str("end of block"),
            Token::Ident(_) => f.write_str("identifier"),
            Token::Int(_) => f.write_str("integer"),
            Token::Dot => f.write_str("`.`"),
            Token::Comma => f.write_str("`,`"),
        }
    }
}

/// Token span information
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub start_offset: u32,
    pub end_line: u32,
    pub end_col: u32,
    pub end_offset: u32,
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            " @ {}:{}-{}:{}",
            self.start_line, self.start_col, self.end_line, self.end_col
        )
    }
}
