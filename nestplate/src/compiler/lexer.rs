use std::ops::ControlFlow;

use crate::compiler::tokens::{Span, Token};
use crate::error::{Error, ErrorKind};

/// Tokenizes templates.
///
/// Template data is emitted exactly as it appears in the source.  There is no
/// whitespace control, so the bytes around directives (including a trailing
/// newline) survive untouched.
pub struct Tokenizer<'s> {
    stack: Vec<LexerState>,
    rest: &'s str,
    current_line: u32,
    current_col: u32,
    current_offset: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum LexerState {
    Template,
    InVariable,
    InBlock,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum StartMarker {
    Variable,
    Block,
}

fn match_start_marker(rest: &str) -> Option<StartMarker> {
    match rest.get(..2) {
        Some("{{") => Some(StartMarker::Variable),
        Some("{%") => Some(StartMarker::Block),
        _ => None,
    }
}

/// Finds the offset of the next `{{` or `{%`.  A lone `{` is plain text.
fn find_start_marker(a: &str) -> Option<usize> {
    let bytes = a.as_bytes();
    let mut offset = 0;
    loop {
        let idx = some!(bytes[offset..].iter().position(|&b| b == b'{'));
        if let Some(b'{' | b'%') = bytes.get(offset + idx + 1).copied() {
            return Some(offset + idx);
        }
        offset += idx + 1;
    }
}

fn lex_identifier(s: &str) -> usize {
    s.as_bytes()
        .iter()
        .enumerate()
        .take_while(|&(idx, &c)| {
            if c == b'_' {
                true
            } else if idx == 0 {
                c.is_ascii_alphabetic()
            } else {
                c.is_ascii_alphanumeric()
            }
        })
        .count()
}

impl<'s> Tokenizer<'s> {
    /// Creates a new tokenizer.
    pub fn new(input: &'s str) -> Tokenizer<'s> {
        Tokenizer {
            rest: input,
            stack: vec![LexerState::Template],
            current_line: 1,
            current_col: 0,
            current_offset: 0,
        }
    }

    /// Returns the line the tokenizer is currently positioned at.
    pub fn current_line(&self) -> u32 {
        self.current_line
    }

    /// Produces the next token from the tokenizer.
    pub fn next_token(&mut self) -> Result<Option<(Token<'s>, Span)>, Error> {
        loop {
            if self.rest.is_empty() {
                return match self.stack.pop() {
                    Some(LexerState::InVariable) => {
                        Err(self.syntax_error("unexpected end of input, expected `}}`"))
                    }
                    Some(LexerState::InBlock) => {
                        Err(self.syntax_error("unexpected end of input, expected `%}`"))
                    }
                    _ => Ok(None),
                };
            }
            let outcome = match self.stack.last().copied().unwrap_or(LexerState::Template) {
                LexerState::Template => self.tokenize_root(),
                LexerState::InBlock => self.tokenize_block_or_var(true),
                LexerState::InVariable => self.tokenize_block_or_var(false),
            };
            match ok!(outcome) {
                ControlFlow::Break(rv) => return Ok(Some(rv)),
                ControlFlow::Continue(()) => continue,
            }
        }
    }

    #[inline]
    fn rest_bytes(&self) -> &[u8] {
        self.rest.as_bytes()
    }

    fn advance(&mut self, bytes: usize) -> &'s str {
        let (skipped, new_rest) = self.rest.split_at(bytes);
        for c in skipped.chars() {
            match c {
                '\n' => {
                    self.current_line += 1;
                    self.current_col = 0;
                }
                _ => self.current_col += 1,
            }
        }
        self.current_offset += bytes as u32;
        self.rest = new_rest;
        skipped
    }

    #[inline]
    fn loc(&self) -> (u32, u32, u32) {
        (self.current_line, self.current_col, self.current_offset)
    }

    #[inline]
    fn span(&self, (start_line, start_col, start_offset): (u32, u32, u32)) -> Span {
        Span {
            start_line,
            start_col,
            start_offset,
            end_line: self.current_line,
            end_col: self.current_col,
            end_offset: self.current_offset,
        }
    }

    #[inline]
    fn syntax_error(&mut self, msg: &'static str) -> Error {
        Error::new(ErrorKind::SyntaxError, msg)
    }

    fn tokenize_root(&mut self) -> Result<ControlFlow<(Token<'s>, Span)>, Error> {
        if let Some(marker) = match_start_marker(self.rest) {
            let old_loc = self.loc();
            self.advance(2);
            let (state, token) = match marker {
                StartMarker::Variable => (LexerState::InVariable, Token::VariableStart),
                StartMarker::Block => (LexerState::InBlock, Token::BlockStart),
            };
            self.stack.push(state);
            return Ok(ControlFlow::Break((token, self.span(old_loc))));
        }
        let old_loc = self.loc();
        let lead = match find_start_marker(self.rest) {
            Some(start) => self.advance(start),
            None => self.advance(self.rest.len()),
        };
        Ok(ControlFlow::Break((
            Token::TemplateData(lead),
            self.span(old_loc),
        )))
    }

    fn tokenize_block_or_var(
        &mut self,
        is_block: bool,
    ) -> Result<ControlFlow<(Token<'s>, Span)>, Error> {
        // whitespace inside of directives carries no meaning
        match self
            .rest_bytes()
            .iter()
            .position(|&x| !x.is_ascii_whitespace())
        {
            Some(0) => {}
            None => {
                self.advance(self.rest.len());
                return Ok(ControlFlow::Continue(()));
            }
            Some(offset) => {
                self.advance(offset);
                return Ok(ControlFlow::Continue(()));
            }
        }

        let old_loc = self.loc();
        let (end_marker, end_token) = if is_block {
            ("%}", Token::BlockEnd)
        } else {
            ("}}", Token::VariableEnd)
        };
        if self.rest.starts_with(end_marker) {
            self.stack.pop();
            self.advance(end_marker.len());
            return Ok(ControlFlow::Break((end_token, self.span(old_loc))));
        }

        let token = match self.rest_bytes().first() {
            Some(b'.') => {
                self.advance(1);
                Token::Dot
            }
            Some(b',') => {
                self.advance(1);
                Token::Comma
            }
            Some(c) if c.is_ascii_digit() => {
                let len = self
                    .rest_bytes()
                    .iter()
                    .take_while(|c| c.is_ascii_digit())
                    .count();
                Token::Int(self.advance(len))
            }
            _ => {
                let len = lex_identifier(self.rest);
                if len == 0 {
                    return Err(self.syntax_error("unexpected character"));
                }
                Token::Ident(self.advance(len))
            }
        };
        Ok(ControlFlow::Break((token, self.span(old_loc))))
    }
}

/// Utility function to quickly tokenize into an iterator.
#[cfg(any(test, feature = "unstable_machinery"))]
pub fn tokenize(input: &str) -> impl Iterator<Item = Result<(Token<'_>, Span), Error>> {
    let mut tokenizer = Tokenizer::new(input);
    std::iter::from_fn(move || tokenizer.next_token().transpose())
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    fn tokens(s: &str) -> Vec<Token<'_>> {
        tokenize(s).map(|x| x.unwrap().0).collect()
    }

    #[test]
    fn test_find_marker() {
        assert!(find_start_marker("{").is_none());
        assert!(find_start_marker("foo").is_none());
        assert!(find_start_marker("foo { bar }").is_none());
        assert_eq!(find_start_marker("foo {{"), Some(4));
        assert_eq!(find_start_marker("a { b {% c"), Some(6));
    }

    #[test]
    fn test_basic_identifiers() {
        fn assert_ident(s: &str) {
            match tokenize(&format!("{{{{{s}}}}}")).nth(1) {
                Some(Ok((Token::Ident(ident), _))) if ident == s => {}
                _ => panic!("did not get a matching token result: {s:?}"),
            }
        }

        assert_ident("foo_bar_baz");
        assert_ident("_foo_bar_baz");
        assert_ident("_42world");
        assert_ident("world42");
    }

    #[test]
    fn test_reference_tokens() {
        assert_eq!(
            tokens("Name: {{ person.name }}\n"),
            vec![
                Token::TemplateData("Name: "),
                Token::VariableStart,
                Token::Ident("person"),
                Token::Dot,
                Token::Ident("name"),
                Token::VariableEnd,
                Token::TemplateData("\n"),
            ]
        );
    }

    #[test]
    fn test_block_tokens() {
        assert_eq!(
            tokens("{% for k, v in years.2023 %}x{%endfor%}"),
            vec![
                Token::BlockStart,
                Token::Ident("for"),
                Token::Ident("k"),
                Token::Comma,
                Token::Ident("v"),
                Token::Ident("in"),
                Token::Ident("years"),
                Token::Dot,
                Token::Int("2023"),
                Token::BlockEnd,
                Token::TemplateData("x"),
                Token::BlockStart,
                Token::Ident("endfor"),
                Token::BlockEnd,
            ]
        );
    }

    #[test]
    fn test_lone_braces_are_data() {
        assert_eq!(
            tokens("a { b } c}}"),
            vec![Token::TemplateData("a { b } c}}")]
        );
        assert_eq!(tokens(""), vec![]);
    }

    #[test]
    fn test_spans() {
        let spans: Vec<_> = tokenize("a\n{{ b }}")
            .map(|x| x.unwrap().1)
            .collect();
        assert_eq!(spans[1].start_line, 2);
        assert_eq!(spans[1].start_col, 0);
        assert_eq!(spans[2].start_offset, 5);
    }

    #[test]
    fn test_errors() {
        let err = tokenize("{{ a + b }}")
            .collect::<Result<Vec<_>, _>>()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxError);
        assert_eq!(err.detail(), Some("unexpected character"));

        let err = tokenize("hello {{ name")
            .collect::<Result<Vec<_>, _>>()
            .unwrap_err();
        assert_eq!(err.detail(), Some("unexpected end of input, expected `}}`"));

        let err = tokenize("{% if x")
            .collect::<Result<Vec<_>, _>>()
            .unwrap_err();
        assert_eq!(err.detail(), Some("unexpected end of input, expected `%}`"));
    }
}
