use std::borrow::Cow;
use std::fmt;

use crate::compiler::ast::{self, Spanned};
use crate::compiler::lexer::Tokenizer;
use crate::compiler::tokens::{Span, Token};
use crate::error::{Error, ErrorKind};

const MAX_RECURSION: usize = 150;
const RESERVED_NAMES: [&str; 4] = ["true", "false", "none", "loop"];

fn unexpected<D: fmt::Display>(unexpected: D, expected: &str) -> Error {
    Error::new(
        ErrorKind::SyntaxError,
        format!("unexpected {unexpected}, expected {expected}"),
    )
}

fn unexpected_eof(expected: &str) -> Error {
    unexpected("end of input", expected)
}

fn syntax_error(msg: Cow<'static, str>) -> Error {
    Error::new(ErrorKind::SyntaxError, msg)
}

macro_rules! syntax_error {
    ($msg:expr) => {{
        return Err(syntax_error(Cow::Borrowed($msg)));
    }};
    ($msg:expr, $($tt:tt)*) => {{
        return Err(syntax_error(Cow::Owned(format!($msg, $($tt)*))));
    }};
}

macro_rules! expect_token {
    ($parser:expr, $expectation:expr) => {{
        match ok!($parser.stream.next()) {
            Some(rv) => rv,
            None => return Err(unexpected_eof($expectation)),
        }
    }};
    ($parser:expr, $match:pat, $expectation:expr) => {{
        match ok!($parser.stream.next()) {
            Some((token @ $match, span)) => (token, span),
            Some((token, _)) => return Err(unexpected(token, $expectation)),
            None => return Err(unexpected_eof($expectation)),
        }
    }};
    ($parser:expr, $match:pat => $target:expr, $expectation:expr) => {{
        match ok!($parser.stream.next()) {
            Some(($match, span)) => ($target, span),
            Some((token, _)) => return Err(unexpected(token, $expectation)),
            None => return Err(unexpected_eof($expectation)),
        }
    }};
}

macro_rules! skip_token {
    ($p:expr, $match:pat) => {
        match $p.stream.current() {
            Err(err) => return Err(err),
            Ok(Some(($match, _))) => {
                let _ = $p.stream.next();
                true
            }
            _ => false,
        }
    };
}

macro_rules! with_recursion_guard {
    ($parser:expr, $expr:expr) => {{
        $parser.depth += 1;
        if $parser.depth > MAX_RECURSION {
            return Err(syntax_error(Cow::Borrowed(
                "template exceeds maximum recursion limits",
            )));
        }
        let rv = $expr;
        $parser.depth -= 1;
        rv
    }};
}

struct TokenStream<'a> {
    tokenizer: Tokenizer<'a>,
    current: Option<Result<(Token<'a>, Span), Error>>,
    current_lex_line: u32,
    last_span: Span,
    failed_lex_line: Option<u32>,
}

impl<'a> TokenStream<'a> {
    /// Tokenize a template
    pub fn new(source: &'a str) -> TokenStream<'a> {
        let mut tokenizer = Tokenizer::new(source);
        let current = tokenizer.next_token().transpose();
        let current_lex_line = tokenizer.current_line();
        TokenStream {
            tokenizer,
            current,
            current_lex_line,
            last_span: Span::default(),
            failed_lex_line: None,
        }
    }

    /// Advance the stream.
    pub fn next(&mut self) -> Result<Option<(Token<'a>, Span)>, Error> {
        let rv = self.current.take();
        let lex_line = self.current_lex_line;
        self.current = self.tokenizer.next_token().transpose();
        self.current_lex_line = self.tokenizer.current_line();
        match rv {
            Some(Ok((token, span))) => {
                self.last_span = span;
                Ok(Some((token, span)))
            }
            Some(Err(err)) => {
                self.failed_lex_line = Some(lex_line);
                Err(err)
            }
            None => Ok(None),
        }
    }

    /// Look at the current token
    pub fn current(&mut self) -> Result<Option<(&Token<'a>, Span)>, Error> {
        match self.current.take() {
            Some(Err(err)) => {
                self.failed_lex_line = Some(self.current_lex_line);
                Err(err)
            }
            other => {
                self.current = other;
                Ok(self
                    .current
                    .as_ref()
                    .and_then(|x| x.as_ref().ok())
                    .map(|x| (&x.0, x.1)))
            }
        }
    }

    /// Expands the span
    #[inline(always)]
    pub fn expand_span(&self, mut span: Span) -> Span {
        span.end_line = self.last_span.end_line;
        span.end_col = self.last_span.end_col;
        span.end_offset = self.last_span.end_offset;
        span
    }

    /// Returns the current span.
    #[inline(always)]
    pub fn current_span(&self) -> Span {
        if let Some(Ok((_, span))) = self.current {
            span
        } else {
            self.last_span
        }
    }

    /// Returns the line an error should be reported at.
    pub fn error_line(&self) -> usize {
        self.failed_lex_line
            .unwrap_or(self.last_span.start_line)
            .max(1) as usize
    }
}

/// A block that was opened and still waits for its end tag.
struct OpenBlock {
    keyword: &'static str,
    end_tag: &'static str,
    line: u32,
}

struct Parser<'a> {
    stream: TokenStream<'a>,
    blocks: Vec<OpenBlock>,
    depth: usize,
}

impl<'a> Parser<'a> {
    /// Creates a new parser.
    pub fn new(source: &'a str) -> Parser<'a> {
        Parser {
            stream: TokenStream::new(source),
            blocks: Vec::new(),
            depth: 0,
        }
    }

    /// Parses a template.
    pub fn parse(&mut self) -> Result<ast::Stmt, Error> {
        let span = self.stream.current_span();
        let children = ok!(self.subparse(&|_| false));
        Ok(ast::Stmt::Template(Spanned::new(
            ast::Template { children },
            self.stream.expand_span(span),
        )))
    }

    fn parse_expr(&mut self) -> Result<ast::Expr, Error> {
        with_recursion_guard!(self, self.parse_not())
    }

    fn parse_not(&mut self) -> Result<ast::Expr, Error> {
        let span = self.stream.current_span();
        if skip_token!(self, Token::Ident("not")) {
            let expr = ok!(self.parse_expr());
            return Ok(ast::Expr::Not(Spanned::new(
                ast::Not { expr },
                self.stream.expand_span(span),
            )));
        }
        self.parse_path()
    }

    fn parse_path(&mut self) -> Result<ast::Expr, Error> {
        let (root, span) = expect_token!(self, Token::Ident(name) => name, "identifier");
        let mut attrs = Vec::new();
        while skip_token!(self, Token::Dot) {
            let (attr, _) = expect_token!(
                self,
                Token::Ident(name) | Token::Int(name) => name,
                "identifier or integer"
            );
            attrs.push(attr.to_string());
        }
        Ok(ast::Expr::Path(Spanned::new(
            ast::Path {
                root: root.to_string(),
                attrs,
            },
            self.stream.expand_span(span),
        )))
    }

    fn parse_stmt(&mut self) -> Result<ast::Stmt, Error> {
        with_recursion_guard!(self, self.parse_stmt_unprotected())
    }

    fn parse_stmt_unprotected(&mut self) -> Result<ast::Stmt, Error> {
        let (token, span) = expect_token!(self, "statement");

        macro_rules! respan {
            ($expr:expr) => {
                Spanned::new($expr, self.stream.expand_span(span))
            };
        }

        let ident = match token {
            Token::Ident(ident) => ident,
            token => return Err(unexpected(token, "statement")),
        };

        Ok(match ident {
            "for" => {
                self.blocks.push(OpenBlock {
                    keyword: "for",
                    end_tag: "endfor",
                    line: span.start_line,
                });
                let rv = ok!(self.parse_for_stmt());
                self.blocks.pop();
                ast::Stmt::ForLoop(respan!(rv))
            }
            "if" => {
                self.blocks.push(OpenBlock {
                    keyword: "if",
                    end_tag: "endif",
                    line: span.start_line,
                });
                let rv = ok!(self.parse_if_cond());
                self.blocks.pop();
                ast::Stmt::IfCond(respan!(rv))
            }
            name => syntax_error!("unknown statement {}", name),
        })
    }

    fn parse_assign_name(&mut self) -> Result<String, Error> {
        let (id, _) = expect_token!(self, Token::Ident(name) => name, "identifier");
        if RESERVED_NAMES.contains(&id) {
            syntax_error!("cannot assign to reserved variable name {}", id);
        }
        Ok(id.to_string())
    }

    fn parse_for_stmt(&mut self) -> Result<ast::ForLoop, Error> {
        let target = ok!(self.parse_assign_name());
        let value_target = if skip_token!(self, Token::Comma) {
            let name = ok!(self.parse_assign_name());
            if name == target {
                syntax_error!("loop variable {} is bound twice", name);
            }
            Some(name)
        } else {
            None
        };
        expect_token!(self, Token::Ident("in"), "`in`");
        let iter = ok!(self.parse_expr());
        expect_token!(self, Token::BlockEnd, "end of block");
        let body = ok!(self.subparse(&|tag| tag == "endfor"));
        ok!(self.stream.next());
        Ok(ast::ForLoop {
            target,
            value_target,
            iter,
            body,
        })
    }

    fn parse_if_cond(&mut self) -> Result<ast::IfCond, Error> {
        let expr = ok!(self.parse_expr());
        expect_token!(self, Token::BlockEnd, "end of block");
        let true_body = ok!(self.subparse(&|tag| matches!(tag, "endif" | "else" | "elif")));
        let false_body = match ok!(self.stream.next()) {
            Some((Token::Ident("else"), _)) => {
                expect_token!(self, Token::BlockEnd, "end of block");
                let rv = ok!(self.subparse(&|tag| tag == "endif"));
                ok!(self.stream.next());
                rv
            }
            Some((Token::Ident("elif"), span)) => {
                let rv = ok!(with_recursion_guard!(self, self.parse_if_cond()));
                vec![ast::Stmt::IfCond(Spanned::new(
                    rv,
                    self.stream.expand_span(span),
                ))]
            }
            _ => Vec::new(),
        };

        Ok(ast::IfCond {
            expr,
            true_body,
            false_body,
        })
    }

    fn subparse(&mut self, end_check: &dyn Fn(&str) -> bool) -> Result<Vec<ast::Stmt>, Error> {
        let mut rv = Vec::new();
        while let Some((token, span)) = ok!(self.stream.next()) {
            match token {
                Token::TemplateData(raw) => rv.push(ast::Stmt::EmitRaw(Spanned::new(
                    ast::EmitRaw {
                        raw: raw.to_string(),
                    },
                    span,
                ))),
                Token::VariableStart => {
                    let expr = ok!(self.parse_expr());
                    rv.push(ast::Stmt::EmitExpr(Spanned::new(
                        ast::EmitExpr { expr },
                        self.stream.expand_span(span),
                    )));
                    expect_token!(self, Token::VariableEnd, "end of variable block");
                }
                Token::BlockStart => {
                    if let Some((&Token::Ident(tag @ ("endfor" | "endif" | "else" | "elif")), _)) =
                        ok!(self.stream.current())
                    {
                        if end_check(tag) {
                            return Ok(rv);
                        }
                        return Err(match self.blocks.last() {
                            Some(block) => syntax_error(Cow::Owned(format!(
                                "unexpected `{}`, expected `{}`",
                                tag, block.end_tag
                            ))),
                            None => syntax_error(Cow::Owned(format!(
                                "unexpected `{}` outside of a block",
                                tag
                            ))),
                        });
                    }
                    rv.push(ok!(self.parse_stmt()));
                    expect_token!(self, Token::BlockEnd, "end of block");
                }
                token => return Err(unexpected(token, "template data or directive")),
            }
        }
        if let Some(block) = self.blocks.last() {
            syntax_error!(
                "unexpected end of input, expected `{}` to close `{}` block from line {}",
                block.end_tag,
                block.keyword,
                block.line
            );
        }
        Ok(rv)
    }
}

/// Parses a template.
///
/// On failure the error carries `filename`, the line the parser stopped at
/// and the template source so it can be rendered with
/// [`display_debug_info`](crate::Error::display_debug_info).
pub fn parse(source: &str, filename: &str) -> Result<ast::Stmt, Error> {
    let mut parser = Parser::new(source);
    parser.parse().map_err(|mut err| {
        err.set_filename_and_line(filename, parser.stream.error_line());
        err.set_template_source(source);
        err
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    fn children(stmt: &ast::Stmt) -> &[ast::Stmt] {
        match stmt {
            ast::Stmt::Template(t) => &t.children,
            _ => panic!("not a template"),
        }
    }

    fn parse_err(source: &str) -> Error {
        parse(source, "test.md").unwrap_err()
    }

    #[test]
    fn test_literal_and_reference() {
        let tmpl = parse("Name: {{ person.name }}\n", "test.md").unwrap();
        let nodes = children(&tmpl);
        assert_eq!(nodes.len(), 3);
        match &nodes[1] {
            ast::Stmt::EmitExpr(emit) => match &emit.expr {
                ast::Expr::Path(path) => assert_eq!(path.to_string(), "person.name"),
                _ => panic!("expected path"),
            },
            _ => panic!("expected emit expr"),
        }
        match &nodes[2] {
            ast::Stmt::EmitRaw(raw) => assert_eq!(raw.raw, "\n"),
            _ => panic!("expected raw"),
        }
    }

    #[test]
    fn test_for_loop() {
        let tmpl = parse("{% for k, v in years.2023 %}{{ k }}{% endfor %}", "t").unwrap();
        match &children(&tmpl)[0] {
            ast::Stmt::ForLoop(for_loop) => {
                assert_eq!(for_loop.target, "k");
                assert_eq!(for_loop.value_target.as_deref(), Some("v"));
                assert_eq!(for_loop.body.len(), 1);
                match &for_loop.iter {
                    ast::Expr::Path(path) => {
                        assert_eq!(path.root, "years");
                        assert_eq!(path.attrs, vec!["2023".to_string()]);
                    }
                    _ => panic!("expected path"),
                }
            }
            _ => panic!("expected loop"),
        }
    }

    #[test]
    fn test_if_elif_else() {
        let tmpl = parse("{% if a %}A{% elif not b %}B{% else %}C{% endif %}", "t").unwrap();
        match &children(&tmpl)[0] {
            ast::Stmt::IfCond(cond) => {
                assert_eq!(cond.true_body.len(), 1);
                match &cond.false_body[..] {
                    [ast::Stmt::IfCond(elif)] => {
                        assert!(matches!(elif.expr, ast::Expr::Not(_)));
                        assert_eq!(elif.false_body.len(), 1);
                    }
                    _ => panic!("expected elif"),
                }
            }
            _ => panic!("expected condition"),
        }
    }

    #[test]
    fn test_unclosed_blocks() {
        let err = parse_err("{% for x in items %}\n- {{ x }}\n");
        assert_eq!(err.kind(), ErrorKind::SyntaxError);
        assert_eq!(
            err.detail(),
            Some("unexpected end of input, expected `endfor` to close `for` block from line 1")
        );
        assert_eq!(err.name(), Some("test.md"));

        let err = parse_err("a\n{% if x %}\n{% for y in x %}{% endfor %}");
        assert_eq!(
            err.detail(),
            Some("unexpected end of input, expected `endif` to close `if` block from line 2")
        );
    }

    #[test]
    fn test_mismatched_blocks() {
        let err = parse_err("{% for x in y %}\n{% if x %}\n{% endfor %}");
        assert_eq!(err.detail(), Some("unexpected `endfor`, expected `endif`"));
        assert_eq!(err.line(), Some(3));

        let err = parse_err("{% if x %}{% else %}{% else %}{% endif %}");
        assert_eq!(err.detail(), Some("unexpected `else`, expected `endif`"));

        let err = parse_err("text {% endif %}");
        assert_eq!(err.detail(), Some("unexpected `endif` outside of a block"));
    }

    #[test]
    fn test_bad_statements() {
        assert_eq!(
            parse_err("{% include x %}").detail(),
            Some("unknown statement include")
        );
        assert_eq!(
            parse_err("{% for loop in x %}{% endfor %}").detail(),
            Some("cannot assign to reserved variable name loop")
        );
        assert_eq!(
            parse_err("{% for x y %}{% endfor %}").detail(),
            Some("unexpected identifier, expected `in`")
        );
        assert_eq!(
            parse_err("{{ }}").detail(),
            Some("unexpected end of variable block, expected identifier")
        );
        assert_eq!(
            parse_err("{{ a.}}").detail(),
            Some("unexpected end of variable block, expected identifier or integer")
        );
    }

    #[test]
    fn test_lexer_error_location() {
        let err = parse_err("line one\nline {{ two + x }}");
        assert_eq!(err.detail(), Some("unexpected character"));
        assert_eq!(err.line(), Some(2));
        assert!(err.template_source().is_some());
    }

    #[test]
    fn test_recursion_limit() {
        let source = "{% if x %}".repeat(200) + &"{% endif %}".repeat(200);
        let err = parse_err(&source);
        assert_eq!(
            err.detail(),
            Some("template exceeds maximum recursion limits")
        );
        let source = "{% if x %}".repeat(100) + &"{% endif %}".repeat(100);
        assert!(parse(&source, "t").is_ok());
    }
}
