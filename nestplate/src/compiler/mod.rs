//! Contains the parts of the engine that turn template source into an AST.
#![allow(missing_docs)]
pub mod ast;
pub mod lexer;
pub mod parser;
pub mod tokens;
