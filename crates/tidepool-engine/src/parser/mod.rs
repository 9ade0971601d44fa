//! Parser for the script subset.
//!
//! Produces an [`ast::Program`](crate::ast::Program) from source text.
//! Statements may omit their terminating semicolon when a line break, a
//! closing brace or the end of input follows.

mod parser;

pub use parser::Parser;
