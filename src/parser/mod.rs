pub mod adapter;
pub mod ast;

pub use adapter::{OrderSpec, ParsedFragment, SqlParserAdapter};
pub use ast::{BinaryOp, Expr};
