pub mod predicate;
pub mod translator;

pub use predicate::{Filter, Predicate};
pub use translator::{NativeExpression, QueryTranslator};
