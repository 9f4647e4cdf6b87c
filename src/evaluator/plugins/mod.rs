pub mod comparison;
pub mod function;
pub mod is_null;
pub mod json;
pub mod like;
pub mod logical;
