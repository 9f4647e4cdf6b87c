use super::json;
use crate::core::{DbError, Result, Row, Schema, Value};
use crate::evaluator::{EvaluationContext, ExpressionEvaluator};
use crate::parser::ast::Expr;

/// Native functions callable from filters and raw fragments.
pub const SUPPORTED_FUNCTIONS: &[&str] = &[
    "JSON_CONTAINS",
    "JSON_SEARCH",
    "JSON_EXTRACT",
    "JSON_UNQUOTE",
    "JSON_QUOTE",
];

pub struct FunctionEvaluator;

impl ExpressionEvaluator for FunctionEvaluator {
    fn name(&self) -> &'static str {
        "FUNCTION"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Function { .. })
    }

    fn evaluate(
        &self,
        expr: &Expr,
        row: &Row,
        schema: &Schema,
        context: &EvaluationContext<'_>,
    ) -> Result<Value> {
        let Expr::Function { name, args } = expr else {
            unreachable!()
        };

        let mut eval_args = Vec::with_capacity(args.len());
        for arg in args {
            eval_args.push(context.evaluate(arg, row, schema)?);
        }

        match name.to_uppercase().as_str() {
            "JSON_CONTAINS" => json::json_contains(&eval_args),
            "JSON_SEARCH" => json::json_search(&eval_args),
            "JSON_EXTRACT" => json::json_extract(&eval_args),
            "JSON_UNQUOTE" => json::json_unquote(&eval_args),
            "JSON_QUOTE" => json::json_quote(&eval_args),
            _ => Err(DbError::StorageError(format!("Unknown function: {}", name))),
        }
    }
}
