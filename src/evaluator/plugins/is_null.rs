use super::super::{EvaluationContext, ExpressionEvaluator};
use crate::core::{Result, Row, Schema, Value};
use crate::parser::ast::Expr;

pub struct IsNullEvaluator;

impl ExpressionEvaluator for IsNullEvaluator {
    fn name(&self) -> &'static str {
        "IS_NULL"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::IsNull { .. })
    }

    fn evaluate(
        &self,
        expr: &Expr,
        row: &Row,
        schema: &Schema,
        context: &EvaluationContext<'_>,
    ) -> Result<Value> {
        let Expr::IsNull { expr, negated } = expr else {
            unreachable!();
        };

        let is_null = context.evaluate(expr, row, schema)?.is_null();
        Ok(Value::Boolean(is_null != *negated))
    }
}
