use super::super::{EvaluationContext, ExpressionEvaluator};
use crate::core::{Result, Row, Schema, Value};
use crate::expression::pattern;
use crate::parser::ast::Expr;

pub struct LikeEvaluator;

impl ExpressionEvaluator for LikeEvaluator {
    fn name(&self) -> &'static str {
        "LIKE"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::Like { .. })
    }

    fn evaluate(
        &self,
        expr: &Expr,
        row: &Row,
        schema: &Schema,
        context: &EvaluationContext<'_>,
    ) -> Result<Value> {
        let Expr::Like {
            expr,
            pattern,
            negated,
        } = expr
        else {
            unreachable!();
        };

        let text_val = context.evaluate(expr, row, schema)?;
        let pattern_val = context.evaluate(pattern, row, schema)?;

        let result = match (&text_val, &pattern_val) {
            (Value::Null, _) | (_, Value::Null) => return Ok(Value::Null),
            (Value::Text(text), Value::Text(pat)) => pattern::eval_like(text, pat, true)?,
            (text, Value::Text(pat)) => pattern::eval_like(&text.to_string(), pat, true)?,
            _ => false,
        };

        Ok(Value::Boolean(result != *negated))
    }
}
