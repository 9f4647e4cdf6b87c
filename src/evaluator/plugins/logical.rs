use super::super::{EvaluationContext, ExpressionEvaluator};
use crate::core::{Result, Row, Schema, Value};
use crate::parser::ast::{BinaryOp, Expr};

/// `AND`, `OR` and `NOT` with SQL three-valued logic.
pub struct LogicalEvaluator;

impl ExpressionEvaluator for LogicalEvaluator {
    fn name(&self) -> &'static str {
        "LOGICAL"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        match expr {
            Expr::BinaryOp { op, .. } => op.is_logical(),
            Expr::Not { .. } => true,
            _ => false,
        }
    }

    fn evaluate(
        &self,
        expr: &Expr,
        row: &Row,
        schema: &Schema,
        context: &EvaluationContext<'_>,
    ) -> Result<Value> {
        match expr {
            Expr::Not { expr } => {
                let value = context.evaluate(expr, row, schema)?;
                if value.is_null() {
                    return Ok(Value::Null);
                }
                Ok(Value::Boolean(!value.as_bool()))
            }
            Expr::BinaryOp { left, op, right } => {
                let left_val = context.evaluate(left, row, schema)?;
                // short circuit on a decided left side
                match (op, left_val.is_null(), left_val.as_bool()) {
                    (BinaryOp::And, false, false) => return Ok(Value::Boolean(false)),
                    (BinaryOp::Or, false, true) => return Ok(Value::Boolean(true)),
                    _ => {}
                }

                let right_val = context.evaluate(right, row, schema)?;
                let result = match op {
                    BinaryOp::And => match (left_val.is_null(), right_val.is_null()) {
                        _ if !right_val.is_null() && !right_val.as_bool() => Value::Boolean(false),
                        (false, false) => Value::Boolean(true),
                        _ => Value::Null,
                    },
                    BinaryOp::Or => match (left_val.is_null(), right_val.is_null()) {
                        _ if !right_val.is_null() && right_val.as_bool() => Value::Boolean(true),
                        (false, false) => Value::Boolean(false),
                        _ => Value::Null,
                    },
                    _ => unreachable!(),
                };
                Ok(result)
            }
            _ => unreachable!(),
        }
    }
}
