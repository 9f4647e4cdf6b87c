use std::cmp::Ordering;

use super::super::{EvaluationContext, ExpressionEvaluator};
use crate::core::{DbError, Result, Row, Schema, Value};
use crate::json::semantic_eq;
use crate::parser::ast::{BinaryOp, Expr};
use serde_json::Value as JsonValue;

pub struct ComparisonEvaluator;

impl ExpressionEvaluator for ComparisonEvaluator {
    fn name(&self) -> &'static str {
        "COMPARISON"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::BinaryOp { op, .. } if !op.is_logical())
    }

    fn evaluate(
        &self,
        expr: &Expr,
        row: &Row,
        schema: &Schema,
        context: &EvaluationContext<'_>,
    ) -> Result<Value> {
        let Expr::BinaryOp { left, op, right } = expr else {
            unreachable!();
        };

        let left_val = context.evaluate(left, row, schema)?;
        let right_val = context.evaluate(right, row, schema)?;

        if left_val.is_null() || right_val.is_null() {
            return Ok(Value::Null);
        }

        Ok(Value::Boolean(self.compare(&left_val, &right_val, op)?))
    }
}

impl ComparisonEvaluator {
    pub fn compare(&self, left: &Value, right: &Value, op: &BinaryOp) -> Result<bool> {
        // A JSON operand turns the comparison into a JSON comparison
        if let (Value::Json(_), _) | (_, Value::Json(_)) = (left, right) {
            return compare_json(&left.to_json(), &right.to_json(), op);
        }

        let ordering = match (left, right) {
            (Value::Boolean(b), other @ (Value::Integer(_) | Value::Float(_)))
            | (other @ (Value::Integer(_) | Value::Float(_)), Value::Boolean(b)) => {
                let flag = Value::Integer(i64::from(*b));
                if matches!(left, Value::Boolean(_)) {
                    flag.compare(other)?
                } else {
                    other.compare(&flag)?
                }
            }
            _ => left.compare(right)?,
        };

        Ok(apply(op, ordering))
    }
}

fn compare_json(left: &JsonValue, right: &JsonValue, op: &BinaryOp) -> Result<bool> {
    match op {
        BinaryOp::Eq => return Ok(semantic_eq(left, right)),
        BinaryOp::NotEq => return Ok(!semantic_eq(left, right)),
        _ => {}
    }

    let ordering = match (left, right) {
        (JsonValue::Number(a), JsonValue::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        (JsonValue::Bool(a), JsonValue::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    };

    ordering.map(|ord| apply(op, ord)).ok_or_else(|| {
        DbError::StorageError(format!("Cannot order JSON values {} and {}", left, right))
    })
}

fn apply(op: &BinaryOp, ordering: Ordering) -> bool {
    match op {
        BinaryOp::Eq => ordering == Ordering::Equal,
        BinaryOp::NotEq => ordering != Ordering::Equal,
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::LtEq => ordering != Ordering::Greater,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::GtEq => ordering != Ordering::Less,
        BinaryOp::And | BinaryOp::Or => unreachable!(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_operand_compares_structurally() {
        let cmp = ComparisonEvaluator;
        assert!(cmp
            .compare(&Value::Json(json!(42)), &Value::Json(json!(42.0)), &BinaryOp::Eq)
            .unwrap());
        assert!(cmp
            .compare(&Value::Json(json!("Fine Dine")), &Value::from("Fine Dine"), &BinaryOp::Eq)
            .unwrap());
        let nested = Value::Json(json!({"a": [1]}));
        assert!(cmp.compare(&nested, &nested.clone(), &BinaryOp::Eq).unwrap());
        assert!(cmp
            .compare(&Value::Json(json!(3)), &Value::Integer(2), &BinaryOp::Gt)
            .unwrap());
    }

    #[test]
    fn scalars_use_value_ordering() {
        let cmp = ComparisonEvaluator;
        assert!(cmp
            .compare(&Value::Integer(1), &Value::Integer(0), &BinaryOp::NotEq)
            .unwrap());
        assert!(cmp
            .compare(&Value::Boolean(true), &Value::Integer(1), &BinaryOp::Eq)
            .unwrap());
        assert!(cmp
            .compare(&Value::from("a"), &Value::Integer(1), &BinaryOp::Eq)
            .is_err());
    }
}
