//! Row-level evaluation of native expressions inside the reference store.

pub mod plugins;

use crate::core::{DbError, Result, Row, Schema, Value};
use crate::parser::ast::Expr;
use tracing::trace;

pub trait ExpressionEvaluator: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_evaluate(&self, expr: &Expr) -> bool;

    fn evaluate(
        &self,
        expr: &Expr,
        row: &Row,
        schema: &Schema,
        context: &EvaluationContext<'_>,
    ) -> Result<Value>;
}

/// Registry plus the parameters bound to the statement being evaluated.
pub struct EvaluationContext<'a> {
    registry: &'a EvaluatorRegistry,
    params: &'a [Value],
}

impl<'a> EvaluationContext<'a> {
    pub fn new(registry: &'a EvaluatorRegistry, params: &'a [Value]) -> Self {
        Self { registry, params }
    }

    pub fn evaluate(&self, expr: &Expr, row: &Row, schema: &Schema) -> Result<Value> {
        match expr {
            Expr::Column(name) => {
                let idx = schema.find_column_index(name).ok_or_else(|| {
                    DbError::StorageError(format!("Unknown column '{}'", name))
                })?;
                return Ok(row[idx].clone());
            }
            Expr::Literal(val) => return Ok(val.clone()),
            Expr::Parameter(idx) => {
                return self.params.get(*idx).cloned().ok_or_else(|| {
                    DbError::StorageError(format!(
                        "Parameter {} is not bound ({} given)",
                        idx + 1,
                        self.params.len()
                    ))
                });
            }
            _ => {}
        }

        if let Some(evaluator) = self.registry.find_evaluator(expr) {
            return evaluator.evaluate(expr, row, schema, self);
        }

        Err(DbError::StorageError(format!(
            "No evaluator found for expression: {}",
            expr
        )))
    }

    /// WHERE semantics: only a true result keeps the row, NULL does not.
    pub fn matches(&self, expr: &Expr, row: &Row, schema: &Schema) -> Result<bool> {
        Ok(self.evaluate(expr, row, schema)?.as_bool())
    }
}

pub struct EvaluatorRegistry {
    evaluators: Vec<Box<dyn ExpressionEvaluator>>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self {
            evaluators: Vec::new(),
        }
    }

    pub fn register(&mut self, evaluator: Box<dyn ExpressionEvaluator>) {
        trace!(evaluator = evaluator.name(), "registered evaluator");
        self.evaluators.push(evaluator);
    }

    pub fn with_default_evaluators() -> Self {
        use plugins::*;

        let mut registry = Self::new();

        registry.register(Box::new(comparison::ComparisonEvaluator));
        registry.register(Box::new(logical::LogicalEvaluator));
        registry.register(Box::new(like::LikeEvaluator));
        registry.register(Box::new(is_null::IsNullEvaluator));
        registry.register(Box::new(function::FunctionEvaluator));
        registry.register(Box::new(json::CastJsonEvaluator));

        registry
    }

    fn find_evaluator(&self, expr: &Expr) -> Option<&dyn ExpressionEvaluator> {
        self.evaluators
            .iter()
            .find(|ev| ev.can_evaluate(expr))
            .map(|boxed| &**boxed)
    }
}

impl Default for EvaluatorRegistry {
    fn default() -> Self {
        Self::with_default_evaluators()
    }
}
