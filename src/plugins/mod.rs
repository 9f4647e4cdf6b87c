//! Conversion of `sqlparser` expressions into the native [`Expr`] tree.
//!
//! Each SQL construct a raw fragment may use is handled by one plugin; the
//! converter tries them in registration order.

pub mod boolean;
pub mod comparison;
pub mod function;
pub mod is_null;
pub mod json;
pub mod like;
pub mod nested;

use std::cell::Cell;

use crate::core::{DbError, Result, Value};
use crate::parser::ast::{BinaryOp, Expr};
use sqlparser::ast as sql_ast;
use tracing::trace;

pub trait ExpressionPlugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool;

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter) -> Result<Expr>;
}

pub struct ExpressionPluginRegistry {
    plugins: Vec<Box<dyn ExpressionPlugin>>,
}

impl ExpressionPluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    pub fn register(&mut self, plugin: Box<dyn ExpressionPlugin>) {
        trace!(plugin = plugin.name(), "registered expression plugin");
        self.plugins.push(plugin);
    }

    pub fn with_default_plugins() -> Self {
        let mut registry = Self::new();

        // Nested first so parentheses are unwrapped before anything else
        registry.register(Box::new(nested::NestedPlugin));
        registry.register(Box::new(function::FunctionPlugin));
        registry.register(Box::new(json::CastJsonPlugin));
        registry.register(Box::new(like::LikePlugin));
        registry.register(Box::new(is_null::IsNullPlugin));
        registry.register(Box::new(boolean::BooleanPlugin));
        registry.register(Box::new(comparison::ComparisonPlugin));

        registry
    }

    pub fn find_plugin(&self, expr: &sql_ast::Expr) -> Option<&dyn ExpressionPlugin> {
        self.plugins
            .iter()
            .find(|plugin| plugin.can_handle(expr))
            .map(|boxed| &**boxed)
    }
}

impl Default for ExpressionPluginRegistry {
    fn default() -> Self {
        Self::with_default_plugins()
    }
}

/// Converts one fragment. `?` placeholders are numbered in the order they
/// are met, which is their textual order.
pub struct ExpressionConverter {
    registry: ExpressionPluginRegistry,
    next_parameter: Cell<usize>,
}

impl ExpressionConverter {
    pub fn new() -> Self {
        Self::with_custom_plugins(ExpressionPluginRegistry::with_default_plugins())
    }

    pub fn with_custom_plugins(registry: ExpressionPluginRegistry) -> Self {
        Self {
            registry,
            next_parameter: Cell::new(0),
        }
    }

    /// Number of placeholders converted so far.
    pub fn parameter_count(&self) -> usize {
        self.next_parameter.get()
    }

    pub fn convert(&self, expr: sql_ast::Expr) -> Result<Expr> {
        match &expr {
            sql_ast::Expr::Identifier(ident) => {
                return Ok(Expr::Column(ident.value.clone()));
            }
            sql_ast::Expr::CompoundIdentifier(idents) => {
                // `t.col` is accepted; only the column part matters on a single table
                if let Some(last) = idents.last() {
                    return Ok(Expr::Column(last.value.clone()));
                }
            }
            sql_ast::Expr::Value(val) => {
                return self.convert_value(&val.value);
            }
            _ => {}
        }

        if let Some(plugin) = self.registry.find_plugin(&expr) {
            return plugin.convert(expr, self);
        }

        Err(DbError::StorageError(format!(
            "Unsupported expression in SQL fragment: {}",
            expr
        )))
    }

    pub fn convert_value(&self, val: &sql_ast::Value) -> Result<Expr> {
        let value = match val {
            sql_ast::Value::Placeholder(_) => {
                let idx = self.next_parameter.get();
                self.next_parameter.set(idx + 1);
                return Ok(Expr::Parameter(idx));
            }
            sql_ast::Value::Number(n, _) => {
                if let Ok(i) = n.parse::<i64>() {
                    Value::Integer(i)
                } else if let Ok(f) = n.parse::<f64>() {
                    Value::Float(f)
                } else {
                    return Err(DbError::StorageError(format!("Invalid number: {}", n)));
                }
            }
            sql_ast::Value::SingleQuotedString(s) | sql_ast::Value::DoubleQuotedString(s) => {
                Value::Text(s.clone())
            }
            sql_ast::Value::Boolean(b) => Value::Boolean(*b),
            sql_ast::Value::Null => Value::Null,
            _ => {
                return Err(DbError::StorageError(format!(
                    "Unsupported value in SQL fragment: {}",
                    val
                )));
            }
        };
        Ok(Expr::Literal(value))
    }

    pub fn convert_binary_op(&self, op: &sql_ast::BinaryOperator) -> Result<BinaryOp> {
        use sql_ast::BinaryOperator as SqlOp;

        match op {
            SqlOp::Eq => Ok(BinaryOp::Eq),
            SqlOp::NotEq => Ok(BinaryOp::NotEq),
            SqlOp::Lt => Ok(BinaryOp::Lt),
            SqlOp::LtEq => Ok(BinaryOp::LtEq),
            SqlOp::Gt => Ok(BinaryOp::Gt),
            SqlOp::GtEq => Ok(BinaryOp::GtEq),

            SqlOp::And => Ok(BinaryOp::And),
            SqlOp::Or => Ok(BinaryOp::Or),

            _ => Err(DbError::StorageError(format!(
                "Unsupported binary operator: {}",
                op
            ))),
        }
    }
}

impl Default for ExpressionConverter {
    fn default() -> Self {
        Self::new()
    }
}
