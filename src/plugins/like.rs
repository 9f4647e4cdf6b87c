use super::{ExpressionConverter, ExpressionPlugin};
use crate::core::{DbError, Result};
use crate::parser::ast::Expr;
use sqlparser::ast as sql_ast;

pub struct LikePlugin;

impl ExpressionPlugin for LikePlugin {
    fn name(&self) -> &'static str {
        "LIKE"
    }

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool {
        matches!(expr, sql_ast::Expr::Like { .. })
    }

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter) -> Result<Expr> {
        match expr {
            sql_ast::Expr::Like {
                negated,
                expr,
                pattern,
                escape_char,
                ..
            } => {
                // MySQL's default escape character is the only one supported
                if escape_char.is_some() {
                    return Err(DbError::StorageError("LIKE ... ESCAPE is not supported".into()));
                }

                Ok(Expr::Like {
                    expr: Box::new(converter.convert(*expr)?),
                    pattern: Box::new(converter.convert(*pattern)?),
                    negated,
                })
            }
            _ => unreachable!("LikePlugin called with non-LIKE expression"),
        }
    }
}
