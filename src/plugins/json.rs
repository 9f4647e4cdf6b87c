use super::{ExpressionConverter, ExpressionPlugin};
use crate::core::{DbError, Result};
use crate::parser::ast::Expr;
use sqlparser::ast as sql_ast;

/// `CAST(x AS JSON)`. Other casts are not part of the fragment surface.
pub struct CastJsonPlugin;

impl ExpressionPlugin for CastJsonPlugin {
    fn name(&self) -> &'static str {
        "CAST AS JSON"
    }

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool {
        matches!(expr, sql_ast::Expr::Cast { .. })
    }

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter) -> Result<Expr> {
        match expr {
            sql_ast::Expr::Cast {
                expr, data_type, ..
            } => match data_type {
                sql_ast::DataType::JSON => Ok(Expr::CastJson {
                    expr: Box::new(converter.convert(*expr)?),
                }),
                other => Err(DbError::StorageError(format!(
                    "Unsupported cast target: {}",
                    other
                ))),
            },
            _ => unreachable!("CastJsonPlugin called with non-cast expression"),
        }
    }
}
