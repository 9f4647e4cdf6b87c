use super::{ExpressionConverter, ExpressionPlugin};
use crate::core::{DbError, Result};
use crate::parser::ast::Expr;
use sqlparser::ast as sql_ast;

pub struct FunctionPlugin;

impl ExpressionPlugin for FunctionPlugin {
    fn name(&self) -> &'static str {
        "FUNCTION"
    }

    fn can_handle(&self, expr: &sql_ast::Expr) -> bool {
        matches!(expr, sql_ast::Expr::Function(_))
    }

    fn convert(&self, expr: sql_ast::Expr, converter: &ExpressionConverter) -> Result<Expr> {
        match expr {
            sql_ast::Expr::Function(func) => {
                let name = func.name.to_string().to_uppercase();

                let args = match func.args {
                    sql_ast::FunctionArguments::List(arg_list) => arg_list
                        .args
                        .into_iter()
                        .map(|arg| match arg {
                            sql_ast::FunctionArg::Unnamed(sql_ast::FunctionArgExpr::Expr(e)) => {
                                converter.convert(e)
                            }
                            other => Err(DbError::StorageError(format!(
                                "Unsupported argument to {}: {}",
                                name, other
                            ))),
                        })
                        .collect::<Result<Vec<_>>>()?,
                    sql_ast::FunctionArguments::None => Vec::new(),
                    sql_ast::FunctionArguments::Subquery(_) => {
                        return Err(DbError::StorageError(format!(
                            "Subquery arguments to {} are not supported",
                            name
                        )));
                    }
                };

                Ok(Expr::Function { name, args })
            }
            _ => unreachable!("FunctionPlugin called with non-function expression"),
        }
    }
}
