use sqlparser::ast as sql_ast;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

use crate::core::{DbError, Result};
use crate::parser::ast::Expr;
use crate::plugins::ExpressionConverter;

/// Column ordering requested by a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    pub column: String,
    pub descending: bool,
}

impl OrderSpec {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// A caller-written fragment after parsing: either a bare predicate or a
/// single-table `SELECT * FROM t [WHERE ..] [ORDER BY ..]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFragment {
    pub table: Option<String>,
    pub selection: Option<Expr>,
    pub order_by: Vec<OrderSpec>,
    pub parameter_count: usize,
}

pub struct SqlParserAdapter {
    dialect: MySqlDialect,
}

impl SqlParserAdapter {
    pub fn new() -> Self {
        Self {
            dialect: MySqlDialect {},
        }
    }

    pub fn parse_fragment(&self, sql: &str) -> Result<ParsedFragment> {
        let trimmed = sql.trim().trim_end_matches(';');
        if starts_with_keyword(trimmed, "select") {
            self.parse_select(trimmed)
        } else {
            self.parse_predicate(trimmed)
        }
    }

    pub fn parse_predicate(&self, sql: &str) -> Result<ParsedFragment> {
        let converter = ExpressionConverter::new();
        let mut parser = Parser::new(&self.dialect)
            .try_with_sql(sql)
            .map_err(|e| DbError::StorageError(format!("Invalid SQL fragment: {}", e)))?;
        let expr = parser
            .parse_expr()
            .map_err(|e| DbError::StorageError(format!("Invalid SQL fragment: {}", e)))?;
        let trailing = parser.peek_token();
        if trailing.token != Token::EOF {
            return Err(DbError::StorageError(format!(
                "Unexpected input after predicate: {}",
                trailing.token
            )));
        }
        let selection = converter.convert(expr)?;

        Ok(ParsedFragment {
            table: None,
            selection: Some(selection),
            order_by: Vec::new(),
            parameter_count: converter.parameter_count(),
        })
    }

    fn parse_select(&self, sql: &str) -> Result<ParsedFragment> {
        let mut statements = Parser::parse_sql(&self.dialect, sql)
            .map_err(|e| DbError::StorageError(format!("Invalid SQL query: {}", e)))?;
        if statements.len() != 1 {
            return Err(DbError::StorageError(format!(
                "Expected exactly one statement, found {}",
                statements.len()
            )));
        }

        let sql_ast::Statement::Query(query) = statements.remove(0) else {
            return Err(DbError::StorageError("Only SELECT queries are supported".into()));
        };
        let query = *query;
        let sql_ast::SetExpr::Select(select) = *query.body else {
            return Err(DbError::StorageError("Only plain SELECT queries are supported".into()));
        };

        if !select
            .projection
            .iter()
            .all(|item| matches!(item, sql_ast::SelectItem::Wildcard(_)))
        {
            return Err(DbError::StorageError(
                "Raw queries must select whole rows (SELECT *)".into(),
            ));
        }

        if select.from.len() != 1 || !select.from[0].joins.is_empty() {
            return Err(DbError::StorageError(
                "Raw queries must read exactly one table".into(),
            ));
        }
        let table = match &select.from[0].relation {
            sql_ast::TableFactor::Table { name, .. } => extract_table_name(name)?,
            _ => {
                return Err(DbError::StorageError(
                    "Complex table references are not supported".into(),
                ));
            }
        };

        let converter = ExpressionConverter::new();
        let selection = select
            .selection
            .map(|expr| converter.convert(expr))
            .transpose()?;
        let order_by = convert_order_by(query.order_by)?;

        Ok(ParsedFragment {
            table: Some(table),
            selection,
            order_by,
            parameter_count: converter.parameter_count(),
        })
    }
}

impl Default for SqlParserAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    sql.get(..keyword.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(keyword))
        && sql[keyword.len()..]
            .chars()
            .next()
            .is_none_or(|c| c.is_whitespace())
}

fn convert_order_by(order_by: Option<sql_ast::OrderBy>) -> Result<Vec<OrderSpec>> {
    let Some(order_by) = order_by else {
        return Ok(Vec::new());
    };

    match order_by.kind {
        sql_ast::OrderByKind::Expressions(exprs) => exprs
            .into_iter()
            .map(|order| {
                let column = match order.expr {
                    sql_ast::Expr::Identifier(ident) => ident.value,
                    other => {
                        return Err(DbError::StorageError(format!(
                            "ORDER BY supports plain columns only, got {}",
                            other
                        )));
                    }
                };
                // asc: Some(true) = ASC, Some(false) = DESC, None = ASC
                let descending = order.options.asc.map(|asc| !asc).unwrap_or(false);
                Ok(OrderSpec { column, descending })
            })
            .collect(),
        sql_ast::OrderByKind::All(_) => {
            Err(DbError::StorageError("ORDER BY ALL is not supported".into()))
        }
    }
}

fn extract_table_name(name: &sql_ast::ObjectName) -> Result<String> {
    name.0
        .last()
        .map(|part| {
            part.to_string()
                .trim_matches(|c| c == '`' || c == '"')
                .to_string()
        })
        .ok_or_else(|| DbError::StorageError("Invalid table name".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::BinaryOp;

    #[test]
    fn parses_bare_predicate_with_placeholders() {
        let parsed = SqlParserAdapter::new()
            .parse_fragment("json_contains(`FoodAdditives`, json_quote(?), '$') <> 0")
            .unwrap();
        assert_eq!(parsed.table, None);
        assert_eq!(parsed.parameter_count, 1);
        let Some(Expr::BinaryOp { left, op, .. }) = parsed.selection else {
            panic!("expected comparison");
        };
        assert_eq!(op, BinaryOp::NotEq);
        assert_eq!(
            left.to_string(),
            "JSON_CONTAINS(`FoodAdditives`, JSON_QUOTE(?), '$')"
        );
    }

    #[test]
    fn parses_full_select() {
        let parsed = SqlParserAdapter::new()
            .parse_fragment(
                "select * from `IceCreams` where json_contains(`FoodAdditives`, json_quote(?), '$') <> 0 order by `Id` desc",
            )
            .unwrap();
        assert_eq!(parsed.table.as_deref(), Some("IceCreams"));
        assert_eq!(parsed.order_by, vec![OrderSpec::desc("Id")]);
        assert!(parsed.selection.is_some());
    }

    #[test]
    fn placeholders_are_numbered_left_to_right() {
        let parsed = SqlParserAdapter::new()
            .parse_fragment(
                "`Name` = ? AND JSON_EXTRACT(`Properties`, '$.InStock') = CAST(? AS JSON)",
            )
            .unwrap();
        assert_eq!(parsed.parameter_count, 2);
        let rendered = parsed.selection.unwrap().to_string();
        assert_eq!(
            rendered,
            "`Name` = ? AND JSON_EXTRACT(`Properties`, '$.InStock') = CAST(? AS JSON)"
        );
    }

    #[test]
    fn rejects_projections_and_garbage() {
        let adapter = SqlParserAdapter::new();
        assert!(matches!(
            adapter.parse_fragment("select Name from IceCreams"),
            Err(DbError::StorageError(_))
        ));
        assert!(matches!(
            adapter.parse_fragment("json_contains(("),
            Err(DbError::StorageError(_))
        ));
        assert!(adapter.parse_fragment("DELETE FROM IceCreams").is_err());
    }
}
