use crate::core::{Result, Row, Schema, Value};
use crate::parser::{Expr, OrderSpec};
use crate::result::QueryResult;
use async_trait::async_trait;

/// JSON functions and operators a backend can evaluate natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    pub json_contains: bool,
    pub json_search: bool,
    pub json_extract: bool,
    pub like: bool,
}

impl BackendCapabilities {
    pub fn all() -> Self {
        Self {
            json_contains: true,
            json_search: true,
            json_extract: true,
            like: true,
        }
    }

    pub fn none() -> Self {
        Self {
            json_contains: false,
            json_search: false,
            json_extract: false,
            like: false,
        }
    }

    /// Whether a function (upper-case name) or `LIKE` is available.
    pub fn supports(&self, function: &str) -> bool {
        match function {
            "JSON_CONTAINS" => self.json_contains,
            "JSON_SEARCH" => self.json_search,
            "JSON_EXTRACT" | "JSON_UNQUOTE" => self.json_extract,
            "LIKE" => self.like,
            "JSON_QUOTE" => true,
            _ => false,
        }
    }
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self::all()
    }
}

/// Statements a session sends to its backend. Values are always bound as
/// parameters, never spliced into SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Insert {
        table: String,
        columns: Vec<String>,
        rows: Vec<Row>,
    },
    Select {
        table: String,
        filter: Option<Expr>,
        params: Vec<Value>,
        order_by: Vec<OrderSpec>,
    },
    /// Caller-written predicate or `SELECT * FROM t WHERE ..`.
    SelectRaw {
        table: String,
        fragment: String,
        params: Vec<Value>,
        order_by: Vec<OrderSpec>,
    },
    Update {
        table: String,
        key_column: String,
        key: Value,
        assignments: Vec<(String, Value)>,
    },
}

impl Statement {
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Insert { .. } => "INSERT",
            Statement::Select { .. } => "SELECT",
            Statement::SelectRaw { .. } => "SELECT RAW",
            Statement::Update { .. } => "UPDATE",
        }
    }

    pub fn table(&self) -> &str {
        match self {
            Statement::Insert { table, .. }
            | Statement::Select { table, .. }
            | Statement::SelectRaw { table, .. }
            | Statement::Update { table, .. } => table,
        }
    }

    /// Parameterized MySQL text of the statement.
    pub fn sql(&self) -> String {
        match self {
            Statement::Insert {
                table,
                columns,
                rows,
            } => {
                let placeholders = format!("({})", vec!["?"; columns.len()].join(", "));
                format!(
                    "INSERT INTO {} ({}) VALUES {}",
                    quote_ident(table),
                    columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
                    vec![placeholders; rows.len().max(1)].join(", ")
                )
            }
            Statement::Select {
                table,
                filter,
                order_by,
                ..
            } => {
                let mut sql = format!("SELECT * FROM {}", quote_ident(table));
                if let Some(filter) = filter {
                    sql.push_str(&format!(" WHERE {}", filter));
                }
                sql.push_str(&render_order_by(order_by));
                sql
            }
            Statement::SelectRaw { fragment, .. } => fragment.clone(),
            Statement::Update {
                table,
                key_column,
                assignments,
                ..
            } => format!(
                "UPDATE {} SET {} WHERE {} = ?",
                quote_ident(table),
                assignments
                    .iter()
                    .map(|(column, _)| format!("{} = ?", quote_ident(column)))
                    .collect::<Vec<_>>()
                    .join(", "),
                quote_ident(key_column)
            ),
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn render_order_by(order_by: &[OrderSpec]) -> String {
    if order_by.is_empty() {
        return String::new();
    }
    let items: Vec<String> = order_by
        .iter()
        .map(|o| {
            format!(
                "{} {}",
                quote_ident(&o.column),
                if o.descending { "DESC" } else { "ASC" }
            )
        })
        .collect();
    format!(" ORDER BY {}", items.join(", "))
}

/// Pluggable storage backend.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn capabilities(&self) -> BackendCapabilities;

    async fn create_table(&self, name: &str, schema: Schema) -> Result<()>;

    async fn table_exists(&self, name: &str) -> bool;

    async fn execute(&self, statement: Statement) -> Result<QueryResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::BinaryOp;

    #[test]
    fn renders_parameterized_sql() {
        let insert = Statement::Insert {
            table: "IceCreams".into(),
            columns: vec!["Id".into(), "Name".into()],
            rows: vec![
                vec![Value::Integer(1), Value::from("Vanilla")],
                vec![Value::Integer(2), Value::from("Chocolate")],
            ],
        };
        assert_eq!(
            insert.sql(),
            "INSERT INTO `IceCreams` (`Id`, `Name`) VALUES (?, ?), (?, ?)"
        );

        let select = Statement::Select {
            table: "IceCreams".into(),
            filter: Some(Expr::binary(
                Expr::column("Name"),
                BinaryOp::Eq,
                Expr::Parameter(0),
            )),
            params: vec![Value::from("Vanilla")],
            order_by: vec![OrderSpec::asc("Id")],
        };
        assert_eq!(
            select.sql(),
            "SELECT * FROM `IceCreams` WHERE `Name` = ? ORDER BY `Id` ASC"
        );

        let update = Statement::Update {
            table: "IceCreams".into(),
            key_column: "Id".into(),
            key: Value::Integer(1),
            assignments: vec![("Name".into(), Value::from("Mint"))],
        };
        assert_eq!(update.sql(), "UPDATE `IceCreams` SET `Name` = ? WHERE `Id` = ?");
        assert_eq!(update.kind(), "UPDATE");
    }

    #[test]
    fn capability_lookup() {
        let caps = BackendCapabilities {
            json_search: false,
            ..BackendCapabilities::all()
        };
        assert!(caps.supports("JSON_CONTAINS"));
        assert!(!caps.supports("JSON_SEARCH"));
        assert!(!BackendCapabilities::none().supports("LIKE"));
    }
}
