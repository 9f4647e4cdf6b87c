use super::engine::{BackendCapabilities, Statement, StorageBackend};
use super::table::{Table, TableSchema};
use crate::core::{DbError, Result, Row, Schema, Value};
use crate::evaluator::{EvaluationContext, EvaluatorRegistry};
use crate::parser::{Expr, OrderSpec, SqlParserAdapter};
use crate::result::QueryResult;
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::debug;

/// One statement as the store received it.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementRecord {
    pub kind: &'static str,
    pub table: String,
    pub sql: String,
    pub rows_scanned: usize,
    pub rows_returned: usize,
    /// Columns assigned by an UPDATE, or every column of an INSERT.
    pub columns_written: Vec<String>,
}

/// In-memory relational store that evaluates MySQL JSON functions itself.
pub struct InMemoryStorage {
    tables: RwLock<HashMap<String, Arc<RwLock<Table>>>>,
    capabilities: BackendCapabilities,
    evaluators: EvaluatorRegistry,
    parser: SqlParserAdapter,
    journal: Mutex<VecDeque<StatementRecord>>,
    journal_capacity: usize,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::with_capabilities(BackendCapabilities::all())
    }

    pub fn with_capabilities(capabilities: BackendCapabilities) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            capabilities,
            evaluators: EvaluatorRegistry::with_default_evaluators(),
            parser: SqlParserAdapter::new(),
            journal: Mutex::new(VecDeque::new()),
            journal_capacity: 0,
        }
    }

    /// Keeps the most recent `capacity` statements for inspection. The
    /// journal is off by default.
    pub fn with_journal(mut self, capacity: usize) -> Self {
        self.journal_capacity = capacity;
        self.journal = Mutex::new(VecDeque::with_capacity(capacity));
        self
    }

    /// Journaled statements, oldest first. Empty unless the journal is on.
    pub fn journal(&self) -> Result<Vec<StatementRecord>> {
        Ok(self.journal.lock()?.iter().cloned().collect())
    }

    pub fn clear_journal(&self) -> Result<()> {
        self.journal.lock()?.clear();
        Ok(())
    }

    async fn get_table(&self, name: &str) -> Result<Arc<RwLock<Table>>> {
        self.tables
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::StorageError(format!("Table '{}' not found", name)))
    }

    fn record(&self, record: StatementRecord) -> Result<()> {
        debug!(
            kind = record.kind,
            table = %record.table,
            scanned = record.rows_scanned,
            returned = record.rows_returned,
            sql = %record.sql,
            "statement executed"
        );
        if self.journal_capacity == 0 {
            return Ok(());
        }
        let mut journal = self.journal.lock()?;
        if journal.len() == self.journal_capacity {
            journal.pop_front();
        }
        journal.push_back(record);
        Ok(())
    }

    fn check_supported(&self, filter: &Expr) -> Result<()> {
        for name in filter.functions() {
            if name.starts_with("JSON_") && !self.capabilities.supports(name) {
                return Err(DbError::StorageError(format!(
                    "Function {} is not supported by this backend",
                    name
                )));
            }
        }
        Ok(())
    }

    async fn insert(
        &self,
        table: &str,
        columns: Vec<String>,
        rows: Vec<Row>,
    ) -> Result<QueryResult> {
        let handle = self.get_table(table).await?;
        let mut guard = handle.write().await;
        let schema = guard.schema().schema().clone();

        let positions = columns
            .iter()
            .map(|column| {
                schema.find_column_index(column).ok_or_else(|| {
                    DbError::StorageError(format!(
                        "Unknown column '{}' in table '{}'",
                        column, table
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut full_rows = Vec::with_capacity(rows.len());
        for row in rows {
            if row.len() != columns.len() {
                return Err(DbError::StorageError(format!(
                    "INSERT lists {} columns but a row has {} values",
                    columns.len(),
                    row.len()
                )));
            }
            let mut full = vec![Value::Null; schema.column_count()];
            for (value, pos) in row.into_iter().zip(&positions) {
                full[*pos] = value;
            }
            full_rows.push(full);
        }

        let inserted = guard.insert_all(full_rows)?;
        Ok(QueryResult::affected(inserted))
    }

    async fn select(
        &self,
        table: &str,
        filter: Option<&Expr>,
        params: &[Value],
        order_by: &[OrderSpec],
    ) -> Result<(QueryResult, usize)> {
        if let Some(filter) = filter {
            self.check_supported(filter)?;
        }

        let handle = self.get_table(table).await?;
        let guard = handle.read().await;
        let schema = guard.schema().schema();
        let context = EvaluationContext::new(&self.evaluators, params);

        let mut scanned = 0;
        let mut rows = Vec::new();
        for row in guard.scan() {
            scanned += 1;
            let keep = match filter {
                Some(filter) => context.matches(filter, row, schema)?,
                None => true,
            };
            if keep {
                rows.push(row.clone());
            }
        }

        sort_rows(&mut rows, schema, order_by)?;
        Ok((QueryResult::new(schema.column_names(), rows), scanned))
    }

    async fn select_raw(
        &self,
        table: &str,
        fragment: &str,
        params: &[Value],
        order_by: &[OrderSpec],
    ) -> Result<(QueryResult, usize)> {
        let parsed = self.parser.parse_fragment(fragment)?;

        if let Some(named) = &parsed.table
            && !named.eq_ignore_ascii_case(table)
        {
            return Err(DbError::StorageError(format!(
                "Raw query reads '{}' but was issued against '{}'",
                named, table
            )));
        }
        if parsed.parameter_count != params.len() {
            return Err(DbError::StorageError(format!(
                "Raw query has {} placeholders but {} parameters were bound",
                parsed.parameter_count,
                params.len()
            )));
        }

        let order_by = if parsed.order_by.is_empty() {
            order_by
        } else {
            &parsed.order_by
        };
        self.select(table, parsed.selection.as_ref(), params, order_by)
            .await
    }

    async fn update(
        &self,
        table: &str,
        key_column: &str,
        key: &Value,
        assignments: &[(String, Value)],
    ) -> Result<QueryResult> {
        let handle = self.get_table(table).await?;
        let mut guard = handle.write().await;
        let updated = guard.update_where(key_column, key, assignments)?;
        Ok(QueryResult::affected(updated))
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    async fn create_table(&self, name: &str, schema: Schema) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.contains_key(name) {
            return Err(DbError::StorageError(format!("Table '{}' already exists", name)));
        }
        let table = Table::new(TableSchema::new(name, schema));
        tables.insert(name.to_string(), Arc::new(RwLock::new(table)));
        debug!(table = name, "table created");
        Ok(())
    }

    async fn table_exists(&self, name: &str) -> bool {
        self.tables.read().await.contains_key(name)
    }

    async fn execute(&self, statement: Statement) -> Result<QueryResult> {
        let kind = statement.kind();
        let sql = statement.sql();
        let table = statement.table().to_string();

        let (result, rows_scanned, columns_written) = match statement {
            Statement::Insert {
                table,
                columns,
                rows,
            } => {
                let result = self.insert(&table, columns.clone(), rows).await?;
                (result, 0, columns)
            }
            Statement::Select {
                table,
                filter,
                params,
                order_by,
            } => {
                let (result, scanned) = self
                    .select(&table, filter.as_ref(), &params, &order_by)
                    .await?;
                (result, scanned, Vec::new())
            }
            Statement::SelectRaw {
                table,
                fragment,
                params,
                order_by,
            } => {
                let (result, scanned) = self
                    .select_raw(&table, &fragment, &params, &order_by)
                    .await?;
                (result, scanned, Vec::new())
            }
            Statement::Update {
                table,
                key_column,
                key,
                assignments,
            } => {
                let result = self
                    .update(&table, &key_column, &key, &assignments)
                    .await?;
                let scanned = result.affected_rows;
                let written = assignments.into_iter().map(|(column, _)| column).collect();
                (result, scanned, written)
            }
        };

        self.record(StatementRecord {
            kind,
            table,
            sql,
            rows_scanned,
            rows_returned: result.row_count(),
            columns_written,
        })?;
        Ok(result)
    }
}

fn sort_rows(rows: &mut [Row], schema: &Schema, order_by: &[OrderSpec]) -> Result<()> {
    if order_by.is_empty() {
        return Ok(());
    }

    let keys = order_by
        .iter()
        .map(|order| {
            schema
                .find_column_index(&order.column)
                .map(|idx| (idx, order.descending))
                .ok_or_else(|| {
                    DbError::StorageError(format!("Unknown ORDER BY column '{}'", order.column))
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut failure = None;
    rows.sort_by(|a, b| {
        for (idx, descending) in &keys {
            match a[*idx].compare(&b[*idx]) {
                Ok(Ordering::Equal) => continue,
                Ok(ord) => return if *descending { ord.reverse() } else { ord },
                Err(err) => {
                    failure.get_or_insert(err);
                    return Ordering::Equal;
                }
            }
        }
        Ordering::Equal
    });

    match failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType};
    use crate::parser::ast::BinaryOp;

    async fn storage() -> InMemoryStorage {
        let storage = InMemoryStorage::new().with_journal(16);
        storage
            .create_table(
                "Items",
                Schema::new(vec![
                    Column::new("Id", DataType::Integer).primary_key(),
                    Column::new("Tags", DataType::Json),
                ]),
            )
            .await
            .unwrap();
        storage
            .execute(Statement::Insert {
                table: "Items".into(),
                columns: vec!["Id".into(), "Tags".into()],
                rows: vec![
                    vec![Value::Integer(2), Value::from(r#"["b","c"]"#)],
                    vec![Value::Integer(1), Value::from(r#"["a","b"]"#)],
                ],
            })
            .await
            .unwrap();
        storage
    }

    fn contains_tag() -> Expr {
        Expr::binary(
            Expr::function(
                "JSON_CONTAINS",
                vec![
                    Expr::column("Tags"),
                    Expr::function("JSON_QUOTE", vec![Expr::Parameter(0)]),
                    Expr::text("$"),
                ],
            ),
            BinaryOp::NotEq,
            Expr::Literal(Value::Integer(0)),
        )
    }

    #[tokio::test]
    async fn filters_and_orders_in_store() {
        let storage = storage().await;
        let result = storage
            .execute(Statement::Select {
                table: "Items".into(),
                filter: Some(contains_tag()),
                params: vec![Value::from("b")],
                order_by: vec![OrderSpec::asc("Id")],
            })
            .await
            .unwrap();
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.get(0, "Id"), Some(&Value::Integer(1)));

        let journal = storage.journal().unwrap();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[1].kind, "SELECT");
        assert_eq!(journal[1].rows_scanned, 2);
        assert_eq!(journal[1].rows_returned, 2);
        assert!(journal[1].sql.contains("JSON_CONTAINS(`Tags`, JSON_QUOTE(?), '$') <> 0"));
    }

    #[tokio::test]
    async fn raw_fragment_is_parsed_and_bound() {
        let storage = storage().await;
        let result = storage
            .execute(Statement::SelectRaw {
                table: "Items".into(),
                fragment: "json_contains(`Tags`, json_quote(?), '$') <> 0".into(),
                params: vec![Value::from("c")],
                order_by: vec![],
            })
            .await
            .unwrap();
        assert_eq!(result.row_count(), 1);

        let err = storage
            .execute(Statement::SelectRaw {
                table: "Items".into(),
                fragment: "select * from Other where 1 = 1".into(),
                params: vec![],
                order_by: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::StorageError(_)));

        let err = storage
            .execute(Statement::SelectRaw {
                table: "Items".into(),
                fragment: "json_contains(`Tags`, json_quote(?), '$') <> 0".into(),
                params: vec![],
                order_by: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::StorageError(_)));
    }

    #[tokio::test]
    async fn missing_capability_is_refused() {
        let storage = InMemoryStorage::with_capabilities(BackendCapabilities {
            json_contains: false,
            ..BackendCapabilities::all()
        });
        storage
            .create_table("Items", Schema::new(vec![Column::new("Tags", DataType::Json)]))
            .await
            .unwrap();
        let err = storage
            .execute(Statement::Select {
                table: "Items".into(),
                filter: Some(contains_tag()),
                params: vec![Value::from("b")],
                order_by: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::StorageError(_)));
    }

    #[tokio::test]
    async fn update_records_written_columns() {
        let storage = storage().await;
        storage.clear_journal().unwrap();
        let result = storage
            .execute(Statement::Update {
                table: "Items".into(),
                key_column: "Id".into(),
                key: Value::Integer(1),
                assignments: vec![("Tags".into(), Value::from("[]"))],
            })
            .await
            .unwrap();
        assert_eq!(result.affected_rows, 1);
        let journal = storage.journal().unwrap();
        assert_eq!(journal[0].columns_written, vec!["Tags".to_string()]);
    }

    #[tokio::test]
    async fn journal_is_off_by_default() {
        let storage = InMemoryStorage::new();
        storage
            .create_table("Items", Schema::new(vec![Column::new("Id", DataType::Integer)]))
            .await
            .unwrap();
        storage
            .execute(Statement::Insert {
                table: "Items".into(),
                columns: vec!["Id".into()],
                rows: vec![vec![Value::Integer(1)]],
            })
            .await
            .unwrap();
        assert!(storage.journal().unwrap().is_empty());
    }

    #[tokio::test]
    async fn journal_keeps_only_the_latest_statements() {
        let storage = storage().await.with_journal(2);
        for id in [3, 4, 5] {
            storage
                .execute(Statement::Insert {
                    table: "Items".into(),
                    columns: vec!["Id".into(), "Tags".into()],
                    rows: vec![vec![Value::Integer(id), Value::from("[]")]],
                })
                .await
                .unwrap();
        }
        storage
            .execute(Statement::Select {
                table: "Items".into(),
                filter: None,
                params: vec![],
                order_by: vec![],
            })
            .await
            .unwrap();

        let journal = storage.journal().unwrap();
        assert_eq!(journal.len(), 2);
        assert_eq!(journal[0].kind, "INSERT");
        assert_eq!(journal[1].kind, "SELECT");
        assert_eq!(journal[1].rows_returned, 5);
    }
}
