use crate::core::{DbError, Result, Row, Schema, Value};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    schema: Schema,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// Row storage for one table. Rows keep insertion order; the primary key,
/// when declared, is unique.
#[derive(Debug, Clone)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<usize, Row>,
    next_row_id: usize,
    primary_index: HashMap<Value, usize>,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_row_id: 0,
            primary_index: HashMap::new(),
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Inserts every row or none of them.
    pub fn insert_all(&mut self, rows: Vec<Row>) -> Result<usize> {
        let pk = self.schema.schema().primary_key_index();
        let mut batch_keys = HashMap::new();

        for row in &rows {
            self.validate_row(row)?;
            if let Some(pk) = pk {
                let key = &row[pk];
                if self.primary_index.contains_key(key) || batch_keys.insert(key, ()).is_some() {
                    return Err(DbError::ConstraintError(format!(
                        "Duplicate primary key {} in table '{}'",
                        key,
                        self.schema.name()
                    )));
                }
            }
        }

        let count = rows.len();
        for row in rows {
            let id = self.next_row_id;
            self.next_row_id += 1;
            if let Some(pk) = pk {
                self.primary_index.insert(row[pk].clone(), id);
            }
            self.rows.insert(id, row);
        }
        Ok(count)
    }

    pub fn scan(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    /// Applies `assignments` to every row whose `key_column` equals `key`.
    pub fn update_where(
        &mut self,
        key_column: &str,
        key: &Value,
        assignments: &[(String, Value)],
    ) -> Result<usize> {
        let schema = self.schema.schema();
        let key_idx = schema.find_column_index(key_column).ok_or_else(|| {
            DbError::StorageError(format!(
                "Unknown column '{}' in table '{}'",
                key_column,
                self.schema.name()
            ))
        })?;

        let mut targets = Vec::with_capacity(assignments.len());
        for (column, value) in assignments {
            let idx = schema.find_column_index(column).ok_or_else(|| {
                DbError::StorageError(format!(
                    "Unknown column '{}' in table '{}'",
                    column,
                    self.schema.name()
                ))
            })?;
            if schema.columns()[idx].primary_key {
                return Err(DbError::ConstraintError(format!(
                    "Primary key column '{}' cannot be updated",
                    column
                )));
            }
            schema.columns()[idx].validate(value)?;
            targets.push((idx, value));
        }

        let ids: Vec<usize> = match schema.primary_key_index() {
            Some(pk) if pk == key_idx => self.primary_index.get(key).copied().into_iter().collect(),
            _ => self
                .rows
                .iter()
                .filter(|(_, row)| &row[key_idx] == key)
                .map(|(id, _)| *id)
                .collect(),
        };

        for id in &ids {
            if let Some(row) = self.rows.get_mut(id) {
                for (idx, value) in &targets {
                    row[*idx] = (*value).clone();
                }
            }
        }
        Ok(ids.len())
    }

    fn validate_row(&self, row: &Row) -> Result<()> {
        let schema = self.schema.schema();

        if row.len() != schema.column_count() {
            return Err(DbError::StorageError(format!(
                "Table '{}' has {} columns, row has {}",
                self.schema.name(),
                schema.column_count(),
                row.len()
            )));
        }

        for (column, value) in schema.columns().iter().zip(row) {
            column.validate(value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType};

    fn table() -> Table {
        Table::new(TableSchema::new(
            "IceCreams",
            Schema::new(vec![
                Column::new("Id", DataType::Integer).primary_key(),
                Column::new("Values", DataType::Json),
            ]),
        ))
    }

    #[test]
    fn duplicate_key_rejects_whole_batch() {
        let mut table = table();
        table
            .insert_all(vec![vec![Value::Integer(1), Value::from("{}")]])
            .unwrap();

        let err = table
            .insert_all(vec![
                vec![Value::Integer(2), Value::from("{}")],
                vec![Value::Integer(1), Value::from("{}")],
            ])
            .unwrap_err();
        assert!(matches!(err, DbError::ConstraintError(_)));
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn update_by_primary_key() {
        let mut table = table();
        table
            .insert_all(vec![
                vec![Value::Integer(1), Value::from("{}")],
                vec![Value::Integer(2), Value::from("{}")],
            ])
            .unwrap();

        let updated = table
            .update_where(
                "Id",
                &Value::Integer(2),
                &[("Values".into(), Value::from(r#"{"10":"ten"}"#))],
            )
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(
            table.scan().nth(1).map(|row| row[1].clone()),
            Some(Value::from(r#"{"10":"ten"}"#))
        );

        let missing = table
            .update_where("Id", &Value::Integer(9), &[("Values".into(), Value::from("{}"))])
            .unwrap();
        assert_eq!(missing, 0);
    }

    #[test]
    fn malformed_json_is_rejected_on_update() {
        let mut table = table();
        table
            .insert_all(vec![vec![Value::Integer(1), Value::from("{}")]])
            .unwrap();
        assert!(matches!(
            table.update_where("Id", &Value::Integer(1), &[("Values".into(), Value::from("{"))]),
            Err(DbError::ConstraintError(_))
        ));
    }
}
