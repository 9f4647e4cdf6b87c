//! Create, load, query and save entities with JSON attributes.
//!
//! Every read decodes JSON columns through the attribute's codec and keeps a
//! snapshot of the decoded tree in the returned [`Tracked`] entity. `save`
//! compares the current value against that snapshot and writes a JSON column
//! only when its comparer reports a change.

use crate::connection::Connection;
use crate::core::{DbError, Result, Row, Value};
use crate::json::{JsonShape, raw_text_unchanged};
use crate::parser::ast::{BinaryOp, Expr};
use crate::parser::OrderSpec;
use crate::persist::entity::{AttributeValue, Attributes, Entity};
use crate::persist::schema::{
    AttributeDescriptor, AttributeStorage, EntityDescriptor, SchemaRegistry,
};
use crate::query::{Filter, QueryTranslator};
use crate::result::QueryResult;
use crate::storage::Statement;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::{Instrument, Level, debug, event, info_span, warn};

/// An entity as it was last read or written, with its immutable identity
/// and a snapshot of every JSON attribute.
///
/// Raw text snapshots hold the stored text. An edit that only reformats
/// that text is not written, so the entity may then carry a spelling that
/// differs from the column until the next real change.
#[derive(Debug, Clone)]
pub struct Tracked<E> {
    entity: E,
    identity: Value,
    snapshots: HashMap<String, JsonValue>,
}

impl<E> Tracked<E> {
    pub fn identity(&self) -> &Value {
        &self.identity
    }

    pub fn snapshot(&self, attribute: &str) -> Option<&JsonValue> {
        self.snapshots.get(attribute)
    }

    pub fn into_inner(self) -> E {
        self.entity
    }
}

impl<E> Deref for Tracked<E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.entity
    }
}

impl<E> DerefMut for Tracked<E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.entity
    }
}

/// A row that could not be decoded under the lenient policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFailure {
    pub identity: Value,
    pub error: DbError,
}

#[derive(Debug, Clone)]
pub struct Loaded<E> {
    pub entities: Vec<Tracked<E>>,
    pub failures: Vec<RowFailure>,
}

impl<E> Loaded<E> {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tracked<E>> {
        self.entities.iter()
    }
}

/// Attributes written and skipped by one `save`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub written: Vec<String>,
    pub skipped: Vec<String>,
}

/// Result ordering. Defaults to identity ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBy {
    attribute: Option<String>,
    descending: bool,
}

impl OrderBy {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn asc(attribute: &str) -> Self {
        Self {
            attribute: Some(attribute.to_string()),
            descending: false,
        }
    }

    pub fn desc(attribute: &str) -> Self {
        Self {
            attribute: Some(attribute.to_string()),
            descending: true,
        }
    }

    fn resolve(&self, descriptor: &EntityDescriptor) -> Result<Vec<OrderSpec>> {
        let attribute = match &self.attribute {
            Some(name) => descriptor.attribute(name).ok_or_else(|| {
                DbError::SchemaError(format!(
                    "{} has no attribute '{}' to order by",
                    descriptor.type_name(),
                    name
                ))
            })?,
            None => descriptor.identity(),
        };
        Ok(vec![OrderSpec {
            column: attribute.column.clone(),
            descending: self.descending,
        }])
    }
}

pub struct Session {
    connection: Connection,
    registry: Arc<SchemaRegistry>,
}

impl Session {
    pub fn new(connection: Connection, registry: Arc<SchemaRegistry>) -> Self {
        Self {
            connection,
            registry,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Creates the entity's table if it does not exist yet. Returns whether
    /// it was created.
    pub async fn ensure_table<E: Entity>(&self) -> Result<bool> {
        let descriptor = self.registry.descriptor::<E>()?;
        if self.connection.table_exists(descriptor.table()).await {
            return Ok(false);
        }
        self.connection
            .create_table(descriptor.table(), descriptor.table_schema())
            .await?;
        debug!(entity = descriptor.type_name(), table = descriptor.table(), "table created");
        Ok(true)
    }

    /// Inserts every entity in one statement. An identity collision rejects
    /// the whole batch.
    pub async fn create<E: Entity>(&self, entities: Vec<E>) -> Result<Vec<Tracked<E>>> {
        let descriptor = self.registry.descriptor::<E>()?;
        let span = info_span!(
            "session.create",
            entity = descriptor.type_name(),
            count = entities.len()
        );

        async move {
            let mut rows = Vec::with_capacity(entities.len());
            let mut tracked = Vec::with_capacity(entities.len());

            for entity in entities {
                let attributes = entity.to_attributes()?;
                let mut row = Row::with_capacity(descriptor.attributes().len());
                let mut snapshots = HashMap::new();

                for attribute in descriptor.attributes() {
                    let value = provided(&descriptor, &attributes, attribute)?;
                    match &attribute.storage {
                        AttributeStorage::Scalar(_) => row.push(scalar_of(attribute, value)?),
                        AttributeStorage::Json { codec, .. } => {
                            row.push(Value::Text(codec.encode(value)?));
                            snapshots.insert(attribute.name.clone(), codec.snapshot_of(value)?);
                        }
                    }
                }

                let identity = identity_of(&descriptor, &attributes)?;
                rows.push(row);
                tracked.push(Tracked {
                    entity,
                    identity,
                    snapshots,
                });
            }

            let result = self
                .connection
                .execute(Statement::Insert {
                    table: descriptor.table().to_string(),
                    columns: descriptor.column_names(),
                    rows,
                })
                .await?;
            event!(Level::DEBUG, inserted = result.affected_rows, "entities created");
            Ok(tracked)
        }
        .instrument(span)
        .await
    }

    pub async fn load_all<E: Entity>(&self, order: OrderBy) -> Result<Loaded<E>> {
        let descriptor = self.registry.descriptor::<E>()?;
        let span = info_span!("session.load_all", entity = descriptor.type_name());

        async move {
            let result = self
                .connection
                .execute(Statement::Select {
                    table: descriptor.table().to_string(),
                    filter: None,
                    params: Vec::new(),
                    order_by: order.resolve(&descriptor)?,
                })
                .await?;
            self.decode_all(&descriptor, result)
        }
        .instrument(span)
        .await
    }

    pub async fn find<E: Entity>(&self, identity: impl Into<Value>) -> Result<Option<Tracked<E>>> {
        let descriptor = self.registry.descriptor::<E>()?;
        let identity = identity.into();
        let span = info_span!(
            "session.find",
            entity = descriptor.type_name(),
            identity = %identity
        );

        async move {
            let result = self
                .connection
                .execute(Statement::Select {
                    table: descriptor.table().to_string(),
                    filter: Some(Expr::binary(
                        Expr::column(&descriptor.identity().column),
                        BinaryOp::Eq,
                        Expr::Parameter(0),
                    )),
                    params: vec![identity],
                    order_by: Vec::new(),
                })
                .await?;

            match result.rows.first() {
                Some(row) => decode_row(&descriptor, &result, row).map(Some),
                None => Ok(None),
            }
        }
        .instrument(span)
        .await
    }

    /// Runs a JSON filter inside the store.
    pub async fn query<E: Entity>(&self, filter: &Filter, order: OrderBy) -> Result<Loaded<E>> {
        let descriptor = self.registry.descriptor::<E>()?;
        let span = info_span!("session.query", entity = descriptor.type_name());

        async move {
            let capabilities = self.connection.capabilities();
            let native = QueryTranslator::new(&descriptor, &capabilities).translate_filter(filter)?;
            debug!(filter = %native.sql(), params = native.params.len(), "filter translated");

            let result = self
                .connection
                .execute(Statement::Select {
                    table: descriptor.table().to_string(),
                    filter: native.expr,
                    params: native.params,
                    order_by: order.resolve(&descriptor)?,
                })
                .await?;
            self.decode_all(&descriptor, result)
        }
        .instrument(span)
        .await
    }

    /// Runs a caller-written predicate or `SELECT * FROM <table> WHERE ..`
    /// with `?` placeholders bound to `params`. An `ORDER BY` inside the
    /// fragment takes precedence over `order`.
    pub async fn query_raw<E: Entity>(
        &self,
        fragment: &str,
        params: Vec<Value>,
        order: OrderBy,
    ) -> Result<Loaded<E>> {
        let descriptor = self.registry.descriptor::<E>()?;
        let span = info_span!("session.query_raw", entity = descriptor.type_name());

        async move {
            let result = self
                .connection
                .execute(Statement::SelectRaw {
                    table: descriptor.table().to_string(),
                    fragment: fragment.to_string(),
                    params,
                    order_by: order.resolve(&descriptor)?,
                })
                .await?;
            self.decode_all(&descriptor, result)
        }
        .instrument(span)
        .await
    }

    /// Writes scalar columns and every JSON column whose value changed since
    /// it was read, then refreshes the snapshots.
    ///
    /// Raw text is compared structurally when both sides parse as JSON:
    /// `[ "a" ,"b" ]` replacing `["a", "b"]` is skipped and the column keeps
    /// its stored spelling.
    pub async fn save<E: Entity>(&self, tracked: &mut Tracked<E>) -> Result<SaveReport> {
        let descriptor = self.registry.descriptor::<E>()?;
        let span = info_span!(
            "session.save",
            entity = descriptor.type_name(),
            identity = %tracked.identity
        );

        async move {
            let attributes = tracked.entity.to_attributes()?;
            let identity = identity_of(&descriptor, &attributes)?;
            if identity != tracked.identity {
                return Err(DbError::ConstraintError(format!(
                    "identity of {} changed from {} to {}",
                    descriptor.type_name(),
                    tracked.identity,
                    identity
                )));
            }

            let mut report = SaveReport::default();
            let mut assignments = Vec::new();
            let mut refreshed = Vec::new();

            for attribute in descriptor.attributes() {
                if descriptor.is_identity(attribute) {
                    continue;
                }
                let value = provided(&descriptor, &attributes, attribute)?;
                match &attribute.storage {
                    AttributeStorage::Scalar(_) => {
                        assignments.push((attribute.column.clone(), scalar_of(attribute, value)?));
                        report.written.push(attribute.name.clone());
                    }
                    AttributeStorage::Json {
                        shape,
                        codec,
                        comparer,
                    } => {
                        let current = codec.snapshot_of(value)?;
                        let unchanged = match (tracked.snapshots.get(&attribute.name), shape) {
                            (Some(JsonValue::String(before)), JsonShape::RawText) => {
                                current.as_str().is_some_and(|now| raw_text_unchanged(before, now))
                            }
                            (Some(before), _) => comparer.is_unchanged(before, &current),
                            (None, _) => false,
                        };

                        if unchanged {
                            report.skipped.push(attribute.name.clone());
                        } else {
                            assignments.push((
                                attribute.column.clone(),
                                Value::Text(codec.encode(value)?),
                            ));
                            refreshed.push((attribute.name.clone(), current));
                            report.written.push(attribute.name.clone());
                        }
                    }
                }
            }

            let result = self
                .connection
                .execute(Statement::Update {
                    table: descriptor.table().to_string(),
                    key_column: descriptor.identity().column.clone(),
                    key: tracked.identity.clone(),
                    assignments,
                })
                .await?;
            if result.affected_rows == 0 {
                return Err(DbError::ConstraintError(format!(
                    "{} {} no longer exists",
                    descriptor.type_name(),
                    tracked.identity
                )));
            }

            tracked.snapshots.extend(refreshed);
            event!(
                Level::DEBUG,
                written = report.written.len(),
                skipped = report.skipped.len(),
                "entity saved"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    fn decode_all<E: Entity>(
        &self,
        descriptor: &EntityDescriptor,
        result: QueryResult,
    ) -> Result<Loaded<E>> {
        let strict = self.connection.config().strict_decode;
        let identity_idx = result.column_index(&descriptor.identity().column);
        let mut loaded = Loaded {
            entities: Vec::with_capacity(result.row_count()),
            failures: Vec::new(),
        };

        for row in &result.rows {
            match decode_row(descriptor, &result, row) {
                Ok(tracked) => loaded.entities.push(tracked),
                Err(err @ DbError::DecodeError { .. }) if !strict => {
                    let identity = identity_idx
                        .map(|idx| row[idx].clone())
                        .unwrap_or(Value::Null);
                    warn!(identity = %identity, error = %err, "row skipped, decode failed");
                    loaded.failures.push(RowFailure {
                        identity,
                        error: err,
                    });
                }
                Err(err) => return Err(err),
            }
        }

        Ok(loaded)
    }
}

fn decode_row<E: Entity>(
    descriptor: &EntityDescriptor,
    result: &QueryResult,
    row: &Row,
) -> Result<Tracked<E>> {
    let mut attributes = Attributes::new();
    let mut snapshots = HashMap::new();
    let mut identity = Value::Null;

    for attribute in descriptor.attributes() {
        let idx = result.column_index(&attribute.column).ok_or_else(|| {
            DbError::StorageError(format!(
                "column '{}' missing from result of '{}'",
                attribute.column,
                descriptor.table()
            ))
        })?;
        let stored = &row[idx];

        let value = match &attribute.storage {
            AttributeStorage::Scalar(_) => {
                if descriptor.is_identity(attribute) {
                    identity = stored.clone();
                }
                AttributeValue::Scalar(stored.clone())
            }
            AttributeStorage::Json { codec, .. } => {
                let value = match stored {
                    Value::Text(text) => codec.decode(text)?,
                    Value::Json(tree) => codec.decode(&tree.to_string())?,
                    Value::Null => return Err(DbError::decode(&attribute.name, "column is NULL")),
                    other => {
                        return Err(DbError::decode(
                            &attribute.name,
                            format!("expected JSON text, found {}", other.type_name()),
                        ));
                    }
                };
                snapshots.insert(attribute.name.clone(), codec.snapshot_of(&value)?);
                value
            }
        };
        attributes.insert(&attribute.name, value);
    }

    Ok(Tracked {
        entity: E::from_attributes(attributes)?,
        identity,
        snapshots,
    })
}

fn provided<'a>(
    descriptor: &EntityDescriptor,
    attributes: &'a Attributes,
    attribute: &AttributeDescriptor,
) -> Result<&'a AttributeValue> {
    attributes.get(&attribute.name).ok_or_else(|| {
        DbError::SchemaError(format!(
            "{} did not provide attribute '{}'",
            descriptor.type_name(),
            attribute.name
        ))
    })
}

fn scalar_of(attribute: &AttributeDescriptor, value: &AttributeValue) -> Result<Value> {
    match value {
        AttributeValue::Scalar(value) => Ok(value.clone()),
        other => Err(DbError::SchemaError(format!(
            "'{}' is a scalar attribute but was given a {} value",
            attribute.name,
            other.variant_name()
        ))),
    }
}

fn identity_of(descriptor: &EntityDescriptor, attributes: &Attributes) -> Result<Value> {
    let value = scalar_of(
        descriptor.identity(),
        provided(descriptor, attributes, descriptor.identity())?,
    )?;
    if value.is_null() {
        return Err(DbError::ConstraintError(format!(
            "{} identity cannot be NULL",
            descriptor.type_name()
        )));
    }
    Ok(value)
}
