//! Lowers JSON predicates to backend-native JSON function calls.
//!
//! Values are always bound as parameters. A predicate that cannot be
//! expressed natively is refused before any query runs; nothing is ever
//! filtered in application memory.

use crate::core::{DbError, Result, Value};
use crate::expression::pattern::escape_like;
use crate::json::{JsonPath, JsonShape};
use crate::parser::ast::{BinaryOp, Expr};
use crate::persist::schema::{AttributeDescriptor, EntityDescriptor};
use crate::query::predicate::{Filter, Predicate};
use crate::storage::BackendCapabilities;
use tracing::trace;

/// A native filter plus the parameters bound to its placeholders, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativeExpression {
    pub expr: Option<Expr>,
    pub params: Vec<Value>,
}

impl NativeExpression {
    pub fn is_empty(&self) -> bool {
        self.expr.is_none()
    }

    /// Parameterized `WHERE` fragment; empty when there is no filter.
    pub fn sql(&self) -> String {
        self.expr.as_ref().map(Expr::to_string).unwrap_or_default()
    }
}

pub struct QueryTranslator<'a> {
    descriptor: &'a EntityDescriptor,
    capabilities: &'a BackendCapabilities,
}

impl<'a> QueryTranslator<'a> {
    pub fn new(descriptor: &'a EntityDescriptor, capabilities: &'a BackendCapabilities) -> Self {
        Self {
            descriptor,
            capabilities,
        }
    }

    pub fn translate(&self, predicate: &Predicate) -> Result<NativeExpression> {
        let mut params = Vec::new();
        let expr = self.lower(predicate, &mut params)?;
        Ok(NativeExpression {
            expr: Some(expr),
            params,
        })
    }

    pub fn translate_filter(&self, filter: &Filter) -> Result<NativeExpression> {
        let mut params = Vec::new();
        let mut combined: Option<Expr> = None;
        for predicate in filter.predicates() {
            let expr = self.lower(predicate, &mut params)?;
            combined = Some(match combined {
                Some(left) => left.and(expr),
                None => expr,
            });
        }
        Ok(NativeExpression {
            expr: combined,
            params,
        })
    }

    fn lower(&self, predicate: &Predicate, params: &mut Vec<Value>) -> Result<Expr> {
        let (attribute, shape) = self.json_attribute(predicate)?;
        let column = Expr::column(&attribute.column);

        let expr = match predicate {
            Predicate::Contains { value, .. } => {
                if !matches!(
                    shape,
                    JsonShape::ScalarList | JsonShape::RawText | JsonShape::Document
                ) {
                    return Err(unsupported(
                        predicate,
                        format!(
                            "Contains needs a scalar list, raw text or document attribute, '{}' is {}",
                            attribute.name, shape
                        ),
                    ));
                }
                self.require(predicate, "JSON_CONTAINS")?;
                let value = scalar(predicate, value)?;
                Expr::function(
                    "JSON_CONTAINS",
                    vec![column, json_candidate(value, params), Expr::text("$")],
                )
            }
            Predicate::ContainsAtPath { path, value, .. } => {
                let path = parse_path(predicate, path)?;
                match scalar(predicate, value)? {
                    Value::Text(text) => {
                        self.require(predicate, "JSON_SEARCH")?;
                        let pattern = bind(params, Value::Text(escape_like(text)));
                        Expr::IsNull {
                            expr: Box::new(Expr::function(
                                "JSON_SEARCH",
                                vec![
                                    column,
                                    Expr::text("one"),
                                    pattern,
                                    Expr::null(),
                                    Expr::text(path.to_string()),
                                ],
                            )),
                            negated: true,
                        }
                    }
                    other => {
                        self.require(predicate, "JSON_EXTRACT")?;
                        self.require(predicate, "JSON_CONTAINS")?;
                        let candidate = bind(params, Value::Text(other.to_json().to_string()));
                        Expr::function(
                            "JSON_CONTAINS",
                            vec![
                                Expr::function(
                                    "JSON_EXTRACT",
                                    vec![column, Expr::text(path.to_string())],
                                ),
                                candidate,
                            ],
                        )
                    }
                }
            }
            Predicate::FieldEquals { path, value, .. } => {
                let path = parse_path(predicate, path)?;
                if path.has_wildcard() {
                    return Err(unsupported(
                        predicate,
                        format!("path {} must address a single value", path),
                    ));
                }
                let value = scalar(predicate, value)?;
                if shape == JsonShape::RawText {
                    self.raw_text_equals(predicate, column, &path, value, params)?
                } else {
                    self.require(predicate, "JSON_EXTRACT")?;
                    let extract =
                        Expr::function("JSON_EXTRACT", vec![column, Expr::text(path.to_string())]);
                    match value {
                        Value::Text(text) => Expr::binary(
                            Expr::function("JSON_UNQUOTE", vec![extract]),
                            BinaryOp::Eq,
                            bind(params, Value::Text(text.clone())),
                        ),
                        other => Expr::binary(
                            extract,
                            BinaryOp::Eq,
                            Expr::CastJson {
                                expr: Box::new(bind(
                                    params,
                                    Value::Text(other.to_json().to_string()),
                                )),
                            },
                        ),
                    }
                }
            }
        };

        trace!(predicate = %predicate, native = %expr, "predicate lowered");
        Ok(expr)
    }

    /// Substring match on the stored text: `"<key>"` followed somewhere by
    /// the JSON rendering of the value. Weaker than a structural match.
    fn raw_text_equals(
        &self,
        predicate: &Predicate,
        column: Expr,
        path: &JsonPath,
        value: &Value,
        params: &mut Vec<Value>,
    ) -> Result<Expr> {
        self.require(predicate, "LIKE")?;
        let key = path.last_key().ok_or_else(|| {
            unsupported(
                predicate,
                format!("path {} names no member to match in raw text", path),
            )
        })?;
        let pattern = format!(
            "%{}%{}%",
            escape_like(&serde_json::Value::String(key.to_string()).to_string()),
            escape_like(&value.to_json().to_string())
        );
        Ok(Expr::Like {
            expr: Box::new(column),
            pattern: Box::new(bind(params, Value::Text(pattern))),
            negated: false,
        })
    }

    fn json_attribute(
        &self,
        predicate: &Predicate,
    ) -> Result<(&'a AttributeDescriptor, JsonShape)> {
        let name = predicate.attribute();
        let attribute = self.descriptor.attribute(name).ok_or_else(|| {
            unsupported(
                predicate,
                format!("{} has no attribute '{}'", self.descriptor.type_name(), name),
            )
        })?;
        let shape = attribute.json_shape().ok_or_else(|| {
            unsupported(predicate, format!("'{}' is not a JSON attribute", name))
        })?;
        Ok((attribute, shape))
    }

    fn require(&self, predicate: &Predicate, function: &str) -> Result<()> {
        if self.capabilities.supports(function) {
            Ok(())
        } else {
            Err(unsupported(
                predicate,
                format!("backend does not support {}", function),
            ))
        }
    }
}

fn unsupported(predicate: &Predicate, reason: String) -> DbError {
    DbError::UnsupportedPredicate(format!("{}: {}", predicate, reason))
}

fn bind(params: &mut Vec<Value>, value: Value) -> Expr {
    params.push(value);
    Expr::Parameter(params.len() - 1)
}

fn scalar<'v>(predicate: &Predicate, value: &'v Value) -> Result<&'v Value> {
    match value {
        Value::Json(_) => Err(unsupported(
            predicate,
            "only scalar values can be matched".into(),
        )),
        // JSON has no NaN or infinity
        Value::Float(f) if !f.is_finite() => Err(unsupported(
            predicate,
            format!("{} has no JSON representation", f),
        )),
        other => Ok(other),
    }
}

/// Strings go through `JSON_QUOTE`; other scalars are bound as JSON text.
fn json_candidate(value: &Value, params: &mut Vec<Value>) -> Expr {
    match value {
        Value::Text(text) => {
            Expr::function("JSON_QUOTE", vec![bind(params, Value::Text(text.clone()))])
        }
        other => bind(params, Value::Text(other.to_json().to_string())),
    }
}

fn parse_path(predicate: &Predicate, path: &str) -> Result<JsonPath> {
    JsonPath::parse(path).map_err(|e| unsupported(predicate, e.to_string()))
}
