//! MySQL JSON function semantics for the reference store.

use super::super::{EvaluationContext, ExpressionEvaluator};
use crate::core::{DbError, Result, Row, Schema, Value};
use crate::expression::pattern;
use crate::json::{JsonPath, semantic_eq};
use crate::parser::ast::Expr;
use serde_json::Value as JsonValue;

/// `CAST(x AS JSON)`
pub struct CastJsonEvaluator;

impl ExpressionEvaluator for CastJsonEvaluator {
    fn name(&self) -> &'static str {
        "CAST_JSON"
    }

    fn can_evaluate(&self, expr: &Expr) -> bool {
        matches!(expr, Expr::CastJson { .. })
    }

    fn evaluate(
        &self,
        expr: &Expr,
        row: &Row,
        schema: &Schema,
        context: &EvaluationContext<'_>,
    ) -> Result<Value> {
        let Expr::CastJson { expr } = expr else {
            unreachable!();
        };
        cast_json(context.evaluate(expr, row, schema)?)
    }
}

pub fn cast_json(value: Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Text(text) => parse_json(&text, "CAST", 1).map(Value::Json),
        other => Ok(Value::Json(other.to_json())),
    }
}

/// `JSON_CONTAINS(target, candidate[, path])`: 1, 0 or NULL.
pub fn json_contains(args: &[Value]) -> Result<Value> {
    arity("JSON_CONTAINS", args, 2, 3)?;
    let Some(target) = json_arg(&args[0], "JSON_CONTAINS", 1)? else {
        return Ok(Value::Null);
    };
    let Some(candidate) = json_arg(&args[1], "JSON_CONTAINS", 2)? else {
        return Ok(Value::Null);
    };

    let scope = match args.get(2) {
        None => Some(&target),
        Some(Value::Null) => return Ok(Value::Null),
        Some(path) => {
            let path = path_arg(path, "JSON_CONTAINS")?;
            if path.has_wildcard() {
                return Err(DbError::StorageError(
                    "JSON_CONTAINS path may not contain wildcards".into(),
                ));
            }
            path.get(&target)
        }
    };

    Ok(match scope {
        Some(scope) => Value::Integer(i64::from(contains(scope, &candidate))),
        None => Value::Null,
    })
}

/// Containment as MySQL defines it for `JSON_CONTAINS`.
pub fn contains(target: &JsonValue, candidate: &JsonValue) -> bool {
    match (target, candidate) {
        (JsonValue::Array(items), JsonValue::Array(wanted)) => wanted
            .iter()
            .all(|w| items.iter().any(|item| contains(item, w))),
        (JsonValue::Array(items), other) => items.iter().any(|item| contains(item, other)),
        (JsonValue::Object(map), JsonValue::Object(wanted)) => wanted.iter().all(|(key, w)| {
            map.get(key).is_some_and(|value| contains(value, w))
        }),
        (JsonValue::Object(_), _) => false,
        (_, JsonValue::Array(_) | JsonValue::Object(_)) => false,
        (scalar, other) => semantic_eq(scalar, other),
    }
}

/// `JSON_SEARCH(doc, 'one'|'all', search[, escape[, path ...]])`
pub fn json_search(args: &[Value]) -> Result<Value> {
    if args.len() < 3 {
        return Err(DbError::StorageError(format!(
            "JSON_SEARCH expects at least 3 arguments, got {}",
            args.len()
        )));
    }

    let Some(doc) = json_arg(&args[0], "JSON_SEARCH", 1)? else {
        return Ok(Value::Null);
    };
    let all = match &args[1] {
        Value::Null => return Ok(Value::Null),
        Value::Text(mode) if mode.eq_ignore_ascii_case("one") => false,
        Value::Text(mode) if mode.eq_ignore_ascii_case("all") => true,
        other => {
            return Err(DbError::StorageError(format!(
                "JSON_SEARCH mode must be 'one' or 'all', got {}",
                other
            )));
        }
    };
    let search = match &args[2] {
        Value::Null => return Ok(Value::Null),
        Value::Text(s) => s.clone(),
        other => other.to_string(),
    };
    let escape = match args.get(3) {
        None | Some(Value::Null) => pattern::DEFAULT_ESCAPE,
        Some(Value::Text(s)) if s.is_empty() => pattern::DEFAULT_ESCAPE,
        Some(Value::Text(s)) if s.chars().count() == 1 => {
            s.chars().next().unwrap_or(pattern::DEFAULT_ESCAPE)
        }
        Some(other) => {
            return Err(DbError::StorageError(format!(
                "JSON_SEARCH escape must be a single character, got {}",
                other
            )));
        }
    };

    let mut scopes = Vec::new();
    if args.len() > 4 {
        for path in &args[4..] {
            if path.is_null() {
                return Ok(Value::Null);
            }
            let path = path_arg(path, "JSON_SEARCH")?;
            scopes.extend(path.select_paths(&doc));
        }
    } else {
        scopes.push((JsonPath::root(), &doc));
    }

    let mut found: Vec<String> = Vec::new();
    for (at, node) in scopes {
        collect_matches(node, at, &search, escape, all, &mut found)?;
        if !all && !found.is_empty() {
            break;
        }
    }

    Ok(match found.len() {
        0 => Value::Null,
        1 => Value::Json(JsonValue::String(found.remove(0))),
        _ => Value::Json(JsonValue::Array(
            found.into_iter().map(JsonValue::String).collect(),
        )),
    })
}

fn collect_matches(
    node: &JsonValue,
    at: JsonPath,
    search: &str,
    escape: char,
    all: bool,
    found: &mut Vec<String>,
) -> Result<()> {
    if !all && !found.is_empty() {
        return Ok(());
    }
    match node {
        JsonValue::String(s) => {
            if pattern::eval_like_escaped(s, search, true, escape)? {
                let rendered = at.to_string();
                if !found.contains(&rendered) {
                    found.push(rendered);
                }
            }
        }
        JsonValue::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                collect_matches(item, at.clone().index(idx), search, escape, all, found)?;
            }
        }
        JsonValue::Object(map) => {
            for (key, value) in map {
                collect_matches(value, at.clone().key(key.clone()), search, escape, all, found)?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// `JSON_EXTRACT(doc, path[, path ...])`
pub fn json_extract(args: &[Value]) -> Result<Value> {
    if args.len() < 2 {
        return Err(DbError::StorageError(format!(
            "JSON_EXTRACT expects at least 2 arguments, got {}",
            args.len()
        )));
    }
    let Some(doc) = json_arg(&args[0], "JSON_EXTRACT", 1)? else {
        return Ok(Value::Null);
    };

    let mut paths = Vec::with_capacity(args.len() - 1);
    for path in &args[1..] {
        if path.is_null() {
            return Ok(Value::Null);
        }
        paths.push(path_arg(path, "JSON_EXTRACT")?);
    }

    // A single wildcard-free path yields the value itself; anything else
    // wraps the matches in an array.
    if let [path] = paths.as_slice()
        && !path.has_wildcard()
    {
        return Ok(path
            .get(&doc)
            .map(|value| Value::Json(value.clone()))
            .unwrap_or(Value::Null));
    }

    let matches: Vec<JsonValue> = paths
        .iter()
        .flat_map(|path| path.select(&doc))
        .cloned()
        .collect();
    if matches.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Json(JsonValue::Array(matches)))
    }
}

/// `JSON_UNQUOTE(v)`
pub fn json_unquote(args: &[Value]) -> Result<Value> {
    arity("JSON_UNQUOTE", args, 1, 1)?;
    Ok(match &args[0] {
        Value::Null => Value::Null,
        Value::Json(JsonValue::String(s)) => Value::Text(s.clone()),
        Value::Json(other) => Value::Text(other.to_string()),
        Value::Text(s) if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') => {
            match serde_json::from_str::<String>(s) {
                Ok(unquoted) => Value::Text(unquoted),
                Err(e) => {
                    return Err(DbError::StorageError(format!(
                        "Invalid JSON text in argument 1 to function JSON_UNQUOTE: {}",
                        e
                    )));
                }
            }
        }
        other => Value::Text(other.to_string()),
    })
}

/// `JSON_QUOTE(s)`: the JSON string literal for `s`, as text.
pub fn json_quote(args: &[Value]) -> Result<Value> {
    arity("JSON_QUOTE", args, 1, 1)?;
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Text(s) => Ok(Value::Text(JsonValue::String(s.clone()).to_string())),
        other => Err(DbError::StorageError(format!(
            "Invalid data type for JSON_QUOTE: {}",
            other.type_name()
        ))),
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        return Err(DbError::StorageError(format!(
            "{} expects {} argument(s), got {}",
            name,
            if min == max {
                min.to_string()
            } else {
                format!("{} to {}", min, max)
            },
            args.len()
        )));
    }
    Ok(())
}

fn json_arg(value: &Value, function: &str, position: usize) -> Result<Option<JsonValue>> {
    match value {
        Value::Null => Ok(None),
        Value::Text(text) => parse_json(text, function, position).map(Some),
        Value::Json(json) => Ok(Some(json.clone())),
        other => Ok(Some(other.to_json())),
    }
}

fn parse_json(text: &str, function: &str, position: usize) -> Result<JsonValue> {
    serde_json::from_str(text).map_err(|e| {
        DbError::StorageError(format!(
            "Invalid JSON text in argument {} to function {}: {}",
            position, function, e
        ))
    })
}

fn path_arg(value: &Value, function: &str) -> Result<JsonPath> {
    match value {
        Value::Text(text) => JsonPath::parse(text)
            .map_err(|e| DbError::StorageError(format!("{} in {}", e, function))),
        other => Err(DbError::StorageError(format!(
            "{} expects a path string, got {}",
            function,
            other.type_name()
        ))),
    }
}
