use crate::core::{DbError, Result};
use lru::LruCache;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// MySQL's default LIKE escape character.
pub const DEFAULT_ESCAPE: char = '\\';

const CACHE_CAPACITY: NonZeroUsize = NonZeroUsize::MIN.saturating_add(199);

lazy_static::lazy_static! {
    static ref REGEX_LRU_CACHE: Arc<Mutex<LruCache<String, Arc<Regex>>>> =
        Arc::new(Mutex::new(LruCache::new(CACHE_CAPACITY)));
}

/// Escapes `%`, `_` and the escape character so `text` matches only itself.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '%' || c == '_' || c == DEFAULT_ESCAPE {
            escaped.push(DEFAULT_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

#[inline]
fn like_to_regex(pattern: &str, escape: char) -> String {
    let mut regex = String::with_capacity(pattern.len() + 8);
    regex.push_str("(?s)^");

    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            c if c == escape && chars.peek().is_some() => {
                if let Some(literal) = chars.next() {
                    regex.push_str(&regex::escape(&literal.to_string()));
                }
            }
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            c => regex.push_str(&regex::escape(&c.to_string())),
        }
    }

    regex.push('$');
    regex
}

/// Fast path for patterns with at most a leading and trailing `%`.
#[inline]
fn fast_path_like(text: &str, pattern: &str, case_sensitive: bool, escape: char) -> Option<bool> {
    if pattern.contains(escape) || pattern.contains('_') {
        return None;
    }

    let (text, pattern) = if case_sensitive {
        (text.to_string(), pattern.to_string())
    } else {
        (text.to_lowercase(), pattern.to_lowercase())
    };

    let leading = pattern.starts_with('%');
    let trailing = pattern.len() > 1 && pattern.ends_with('%');
    let start = usize::from(leading);
    let end = pattern.len() - usize::from(trailing);
    let core = pattern.get(start..end)?;
    if core.contains('%') {
        return None;
    }

    Some(match (leading, trailing) {
        (false, false) => text == core,
        (false, true) => text.starts_with(core),
        (true, false) => text.ends_with(core),
        (true, true) => text.contains(core),
    })
}

fn get_or_compile_regex(pattern: &str, case_sensitive: bool, escape: char) -> Result<Arc<Regex>> {
    let cache_key = format!(
        "{}{}:{}",
        if case_sensitive { 's' } else { 'i' },
        escape,
        pattern
    );

    {
        let mut cache = REGEX_LRU_CACHE.lock()?;
        if let Some(regex) = cache.get(&cache_key) {
            return Ok(Arc::clone(regex));
        }
    }

    let compiled = regex::RegexBuilder::new(&like_to_regex(pattern, escape))
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| DbError::StorageError(format!("Invalid LIKE pattern: {}", e)))?;
    let compiled = Arc::new(compiled);

    REGEX_LRU_CACHE
        .lock()?
        .put(cache_key, Arc::clone(&compiled));

    Ok(compiled)
}

#[inline]
pub fn eval_like(text: &str, pattern: &str, case_sensitive: bool) -> Result<bool> {
    eval_like_escaped(text, pattern, case_sensitive, DEFAULT_ESCAPE)
}

pub fn eval_like_escaped(
    text: &str,
    pattern: &str,
    case_sensitive: bool,
    escape: char,
) -> Result<bool> {
    if let Some(result) = fast_path_like(text, pattern, case_sensitive, escape) {
        return Ok(result);
    }

    let regex = get_or_compile_regex(pattern, case_sensitive, escape)?;
    Ok(regex.is_match(text))
}
