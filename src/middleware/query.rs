//! Query string parsing.

use std::borrow::Cow;
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::core::{Request, Response};

use super::{HandlerResult, Next, RequestHandler};

/// Query parser options.
#[derive(Clone, Debug, Default)]
pub struct QueryParserOptions {
    /// Copy query fields into `req.params`.
    pub map_params: bool,
    /// When mapping, replace params that already exist.
    pub override_params: bool,
}

/// Percent decode, treating `+` as a space.
#[inline]
pub fn form_decode(s: &str) -> Cow<'_, str> {
    if !s.contains('%') && !s.contains('+') {
        return Cow::Borrowed(s);
    }
    let spaced = s.replace('+', " ");
    Cow::Owned(
        percent_encoding::percent_decode_str(&spaced)
            .decode_utf8_lossy()
            .into_owned(),
    )
}

/// Split `a=1&b=2` into decoded pairs; keys without `=` get an empty value.
pub fn parse_pairs(query: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity((query.matches('&').count() + 1).min(16));

    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }

        let (key, value) = match pair.find('=') {
            Some(pos) => (&pair[..pos], &pair[pos + 1..]),
            None => (pair, ""),
        };

        if !key.is_empty() {
            pairs.push((form_decode(key).into_owned(), form_decode(value).into_owned()));
        }
    }

    pairs
}

/// Collect pairs into an object; repeated keys (or `key[]`) become arrays.
pub fn pairs_to_object(pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in pairs {
        let (key, force_array) = match key.strip_suffix("[]") {
            Some(k) => (k.to_string(), true),
            None => (key, false),
        };
        let value = Value::String(value);

        match map.get_mut(&key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None if force_array => {
                map.insert(key, Value::Array(vec![value]));
            }
            None => {
                map.insert(key, value);
            }
        }
    }
    map
}

/// Parse a query string into an object.
pub fn parse_query(query: &str) -> Map<String, Value> {
    pairs_to_object(parse_pairs(query))
}

/// Stringify a field for `req.params`; arrays are comma-joined.
fn param_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(param_value)
            .collect::<Vec<_>>()
            .join(","),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Copy object fields into params.
pub fn map_into_params(
    fields: &Map<String, Value>,
    params: &mut HashMap<String, String>,
    override_params: bool,
) {
    for (key, value) in fields {
        if !override_params && params.contains_key(key) {
            continue;
        }
        params.insert(key.clone(), param_value(value));
    }
}

/// Parses the query string into `req.query`.
pub struct QueryParser {
    options: QueryParserOptions,
}

#[async_trait]
impl RequestHandler for QueryParser {
    fn name(&self) -> &str {
        "query_parser"
    }

    async fn handle(&self, req: &mut Request, _res: &mut Response) -> HandlerResult {
        let query = match req.query_string() {
            Some(q) if !q.is_empty() => parse_query(q),
            _ => Map::new(),
        };

        if self.options.map_params {
            map_into_params(&query, &mut req.params, self.options.override_params);
        }
        req.query = query;
        Ok(Next::Continue)
    }
}

/// Create a query parser.
pub fn query_parser(options: QueryParserOptions) -> QueryParser {
    QueryParser { options }
}
