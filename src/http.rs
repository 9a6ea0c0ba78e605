use reqwest::{Method, StatusCode, Url};
use serde_json::Value;

use crate::errors::{APIError, Error, Result};

/// Normalizes the configured base URL so relative paths always append to it.
pub(crate) fn parse_base_url(raw: &str) -> Result<Url> {
    let mut base = raw.trim().trim_end_matches('/').to_string();
    base.push('/');
    let url = Url::parse(&base).map_err(|err| Error::Config(format!("invalid base url: {err}")))?;
    if url.cannot_be_a_base() {
        return Err(Error::Config(format!("invalid base url: {raw}")));
    }
    Ok(url)
}

/// Resolves `path` against the base URL; absolute URLs are used as-is.
pub(crate) fn join_url(base: &Url, path: &str) -> Result<Url> {
    if path.starts_with("http://") || path.starts_with("https://") {
        return Url::parse(path).map_err(|err| Error::Config(err.to_string()));
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|err| Error::Config(format!("invalid path: {err}")))
}

/// Flattens a JSON object into query pairs.
///
/// Strings are sent verbatim, other scalars in their JSON form, arrays as
/// repeated keys. Nulls and nested objects are skipped.
pub(crate) fn query_pairs(query: &Value) -> Vec<(String, String)> {
    let Value::Object(map) = query else {
        return Vec::new();
    };
    let mut pairs = Vec::with_capacity(map.len());
    for (key, value) in map {
        match value {
            Value::Array(items) => {
                pairs.extend(
                    items
                        .iter()
                        .filter_map(scalar_to_query)
                        .map(|v| (key.clone(), v)),
                );
            }
            other => {
                if let Some(v) = scalar_to_query(other) {
                    pairs.push((key.clone(), v));
                }
            }
        }
    }
    pairs
}

fn scalar_to_query(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// True when the payload carries nothing worth sending.
pub(crate) fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Whether the verb carries its payload in the query string rather than a JSON body.
pub(crate) fn sends_query(method: &Method) -> bool {
    *method == Method::GET || *method == Method::DELETE
}

/// Routes a response status; statuses in `400..600` become an [`APIError`].
pub(crate) fn check_status(status: StatusCode, url: &Url, body: &[u8]) -> Result<()> {
    let code = status.as_u16();
    if !APIError::is_error_status(code) {
        return Ok(());
    }
    let body = String::from_utf8_lossy(body);
    Err(APIError::classify(code, url.as_str(), body).into())
}
