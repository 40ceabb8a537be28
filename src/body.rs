//! Request body and cookie decoding.
//!
//! JSON and URL-encoded bodies are buffered, size-checked and parsed
//! before dispatch. The decoded value travels as a [`ParsedBody`]
//! extension while the original bytes are handed on untouched, so route
//! handlers can still use axum's own `Json` or `Form` extractors.

use crate::error::{AppError, AppResult};
use axum::{
    body::{Body, Bytes},
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::Cookie;
use http_body_util::LengthLimitError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::convert::Infallible;

/// Largest accepted JSON body
pub const JSON_LIMIT: usize = 20 * 1024 * 1024;

/// Largest accepted URL-encoded body
pub const URLENCODED_LIMIT: usize = 100 * 1024;

/// Maximum number of URL-encoded key/value pairs
pub const PARAMETER_LIMIT: usize = 1000;

/// Maximum bracket nesting honoured in URL-encoded keys
pub const NESTING_DEPTH: usize = 32;

/// Highest numeric bracket index treated as an array position
const ARRAY_INDEX_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    UrlEncoded,
}

impl BodyKind {
    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let content_type = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
        let essence = content_type.split(';').next()?.trim();

        if essence.eq_ignore_ascii_case("application/json") {
            Some(BodyKind::Json)
        } else if essence.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            Some(BodyKind::UrlEncoded)
        } else {
            None
        }
    }

    fn limit(self) -> usize {
        match self {
            BodyKind::Json => JSON_LIMIT,
            BodyKind::UrlEncoded => URLENCODED_LIMIT,
        }
    }
}

/// Decoded request body.
///
/// Extracts as an empty object when the request carried nothing the
/// decoder understood.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody(pub Value);

impl<S> FromRequestParts<S> for ParsedBody
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<ParsedBody>()
            .cloned()
            .unwrap_or_else(|| ParsedBody(Value::Object(Map::new()))))
    }
}

/// Request cookies keyed by name, values percent-decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies(BTreeMap<String, String>);

impl Cookies {
    /// Parse every `Cookie` header. The first occurrence of a name wins.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = BTreeMap::new();
        let parsed = headers
            .get_all(header::COOKIE)
            .into_iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| Cookie::split_parse_encoded(value))
            .filter_map(Result::ok);

        for cookie in parsed {
            cookies
                .entry(cookie.name().to_string())
                .or_insert_with(|| cookie.value().to_string());
        }

        Self(cookies)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Decode a `j:`-prefixed JSON cookie.
    pub fn json(&self, name: &str) -> Option<Value> {
        let raw = self.get(name)?.strip_prefix("j:")?;
        serde_json::from_str(raw).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S> FromRequestParts<S> for Cookies
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Cookies>()
            .cloned()
            .unwrap_or_else(|| Cookies::from_headers(&parts.headers)))
    }
}

/// Body decoding middleware - parses cookies and JSON/URL-encoded bodies
pub async fn decode_body(req: Request, next: Next) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let cookies = Cookies::from_headers(&parts.headers);
    parts.extensions.insert(cookies);

    let Some(kind) = BodyKind::from_headers(&parts.headers) else {
        return Ok(next.run(Request::from_parts(parts, body)).await);
    };

    let limit = kind.limit();
    let declared_length = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_length.is_some_and(|len| len > limit) {
        return Err(AppError::PayloadTooLarge { limit });
    }

    let bytes = read_limited(body, limit).await?;
    let parsed = match kind {
        BodyKind::Json => parse_json(&bytes)?,
        BodyKind::UrlEncoded => parse_urlencoded(&bytes)?,
    };

    tracing::debug!(
        kind = ?kind,
        bytes = bytes.len(),
        "Decoded request body"
    );

    parts.extensions.insert(ParsedBody(parsed));
    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

async fn read_limited(body: Body, limit: usize) -> AppResult<Bytes> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        let inner = e.into_inner();
        if inner.is::<LengthLimitError>() {
            AppError::PayloadTooLarge { limit }
        } else {
            AppError::MalformedBody(format!("failed to read request body: {}", inner))
        }
    })
}

/// Parse a strict JSON body: only objects and arrays are accepted at the top level.
pub fn parse_json(bytes: &[u8]) -> AppResult<Value> {
    let first = bytes.iter().find(|b| !b.is_ascii_whitespace());
    match first {
        None => Ok(Value::Object(Map::new())),
        Some(b'{') | Some(b'[') => serde_json::from_slice(bytes)
            .map_err(|e| AppError::MalformedBody(e.to_string())),
        Some(_) => Err(AppError::MalformedBody(
            "JSON body must be an object or an array".to_string(),
        )),
    }
}

/// Parse a URL-encoded body, expanding bracketed keys into nested values.
pub fn parse_urlencoded(bytes: &[u8]) -> AppResult<Value> {
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(bytes)
        .into_owned()
        .take(PARAMETER_LIMIT + 1)
        .collect();

    if pairs.len() > PARAMETER_LIMIT {
        return Err(AppError::TooManyParameters {
            limit: PARAMETER_LIMIT,
        });
    }

    let mut root = Node::Map(BTreeMap::new());
    for (key, value) in pairs {
        if key.is_empty() {
            continue;
        }
        let segments = split_key(&key, NESTING_DEPTH);
        root = insert(root, &segments, value);
    }

    Ok(root.into_value())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    Push,
}

impl Segment {
    fn from_bracket(inner: &str) -> Self {
        if inner.is_empty() {
            return Segment::Push;
        }
        match inner.parse::<usize>() {
            Ok(index) if index <= ARRAY_INDEX_LIMIT => Segment::Index(index),
            _ => Segment::Key(inner.to_string()),
        }
    }
}

/// Split `a[b][]` into `[Key(a), Key(b), Push]`.
///
/// Brackets beyond `depth` are kept verbatim as a final key.
fn split_key(key: &str, depth: usize) -> Vec<Segment> {
    let (root, mut rest) = match key.find('[') {
        Some(i) if i > 0 => (&key[..i], &key[i..]),
        _ => (key, ""),
    };

    let mut segments = vec![Segment::Key(root.to_string())];
    let mut groups = 0;
    while groups < depth && rest.starts_with('[') {
        let Some(close) = rest.find(']') else {
            break;
        };
        segments.push(Segment::from_bracket(&rest[1..close]));
        rest = &rest[close + 1..];
        groups += 1;
    }

    if !rest.is_empty() {
        segments.push(Segment::Key(rest.to_string()));
    }

    segments
}

/// Intermediate form tree. Arrays stay sparse until the whole body has
/// been read, so indices land by position rather than arrival order.
#[derive(Debug)]
enum Node {
    Leaf(Vec<String>),
    Map(BTreeMap<String, Node>),
    List(BTreeMap<usize, Node>),
}

impl Node {
    fn with_leaf(self, value: String) -> Node {
        match self {
            Node::Leaf(mut values) => {
                values.push(value);
                Node::Leaf(values)
            }
            Node::List(mut items) => {
                items.insert(next_index(&items), Node::Leaf(vec![value]));
                Node::List(items)
            }
            Node::Map(mut map) => {
                map.insert(map.len().to_string(), Node::Leaf(vec![value]));
                Node::Map(map)
            }
        }
    }

    fn into_map(self) -> BTreeMap<String, Node> {
        match self {
            Node::Map(map) => map,
            Node::List(items) => items
                .into_iter()
                .map(|(i, node)| (i.to_string(), node))
                .collect(),
            Node::Leaf(values) => values
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), Node::Leaf(vec![v])))
                .collect(),
        }
    }

    fn into_list(self) -> BTreeMap<usize, Node> {
        match self {
            Node::List(items) => items,
            Node::Map(map) => map.into_values().enumerate().collect(),
            Node::Leaf(values) => values
                .into_iter()
                .map(|v| Node::Leaf(vec![v]))
                .enumerate()
                .collect(),
        }
    }

    /// Compact sparse arrays in index order.
    fn into_value(self) -> Value {
        match self {
            Node::Leaf(mut values) if values.len() == 1 => Value::String(values.remove(0)),
            Node::Leaf(values) => Value::Array(values.into_iter().map(Value::String).collect()),
            Node::Map(map) => Value::Object(
                map.into_iter()
                    .map(|(key, node)| (key, node.into_value()))
                    .collect(),
            ),
            Node::List(items) => Value::Array(items.into_values().map(Node::into_value).collect()),
        }
    }
}

fn next_index(items: &BTreeMap<usize, Node>) -> usize {
    items.keys().next_back().map_or(0, |last| last + 1)
}

fn insert(node: Node, segments: &[Segment], value: String) -> Node {
    let Some((segment, rest)) = segments.split_first() else {
        return node.with_leaf(value);
    };

    match (segment, node) {
        (Segment::Key(key), node) => {
            let mut map = node.into_map();
            let child = map.remove(key);
            map.insert(key.clone(), insert_child(child, rest, value));
            Node::Map(map)
        }
        (Segment::Index(index), Node::Map(mut map)) => {
            let key = index.to_string();
            let child = map.remove(&key);
            map.insert(key, insert_child(child, rest, value));
            Node::Map(map)
        }
        (Segment::Push, Node::Map(mut map)) => {
            let key = map.len().to_string();
            map.insert(key, insert_child(None, rest, value));
            Node::Map(map)
        }
        (Segment::Index(index), node) => {
            let mut items = node.into_list();
            match items.remove(index) {
                // A taken index holding a scalar gets a sibling, not a nested array.
                Some(existing) if rest.is_empty() || matches!(existing, Node::Leaf(_)) => {
                    items.insert(*index, existing);
                    let next = next_index(&items);
                    items.insert(next, insert_child(None, rest, value));
                }
                existing => {
                    items.insert(*index, insert_child(existing, rest, value));
                }
            }
            Node::List(items)
        }
        (Segment::Push, node) => {
            let mut items = node.into_list();
            let next = next_index(&items);
            items.insert(next, insert_child(None, rest, value));
            Node::List(items)
        }
    }
}

fn insert_child(child: Option<Node>, rest: &[Segment], value: String) -> Node {
    match (child, rest.first()) {
        (Some(node), _) => insert(node, rest, value),
        (None, None) => Node::Leaf(vec![value]),
        (None, Some(Segment::Key(_))) => insert(Node::Map(BTreeMap::new()), rest, value),
        (None, Some(_)) => insert(Node::List(BTreeMap::new()), rest, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_json_body_is_empty_object() {
        assert_eq!(parse_json(b"").unwrap(), json!({}));
        assert_eq!(parse_json(b"  \n").unwrap(), json!({}));
    }

    #[test]
    fn test_json_object_and_array() {
        assert_eq!(parse_json(br#"{"a": [1, 2]}"#).unwrap(), json!({"a": [1, 2]}));
        assert_eq!(parse_json(b"[true]").unwrap(), json!([true]));
    }

    #[test]
    fn test_json_scalars_are_rejected() {
        assert!(matches!(parse_json(b"42"), Err(AppError::MalformedBody(_))));
        assert!(matches!(parse_json(b"\"x\""), Err(AppError::MalformedBody(_))));
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(matches!(parse_json(b"{\"a\":"), Err(AppError::MalformedBody(_))));
    }

    #[test]
    fn test_flat_form() {
        let value = parse_urlencoded(b"name=Honey+Jar&qty=2").unwrap();
        assert_eq!(value, json!({"name": "Honey Jar", "qty": "2"}));
    }

    #[test]
    fn test_nested_form() {
        let value = parse_urlencoded(b"address%5Bcity%5D=Pune&address%5Bzip%5D=411001").unwrap();
        assert_eq!(value, json!({"address": {"city": "Pune", "zip": "411001"}}));
    }

    #[test]
    fn test_form_arrays() {
        let value = parse_urlencoded(b"tags[]=raw&tags[]=organic&id=1&id=2").unwrap();
        assert_eq!(
            value,
            json!({"tags": ["raw", "organic"], "id": ["1", "2"]})
        );
    }

    #[test]
    fn test_indexed_objects() {
        let value =
            parse_urlencoded(b"items[0][sku]=A1&items[0][qty]=2&items[1][sku]=B2").unwrap();
        assert_eq!(
            value,
            json!({"items": [{"sku": "A1", "qty": "2"}, {"sku": "B2"}]})
        );
    }

    #[test]
    fn test_indices_land_by_position() {
        let value = parse_urlencoded(b"items[1][sku]=B&items[0][sku]=A").unwrap();
        assert_eq!(value, json!({"items": [{"sku": "A"}, {"sku": "B"}]}));

        let value = parse_urlencoded(b"a[1]=b&a[0]=c").unwrap();
        assert_eq!(value, json!({"a": ["c", "b"]}));
    }

    #[test]
    fn test_repeated_index_adds_sibling() {
        let value = parse_urlencoded(b"a[0]=x&a[0]=y").unwrap();
        assert_eq!(value, json!({"a": ["x", "y"]}));
    }

    #[test]
    fn test_sparse_indices_are_compacted() {
        let value = parse_urlencoded(b"a[5]=z&a[2]=y").unwrap();
        assert_eq!(value, json!({"a": ["y", "z"]}));
    }

    #[test]
    fn test_large_index_is_object_key() {
        let value = parse_urlencoded(b"a[100]=x").unwrap();
        assert_eq!(value, json!({"a": {"100": "x"}}));
    }

    #[test]
    fn test_too_many_parameters() {
        let body = (0..=PARAMETER_LIMIT)
            .map(|i| format!("k{}=v", i))
            .collect::<Vec<_>>()
            .join("&");
        assert!(matches!(
            parse_urlencoded(body.as_bytes()),
            Err(AppError::TooManyParameters { .. })
        ));
    }

    #[test]
    fn test_split_key_depth() {
        assert_eq!(
            split_key("a[b][c]", 1),
            vec![
                Segment::Key("a".to_string()),
                Segment::Key("b".to_string()),
                Segment::Key("[c]".to_string()),
            ]
        );
    }

    #[test]
    fn test_split_key_unclosed_bracket() {
        assert_eq!(
            split_key("a[b", NESTING_DEPTH),
            vec![Segment::Key("a".to_string()), Segment::Key("[b".to_string())]
        );
    }

    #[test]
    fn test_cookies_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "session=abc%20123; cart=j%3A%7B%22items%22%3A2%7D".parse().unwrap(),
        );

        let cookies = Cookies::from_headers(&headers);
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies.get("session"), Some("abc 123"));
        assert_eq!(cookies.json("cart"), Some(json!({"items": 2})));
        assert_eq!(cookies.json("session"), None);
    }

    #[test]
    fn test_duplicate_cookie_keeps_first_value() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, "sid=first; sid=second".parse().unwrap());
        headers.append(header::COOKIE, "sid=third; theme=dark".parse().unwrap());

        let cookies = Cookies::from_headers(&headers);
        assert_eq!(cookies.get("sid"), Some("first"));
        assert_eq!(cookies.get("theme"), Some("dark"));
    }

    #[test]
    fn test_no_cookie_header() {
        assert!(Cookies::from_headers(&HeaderMap::new()).is_empty());
    }
}
