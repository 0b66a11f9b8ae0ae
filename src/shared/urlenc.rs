use std::borrow::Cow;
use std::collections::HashMap;

/// Percent-encode a query value.
pub fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Percent-decode, tolerating malformed escapes by passing them through.
pub fn decode(value: &str) -> String {
    match urlencoding::decode(value) {
        Ok(Cow::Borrowed(s)) => s.to_string(),
        Ok(Cow::Owned(s)) => s,
        Err(_) => value.to_string(),
    }
}

/// Split a raw query string into decoded key/value pairs. Later duplicates
/// win, which is all the handlers need.
pub fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let Some(query) = query else {
        return params;
    };
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };
        params.insert(decode(key), decode(value));
    }
    params
}
