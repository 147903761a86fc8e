//! Small readers for request headers

use axum::http::{header, HeaderMap};

/// Whether the client asked for a JSON response.
pub fn accepts_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value.split(',').any(|item| {
                item.split(';')
                    .next()
                    .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
            })
        })
        .unwrap_or(false)
}

/// Value of an option header, accepted with or without the `Linx-` prefix.
pub fn option_header(headers: &HeaderMap, name: &str) -> Option<String> {
    [name.to_string(), format!("Linx-{}", name)]
        .iter()
        .filter_map(|candidate| headers.get(candidate.as_str()))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// `yes` and `true` switch a flag on; anything else leaves it off.
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    value.eq_ignore_ascii_case("yes") || value.eq_ignore_ascii_case("true")
}

/// Declared body size, if any.
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_accepts_json() {
        let mut headers = HeaderMap::new();
        assert!(!accepts_json(&headers));
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html, Application/JSON;q=0.9"));
        assert!(accepts_json(&headers));
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
        assert!(!accepts_json(&headers));
    }

    #[test]
    fn test_option_header_prefixes() {
        let mut headers = HeaderMap::new();
        headers.insert("Linx-Expiry", HeaderValue::from_static("60"));
        assert_eq!(option_header(&headers, "Expiry").as_deref(), Some("60"));

        headers.insert("Expiry", HeaderValue::from_static("120"));
        assert_eq!(option_header(&headers, "Expiry").as_deref(), Some("120"));
        assert_eq!(option_header(&headers, "Delete-Key"), None);
    }

    #[test]
    fn test_truthy() {
        assert!(is_truthy("yes"));
        assert!(is_truthy("TRUE"));
        assert!(!is_truthy("no"));
        assert!(!is_truthy(""));
    }
}
