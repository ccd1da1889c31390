//! Response header policy.
//!
//! - `Access-Control-Allow-Origin: *` on every response, via a tower layer
//! - Cache-defeating headers on static file and 404 responses, so a browser
//!   never reuses an asset while it is being edited

use axum::http::HeaderValue;
use axum::http::header::{self, HeaderName};
use tower_http::set_header::SetResponseHeaderLayer;

/// `Cache-Control` value for static responses.
pub(crate) const NO_CACHE: &str = "no-store, no-cache, must-revalidate, proxy-revalidate";

/// Create layer that adds a wildcard `Access-Control-Allow-Origin` header.
pub(crate) fn allow_any_origin_layer() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    )
}

/// Headers that forbid caching at every layer between server and browser.
pub(crate) fn no_cache_headers() -> [(HeaderName, HeaderValue); 4] {
    [
        (header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE)),
        (header::PRAGMA, HeaderValue::from_static("no-cache")),
        (header::EXPIRES, HeaderValue::from_static("0")),
        (
            HeaderName::from_static("surrogate-control"),
            HeaderValue::from_static("no-store"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_cache_value() {
        assert!(NO_CACHE.contains("no-store"));
        assert!(NO_CACHE.contains("no-cache"));
        assert!(NO_CACHE.contains("must-revalidate"));
    }

    #[test]
    fn test_no_cache_headers_names() {
        let names: Vec<_> = no_cache_headers()
            .into_iter()
            .map(|(name, _)| name.as_str().to_owned())
            .collect();

        assert_eq!(
            names,
            ["cache-control", "pragma", "expires", "surrogate-control"]
        );
    }
}
