// src/classifier.rs
use crate::types::Redirect;
use reqwest::header::{HeaderMap, LOCATION, SERVER};

/// Substrings whose presence in a page marks it as a WordPress site.
pub const PLATFORM_SIGNATURES: [&str; 3] = ["wp-content", "wp-includes", "wp-json"];

/// Case-sensitive search of the body for any platform signature.
pub fn is_platform(body: &[u8]) -> bool {
    let body = String::from_utf8_lossy(body);
    PLATFORM_SIGNATURES.iter().any(|signature| body.contains(signature))
}

/// First `Server` header value, empty when the server sent none.
pub fn server_banner(headers: &HeaderMap) -> String {
    headers
        .get(SERVER)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default()
}

pub fn redirect_target(headers: &HeaderMap) -> Redirect {
    match headers.get(LOCATION) {
        Some(value) if !value.is_empty() => {
            Redirect::To(String::from_utf8_lossy(value.as_bytes()).into_owned())
        }
        _ => Redirect::None,
    }
}
