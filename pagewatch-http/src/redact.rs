//! Keeping secrets out of logs.

use reqwest::header::HeaderMap;
use reqwest::{Method, Url};

const RAW_ENV: &str = "PAGEWATCH_HTTP_RAW";
pub(crate) const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_MAX: usize = 500;
const REDACTED: &str = "<redacted>";

pub(crate) fn raw_enabled() -> bool {
    std::env::var(RAW_ENV)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Replace chat-bot tokens embedded in URL paths (`/bot123:abc/sendMessage`).
///
/// ```
/// assert_eq!(
///     pagewatch_http::redact_path("/bot123456:AAE-secret/sendMessage"),
///     "/bot<redacted>/sendMessage"
/// );
/// assert_eq!(pagewatch_http::redact_path("/bottles/list"), "/bottles/list");
/// ```
pub fn redact_path(path: &str) -> String {
    path.split('/')
        .map(|seg| match seg.strip_prefix("bot") {
            Some(rest) if rest.contains(':') => "bot<redacted>",
            _ => seg,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// `host[:port]/path` with the path redacted and the query dropped.
pub(crate) fn log_target(url: &Url) -> String {
    let host = url.host_str().unwrap_or("-");
    let path = redact_path(url.path());
    match url.port() {
        Some(port) => format!("{host}:{port}{path}"),
        None => format!("{host}{path}"),
    }
}

pub(crate) fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if is_secret_header(name.as_str()) {
                REDACTED.to_string()
            } else {
                value.to_str().unwrap_or("<binary>").to_string()
            };
            (name.as_str().to_string(), shown)
        })
        .collect()
}

fn is_secret_header(name: &str) -> bool {
    ["authorization", "x-api-key", "cookie", "set-cookie"]
        .iter()
        .any(|s| name.eq_ignore_ascii_case(s))
}

/// Single-line curl reproduction of a request, safe to log.
pub(crate) fn curl_line(method: &Method, url: &Url, bearer: bool, body: Option<&[u8]>) -> String {
    let quote = |s: &str| format!("'{}'", s.replace('\'', r"'\''"));
    let mut line = format!("curl -X{method}");
    if bearer {
        line.push_str(&format!(" -H 'authorization: Bearer {REDACTED}'"));
    }
    if let Some(bytes) = body {
        match std::str::from_utf8(bytes) {
            Ok(text) => {
                line.push_str(" -H 'content-type: application/json' -d ");
                line.push_str(&quote(&truncated(text, RAW_MAX_BODY)));
            }
            Err(_) => line.push_str(&format!(" --data-binary @- # ({} bytes)", bytes.len())),
        }
    }
    line.push(' ');
    line.push_str(&quote(&format!("{}://{}", url.scheme(), log_target(url))));
    line
}

pub(crate) fn snip_body(body: &[u8]) -> String {
    truncated(&String::from_utf8_lossy(body), SNIPPET_MAX)
}

/// Cut `text` to at most `max` bytes on a char boundary, marking the cut.
fn truncated(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let cut = (0..=max).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0);
    format!("{}...", &text[..cut])
}
