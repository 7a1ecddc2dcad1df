//! Page acquisition: one HTTP GET, then HTML flattened to plain text.

use async_trait::async_trait;
use pagewatch_config::MonitorConfig;
use pagewatch_http::{HttpClient, HttpError};
use scraper::{Html, Node};
use thiserror::Error;

/// Elements whose text never shows up on the rendered page.
const INVISIBLE: [&str; 4] = ["script", "style", "template", "noscript"];

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch failed: {0}")]
    Http(#[from] HttpError),
}

/// Where the raw page text comes from.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch the document and return its plain-text rendering.
    async fn fetch(&self) -> Result<String, FetchError>;

    /// Address reported in notifications.
    fn url(&self) -> &str;
}

/// Live source: GET with a browser-like user agent, body forced to UTF-8.
pub struct HttpPageSource {
    client: HttpClient,
    url: String,
}

impl HttpPageSource {
    pub fn new(url: &str, user_agent: &str) -> Result<Self, FetchError> {
        let client = HttpClient::new(url)?.with_user_agent(user_agent)?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn from_config(cfg: &MonitorConfig) -> Result<Self, FetchError> {
        let client = HttpClient::new(&cfg.url)?
            .with_user_agent(&cfg.user_agent)?
            .with_timeout(cfg.http.timeout())
            .with_retries(cfg.http.retries);
        Ok(Self {
            client,
            url: cfg.url.clone(),
        })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        let html = self.client.get_text("").await?;
        tracing::debug!(url = %self.url, html_len = html.len(), "page.fetched");
        Ok(html_to_text(&html))
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Flatten an HTML document to its visible text nodes, one per line.
///
/// ```
/// use pagewatch_core::page::html_to_text;
///
/// let html = "<html><head><style>p{}</style></head><body><h1>Offers</h1><p>Apt&nbsp;A</p></body></html>";
/// assert_eq!(html_to_text(html), "Offers\nApt\u{a0}A");
/// ```
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| INVISIBLE.contains(&el.name()))
        });
        if !hidden {
            parts.push(&**text);
        }
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;

    #[test]
    fn text_nodes_are_separated_by_newlines() {
        let html = "<div>Eine Bewerbung ist nur online möglich.<ul><li>2-Zimmer</li><li>3-Zimmer</li></ul></div><footer>Bauverein</footer>";
        let text = html_to_text(html);
        assert_eq!(
            text,
            "Eine Bewerbung ist nur online möglich.\n2-Zimmer\n3-Zimmer\nBauverein"
        );
    }

    #[test]
    fn scripts_and_comments_are_dropped() {
        let html = "<body><script>var x = 'Apt';</script><!-- hidden --><p>shown</p></body>";
        assert_eq!(html_to_text(html), "shown");
    }

    #[test]
    fn entities_are_decoded_before_extraction() {
        let html = "<p>Start &amp; go</p><p> Apt &lt;1&gt; </p><p>Ende</p>";
        let text = html_to_text(html);
        assert_eq!(extract(&text, "Start & go", "Ende").unwrap(), "Apt <1>");
    }
}
