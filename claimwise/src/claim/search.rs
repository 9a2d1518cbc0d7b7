//! Web search used by the repair shop finder.

use std::fmt::Write as _;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{Error, Result, ToolError};
use crate::tool::{Tool, ToolResult};

/// `DuckDuckGo` Lite HTML endpoint.
pub const DUCKDUCKGO_LITE_URL: &str = "https://lite.duckduckgo.com/lite/";

/// Default number of results returned to the model.
pub const DEFAULT_MAX_RESULTS: usize = 10;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

static LINK_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"class=['"]result-link['"][^>]*href=['"]([^'"]+)['"][^>]*>([^<]+)</a>"#).ok()
});

static LINK_HREF_FIRST_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"href=['"]([^'"]+)['"][^>]*class=['"]result-link['"][^>]*>([^<]+)</a>"#).ok()
});

static SNIPPET_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"(?s)class=['"]result-snippet['"][^>]*>(.*?)</td>"#).ok()
});

static TAG_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]+>").ok());

/// Arguments for web search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchArgs {
    /// The search query to perform.
    pub query: String,
}

/// A single search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Title of the result.
    pub title: String,
    /// URL of the result.
    pub link: String,
    /// Description/snippet of the result.
    pub description: String,
}

/// Web search over `DuckDuckGo` Lite.
#[derive(Debug, Clone)]
pub struct WebSearchTool {
    client: reqwest::Client,
    endpoint: Url,
    max_results: usize,
}

impl WebSearchTool {
    /// Create a search tool with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        let endpoint = Url::parse(DUCKDUCKGO_LITE_URL)
            .map_err(|e| Error::agent(format!("invalid search endpoint: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            max_results: DEFAULT_MAX_RESULTS,
        })
    }

    /// Set maximum results.
    #[must_use]
    pub const fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Point the tool at another Lite-compatible endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Returns the configured result limit.
    #[must_use]
    pub const fn max_results(&self) -> usize {
        self.max_results
    }

    /// Run a search and return at most `max_results` results.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Service`] if the endpoint cannot be reached or
    /// answers with a non-success status.
    pub async fn search(&self, query: &str) -> ToolResult<Vec<SearchResult>> {
        let url = Url::parse_with_params(self.endpoint.as_str(), &[("q", query)])
            .map_err(|e| ToolError::service("web search", e.to_string()))?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ToolError::service("web search", format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::service(
                "web search",
                format!("HTTP {}", status.as_u16()),
            ));
        }

        let html = response
            .text()
            .await
            .map_err(|e| ToolError::service("web search", format!("failed to read response: {e}")))?;

        let mut results = parse_duckduckgo_html(&html);
        results.truncate(self.max_results);
        debug!(query, results = results.len(), "Web search finished");
        Ok(results)
    }
}

/// Render results as markdown for the model.
#[must_use]
pub fn format_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results found.".to_owned();
    }

    let mut output = String::from("## Search Results\n\n");
    for result in results {
        let _ = write!(
            output,
            "[{}]({})\n{}\n\n",
            result.title, result.link, result.description
        );
    }
    output
}

/// Parse a `DuckDuckGo` Lite result page.
#[must_use]
pub fn parse_duckduckgo_html(html: &str) -> Vec<SearchResult> {
    let (Some(link_re), Some(alt_link_re), Some(snippet_re)) = (
        LINK_RE.as_ref(),
        LINK_HREF_FIRST_RE.as_ref(),
        SNIPPET_RE.as_ref(),
    ) else {
        return Vec::new();
    };

    let mut links: Vec<_> = link_re.captures_iter(html).collect();
    if links.is_empty() {
        links = alt_link_re.captures_iter(html).collect();
    }
    let snippets: Vec<_> = snippet_re.captures_iter(html).collect();

    links
        .iter()
        .enumerate()
        .filter_map(|(i, cap)| {
            let href = cap.get(1).map_or("", |m| m.as_str());
            let title = cap.get(2).map_or("", |m| m.as_str()).trim();
            if href.is_empty() || title.is_empty() {
                return None;
            }
            let description = snippets
                .get(i)
                .and_then(|c| c.get(1))
                .map_or(String::new(), |m| strip_tags(m.as_str()));
            Some(SearchResult {
                title: unescape(title),
                link: resolve_link(&unescape(href)),
                description: unescape(description.trim()),
            })
        })
        .collect()
}

/// Unwrap `DuckDuckGo` redirect links (`//duckduckgo.com/l/?uddg=<target>`).
fn resolve_link(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_owned()
    };
    Url::parse(&absolute)
        .ok()
        .filter(|u| u.path().starts_with("/l/"))
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or(absolute)
}

fn strip_tags(fragment: &str) -> String {
    TAG_RE
        .as_ref()
        .map_or_else(|| fragment.to_owned(), |re| re.replace_all(fragment, "").into_owned())
}

fn unescape(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
}

#[async_trait]
impl Tool for WebSearchTool {
    const NAME: &'static str = "web_search";
    type Args = WebSearchArgs;
    type Output = String;
    type Error = ToolError;

    fn description(&self) -> String {
        "Performs a web search for a query and returns the top search results formatted as markdown."
            .to_owned()
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to perform"
                }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: Self::Args) -> std::result::Result<Self::Output, Self::Error> {
        if args.query.trim().is_empty() {
            return Err(ToolError::invalid_args("query must not be empty"));
        }
        let results = self.search(&args.query).await?;

        if results.is_empty() {
            return Err(ToolError::execution(
                "No results found! Try a less restrictive/shorter query.",
            ));
        }

        Ok(format_results(&results))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<table>
<tr><td>1.&nbsp;</td><td>
  <a rel="nofollow" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fspringfieldcollision.example%2F&amp;rut=abc" class='result-link'>Springfield Collision &amp; Paint</a>
</td></tr>
<tr><td>&nbsp;</td><td class='result-snippet'>Certified <b>Honda</b> body shop. 400 Elm St, Springfield, IL. (217) 555-0101</td></tr>
<tr><td>2.&nbsp;</td><td>
  <a rel="nofollow" href="https://autofix.example/springfield" class='result-link'>AutoFix Springfield</a>
</td></tr>
<tr><td>&nbsp;</td><td class='result-snippet'>Collision repair near Main St.</td></tr>
</table>"#;

    mod parsing {
        use super::*;

        #[test]
        fn extracts_titles_links_and_snippets() {
            let results = parse_duckduckgo_html(PAGE);
            assert_eq!(results.len(), 2);
            assert_eq!(results[0].title, "Springfield Collision & Paint");
            assert_eq!(results[0].link, "https://springfieldcollision.example/");
            assert_eq!(
                results[0].description,
                "Certified Honda body shop. 400 Elm St, Springfield, IL. (217) 555-0101"
            );
            assert_eq!(results[1].link, "https://autofix.example/springfield");
        }

        #[test]
        fn page_without_results_is_empty() {
            assert!(parse_duckduckgo_html("<html><body>No results.</body></html>").is_empty());
        }

        #[test]
        fn plain_links_are_kept() {
            assert_eq!(resolve_link("https://a.example/x"), "https://a.example/x");
        }
    }

    mod formatting {
        use super::*;

        #[test]
        fn markdown_lists_each_result() {
            let text = format_results(&parse_duckduckgo_html(PAGE));
            assert!(text.starts_with("## Search Results"));
            assert!(text.contains("[AutoFix Springfield](https://autofix.example/springfield)"));
        }

        #[test]
        fn empty_results() {
            assert_eq!(format_results(&[]), "No results found.");
        }
    }

    mod tool {
        use super::*;

        #[test]
        fn builder_and_definition() {
            let tool = WebSearchTool::new(Duration::from_secs(5))
                .unwrap()
                .with_max_results(3);
            assert_eq!(tool.max_results(), 3);
            assert_eq!(tool.definition().name(), "web_search");
        }

        #[tokio::test]
        async fn blank_query_is_rejected_before_any_request() {
            let tool = WebSearchTool::new(Duration::from_secs(5)).unwrap();
            let err = tool
                .call(WebSearchArgs {
                    query: "  ".into(),
                })
                .await
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidArguments(_)));
        }

        #[tokio::test]
        async fn unreachable_endpoint_is_a_fatal_service_failure() {
            let tool = WebSearchTool::new(Duration::from_secs(2))
                .unwrap()
                .with_endpoint(Url::parse("http://127.0.0.1:9/lite/").unwrap());
            let err = tool
                .call(WebSearchArgs {
                    query: "body shop".into(),
                })
                .await
                .unwrap_err();
            assert!(err.is_fatal());
            assert!(matches!(err, ToolError::Service { .. }));
        }
    }
}
