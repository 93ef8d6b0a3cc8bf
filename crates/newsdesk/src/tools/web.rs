//! Fetching a single web page and reducing it to readable text.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};

use super::{outlets::PAYWALLED_OUTLETS, ToolHandler};
use crate::{
    config::Config,
    types::{Tool, ToolError, ToolResult},
};

pub const VISIT_WEBSITE_TOOL_NAME: &str = "visit_website";

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36";
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
const NO_TITLE: &str = "No title found";

/// Elements whose content never counts as page text
const SKIPPED_TAGS: &[&str] = &["script", "style", "img", "input"];

/// Text shown to the model when a page cannot be fetched
pub fn unreachable_page(url: &str) -> String {
    format!(
        "This website {} cannot be fetched, possibly because it is paywalled.",
        url
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct Website {
    pub url: String,
    pub title: String,
    pub text: String,
    pub links: Vec<String>,
}

impl Website {
    pub fn parse(url: &str, html: &str) -> Self {
        let document = Html::parse_document(html);

        let title = select_first(&document, "title")
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| NO_TITLE.to_string());
        let text = select_first(&document, "body")
            .map(body_text)
            .unwrap_or_default();
        let links = Selector::parse("a[href]")
            .map(|selector| {
                document
                    .select(&selector)
                    .filter_map(|a| a.value().attr("href"))
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Self {
            url: url.to_string(),
            title,
            text,
            links,
        }
    }

    /// The page as the model sees it
    pub fn contents(&self) -> String {
        format!(
            "Webpage Title:\n{}\nWebpage Contents:\n{}\n\n",
            self.title, self.text
        )
    }
}

fn select_first<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

/// Trimmed, non-empty text fragments of `body`, one per line
fn body_text(body: ElementRef<'_>) -> String {
    body.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let skipped = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|e| SKIPPED_TAGS.contains(&e.name()))
            });
            let trimmed = text.trim();
            (!skipped && !trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout: u64 = config
            .get_optional_param("NEWSDESK_FETCH_TIMEOUT")?
            .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);
        Self::new(Duration::from_secs(timeout))
    }

    pub async fn fetch(&self, url: &str) -> Result<Website, reqwest::Error> {
        let html = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(Website::parse(url, &html))
    }

    /// Page contents, or the unreachable-page text if the fetch fails for any reason.
    pub async fn lookup(&self, url: &str) -> String {
        match self.fetch(url).await {
            Ok(website) => website.contents(),
            Err(e) => {
                tracing::warn!(url, error = %e, "page fetch failed");
                unreachable_page(url)
            }
        }
    }
}

pub struct VisitWebsiteTool {
    fetcher: PageFetcher,
}

impl VisitWebsiteTool {
    pub fn new(fetcher: PageFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl ToolHandler for VisitWebsiteTool {
    fn tool(&self) -> Tool {
        let paywalled = PAYWALLED_OUTLETS
            .iter()
            .map(|o| o.name)
            .collect::<Vec<_>>()
            .join(", ");
        Tool::new(
            VISIT_WEBSITE_TOOL_NAME,
            format!(
                "Visit a website to fetch its content and answer the user's question. \
                Call this function when the user asks for more information about a particular article. \
                Do NOT call this tool for paywalled news sources such as: {}.",
                paywalled
            ),
            json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "The URL of the article, exactly as listed in its source"
                    }
                },
                "required": ["url"],
                "additionalProperties": false
            }),
        )
    }

    async fn call(&self, arguments: Value) -> ToolResult<Value> {
        let url = arguments
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParameters("url must be a string".into()))?;
        let web_content = self.fetcher.lookup(url).await;
        Ok(json!({ "url": url, "web_content": web_content }))
    }
}
