//! News search followed by model-driven article selection.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{web::PageFetcher, ToolHandler};
use crate::{
    config::Config,
    generate_structured_outputs,
    message::Message,
    prompt_template::{render_global_file, PromptContext},
    providers::Provider,
    types::{Tool, ToolError, ToolResult},
};

pub const BRAVE_SEARCH_DEFAULT_HOST: &str = "https://api.search.brave.com";
pub const FIND_ARTICLES_TOOL_NAME: &str = "find_internet_articles";

const NEWS_RESULT_TYPE: &str = "news_result";
const SEARCH_RESULT_COUNT: u32 = 8;
const SEARCH_TIMEOUT_SECS: u64 = 30;
pub const ARTICLES_PER_SEARCH: usize = 3;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct BraveSearchClient {
    client: Client,
    host: String,
    api_key: String,
}

impl BraveSearchClient {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            host: host.into(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key: String = config.get_secret("BRAVE_API_KEY")?;
        let host: String = config
            .get_param("BRAVE_SEARCH_HOST")
            .unwrap_or_else(|_| BRAVE_SEARCH_DEFAULT_HOST.to_string());
        Self::new(host, api_key)
    }

    /// Run a news search and keep only results typed as news.
    pub async fn search(&self, query: &str, count: u32) -> ToolResult<Vec<Value>> {
        let url = format!("{}/res/v1/news/search", self.host.trim_end_matches('/'));
        let count = count.to_string();
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.api_key)
            .query(&[
                ("q", query),
                ("count", count.as_str()),
                ("offset", "0"),
                ("search_lang", "en"),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ToolError::ExecutionError(format!("News search failed: {}", e)))?;

        let body: SearchResponse = response.json().await.map_err(|e| {
            ToolError::ExecutionError(format!("News search returned invalid JSON: {}", e))
        })?;

        Ok(body
            .results
            .into_iter()
            .filter(|r| r.get("type").and_then(Value::as_str) == Some(NEWS_RESULT_TYPE))
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SelectedLink {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SelectedLinks {
    pub links: Vec<SelectedLink>,
}

fn selected_links_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "links": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "url": { "type": "string" }
                    },
                    "required": ["title", "url"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["links"],
        "additionalProperties": false
    })
}

pub struct FindArticlesTool {
    search: BraveSearchClient,
    fetcher: PageFetcher,
    provider: Arc<dyn Provider>,
}

impl FindArticlesTool {
    pub fn new(search: BraveSearchClient, fetcher: PageFetcher, provider: Arc<dyn Provider>) -> Self {
        Self {
            search,
            fetcher,
            provider,
        }
    }

    /// Ask the model which of the search results to read.
    async fn select_links(&self, query: &str, results: &[Value]) -> ToolResult<Vec<SelectedLink>> {
        let context = PromptContext::today();
        let system = render_global_file("link_selection.md", &context)
            .map_err(|e| ToolError::ExecutionError(format!("Failed to render prompt: {}", e)))?;
        let listing = serde_json::to_string_pretty(results).unwrap_or_default();
        let request = Message::user().with_text(format!(
            "The user's question is: {}\nToday's date is {}.\n\nHere are the search results:\n{}",
            query,
            Local::now().format("%Y-%m-%d"),
            listing
        ));

        let selected: SelectedLinks = generate_structured_outputs(
            self.provider.as_ref(),
            &system,
            &[request],
            &selected_links_schema(),
        )
        .await
        .map_err(|e| ToolError::ExecutionError(format!("Link selection failed: {}", e)))?;

        Ok(selected.links.into_iter().take(ARTICLES_PER_SEARCH).collect())
    }
}

#[async_trait]
impl ToolHandler for FindArticlesTool {
    fn tool(&self) -> Tool {
        Tool::new(
            FIND_ARTICLES_TOOL_NAME,
            "Perform an internet search on the query and read 3 relevant news articles. \
            Call this tool when you need broader or more comprehensive information to answer the user, \
            or when the article the user mentions comes from a paywalled source.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "A search query describing the news story"
                    }
                },
                "required": ["query"],
                "additionalProperties": false
            }),
        )
    }

    async fn call(&self, arguments: Value) -> ToolResult<Value> {
        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParameters("query must be a string".into()))?;

        let results = self.search.search(query, SEARCH_RESULT_COUNT).await?;
        tracing::info!(query, results = results.len(), "news search complete");

        let mut search_results = format!("The user's question is: {}\n\n", query);
        if results.is_empty() {
            search_results.push_str("No news articles were found for this query.\n");
            return Ok(json!({ "query": query, "search_results": search_results }));
        }

        for link in self.select_links(query, &results).await? {
            let content = self.fetcher.lookup(&link.url).await;
            search_results.push_str(&format!(
                "Here is one relevant article\nTitle of this article is: {}\nURL: {}\n{}{}\n",
                link.title,
                link.url,
                content,
                "-".repeat(50)
            ));
        }

        Ok(json!({ "query": query, "search_results": search_results }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{
        errors::ProviderError, MessageStream, ProviderCompleteResponse, ProviderExtractResponse,
        Usage,
    };
    use std::sync::Mutex;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Answers every extraction with the same data and records the prompts
    struct FixedExtraction {
        data: Value,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Provider for FixedExtraction {
        async fn complete(
            &self,
            _system: &str,
            _messages: &[Message],
            _tools: &[Tool],
        ) -> Result<ProviderCompleteResponse, ProviderError> {
            Err(ProviderError::ExecutionError("not scripted".into()))
        }

        async fn extract(
            &self,
            _system: &str,
            messages: &[Message],
            _schema: &Value,
        ) -> Result<ProviderExtractResponse, ProviderError> {
            self.prompts
                .lock()
                .unwrap()
                .extend(messages.iter().map(Message::as_concat_text));
            Ok(ProviderExtractResponse::new(
                self.data.clone(),
                "mock".to_string(),
                Usage::default(),
            ))
        }

        async fn stream(
            &self,
            _system: &str,
            _messages: &[Message],
        ) -> Result<MessageStream, ProviderError> {
            Err(ProviderError::ExecutionError("not scripted".into()))
        }
    }

    async fn mount_search(server: &MockServer, results: Value) {
        Mock::given(method("GET"))
            .and(path("/res/v1/news/search"))
            .and(header("X-Subscription-Token", "brave-key"))
            .and(query_param("q", "tariffs"))
            .and(query_param("count", "8"))
            .and(query_param("search_lang", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "news",
                "results": results
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_search_keeps_only_news_results() {
        let server = MockServer::start().await;
        mount_search(
            &server,
            json!([
                {"type": "news_result", "title": "A", "url": "https://a.example"},
                {"type": "video_result", "title": "B", "url": "https://b.example"},
                {"type": "news_result", "title": "C", "url": "https://c.example"}
            ]),
        )
        .await;

        let client = BraveSearchClient::new(server.uri(), "brave-key").unwrap();
        let results = client.search("tariffs", 8).await.unwrap();
        let titles: Vec<&str> = results.iter().filter_map(|r| r["title"].as_str()).collect();
        assert_eq!(titles, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_find_articles_visits_three_selected_links_in_order() {
        let server = MockServer::start().await;
        mount_search(
            &server,
            json!([{"type": "news_result", "title": "Any", "url": "https://any.example"}]),
        )
        .await;
        for (page, title) in [("one", "First"), ("two", "Second"), ("three", "Third")] {
            Mock::given(method("GET"))
                .and(path(format!("/{}", page)))
                .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                    "<html><head><title>{}</title></head><body>{} body</body></html>",
                    title, title
                )))
                .expect(1)
                .mount(&server)
                .await;
        }

        let link = |title: &str, page: &str| json!({"title": title, "url": format!("{}/{}", server.uri(), page)});
        let provider = Arc::new(FixedExtraction {
            data: json!({"links": [
                link("First", "one"),
                link("Second", "two"),
                link("Third", "three"),
                link("Fourth", "four")
            ]}),
            prompts: Mutex::new(Vec::new()),
        });

        let tool = FindArticlesTool::new(
            BraveSearchClient::new(server.uri(), "brave-key").unwrap(),
            PageFetcher::new(Duration::from_secs(5)).unwrap(),
            provider.clone(),
        );
        let result = tool.call(json!({"query": "tariffs"})).await.unwrap();

        assert_eq!(result["query"], "tariffs");
        let text = result["search_results"].as_str().unwrap();
        assert!(text.starts_with("The user's question is: tariffs\n\n"));
        assert_eq!(text.matches("Here is one relevant article").count(), 3);
        let first = text.find("Webpage Title:\nFirst").unwrap();
        let second = text.find("Webpage Title:\nSecond").unwrap();
        let third = text.find("Webpage Title:\nThird").unwrap();
        assert!(first < second && second < third);
        assert!(!text.contains("Fourth"));
        assert_eq!(text.matches(&"-".repeat(50)).count(), 3);

        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("https://any.example"));
    }

    #[tokio::test]
    async fn test_malformed_selection_is_an_error() {
        let server = MockServer::start().await;
        mount_search(
            &server,
            json!([{"type": "news_result", "title": "Any", "url": "https://any.example"}]),
        )
        .await;

        let tool = FindArticlesTool::new(
            BraveSearchClient::new(server.uri(), "brave-key").unwrap(),
            PageFetcher::new(Duration::from_secs(5)).unwrap(),
            Arc::new(FixedExtraction {
                data: json!({"articles": []}),
                prompts: Mutex::new(Vec::new()),
            }),
        );
        let err = tool.call(json!({"query": "tariffs"})).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionError(msg) if msg.contains("Link selection failed")));
    }

    #[tokio::test]
    async fn test_no_results_skips_selection() {
        let server = MockServer::start().await;
        mount_search(&server, json!([])).await;

        let provider = Arc::new(FixedExtraction {
            data: json!({"links": []}),
            prompts: Mutex::new(Vec::new()),
        });
        let tool = FindArticlesTool::new(
            BraveSearchClient::new(server.uri(), "brave-key").unwrap(),
            PageFetcher::new(Duration::from_secs(5)).unwrap(),
            provider.clone(),
        );
        let result = tool.call(json!({"query": "tariffs"})).await.unwrap();
        assert!(result["search_results"]
            .as_str()
            .unwrap()
            .contains("No news articles were found"));
        assert!(provider.prompts.lock().unwrap().is_empty());
    }
}
