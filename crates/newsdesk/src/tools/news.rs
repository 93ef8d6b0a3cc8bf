//! Article listings from a NewsAPI-compatible source.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};
use reqwest::Client;
use serde_json::{json, Value};

use super::ToolHandler;
use crate::{
    config::Config,
    types::{Tool, ToolError, ToolResult},
};

pub const NEWS_API_DEFAULT_HOST: &str = "https://newsapi.org";
const NEWS_API_TIMEOUT_SECS: u64 = 30;

pub const TODAY_NEWS_TOOL_NAME: &str = "get_today_news";
pub const CUSTOM_DOMAIN_TOOL_NAME: &str = "custom_domain_search";

/// One named listing request, e.g. "Business" -> top business headlines
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryQuery {
    pub name: String,
    pub endpoint: &'static str,
    pub params: Vec<(&'static str, String)>,
}

impl CategoryQuery {
    fn top_headlines(name: &str, params: &[(&'static str, &str)]) -> Self {
        Self::new(name, "top-headlines", params)
    }

    fn everything(name: &str, params: &[(&'static str, &str)]) -> Self {
        Self::new(name, "everything", params)
    }

    fn new(name: &str, endpoint: &'static str, params: &[(&'static str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            endpoint,
            params: params.iter().map(|(k, v)| (*k, v.to_string())).collect(),
        }
    }
}

fn days_before(today: NaiveDate, days: u64) -> String {
    today
        .checked_sub_days(Days::new(days))
        .unwrap_or(today)
        .format("%Y-%m-%d")
        .to_string()
}

/// The six categories of the daily briefing, in presentation order
pub fn daily_categories(today: NaiveDate) -> Vec<CategoryQuery> {
    let china_from = days_before(today, 2);
    vec![
        CategoryQuery::top_headlines("Top headlines", &[("country", "us"), ("pageSize", "5")]),
        CategoryQuery::top_headlines("Business", &[("category", "business"), ("pageSize", "3")]),
        CategoryQuery::top_headlines(
            "Tech",
            &[("category", "technology"), ("pageSize", "3"), ("language", "en")],
        ),
        CategoryQuery::everything(
            "AI",
            &[
                ("q", "artificial intelligence"),
                ("sortBy", "publishedAt"),
                ("pageSize", "3"),
                ("language", "en"),
            ],
        ),
        CategoryQuery::top_headlines("Canada", &[("sources", "cbc-news"), ("pageSize", "3")]),
        CategoryQuery::everything(
            "China",
            &[
                ("q", "China"),
                ("from", china_from.as_str()),
                ("sortBy", "popularity"),
                ("pageSize", "4"),
                ("language", "en"),
            ],
        ),
    ]
}

/// Four popular articles about `domain` from the last five days
pub fn custom_domain_query(domain: &str, today: NaiveDate) -> CategoryQuery {
    let from = days_before(today, 5);
    CategoryQuery::everything(
        domain,
        &[
            ("q", domain),
            ("from", from.as_str()),
            ("sortBy", "popularity"),
            ("pageSize", "4"),
            ("language", "en"),
        ],
    )
}

/// `Category:<name>` followed by the listing as indented JSON
pub fn format_category(name: &str, listing: &Value) -> String {
    let body = serde_json::to_string_pretty(listing).unwrap_or_else(|_| listing.to_string());
    format!("Category:{}\n{}\n\n\n", name, body)
}

#[derive(Debug, Clone)]
pub struct NewsApiClient {
    client: Client,
    host: String,
    api_key: String,
}

impl NewsApiClient {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(NEWS_API_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            host: host.into(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key: String = config.get_secret("NEWS_API_KEY")?;
        let host: String = config
            .get_param("NEWS_API_HOST")
            .unwrap_or_else(|_| NEWS_API_DEFAULT_HOST.to_string());
        Self::new(host, api_key)
    }

    /// Fetch one listing. Any transport or status failure is an error.
    pub async fn fetch(&self, query: &CategoryQuery) -> ToolResult<Value> {
        let url = format!("{}/v2/{}", self.host.trim_end_matches('/'), query.endpoint);
        let response = self
            .client
            .get(&url)
            .query(&query.params)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                ToolError::ExecutionError(format!("News listing '{}' failed: {}", query.name, e))
            })?;

        response.json::<Value>().await.map_err(|e| {
            ToolError::ExecutionError(format!(
                "News listing '{}' returned invalid JSON: {}",
                query.name, e
            ))
        })
    }

    /// Fetch every query in order and concatenate the formatted listings.
    pub async fn fetch_categories(&self, queries: &[CategoryQuery]) -> ToolResult<String> {
        let mut summary = String::new();
        for query in queries {
            tracing::info!(category = %query.name, "fetching news listing");
            let listing = self.fetch(query).await?;
            summary.push_str(&format_category(&query.name, &listing));
        }
        Ok(summary)
    }
}

pub struct TodayNewsTool {
    client: NewsApiClient,
}

impl TodayNewsTool {
    pub fn new(client: NewsApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolHandler for TodayNewsTool {
    fn tool(&self) -> Tool {
        Tool::new(
            TODAY_NEWS_TOOL_NAME,
            "Receive today's news in JSON format. Call this function when you need to know today's news.",
            json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        )
    }

    async fn call(&self, _arguments: Value) -> ToolResult<Value> {
        let today = Local::now().date_naive();
        let summary = self.client.fetch_categories(&daily_categories(today)).await?;
        Ok(json!({ "summary": summary }))
    }
}

pub struct CustomDomainTool {
    client: NewsApiClient,
}

impl CustomDomainTool {
    pub fn new(client: NewsApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolHandler for CustomDomainTool {
    fn tool(&self) -> Tool {
        Tool::new(
            CUSTOM_DOMAIN_TOOL_NAME,
            "Fetch 4 relevant news articles about a custom domain. Call this function when you see ./ domain_name",
            json!({
                "type": "object",
                "properties": {
                    "domain": {
                        "type": "string",
                        "description": "The domain the user wants news about, e.g. fashion"
                    }
                },
                "required": ["domain"],
                "additionalProperties": false
            }),
        )
    }

    async fn call(&self, arguments: Value) -> ToolResult<Value> {
        let domain = arguments
            .get("domain")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidParameters("domain must be a string".into()))?;
        let today = Local::now().date_naive();
        let summary = self
            .client
            .fetch_categories(&[custom_domain_query(domain, today)])
            .await?;
        Ok(json!({ "Domain_name": domain, "summary": summary }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_daily_categories_order_and_params() {
        let categories = daily_categories(date(2025, 3, 1));
        let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Top headlines", "Business", "Tech", "AI", "Canada", "China"]
        );

        let china = &categories[5];
        assert_eq!(china.endpoint, "everything");
        assert!(china.params.contains(&("from", "2025-02-27".to_string())));
        assert!(china.params.contains(&("pageSize", "4".to_string())));

        let canada = &categories[4];
        assert_eq!(canada.endpoint, "top-headlines");
        assert!(canada.params.contains(&("sources", "cbc-news".to_string())));
    }

    #[test]
    fn test_custom_domain_query() {
        let query = custom_domain_query("fashion", date(2025, 3, 1));
        assert_eq!(query.name, "fashion");
        assert_eq!(query.endpoint, "everything");
        assert!(query.params.contains(&("q", "fashion".to_string())));
        assert!(query.params.contains(&("from", "2025-02-24".to_string())));
        assert!(query.params.contains(&("sortBy", "popularity".to_string())));
    }

    #[test]
    fn test_format_category() {
        let formatted = format_category("Tech", &json!({"status": "ok"}));
        assert_eq!(formatted, "Category:Tech\n{\n  \"status\": \"ok\"\n}\n\n\n");
    }

    #[tokio::test]
    async fn test_today_news_fetches_six_categories_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/top-headlines"))
            .and(query_param("apiKey", "news-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"articles": ["headline"]})))
            .expect(4)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v2/everything"))
            .and(query_param("apiKey", "news-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"articles": ["story"]})))
            .expect(2)
            .mount(&server)
            .await;

        let tool = TodayNewsTool::new(NewsApiClient::new(server.uri(), "news-key").unwrap());
        let result = tool.call(json!({})).await.unwrap();
        let summary = result["summary"].as_str().unwrap();

        let positions: Vec<usize> = ["Top headlines", "Business", "Tech", "AI", "Canada", "China"]
            .iter()
            .map(|name| summary.find(&format!("Category:{}\n", name)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(summary.matches("\n\n\n").count(), 6);
    }

    #[tokio::test]
    async fn test_custom_domain_result_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/everything"))
            .and(query_param("q", "fashion"))
            .and(query_param("pageSize", "4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"articles": [1, 2, 3, 4]})))
            .expect(1)
            .mount(&server)
            .await;

        let tool = CustomDomainTool::new(NewsApiClient::new(server.uri(), "news-key").unwrap());
        let result = tool.call(json!({"domain": "fashion"})).await.unwrap();
        assert_eq!(result["Domain_name"], "fashion");
        assert!(result["summary"]
            .as_str()
            .unwrap()
            .starts_with("Category:fashion\n"));
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"status": "error"})))
            .mount(&server)
            .await;

        let tool = TodayNewsTool::new(NewsApiClient::new(server.uri(), "bad-key").unwrap());
        let err = tool.call(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionError(msg) if msg.contains("Top headlines")));
    }
}
