//! Web page loading
//!
//! Fetches a URL and reduces the body to readable text. HTML is parsed,
//! page chrome (scripts, styles, navigation, footers) is dropped and the
//! main content is rendered to text; plain text bodies pass through untouched.

use crate::errors::IngestionError;
use reqwest::Url;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::debug;

/// Wrap width for rendered text
const TEXT_WIDTH: usize = 120;

/// Text extracted from a fetched page
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
}

/// HTTP page fetcher
#[derive(Clone)]
pub struct PageLoader {
    client: reqwest::Client,
    extractor: HtmlExtractor,
}

impl PageLoader {
    pub fn new(timeout_secs: u64) -> Result<Self, IngestionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("ragwise/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| IngestionError::Client(e.to_string()))?;

        Ok(Self {
            client,
            extractor: HtmlExtractor::new()?,
        })
    }

    /// Fetch a page and extract its text
    pub async fn load(&self, url: &str) -> Result<LoadedPage, IngestionError> {
        let parsed = parse_url(url)?;

        let fetch_err = |message: String| IngestionError::Fetch {
            url: url.to_string(),
            message,
        };

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fetch_err(format!("HTTP {}", response.status())));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html"))
            .unwrap_or(true);

        let body = response.text().await.map_err(|e| fetch_err(e.to_string()))?;

        let (title, text) = if is_html {
            self.extractor.extract(&body)
        } else {
            (None, body.trim().to_string())
        };

        if text.is_empty() {
            return Err(IngestionError::EmptyContent(url.to_string()));
        }

        debug!(url, text_len = text.len(), "Page loaded");

        Ok(LoadedPage {
            url: url.to_string(),
            title,
            text,
        })
    }
}

/// Accept only absolute http(s) URLs
pub fn parse_url(url: &str) -> Result<Url, IngestionError> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(parsed),
        _ => Err(IngestionError::InvalidUrl(url.to_string())),
    }
}

/// Title and readable text of an HTML document
#[derive(Clone)]
pub struct HtmlExtractor {
    title: Selector,
    heading: Selector,
    hidden: Selector,
    /// Content roots, most specific first
    roots: Vec<Selector>,
}

fn selector(css: &str) -> Result<Selector, IngestionError> {
    Selector::parse(css).map_err(|e| IngestionError::Markup(format!("{}: {}", css, e)))
}

impl HtmlExtractor {
    pub fn new() -> Result<Self, IngestionError> {
        Ok(Self {
            title: selector("title")?,
            heading: selector("h1")?,
            hidden: selector("script, style, noscript, template, iframe, svg, nav, footer")?,
            roots: vec![selector("article")?, selector("main")?, selector("body")?],
        })
    }

    pub fn extract(&self, html: &str) -> (Option<String>, String) {
        let mut document = Html::parse_document(html);
        let title = self.title(&document);

        let hidden: Vec<_> = document.select(&self.hidden).map(|el| el.id()).collect();
        for id in hidden {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }

        let content = self
            .roots
            .iter()
            .find_map(|root| document.select(root).next())
            .map(|el| el.html())
            .unwrap_or_else(|| document.root_element().html());

        (title, html_to_text(&content))
    }

    /// `<title>`, falling back to the first `<h1>`
    fn title(&self, document: &Html) -> Option<String> {
        [&self.title, &self.heading].into_iter().find_map(|sel| {
            document
                .select(sel)
                .next()
                .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                .filter(|t| !t.is_empty())
        })
    }
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), TEXT_WIDTH)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
