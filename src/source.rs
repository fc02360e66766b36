use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::config::LinkPick;
use crate::error::{PipelineError, Result};

static LAST_SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^/?#]*)(?:[?#].*)?$").unwrap());

/// Plain GETs. Implemented over reqwest in production and by fakes in tests.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn text(&self, url: &str) -> Result<String>;
    async fn bytes(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpFetch {
    client: reqwest::Client,
}

impl Default for HttpFetch {
    fn default() -> Self {
        HttpFetch {
            client: reqwest::Client::new(),
        }
    }
}

impl HttpFetch {
    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        self.client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::network(url, e))
    }
}

#[async_trait]
impl Fetch for HttpFetch {
    async fn text(&self, url: &str) -> Result<String> {
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|e| PipelineError::network(url, e))
    }

    async fn bytes(&self, url: &str) -> Result<Vec<u8>> {
        let body = self
            .get(url)
            .await?
            .bytes()
            .await
            .map_err(|e| PipelineError::network(url, e))?;
        Ok(body.to_vec())
    }
}

/// The PDF a run will ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfSource {
    pub url: String,
    pub version: String,
}

/// Fetch the index page and pick its PDF link.
pub async fn locate(fetch: &dyn Fetch, index_url: &str, pick: LinkPick) -> Result<PdfSource> {
    info!("Fetching index page: {}", index_url);
    let html = fetch.text(index_url).await?;
    let source = find_pdf_link(&html, index_url, pick)?;
    info!(version = %source.version, "Found PDF: {}", source.url);
    Ok(source)
}

/// Scan `<a href>` elements for a `.pdf` target. `pick` decides between
/// several candidates; hrefs resolve against `index_url`.
pub fn find_pdf_link(html: &str, index_url: &str, pick: LinkPick) -> Result<PdfSource> {
    let base = Url::parse(index_url).map_err(|e| PipelineError::network(index_url, e))?;
    let doc = Html::parse_document(html);
    let anchors = Selector::parse("a[href]").unwrap();

    let mut candidates = doc.select(&anchors).filter_map(|a| {
        let href = a.value().attr("href")?;
        let version = version_token(href)?;
        let url = base.join(href).ok()?;
        debug!("PDF candidate: {}", href);
        Some(PdfSource {
            url: url.to_string(),
            version,
        })
    });

    let found = match pick {
        LinkPick::First => candidates.next(),
        LinkPick::Last => candidates.last(),
    };
    found.ok_or_else(|| PipelineError::NotFound(index_url.to_string()))
}

/// Version of a PDF link: any href containing `.pdf` qualifies, and the
/// version is its last path segment with `.pdf` removed
/// (`aki-joho/R6-04.pdf` → `R6-04`).
pub fn version_token(href: &str) -> Option<String> {
    if !href.contains(".pdf") {
        return None;
    }
    let segment = LAST_SEGMENT_RE
        .captures(href)
        .and_then(|c| c.get(1))
        .map_or("", |m| m.as_str());
    let version = segment.replace(".pdf", "");
    (!version.is_empty()).then_some(version)
}
