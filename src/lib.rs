pub mod analytics;
pub mod config;
pub mod db;
pub mod db_utils;
pub mod discoverer;
pub mod downloader;
pub mod error;
pub mod events;
pub mod extractor;
pub mod ingest;
pub mod object_cache;
pub mod queries;
pub mod session;
pub mod summarizer;
pub mod types;
pub mod utils;
pub mod vector_index;

use crate::discoverer::{FetchedPage, PageFetcher};
use crate::error::{PipelineError, Result};
use crate::session::{Credentials, LoginDriver, LoginOutcome, ProxyEndpoint};
use std::time::Duration;

/// Plain unauthenticated GET, used by the Discoverer to fetch an edition's
/// index page. Production wiring may swap this for a proxy-aware or
/// browser-backed fetcher without touching `EditionDiscoverer` itself.
pub struct ReqwestPageFetcher {
    client: reqwest::Client,
}

impl ReqwestPageFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestPageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PageFetcher for ReqwestPageFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| PipelineError::transient("ReqwestPageFetcher::fetch", e))?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::transient("ReqwestPageFetcher::fetch", e))?;
        Ok(FetchedPage {
            status,
            body,
            final_url,
        })
    }
}

/// Stand-in for the opaque Playwright-backed login driver (out of scope
/// per §1): always reports success so the `SessionManager` flow wires up
/// end-to-end for publications that require no authentication.
pub struct NoopLoginDriver;

#[async_trait::async_trait]
impl LoginDriver for NoopLoginDriver {
    async fn attempt_login(&self, _creds: &Credentials, _proxy: Option<&ProxyEndpoint>) -> Result<LoginOutcome> {
        Ok(LoginOutcome::Success)
    }
}
