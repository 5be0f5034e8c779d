use crate::config::Config;
use crate::discoverer::FetchedPage;
use crate::error::{BatchOutcome, PipelineError, Result};
use crate::object_cache::ObjectCache;
use crate::types::{CachedBlobMeta, EditionPage, PageFormat};
use crate::utils::{log_step, log_success};
use chrono::{NaiveDate, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use rand::seq::SliceRandom;
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Semaphore;

#[derive(Debug, Clone)]
pub struct DownloadedPage {
    pub url: String,
    pub cache_key: String,
    pub bytes_len: usize,
    pub from_cache: bool,
}

/// Aggregate result of one edition's download pass (§4.3).
#[derive(Debug, Clone, Default)]
pub struct DownloadReport {
    pub total_pages: usize,
    pub successful: usize,
    pub failed: usize,
    pub from_cache: usize,
}

impl DownloadReport {
    pub fn success_rate(&self) -> f64 {
        if self.total_pages == 0 {
            return 1.0;
        }
        self.successful as f64 / self.total_pages as f64
    }
}

/// Downloads every page of an edition concurrently with a bounded worker
/// pool, retrying through a rotating proxy pool before a single direct
/// fallback attempt (§4.3). Grounded on the teacher's `jira.rs`
/// `Semaphore` + `FuturesUnordered` concurrent-fetch pattern.
pub struct DownloadOrchestrator {
    client: Client,
    cache: Arc<ObjectCache>,
    proxies: Vec<String>,
    workers: usize,
    max_retries: u32,
}

impl DownloadOrchestrator {
    pub fn new(config: &Config, cache: Arc<ObjectCache>) -> Self {
        let proxies = build_proxy_pool(config);
        Self {
            client: Client::new(),
            cache,
            proxies,
            workers: config.download_workers.max(1),
            max_retries: config.download_max_retries.max(1),
        }
    }

    pub async fn download_edition(
        &self,
        date: NaiveDate,
        publication_slug: &str,
        pages: Vec<EditionPage>,
        force_refresh: bool,
    ) -> (DownloadReport, BatchOutcome<DownloadedPage>) {
        log_step(
            "⬇️",
            &format!("Downloading {} page(s) for {publication_slug}...", pages.len()),
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = FuturesUnordered::new();

        for page in pages {
            let permit = semaphore.clone().acquire_owned().await.unwrap();
            let client = self.client.clone();
            let cache = self.cache.clone();
            let proxies = self.proxies.clone();
            let max_retries = self.max_retries;
            let publication_slug = publication_slug.to_string();

            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                download_one_page(
                    &client,
                    &cache,
                    &proxies,
                    max_retries,
                    date,
                    &publication_slug,
                    page,
                    force_refresh,
                )
                .await
            }));
        }

        let mut report = DownloadReport::default();
        let mut outcome: BatchOutcome<DownloadedPage> = BatchOutcome::new();

        while let Some(joined) = tasks.next().await {
            report.total_pages += 1;
            match joined {
                Ok(Ok(downloaded)) => {
                    report.successful += 1;
                    if downloaded.from_cache {
                        report.from_cache += 1;
                    }
                    outcome.record_ok(downloaded);
                }
                Ok(Err((url, err))) => {
                    report.failed += 1;
                    outcome.record_err(url, err);
                }
                Err(join_err) => {
                    report.failed += 1;
                    outcome.record_err(
                        "unknown".to_string(),
                        PipelineError::fatal("downloader::download_edition", join_err.to_string()),
                    );
                }
            }
        }

        log_success(&format!(
            "Edition download complete: {}/{} succeeded ({} from cache).",
            report.successful, report.total_pages, report.from_cache
        ));
        (report, outcome)
    }
}

fn build_proxy_pool(config: &Config) -> Vec<String> {
    let (Some(host), ports) = (&config.smartproxy_host, &config.smartproxy_ports) else {
        return Vec::new();
    };
    if ports.is_empty() {
        return Vec::new();
    }
    ports
        .iter()
        .map(|port| match (&config.smartproxy_username, &config.smartproxy_password) {
            (Some(user), Some(pass)) => format!("http://{user}:{pass}@{host}:{port}"),
            _ => format!("http://{host}:{port}"),
        })
        .collect()
}

async fn download_one_page(
    client: &Client,
    cache: &ObjectCache,
    proxies: &[String],
    max_retries: u32,
    date: NaiveDate,
    publication_slug: &str,
    page: EditionPage,
    force_refresh: bool,
) -> std::result::Result<DownloadedPage, (String, PipelineError)> {
    let ext = page.format.extension();
    let cache_key = ObjectCache::build_key(
        date,
        publication_slug,
        page.page_number.unwrap_or(0),
        &page.url,
        ext,
    );

    if !force_refresh {
        if let Ok(bytes) = cache.get(&cache_key).await {
            return Ok(DownloadedPage {
                url: page.url,
                cache_key,
                bytes_len: bytes.len(),
                from_cache: true,
            });
        }
    }

    let mut last_err = None;
    for attempt in 0..max_retries {
        let proxy_url = proxies.choose(&mut rand::thread_rng());
        match fetch_page(client, &page.url, proxy_url).await {
            Ok(fetched) if fetched.status < 400 => {
                let bytes = fetched.body.into_bytes();
                let meta = CachedBlobMeta {
                    url: page.url.clone(),
                    page_number: page.page_number,
                    format: ext.to_string(),
                    content_hash: ObjectCache::content_hash_of(&bytes),
                    cached_at: Utc::now(),
                    publication: publication_slug.to_string(),
                    section: page.section.clone(),
                    title: page.title.clone(),
                };
                let content_type = match page.format {
                    PageFormat::Pdf => "application/pdf",
                    PageFormat::Html => "text/html",
                };
                if let Err(e) = cache.put(&cache_key, &bytes, &meta, content_type).await {
                    last_err = Some(e);
                    continue;
                }
                return Ok(DownloadedPage {
                    url: page.url,
                    cache_key,
                    bytes_len: bytes.len(),
                    from_cache: false,
                });
            }
            Ok(fetched) => {
                last_err = Some(PipelineError::rate_limited(
                    "downloader::download_one_page",
                    format!("HTTP {} via proxy", fetched.status),
                ));
            }
            Err(e) => last_err = Some(e),
        }
        tokio::time::sleep(std::time::Duration::from_secs((attempt as u64 + 1) * 2)).await;
    }

    // One direct (no-proxy) fallback attempt before giving up (§4.3 step 3).
    match fetch_page(client, &page.url, None).await {
        Ok(fetched) if fetched.status < 400 => {
            let bytes = fetched.body.into_bytes();
            let meta = CachedBlobMeta {
                url: page.url.clone(),
                page_number: page.page_number,
                format: ext.to_string(),
                content_hash: ObjectCache::content_hash_of(&bytes),
                cached_at: Utc::now(),
                publication: publication_slug.to_string(),
                section: page.section.clone(),
                title: page.title.clone(),
            };
            let content_type = match page.format {
                PageFormat::Pdf => "application/pdf",
                PageFormat::Html => "text/html",
            };
            cache
                .put(&cache_key, &bytes, &meta, content_type)
                .await
                .map_err(|e| (page.url.clone(), e))?;
            Ok(DownloadedPage {
                url: page.url,
                cache_key,
                bytes_len: bytes.len(),
                from_cache: false,
            })
        }
        Ok(fetched) => Err((
            page.url,
            PipelineError::rate_limited(
                "downloader::download_one_page",
                format!("direct fallback HTTP {}", fetched.status),
            ),
        )),
        Err(e) => Err((
            page.url,
            last_err.unwrap_or(e),
        )),
    }
}

async fn fetch_page(
    client: &Client,
    url: &str,
    proxy_url: Option<&String>,
) -> Result<FetchedPage> {
    let request_client = if let Some(proxy) = proxy_url {
        Client::builder()
            .proxy(reqwest::Proxy::all(proxy).map_err(|e| PipelineError::transient("downloader::fetch_page", e))?)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| PipelineError::transient("downloader::fetch_page", e))?
    } else {
        client.clone()
    };

    let response = request_client
        .get(url)
        .timeout(std::time::Duration::from_secs(30))
        .send()
        .await
        .map_err(|e| PipelineError::transient("downloader::fetch_page", e))?;

    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let body = response
        .text()
        .await
        .map_err(|e| PipelineError::transient("downloader::fetch_page", e))?;

    Ok(FetchedPage {
        status,
        body,
        final_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_pool_is_empty_without_host() {
        let mut config = test_config();
        config.smartproxy_host = None;
        assert!(build_proxy_pool(&config).is_empty());
    }

    #[test]
    fn proxy_pool_has_one_url_per_port() {
        let mut config = test_config();
        config.smartproxy_host = Some("proxy.example".to_string());
        config.smartproxy_ports = vec![10000, 10001, 10002];
        assert_eq!(build_proxy_pool(&config).len(), 3);
    }

    fn test_config() -> Config {
        Config {
            database_path: std::path::PathBuf::from(":memory:"),
            minio_endpoint: None,
            minio_access_key: None,
            minio_secret_key: None,
            minio_bucket: "newsroom".to_string(),
            eedition_user: None,
            eedition_pass: None,
            smartproxy_username: None,
            smartproxy_password: None,
            smartproxy_host: None,
            smartproxy_ports: Vec::new(),
            openai_api_key: None,
            openai_api_base: None,
            openai_model: "gpt-4o-mini".to_string(),
            openai_max_tokens: 1024,
            openai_embed_model: "text-embedding-3-small".to_string(),
            summarizer_batch_size: 10,
            summarizer_max_batches: 50,
            summarizer_max_retries: 3,
            weaviate_url: None,
            weaviate_api_key: None,
            qdrant_url: None,
            qdrant_api_key: None,
            ntfy_url: None,
            ntfy_topic: None,
            ntfy_token: None,
            reddit_client_id: None,
            reddit_client_secret: None,
            reddit_username: None,
            reddit_password: None,
            facebook_page_id: None,
            facebook_page_token: None,
            download_workers: 4,
            download_max_retries: 3,
        }
    }
}
