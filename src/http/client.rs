//! Cached, rate-limited HTTP client used by every harvester
//!
//! A `get` call goes through these steps:
//!
//! 1. Unless refreshing, return a fresh, decodable cache entry if one exists
//! 2. Acquire the source's concurrency permit
//! 3. Wait for the source's rate limiter
//! 4. Send the request, check the status and decode the body
//! 5. On a retryable failure, back off and go to 3
//! 6. Cache the raw body (failure to write is logged, not fatal)
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | HTTP 5xx / 429 | Retry with backoff |
//! | Timeout / connection error | Retry with backoff |
//! | Malformed body | Retry with backoff |
//! | Other HTTP 4xx | Fail immediately |

use crate::config::PipelineConfig;
use crate::http::cache::{temp_path_for, ResponseCache};
use crate::http::limiter::RateLimiter;
use crate::http::retry::BackoffPolicy;
use crate::model::Source;
use crate::{HttpError, HttpResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, Semaphore};

/// HTTP client with disk caching, per-source pacing and retries
#[derive(Debug)]
pub struct CachedHttpClient {
    client: Client,
    cache: ResponseCache,
    limiter: RateLimiter,
    backoff: BackoffPolicy,
    concurrency: HashMap<String, usize>,
    semaphores: Mutex<HashMap<String, Arc<Semaphore>>>,
    refresh: bool,
    failures: AtomicU64,
}

/// Builds the underlying reqwest client
pub fn build_http_client(user_agent: &str, timeout: Duration) -> HttpResult<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(HttpError::Client)
}

impl CachedHttpClient {
    pub fn new(
        client: Client,
        cache: ResponseCache,
        limiter: RateLimiter,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            client,
            cache,
            limiter,
            backoff,
            concurrency: HashMap::new(),
            semaphores: Mutex::new(HashMap::new()),
            refresh: false,
            failures: AtomicU64::new(0),
        }
    }

    /// Builds a client from the pipeline configuration
    ///
    /// `refresh` bypasses cache reads for the whole run; fresh responses are
    /// still written back.
    pub fn from_config(config: &PipelineConfig, refresh: bool) -> HttpResult<Self> {
        let client = build_http_client(
            &config.http.user_agent,
            Duration::from_secs(config.http.timeout_secs),
        )?;

        let cache = ResponseCache::new(
            &config.paths.cache_dir,
            config.cache.cache_ttl_hours,
            config.cache.enable_disk_caching,
        );

        let mut limiter = RateLimiter::new(Duration::from_millis(1000));
        for source in Source::all() {
            limiter = limiter.with_interval(source.as_str(), config.min_request_interval(source.as_str()));
        }

        let concurrency = Source::all()
            .iter()
            .map(|s| (s.as_str().to_string(), config.concurrency_for(s.as_str())))
            .collect();

        Ok(Self::new(client, cache, limiter, BackoffPolicy::from_config(&config.http))
            .with_concurrency(concurrency)
            .with_refresh(refresh))
    }

    pub fn with_concurrency(mut self, concurrency: HashMap<String, usize>) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Requests that failed after exhausting their retries
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Fetches `url` and decodes it as JSON, consulting the cache first
    pub async fn get<T: DeserializeOwned>(&self, url: &str, source: &str) -> HttpResult<T> {
        if !self.refresh {
            if let Some(entry) = self.cache.load(url).await {
                match serde_json::from_str(&entry.body) {
                    Ok(value) => {
                        tracing::debug!("Cache hit for {}", url);
                        return Ok(value);
                    }
                    Err(e) => tracing::debug!("Cached body for {} no longer decodes: {}", url, e),
                }
            }
        }

        let semaphore = self.semaphore_for(source).await;
        let _permit = semaphore.acquire_owned().await.ok();

        let (value, body) = self
            .with_retries(url, source, || self.fetch_json::<T>(url))
            .await?;

        if let Err(e) = self.cache.store(url, &body).await {
            tracing::warn!("Failed to write cache entry for {}: {}", url, e);
        }

        Ok(value)
    }

    /// Streams the body of `url` to `destination`
    ///
    /// The body is written to a sibling temp file and renamed into place once
    /// complete, so an interrupted download never leaves a partial file.
    pub async fn download_binary(&self, url: &str, destination: &Path, source: &str) -> HttpResult<()> {
        let semaphore = self.semaphore_for(source).await;
        let _permit = semaphore.acquire_owned().await.ok();

        self.with_retries(url, source, || self.fetch_to_file(url, destination))
            .await
    }

    async fn with_retries<T, F, Fut>(&self, url: &str, source: &str, mut op: F) -> HttpResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = HttpResult<T>>,
    {
        let mut attempt = 0;
        loop {
            self.limiter.acquire(source).await;
            tracing::debug!("Requesting {} (attempt {})", url, attempt + 1);

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.backoff.max_retries => {
                    let delay = self.backoff.delay_for_attempt(attempt);
                    tracing::warn!("Request to {} failed ({}), retrying in {:?}", url, e, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    return Err(e);
                }
            }
        }
    }

    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> HttpResult<(T, String)> {
        let response = self.send(url).await?;
        let body = response.text().await.map_err(|source| HttpError::Request {
            url: url.to_string(),
            source,
        })?;
        let value = serde_json::from_str(&body).map_err(|source| HttpError::Decode {
            url: url.to_string(),
            source,
        })?;
        Ok((value, body))
    }

    async fn fetch_to_file(&self, url: &str, destination: &Path) -> HttpResult<()> {
        let response = self.send(url).await?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| HttpError::Io {
                    url: url.to_string(),
                    source,
                })?;
        }

        let tmp = temp_path_for(destination);
        let result = write_body(url, response, &tmp, destination).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp).await;
        }
        result
    }

    async fn send(&self, url: &str) -> HttpResult<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| HttpError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HttpError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    async fn semaphore_for(&self, source: &str) -> Arc<Semaphore> {
        let limit = self.concurrency.get(source).copied().unwrap_or(1).max(1);
        let mut map = self.semaphores.lock().await;
        map.entry(source.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(limit)))
            .clone()
    }
}

/// Writes the response body to `tmp`, then renames it to `destination`
async fn write_body(
    url: &str,
    mut response: reqwest::Response,
    tmp: &Path,
    destination: &Path,
) -> HttpResult<()> {
    let io_err = |source: std::io::Error| HttpError::Io {
        url: url.to_string(),
        source,
    };

    let mut file = tokio::fs::File::create(tmp).await.map_err(io_err)?;

    while let Some(chunk) = response.chunk().await.map_err(|source| HttpError::Request {
        url: url.to_string(),
        source,
    })? {
        file.write_all(&chunk).await.map_err(io_err)?;
    }

    file.flush().await.map_err(io_err)?;
    drop(file);

    tokio::fs::rename(tmp, destination).await.map_err(io_err)
}
