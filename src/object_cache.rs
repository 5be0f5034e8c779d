use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::types::CachedBlobMeta;
use crate::utils::{sha256_hex, url_md5_8};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::Utc;

/// Content-addressed object cache fronting an S3-compatible endpoint
/// (MinIO in production, per `MINIO_*` config). Every write is a full-object
/// replacement keyed by a deterministic path, so concurrent writers for the
/// same key are safe (§5: last writer wins, content identical).
pub struct ObjectCache {
    client: Client,
    bucket: String,
}

impl ObjectCache {
    pub async fn new(config: &Config) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(endpoint) = &config.minio_endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(true);
        if let (Some(access_key), Some(secret_key)) =
            (&config.minio_access_key, &config.minio_secret_key)
        {
            s3_builder = s3_builder.credentials_provider(aws_sdk_s3::config::Credentials::new(
                access_key, secret_key, None, None, "minio-static",
            ));
        }

        Ok(Self {
            client: Client::from_conf(s3_builder.build()),
            bucket: config.minio_bucket.clone(),
        })
    }

    /// §4.3's cache key: `YYYY-MM-DD/<pub_slug>_page_NNN_<url_md5_8>.<ext>`.
    pub fn build_key(
        date: chrono::NaiveDate,
        publication_slug: &str,
        page_number: i32,
        url: &str,
        ext: &str,
    ) -> String {
        format!(
            "{}/{}_page_{:03}_{}.{}",
            date.format("%Y-%m-%d"),
            publication_slug,
            page_number,
            url_md5_8(url),
            ext
        )
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.to_string().contains("NotFound") => Ok(false),
            Err(e) => Err(PipelineError::fatal_display("object_cache::exists", e)),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let out = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    PipelineError::CacheMiss {
                        key: key.to_string(),
                    }
                } else {
                    PipelineError::fatal_display("object_cache::get", e)
                }
            })?;
        let bytes = out
            .body
            .collect()
            .await
            .map_err(|e| PipelineError::parse("object_cache::get", e.to_string()))?
            .into_bytes()
            .to_vec();
        Ok(bytes)
    }

    /// Writes the blob plus a JSON metadata sidecar at `<key>.meta.json`.
    pub async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        meta: &CachedBlobMeta,
        content_type: &str,
    ) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| PipelineError::fatal_display("object_cache::put", e))?;

        let meta_key = format!("{key}.meta.json");
        let meta_json = serde_json::to_vec(meta)
            .map_err(|e| PipelineError::parse("object_cache::put: metadata", e.to_string()))?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(meta_key)
            .body(ByteStream::from(meta_json))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| PipelineError::fatal_display("object_cache::put: metadata", e))?;
        Ok(())
    }

    pub fn content_hash_of(bytes: &[u8]) -> String {
        sha256_hex(bytes)
    }

    /// Lockout marker at the well-known path from §6.
    pub async fn read_lockout_marker(&self) -> Result<Option<serde_json::Value>> {
        match self.get("locks/login-lockout.json").await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes).ok()),
            Err(PipelineError::CacheMiss { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn write_lockout_marker(&self, marker: &serde_json::Value) -> Result<()> {
        let bytes = serde_json::to_vec(marker)
            .map_err(|e| PipelineError::parse("object_cache::write_lockout_marker", e.to_string()))?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key("locks/login-lockout.json")
            .body(ByteStream::from(bytes))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| PipelineError::fatal_display("object_cache::write_lockout_marker", e))?;
        Ok(())
    }

    /// Reads back the `<key>.meta.json` sidecar written alongside `put`.
    pub async fn get_meta(&self, key: &str) -> Result<CachedBlobMeta> {
        let bytes = self.get(&format!("{key}.meta.json")).await?;
        serde_json::from_slice(&bytes).map_err(|e| PipelineError::parse("object_cache::get_meta", e.to_string()))
    }

    /// Lists object keys under a prefix (e.g. a day's edition directory),
    /// skipping the `.meta.json` sidecars so callers see only blob keys.
    pub async fn list_keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket).prefix(prefix);
            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }
            let output = request
                .send()
                .await
                .map_err(|e| PipelineError::fatal_display("object_cache::list_keys_with_prefix", e))?;

            for obj in output.contents() {
                if let Some(key) = obj.key() {
                    if !key.ends_with(".meta.json") {
                        keys.push(key.to_string());
                    }
                }
            }

            if output.is_truncated().unwrap_or(false) {
                continuation_token = output.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        Ok(keys)
    }

    /// Best-effort debug capture path from §6: `debug/login/<label>/<ts>.html|.png`.
    pub async fn write_debug_capture(&self, label: &str, ext: &str, bytes: &[u8]) -> Result<()> {
        let ts = Utc::now().format("%Y%m%dT%H%M%SZ");
        let key = format!("debug/login/{label}/{ts}.{ext}");
        let content_type = if ext == "png" { "image/png" } else { "text/html" };
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| PipelineError::fatal_display("object_cache::write_debug_capture", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_matches_documented_format() {
        let date = chrono::NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        let key = ObjectCache::build_key(date, "daily-gazette", 1, "https://example.com/a", "pdf");
        let re = regex::Regex::new(r"^\d{4}-\d{2}-\d{2}/[a-z0-9-]+_page_\d{3}_[0-9a-f]{8}\.(pdf|html)$")
            .unwrap();
        assert!(re.is_match(&key), "key {key} did not match expected format");
    }
}
