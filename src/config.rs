use crate::error::{PipelineError, Result};
use dirs::home_dir;
use std::env;
use std::path::PathBuf;

/// All environment variables are read once, at process start, mirroring the
/// teacher's `auth.rs::authenticate` pattern of resolving config at the top
/// of a flow rather than re-reading `env` state per call. SPEC_FULL §6.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,

    pub minio_endpoint: Option<String>,
    pub minio_access_key: Option<String>,
    pub minio_secret_key: Option<String>,
    pub minio_bucket: String,

    pub eedition_user: Option<String>,
    pub eedition_pass: Option<String>,

    pub smartproxy_username: Option<String>,
    pub smartproxy_password: Option<String>,
    pub smartproxy_host: Option<String>,
    pub smartproxy_ports: Vec<u16>,

    pub openai_api_key: Option<String>,
    pub openai_api_base: Option<String>,
    pub openai_model: String,
    pub openai_max_tokens: u32,
    pub openai_embed_model: String,

    pub summarizer_batch_size: usize,
    pub summarizer_max_batches: usize,
    pub summarizer_max_retries: u32,

    pub weaviate_url: Option<String>,
    pub weaviate_api_key: Option<String>,
    pub qdrant_url: Option<String>,
    pub qdrant_api_key: Option<String>,

    pub ntfy_url: Option<String>,
    pub ntfy_topic: Option<String>,
    pub ntfy_token: Option<String>,

    pub reddit_client_id: Option<String>,
    pub reddit_client_secret: Option<String>,
    pub reddit_username: Option<String>,
    pub reddit_password: Option<String>,

    pub facebook_page_id: Option<String>,
    pub facebook_page_token: Option<String>,

    pub download_workers: usize,
    pub download_max_retries: u32,
}

impl Config {
    /// Loads `.env` if present (best-effort, matching `dotenvy`'s convention
    /// elsewhere in the pack), then reads environment variables. `strict`
    /// mirrors §7's Config-error fatality: when true, a missing
    /// `DATABASE_URL` is a startup error instead of falling back to the
    /// teacher's `~/.triage`-style default directory.
    pub fn from_env(strict: bool) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let database_path = match env::var("DATABASE_URL") {
            Ok(v) if !v.is_empty() => PathBuf::from(v),
            _ if strict => {
                return Err(PipelineError::Config(
                    "DATABASE_URL is required in strict mode".to_string(),
                ))
            }
            _ => default_database_path()?,
        };

        let smartproxy_ports = env::var("SMARTPROXY_PORTS")
            .ok()
            .map(|v| {
                v.split(',')
                    .filter_map(|p| p.trim().parse::<u16>().ok())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            database_path,
            minio_endpoint: env::var("MINIO_ENDPOINT").ok(),
            minio_access_key: env::var("MINIO_ACCESS_KEY").ok(),
            minio_secret_key: env::var("MINIO_SECRET_KEY").ok(),
            minio_bucket: env::var("MINIO_BUCKET").unwrap_or_else(|_| "newsroom".to_string()),

            eedition_user: env::var("EEDITION_USER").ok(),
            eedition_pass: env::var("EEDITION_PASS").ok(),

            smartproxy_username: env::var("SMARTPROXY_USERNAME").ok(),
            smartproxy_password: env::var("SMARTPROXY_PASSWORD").ok(),
            smartproxy_host: env::var("SMARTPROXY_HOST").ok(),
            smartproxy_ports,

            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            openai_api_base: env::var("OPENAI_API_BASE").ok(),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            openai_max_tokens: env_parse("OPENAI_MAX_TOKENS", 1024),
            openai_embed_model: env::var("OPENAI_EMBED_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),

            summarizer_batch_size: env_parse("SUMMARIZER_BATCH_SIZE", 10),
            summarizer_max_batches: env_parse("SUMMARIZER_MAX_BATCHES", 50),
            summarizer_max_retries: env_parse("SUMMARIZER_MAX_RETRIES", 3),

            weaviate_url: env::var("WEAVIATE_URL").ok(),
            weaviate_api_key: env::var("WEAVIATE_API_KEY").ok(),
            qdrant_url: env::var("QDRANT_URL").ok(),
            qdrant_api_key: env::var("QDRANT_API_KEY").ok(),

            ntfy_url: env::var("NTFY_URL").ok(),
            ntfy_topic: env::var("NTFY_TOPIC").ok(),
            ntfy_token: env::var("NTFY_TOKEN").ok(),

            reddit_client_id: env::var("REDDIT_CLIENT_ID").ok(),
            reddit_client_secret: env::var("REDDIT_CLIENT_SECRET").ok(),
            reddit_username: env::var("REDDIT_USERNAME").ok(),
            reddit_password: env::var("REDDIT_PASSWORD").ok(),

            facebook_page_id: env::var("FACEBOOK_PAGE_ID").ok(),
            facebook_page_token: env::var("FACEBOOK_PAGE_TOKEN").ok(),

            download_workers: env_parse("DOWNLOAD_WORKERS", 4),
            download_max_retries: env_parse("DOWNLOAD_MAX_RETRIES", 3),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn default_database_path() -> Result<PathBuf> {
    let mut dir = home_dir().ok_or_else(|| {
        PipelineError::Config("could not resolve home directory for default DB path".to_string())
    })?;
    dir.push(".newsroom-pipeline");
    std::fs::create_dir_all(&dir).map_err(|e| {
        PipelineError::Config(format!("could not create {}: {}", dir.display(), e))
    })?;
    dir.push("articles.duckdb");
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_mode_requires_database_url() {
        // SAFETY: test-only env mutation, single-threaded test execution assumed.
        unsafe {
            std::env::remove_var("DATABASE_URL");
        }
        let result = Config::from_env(true);
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}
