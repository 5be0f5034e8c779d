use crate::config::Config;
use crate::db::{self, IndexableArticle};
use crate::error::{PipelineError, Result};
use crate::utils::{log_step, log_success, log_warn};
use async_openai::config::OpenAIConfig;
use async_openai::types::CreateEmbeddingRequestArgs;
use async_openai::Client;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointStruct, UpsertPointsBuilder, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use uuid::Uuid;

const COLLECTION_NAME: &str = "articles";

/// §4.7's redesign of the Python `try: import openai except: AsyncOpenAI = None`
/// pattern into a typed optional dependency.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

pub struct OpenAiEmbeddingBackend {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbeddingBackend {
    pub fn new(config: &Config) -> Self {
        let mut oai_config = OpenAIConfig::new();
        if let Some(key) = &config.openai_api_key {
            oai_config = oai_config.with_api_key(key);
        }
        if let Some(base) = &config.openai_api_base {
            oai_config = oai_config.with_api_base(base);
        }
        Self {
            client: Client::with_config(oai_config),
            model: config.openai_embed_model.clone(),
        }
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiEmbeddingBackend {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(texts.to_vec())
            .build()
            .map_err(|e| PipelineError::fatal_display("vector_index::embed", e))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| PipelineError::fatal_display("vector_index::embed", e))?;

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Keyword-only mode: no embedding backend configured. `sync` still upserts
/// every point with its full payload, using a placeholder single-dimension
/// vector in place of a real embedding (Qdrant requires one per point).
pub struct NoEmbeddingBackend;

#[async_trait]
impl EmbeddingBackend for NoEmbeddingBackend {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(Vec::new())
    }
}

pub fn build_backend(config: &Config) -> Box<dyn EmbeddingBackend> {
    if config.openai_api_key.is_some() {
        Box::new(OpenAiEmbeddingBackend::new(config))
    } else {
        Box::new(NoEmbeddingBackend)
    }
}

fn article_point_id(article_id: i64) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("article:{article_id}").as_bytes())
}

fn build_payload(article: &IndexableArticle) -> Payload {
    let mut fields = json!({
        "article_id": article.id,
        "title": article.title,
        "section": article.section.clone().unwrap_or_else(|| "General".to_string()),
        "summary": article.summary,
        "content": article.content,
    });
    if let Some(url) = &article.url {
        fields["url"] = json!(url);
    }
    if let Some(date_published) = article.date_published {
        fields["date_published"] = json!(date_published.to_rfc3339());
    }
    Payload::try_from(fields).unwrap_or_default()
}

async fn ensure_collection(client: &Qdrant, dim: u64) -> Result<()> {
    let exists = client
        .collection_exists(COLLECTION_NAME)
        .await
        .map_err(|e| PipelineError::fatal_display("vector_index::ensure_collection", e))?;
    if exists {
        return Ok(());
    }

    let vectors_config = VectorParamsBuilder::new(dim, Distance::Cosine).build();
    client
        .create_collection(CreateCollectionBuilder::new(COLLECTION_NAME).vectors_config(vectors_config))
        .await
        .map_err(|e| PipelineError::fatal_display("vector_index::ensure_collection", e))?;
    Ok(())
}

/// §4.7: articles updated within the last `hours`, `processing_status = summarized`.
/// Embeds title + (brief summary, falling back to content[:2000]), upserts into Qdrant
/// with a deterministic UUIDv5 point id so re-runs are idempotent.
pub async fn sync(config: &Config, hours: i64, backend: &dyn EmbeddingBackend) -> Result<usize> {
    let Some(qdrant_url) = &config.qdrant_url else {
        log_warn("QDRANT_URL not set, skipping vector index sync.");
        return Ok(0);
    };

    let since: DateTime<Utc> = Utc::now() - chrono::Duration::hours(hours);
    let articles = db::fetch_articles_for_vector_index(config, since)?;
    if articles.is_empty() {
        log_step("🧭", "No updated summarized articles to sync.");
        return Ok(0);
    }

    log_step("🧭", &format!("Syncing {} article(s) to the vector index...", articles.len()));

    let texts: Vec<String> = articles
        .iter()
        .map(|a| {
            let body = a
                .summary
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| a.content.chars().take(2000).collect::<String>());
            format!("{}\n\n{body}", a.title)
        })
        .collect();

    let vectors = backend.embed(&texts).await?;

    let mut client_builder = Qdrant::from_url(qdrant_url);
    if let Some(key) = &config.qdrant_api_key {
        client_builder = client_builder.api_key(key.clone());
    }
    let client = client_builder
        .build()
        .map_err(|e| PipelineError::fatal_display("vector_index::sync", e))?;

    let points: Vec<PointStruct> = if vectors.is_empty() {
        // BM25/keyword-only mode: no embedding backend configured. The payload still
        // carries title/summary/content for Qdrant's payload-based text filtering, so
        // a placeholder single-dimension vector stands in for the (absent) embedding.
        log_warn("No embedding backend configured; upserting payload-only points for keyword search.");
        ensure_collection(&client, 1).await?;
        articles
            .iter()
            .map(|article| PointStruct::new(article_point_id(article.id).to_string(), vec![0.0f32], build_payload(article)))
            .collect()
    } else {
        ensure_collection(&client, vectors[0].len() as u64).await?;
        articles
            .iter()
            .zip(vectors.into_iter())
            .map(|(article, vector)| {
                PointStruct::new(article_point_id(article.id).to_string(), vector, build_payload(article))
            })
            .collect()
    };

    let count = points.len();
    client
        .upsert_points(UpsertPointsBuilder::new(COLLECTION_NAME, points))
        .await
        .map_err(|e| PipelineError::fatal_display("vector_index::sync", e))?;

    log_success(&format!("Vector index sync complete: {count} point(s) upserted."));
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_point_id_is_deterministic() {
        let a = article_point_id(42);
        let b = article_point_id(42);
        assert_eq!(a, b);
    }

    #[test]
    fn article_point_id_differs_across_articles() {
        assert_ne!(article_point_id(1), article_point_id(2));
    }

    #[tokio::test]
    async fn no_embedding_backend_returns_empty_vectors() {
        let backend = NoEmbeddingBackend;
        let vectors = backend.embed(&["hello".to_string()]).await.unwrap();
        assert!(vectors.is_empty());
    }
}
