use thiserror::Error;

/// Error taxonomy for the pipeline. Each variant maps to a handling policy
/// documented alongside the component that raises it: retry, surface
/// per-item, or bubble up as fatal.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("transient network error in {context}: {source}")]
    TransientNetwork {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("rate limited in {context}: {detail}")]
    RateLimited { context: String, detail: String },

    #[error("auth failed in {context}: {detail}")]
    Auth { context: String, detail: String },

    #[error("cache miss for {key}")]
    CacheMiss { key: String },

    #[error("parse error in {context}: {detail}")]
    Parse { context: String, detail: String },

    #[error("constraint violation in {context}: {detail}")]
    Constraint { context: String, detail: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("fatal error in {context}: {detail}")]
    Fatal { context: String, detail: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub fn transient(context: impl Into<String>, source: reqwest::Error) -> Self {
        Self::TransientNetwork {
            context: context.into(),
            source,
        }
    }

    pub fn rate_limited(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::RateLimited {
            context: context.into(),
            detail: detail.into(),
        }
    }

    pub fn parse(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Parse {
            context: context.into(),
            detail: detail.into(),
        }
    }

    pub fn fatal(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Fatal {
            context: context.into(),
            detail: detail.into(),
        }
    }

    pub fn config(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Config(format!("{}: {}", context.into(), detail.into()))
    }

    pub fn auth(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Auth {
            context: context.into(),
            detail: detail.into(),
        }
    }

    /// Wraps an opaque external error (an AWS SDK error, for instance) whose
    /// type we don't want to depend on directly in the taxonomy.
    pub fn fatal_display(context: impl Into<String>, source: impl std::fmt::Display) -> Self {
        Self::Fatal {
            context: context.into(),
            detail: source.to_string(),
        }
    }

    /// Whether a retry loop should attempt again after seeing this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork { .. } | Self::CacheMiss { .. })
    }
}

/// Per-item outcome collector used by every outer loop (per-edition,
/// per-file, per-article): individual failures are recorded, never
/// propagated, so the batch always runs to completion.
#[derive(Debug, Default)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<(String, PipelineError)>,
}

impl<T> BatchOutcome<T> {
    pub fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn record_ok(&mut self, item: T) {
        self.succeeded.push(item);
    }

    pub fn record_err(&mut self, item_id: impl Into<String>, err: PipelineError) {
        self.failed.push((item_id.into(), err));
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            return 1.0;
        }
        self.succeeded.len() as f64 / self.total() as f64
    }

    /// §6 exit-code rule: nonzero when every item in a nonempty batch failed.
    pub fn all_failed(&self) -> bool {
        !self.failed.is_empty() && self.succeeded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_outcome_tracks_rate() {
        let mut outcome: BatchOutcome<u32> = BatchOutcome::new();
        outcome.record_ok(1);
        outcome.record_ok(2);
        outcome.record_err("3", PipelineError::fatal("test", "boom"));
        assert_eq!(outcome.total(), 3);
        assert!((outcome.success_rate() - 2.0 / 3.0).abs() < 1e-9);
        assert!(!outcome.all_failed());
    }

    #[test]
    fn batch_outcome_all_failed_requires_nonempty() {
        let empty: BatchOutcome<u32> = BatchOutcome::new();
        assert!(!empty.all_failed());

        let mut all_bad: BatchOutcome<u32> = BatchOutcome::new();
        all_bad.record_err("1", PipelineError::fatal("test", "boom"));
        assert!(all_bad.all_failed());
    }
}
