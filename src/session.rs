use crate::error::{PipelineError, Result};
use crate::object_cache::ObjectCache;
use crate::utils::{log_step, log_success, log_warn};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ProxyEndpoint {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Result of one login attempt, returned by the opaque `LoginDriver`.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    Success,
    InvalidCredentials,
    RateLimited,
    Other(String),
}

/// §9's `PageFetcher`-adjacent abstraction boundary: the headless-browser
/// navigation itself is the one collaborator this crate treats as opaque.
/// Production wiring supplies a Playwright-backed implementation (out of
/// scope); tests supply a scripted stub.
#[async_trait::async_trait]
pub trait LoginDriver: Send + Sync {
    async fn attempt_login(
        &self,
        creds: &Credentials,
        proxy: Option<&ProxyEndpoint>,
    ) -> Result<LoginOutcome>;
}

/// Persistent marker disabling login attempts for a cooldown window after a
/// rate-limit signal (§4.1's Lockout Guard).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockoutMarker {
    pub activated_at: DateTime<Utc>,
    pub reason: String,
    pub active_until: DateTime<Utc>,
}

impl LockoutMarker {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.active_until
    }
}

/// Owned, not a module-level global (§9): concurrent access goes through
/// this store's methods, which read/write both a local file and the Object
/// Cache (best-effort on the latter).
pub struct LockoutStore {
    local_path: PathBuf,
}

impl LockoutStore {
    pub fn new(local_path: PathBuf) -> Self {
        Self { local_path }
    }

    pub fn read_local(&self) -> Option<LockoutMarker> {
        let data = std::fs::read_to_string(&self.local_path).ok()?;
        serde_json::from_str(&data).ok()
    }

    pub fn write_local(&self, marker: &LockoutMarker) -> Result<()> {
        let json = serde_json::to_string(marker)
            .map_err(|e| PipelineError::parse("session::LockoutStore::write_local", e.to_string()))?;
        std::fs::write(&self.local_path, json)
            .map_err(|e| PipelineError::fatal("session::LockoutStore::write_local", e.to_string()))
    }

    pub async fn activate(
        &self,
        object_cache: Option<&ObjectCache>,
        reason: impl Into<String>,
        cooldown: chrono::Duration,
    ) -> Result<()> {
        let now = Utc::now();
        let marker = LockoutMarker {
            activated_at: now,
            reason: reason.into(),
            active_until: now + cooldown,
        };
        self.write_local(&marker)?;
        if let Some(cache) = object_cache {
            let _ = cache
                .write_lockout_marker(&serde_json::to_value(&marker).unwrap_or_default())
                .await;
        }
        Ok(())
    }

    pub fn clear_local(&self) {
        let _ = std::fs::remove_file(&self.local_path);
    }
}

/// Maintains a single authenticated session per (site, egress-proxy) pair,
/// persisted to a storage-state file bound to the proxy identity.
pub struct SessionManager<D: LoginDriver> {
    driver: D,
    credentials: Credentials,
    storage_state_path: PathBuf,
    lockout: LockoutStore,
}

pub struct SessionHandle {
    pub storage_state_path: PathBuf,
}

impl<D: LoginDriver> SessionManager<D> {
    /// Credentials are resolved once by `Config::from_env` (§4.1.1) and
    /// passed in here, mirroring the teacher's `auth.rs::authenticate`
    /// pattern of resolving config at the top of a flow.
    pub fn new(
        driver: D,
        credentials: Credentials,
        storage_state_path: PathBuf,
        lockout_local_path: PathBuf,
    ) -> Self {
        Self {
            driver,
            credentials,
            storage_state_path,
            lockout: LockoutStore::new(lockout_local_path),
        }
    }

    /// Attempts an authenticated request; since the actual HTTP fetch goes
    /// through the `PageFetcher` capability (§4.2), this crate exposes the
    /// decision point and leaves the fetch itself to the caller-supplied
    /// closure so `SessionManager` stays independent of any HTTP client type.
    pub fn verify_session<F>(&self, probe: F) -> bool
    where
        F: FnOnce(&PathBuf) -> bool,
    {
        self.storage_state_path.exists() && probe(&self.storage_state_path)
    }

    pub async fn login(&self, proxy: Option<&ProxyEndpoint>) -> Result<bool> {
        if let Some(marker) = self.lockout.read_local() {
            if marker.is_active(Utc::now()) {
                log_warn(&format!(
                    "login suppressed, lockout active until {}",
                    marker.active_until
                ));
                return Ok(false);
            }
        }

        log_step("🔐", "Attempting login...");
        match self.driver.attempt_login(&self.credentials, proxy).await? {
            LoginOutcome::Success => {
                self.lockout.clear_local();
                log_success("Login succeeded.");
                Ok(true)
            }
            LoginOutcome::RateLimited => {
                self.lockout
                    .activate(None, "HTTP 429 during login", chrono::Duration::hours(1))
                    .await?;
                Err(PipelineError::rate_limited(
                    "session::login",
                    "rate limited, lockout guard activated",
                ))
            }
            LoginOutcome::InvalidCredentials => Err(PipelineError::Auth {
                context: "session::login".to_string(),
                detail: "credentials rejected".to_string(),
            }),
            LoginOutcome::Other(detail) => Err(PipelineError::Auth {
                context: "session::login".to_string(),
                detail,
            }),
        }
    }

    /// Takes a cross-process file lock bound to the storage-state path,
    /// verifies or logs in once, then returns a session handle. The lock
    /// prevents concurrent re-logins when multiple workers start at once.
    pub async fn with_session<F>(&self, verify_probe: F) -> Result<SessionHandle>
    where
        F: FnOnce(&PathBuf) -> bool,
    {
        let lock_path = lock_file_path(&self.storage_state_path);
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| PipelineError::fatal("session::with_session", e.to_string()))?;
        lock_file
            .lock_exclusive()
            .map_err(|e| PipelineError::fatal("session::with_session", e.to_string()))?;

        let result = self.ensure_authenticated(verify_probe).await;

        lock_file.unlock().ok();
        result?;
        Ok(SessionHandle {
            storage_state_path: self.storage_state_path.clone(),
        })
    }

    async fn ensure_authenticated<F>(&self, verify_probe: F) -> Result<()>
    where
        F: FnOnce(&PathBuf) -> bool,
    {
        if self.verify_session(verify_probe) {
            return Ok(());
        }
        if self.login(None).await? {
            Ok(())
        } else {
            Err(PipelineError::Auth {
                context: "session::ensure_authenticated".to_string(),
                detail: "login did not succeed".to_string(),
            })
        }
    }
}

fn lock_file_path(storage_state_path: &PathBuf) -> PathBuf {
    let mut p = storage_state_path.clone();
    let mut name = p
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "session".to_string());
    name.push_str(".lock");
    p.set_file_name(name);
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedDriver {
        outcome: LoginOutcome,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl LoginDriver for ScriptedDriver {
        async fn attempt_login(
            &self,
            _creds: &Credentials,
            _proxy: Option<&ProxyEndpoint>,
        ) -> Result<LoginOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.outcome.clone())
        }
    }

    #[tokio::test]
    async fn lockout_suppresses_login_without_calling_driver() {
        let dir = std::env::temp_dir().join(format!("nrp-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let lockout_path = dir.join("lockout.json");
        let storage_path = dir.join("storage.json");

        let calls = Arc::new(AtomicUsize::new(0));
        let manager = SessionManager::new(
            ScriptedDriver {
                outcome: LoginOutcome::Success,
                calls: calls.clone(),
            },
            Credentials {
                username: "u".to_string(),
                password: "p".to_string(),
            },
            storage_path,
            lockout_path.clone(),
        );

        let marker = LockoutMarker {
            activated_at: Utc::now(),
            reason: "test".to_string(),
            active_until: Utc::now() + chrono::Duration::hours(1),
        };
        manager.lockout.write_local(&marker).unwrap();

        let result = manager.login(None).await.unwrap();
        assert!(!result);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        std::fs::remove_dir_all(&dir).ok();
    }
}
