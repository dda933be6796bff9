//! Platform session lifecycle.
//!
//! The relay holds at most one authenticated session. It is established on
//! first use and reused until a platform call reports the credential as
//! rejected. Initialization is single-flight: the slot's lock is held across
//! the login, so concurrent callers wait for the same attempt instead of
//! starting their own.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::error::{RelayError, RelayResult};
use crate::platform::{Platform, PlatformError, User};

/// An authenticated platform session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The bot account the credential belongs to.
    pub bot: User,
    /// When the session was established.
    pub established_at: DateTime<Utc>,
}

/// Lazily establishes and memoizes the process-wide session.
pub struct SessionManager {
    platform: Arc<dyn Platform>,
    connect_timeout: Duration,
    slot: Mutex<Option<Arc<Session>>>,
}

impl SessionManager {
    /// Create a manager; no connection is made until first use.
    pub fn new(platform: Arc<dyn Platform>, connect_timeout: Duration) -> Self {
        Self {
            platform,
            connect_timeout,
            slot: Mutex::new(None),
        }
    }

    /// Return the ready session, logging in first if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Platform`] if the login fails and
    /// [`RelayError::Timeout`] if it does not complete within the connect
    /// timeout. A failed attempt leaves the slot empty for the next caller.
    pub async fn ensure_session(&self) -> RelayResult<Arc<Session>> {
        let mut slot = self.slot.lock().await;
        if let Some(session) = slot.as_ref() {
            return Ok(Arc::clone(session));
        }

        info!("establishing platform session");
        let bot = match tokio::time::timeout(self.connect_timeout, self.platform.login()).await {
            Ok(Ok(bot)) => bot,
            Ok(Err(e)) => {
                error!(error = %e, "platform connection failed");
                return Err(RelayError::Platform(e));
            }
            Err(_) => {
                error!(
                    timeout_secs = self.connect_timeout.as_secs(),
                    "platform connection timed out"
                );
                return Err(RelayError::Timeout(format!(
                    "platform login did not complete within {}s",
                    self.connect_timeout.as_secs()
                )));
            }
        };

        info!(bot = %bot.tag(), "platform session ready");
        let session = Arc::new(Session {
            bot,
            established_at: Utc::now(),
        });
        *slot = Some(Arc::clone(&session));
        Ok(session)
    }

    /// The current session, without connecting.
    pub async fn current(&self) -> Option<Arc<Session>> {
        self.slot.lock().await.clone()
    }

    /// Whether a ready session exists.
    pub async fn is_ready(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    /// Drop the current session so the next caller logs in again.
    pub async fn invalidate(&self) {
        if self.slot.lock().await.take().is_some() {
            warn!("platform session invalidated");
        }
    }

    /// Run a platform call under `limit`, invalidating the session when the
    /// platform rejects the credential.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Timeout`] naming `operation` on expiry, or the
    /// call's own error wrapped in [`RelayError::Platform`].
    pub async fn call<T, F>(&self, limit: Duration, operation: &str, fut: F) -> RelayResult<T>
    where
        F: Future<Output = Result<T, PlatformError>>,
    {
        match with_timeout(limit, operation, fut).await {
            Err(RelayError::Platform(e)) if e.is_unauthorized() => {
                self.invalidate().await;
                Err(RelayError::Platform(e))
            }
            other => other,
        }
    }
}

/// Bound a platform call by `limit`.
///
/// # Errors
///
/// Returns [`RelayError::Timeout`] naming `operation` on expiry, or the
/// call's own error wrapped in [`RelayError::Platform`].
pub async fn with_timeout<T, F>(limit: Duration, operation: &str, fut: F) -> RelayResult<T>
where
    F: Future<Output = Result<T, PlatformError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(RelayError::from),
        Err(_) => Err(RelayError::Timeout(format!(
            "{operation} did not complete within {}s",
            limit.as_secs()
        ))),
    }
}
