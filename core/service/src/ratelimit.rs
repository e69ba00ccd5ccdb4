//! Download attempt throttling.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::RateLimitConfig;
use docseal_common::{Identity, Result};

/// Windows kept before expired entries are swept.
const SWEEP_THRESHOLD: usize = 1024;

/// Operation being throttled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitedAction {
    Download,
    DownloadUrl,
}

impl fmt::Display for RateLimitedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitedAction::Download => write!(f, "download"),
            RateLimitedAction::DownloadUrl => write!(f, "download_url"),
        }
    }
}

/// Stable per-caller key.
///
/// Every entry point authenticates before the gateway runs, so the key is
/// always the caller's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    pub fn for_identity(identity: &Identity) -> Self {
        Self(format!("user:{}", identity.user_id()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Gate consulted before protection-sensitive work begins.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Record an attempt and report whether it may proceed.
    async fn allow(&self, key: &RateLimitKey, action: RateLimitedAction) -> bool;
}

/// Limiter that admits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

#[async_trait]
impl RateLimiter for Unlimited {
    async fn allow(&self, _key: &RateLimitKey, _action: RateLimitedAction) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// In-process fixed window limiter.
///
/// Each caller and action gets `max_attempts` per window. Failed and
/// successful attempts count alike.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    max_attempts: u32,
    window: Duration,
    windows: Mutex<HashMap<(RateLimitKey, RateLimitedAction), Window>>,
}

impl FixedWindowLimiter {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn check_at(&self, key: &RateLimitKey, action: RateLimitedAction, now: Instant) -> bool {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        if windows.len() >= SWEEP_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry((key.clone(), action)).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_attempts {
            return false;
        }
        entry.count += 1;
        true
    }
}

#[async_trait]
impl RateLimiter for FixedWindowLimiter {
    async fn allow(&self, key: &RateLimitKey, action: RateLimitedAction) -> bool {
        self.check_at(key, action, Instant::now())
    }
}

/// Build the limiter described by `config`.
///
/// # Errors
/// - `InvalidInput` if the configuration is invalid
pub fn from_config(config: &RateLimitConfig) -> Result<Arc<dyn RateLimiter>> {
    config.validate()?;
    if !config.enabled {
        return Ok(Arc::new(Unlimited));
    }
    Ok(Arc::new(FixedWindowLimiter::new(
        config.max_attempts,
        Duration::from_secs(config.window_seconds),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(user: &str) -> RateLimitKey {
        RateLimitKey::for_identity(&Identity::new(user).unwrap())
    }

    #[test]
    fn test_key_is_user_scoped() {
        assert_eq!(key("alice").as_str(), "user:alice");
        assert_ne!(key("alice"), key("bob"));
    }

    #[test]
    fn test_budget_within_window() {
        let limiter = FixedWindowLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();
        let alice = key("alice");

        assert!(limiter.check_at(&alice, RateLimitedAction::Download, start));
        assert!(limiter.check_at(&alice, RateLimitedAction::Download, start + Duration::from_secs(1)));
        assert!(!limiter.check_at(&alice, RateLimitedAction::Download, start + Duration::from_secs(2)));
    }

    #[test]
    fn test_window_resets() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        let alice = key("alice");

        assert!(limiter.check_at(&alice, RateLimitedAction::Download, start));
        assert!(!limiter.check_at(&alice, RateLimitedAction::Download, start + Duration::from_secs(59)));
        assert!(limiter.check_at(&alice, RateLimitedAction::Download, start + Duration::from_secs(60)));
    }

    #[test]
    fn test_keys_and_actions_independent() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check_at(&key("alice"), RateLimitedAction::Download, now));
        assert!(limiter.check_at(&key("bob"), RateLimitedAction::Download, now));
        assert!(limiter.check_at(&key("alice"), RateLimitedAction::DownloadUrl, now));
        assert!(!limiter.check_at(&key("alice"), RateLimitedAction::Download, now));
    }

    #[test]
    fn test_sweep_drops_expired_windows() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(1));
        let start = Instant::now();
        for i in 0..SWEEP_THRESHOLD {
            limiter.check_at(&key(&format!("u{}", i)), RateLimitedAction::Download, start);
        }

        limiter.check_at(&key("late"), RateLimitedAction::Download, start + Duration::from_secs(5));
        assert_eq!(limiter.windows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_default_config_does_not_throttle() {
        let limiter = from_config(&RateLimitConfig::default()).unwrap();
        for _ in 0..5 {
            assert!(limiter.allow(&key("alice"), RateLimitedAction::Download).await);
        }
    }

    #[tokio::test]
    async fn test_enabled_config_throttles() {
        let enabled = RateLimitConfig {
            enabled: true,
            ..Default::default()
        };
        let limiter = from_config(&enabled).unwrap();
        assert!(limiter.allow(&key("alice"), RateLimitedAction::Download).await);
        assert!(!limiter.allow(&key("alice"), RateLimitedAction::Download).await);
    }
}
