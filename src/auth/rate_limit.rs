use std::{
    collections::HashMap,
    net::SocketAddr,
    time::Duration,
};

use axum::{extract::ConnectInfo, http::HeaderMap};
use tokio::{sync::Mutex, time::Instant};

use crate::config::RateLimitConfig;

/// Above this many tracked clients, expired windows are dropped on the next check.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    attempts: u32,
}

/// Fixed-window attempt counter keyed by client.
#[derive(Debug)]
pub struct LoginRateLimiter {
    max_attempts: u32,
    window: Duration,
    trust_proxy: bool,
    windows: Mutex<HashMap<String, Window>>,
}

impl LoginRateLimiter {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            trust_proxy: false,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(cfg: &RateLimitConfig) -> Self {
        Self {
            trust_proxy: cfg.trust_proxy,
            ..Self::new(cfg.max_attempts, Duration::from_secs(cfg.window_minutes * 60))
        }
    }

    pub fn window_minutes(&self) -> u64 {
        self.window.as_secs() / 60
    }

    /// Records an attempt. `Err` carries how long until the window resets.
    pub async fn check(&self, key: &str) -> Result<(), Duration> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;

        if windows.len() > PRUNE_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            attempts: 0,
        });
        let elapsed = now.duration_since(entry.started);
        if elapsed >= self.window {
            *entry = Window {
                started: now,
                attempts: 0,
            };
        } else if entry.attempts >= self.max_attempts {
            return Err(self.window - elapsed);
        }
        entry.attempts += 1;
        Ok(())
    }

    /// Peer IP of the connection. Behind a trusted proxy, the first
    /// `X-Forwarded-For` hop when present.
    pub fn client_key(
        &self,
        headers: &HeaderMap,
        peer: Option<&ConnectInfo<SocketAddr>>,
    ) -> String {
        let forwarded = self
            .trust_proxy
            .then(|| {
                headers
                    .get("x-forwarded-for")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.split(',').next())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            })
            .flatten();
        forwarded
            .or_else(|| peer.map(|ConnectInfo(addr)| addr.ip().to_string()))
            .unwrap_or_else(|| "unknown".to_string())
    }
}
