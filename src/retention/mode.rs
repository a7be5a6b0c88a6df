use chrono::{DateTime, Utc};

use super::state::RetentionStateStore;
use crate::config::RetentionLimits;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionMode {
    Normal,
    Aggressive,
}

impl RetentionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionMode::Normal => "normal",
            RetentionMode::Aggressive => "aggressive",
        }
    }
}

impl std::fmt::Display for RetentionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode and batch size chosen for one flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedMode {
    pub mode: RetentionMode,
    pub batch_size: u64,
    /// Expiry of the aggressive flag, when aggressive.
    pub expires_at: Option<DateTime<Utc>>,
}

impl ResolvedMode {
    pub fn normal(limits: &RetentionLimits) -> Self {
        Self {
            mode: RetentionMode::Normal,
            batch_size: limits.normal_batch,
            expires_at: None,
        }
    }

    pub fn is_aggressive(&self) -> bool {
        self.mode == RetentionMode::Aggressive
    }
}

/// Read the persisted flag and pick this run's batch size.
///
/// An unreadable flag is treated as absent.
pub async fn resolve_mode(
    store: &dyn RetentionStateStore,
    now: DateTime<Utc>,
    limits: &RetentionLimits,
) -> ResolvedMode {
    let state = match store.load().await {
        Ok(state) => state,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read retention mode, assuming normal");
            None
        }
    };

    match state {
        Some(state) if state.is_active(now) => ResolvedMode {
            mode: RetentionMode::Aggressive,
            batch_size: limits.aggressive_batch,
            expires_at: Some(state.expires_at),
        },
        _ => ResolvedMode::normal(limits),
    }
}
