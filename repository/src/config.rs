use std::time::Duration;

/// Default pause between two completed writes against a versioned remote
pub const DEFAULT_WRITE_DELAY: Duration = Duration::from_secs(1);

/// Default wait before re-fetching the version token after a conflict
pub const DEFAULT_CONFLICT_BACKOFF: Duration = Duration::from_secs(1);

/// Timing of the per-repository write queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub write_delay: Duration,
    pub conflict_backoff: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            write_delay: DEFAULT_WRITE_DELAY,
            conflict_backoff: DEFAULT_CONFLICT_BACKOFF,
        }
    }
}

impl QueueConfig {
    pub fn new(write_delay: Duration, conflict_backoff: Duration) -> Self {
        Self {
            write_delay,
            conflict_backoff,
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            write_delay: millis_from_env("REPO_WRITE_DELAY_MS")?.unwrap_or(defaults.write_delay),
            conflict_backoff: millis_from_env("REPO_CONFLICT_BACKOFF_MS")?
                .unwrap_or(defaults.conflict_backoff),
        })
    }
}

fn millis_from_env(name: &str) -> anyhow::Result<Option<Duration>> {
    match std::env::var(name) {
        Ok(raw) => {
            let millis = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| anyhow::anyhow!("{name} must be a number of milliseconds: {e}"))?;
            Ok(Some(Duration::from_millis(millis)))
        }
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(anyhow::anyhow!("{name} is not valid unicode: {e}")),
    }
}
