use std::time::Duration;

/// Tunables shared by the index builder, engine and session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Base window size and the increment applied by "load more".
    pub chunk_size: usize,
    /// Quiescence window of the query scheduler.
    pub debounce: Duration,
    /// Records indexed per cooperative build step.
    pub build_batch: usize,
    /// Titles longer than this (bytes) are skipped by the builder.
    pub max_title_len: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 250,
            debounce: Duration::from_millis(50),
            build_batch: 256,
            max_title_len: 4096,
        }
    }
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<usize>().ok())
}

impl SearchConfig {
    /// Defaults overridden by `MSEARCH_CHUNK_SIZE`, `MSEARCH_DEBOUNCE_MS`,
    /// `MSEARCH_BUILD_BATCH` and `MSEARCH_MAX_TITLE_LEN`. Unparsable values are ignored.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            chunk_size: env_usize("MSEARCH_CHUNK_SIZE").unwrap_or(d.chunk_size),
            debounce: env_usize("MSEARCH_DEBOUNCE_MS").map(|ms| Duration::from_millis(ms as u64)).unwrap_or(d.debounce),
            build_batch: env_usize("MSEARCH_BUILD_BATCH").unwrap_or(d.build_batch),
            max_title_len: env_usize("MSEARCH_MAX_TITLE_LEN").unwrap_or(d.max_title_len),
        }
        .clamped()
    }

    /// Chunk and batch sizes of zero would stall pagination and the builder.
    pub fn clamped(mut self) -> Self {
        self.chunk_size = self.chunk_size.max(1);
        self.build_batch = self.build_batch.max(1);
        self
    }
}
