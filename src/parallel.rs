use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Worker pool settings for the row-parallel matchers.
///
/// Builds a dedicated rayon pool instead of touching the global one, so two
/// callers with different settings never interfere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadPoolConfig {
    /// Worker count; `None` lets rayon pick one per logical CPU.
    pub num_threads: Option<usize>,
}

impl ThreadPoolConfig {
    pub fn new(num_threads: Option<usize>) -> Self {
        Self { num_threads }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_threads == Some(0) {
            return Err(Error::invalid_argument("Thread count must be >= 1"));
        }
        Ok(())
    }

    pub fn build(&self) -> Result<rayon::ThreadPool> {
        self.validate()?;

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(num_threads) = self.num_threads {
            builder = builder.num_threads(num_threads);
        }
        builder.build().map_err(|e| {
            Error::ThreadPool(format!(
                "Failed to initialize thread pool with {:?} threads: {e}",
                self.num_threads
            ))
        })
    }
}
