//! Explicit configuration for a disparity run.
//!
//! JSON keys follow the camelCase parameter names used by existing experiment
//! scripts (`blockSize`, `maxDisparity`, `windowSize`, ...).

use crate::block_matching::{DisparityMethod, SsdMatcher};
use crate::normalize::{normalize_disparity, EncodedMap, Encoding};
use crate::parallel::ThreadPoolConfig;
use crate::{DisparityMap, Result, StereoMatcherCtx};
use image::GrayImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct DisparityConfig {
    pub method: DisparityMethod,
    /// Square block side for [`DisparityMethod::SymmetricBlock`].
    pub block_size: usize,
    pub max_disparity: usize,
    /// `(height, width)` for [`DisparityMethod::LeftToRight`].
    pub window_size: (usize, usize),
    pub normalize: bool,
    pub normalize_range: Encoding,
    pub threads: Option<usize>,
}

impl Default for DisparityConfig {
    fn default() -> Self {
        Self {
            method: DisparityMethod::LeftToRight,
            block_size: 9,
            max_disparity: 64,
            window_size: (11, 11),
            normalize: true,
            normalize_range: Encoding::Bits8,
            threads: None,
        }
    }
}

/// Result of [`DisparityConfig::run`].
#[derive(Debug, Clone)]
pub struct DisparityOutput {
    pub raw: DisparityMap,
    pub normalized: Option<EncodedMap>,
}

impl DisparityConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.matcher().validate()?;
        self.thread_pool().validate()
    }

    pub fn matcher(&self) -> SsdMatcher {
        SsdMatcher::new()
            .with_method(self.method)
            .with_max_disparity(self.max_disparity)
            .with_window(self.window_size.0, self.window_size.1)
            .with_block_size(self.block_size)
    }

    pub fn thread_pool(&self) -> ThreadPoolConfig {
        ThreadPoolConfig::new(self.threads)
    }

    /// Compute the raw disparity map and, if enabled, its normalized encoding.
    pub fn run(&self, left: &GrayImage, right: &GrayImage) -> Result<DisparityOutput> {
        self.validate()?;
        let pool = self.thread_pool().build()?;
        let raw = self.matcher().compute_ctx(left, right, &pool)?;

        let normalized = if self.normalize {
            Some(normalize_disparity(&raw, self.normalize_range)?)
        } else {
            None
        };

        tracing::info!(
            method = self.method.as_str(),
            normalized = self.normalize,
            "disparity map successfully calculated"
        );
        Ok(DisparityOutput { raw, normalized })
    }
}
