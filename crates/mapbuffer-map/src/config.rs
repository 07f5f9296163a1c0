use crate::error::ConfigError;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct MapBufferConfig {
    /// The edge length, in submaps, of the square regions that are loaded and saved together.
    pub region_size: i32,
    /// Log save progress every time this many regions have been written. Zero disables progress logging.
    pub save_progress_interval: usize,
}

impl Default for MapBufferConfig {
    fn default() -> Self {
        Self {
            region_size: 2,
            save_progress_interval: 64,
        }
    }
}

impl MapBufferConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region_size <= 0 {
            return Err(ConfigError::InvalidRegionSize(self.region_size));
        }
        Ok(())
    }
}
