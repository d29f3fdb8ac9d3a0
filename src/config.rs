use easy_error::{Error, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::io::DEFAULT_BUFFER_SIZE;

/// Copy tuning shared by one-way copies and relays.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct IoParams {
    /// Bytes read per iteration, per direction.
    pub buffer_size: usize,
    /// Idle timeout in seconds; 0 disables it.
    pub idle_timeout: u64,
}

impl Default for IoParams {
    fn default() -> Self {
        IoParams {
            buffer_size: DEFAULT_BUFFER_SIZE,
            idle_timeout: 0,
        }
    }
}

impl IoParams {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let s = tokio::fs::read(path).await.context("read file")?;
        let s = String::from_utf8(s).context("parse utf8")?;
        Self::from_yaml(&s)
    }

    pub fn from_yaml(s: &str) -> Result<Self, Error> {
        serde_yaml_ng::from_str(s).context("parse yaml")
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout > 0).then(|| Duration::from_secs(self.idle_timeout))
    }
}
