use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};

use crate::{Error, InternalResult};

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;
pub const DEFAULT_DISPATCH_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Capacity of each per-event-name broadcast channel.
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,

    /// How long the outbound call is held back after the reply listener
    /// has been armed.
    #[serde(default = "default_dispatch_delay", with = "duration_ms")]
    pub dispatch_delay: Duration,

    /// Upper bound on how long a single-shot request waits for its reply.
    /// Unset means wait until the reply arrives or the client is torn down.
    #[serde(default, with = "option_duration_ms")]
    pub request_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: default_event_buffer_size(),
            dispatch_delay: default_dispatch_delay(),
            request_timeout: None,
        }
    }
}

impl BridgeConfig {
    // JSONファイルから設定を読み込む
    pub fn from_file<P: AsRef<Path>>(path: P) -> InternalResult<Self> {
        from_file(path)
    }

    pub fn from_str(s: &str) -> InternalResult<Self> {
        from_str(s)
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> InternalResult<T> {
    let file = File::open(path)
        .map_err(|e| Error::Config(format!("Failed to open config file: {}", e)))?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> InternalResult<T> {
    let config = serde_json::from_str(s)
        .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

fn default_event_buffer_size() -> usize {
    DEFAULT_EVENT_BUFFER_SIZE
}

fn default_dispatch_delay() -> Duration {
    DEFAULT_DISPATCH_DELAY
}

// Duration型のシリアライズ/デシリアライズヘルパー
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod option_duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
