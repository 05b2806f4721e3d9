//! Outcome and progress types produced by a function call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

/// The single structured outcome of a function call.
///
/// Exactly one of `data` (on success) or `error` (on failure) is populated.
/// Functions build results through [`FunctionResult::success`] and
/// [`FunctionResult::failure`]; the duration is filled in by the engine after
/// the function returns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionResult {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(rename = "duration_ms", with = "duration_ms")]
    duration: Duration,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    metadata: serde_json::Map<String, Value>,
    timestamp: DateTime<Utc>,
}

impl FunctionResult {
    pub fn success(data: impl Into<Value>) -> Self {
        Self {
            success: true,
            data: Some(data.into()),
            error: None,
            duration: Duration::ZERO,
            metadata: serde_json::Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            duration: Duration::ZERO,
            metadata: serde_json::Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn success_with_message(data: impl Into<Value>, message: impl Into<String>) -> Self {
        Self::success(data).with_metadata("message", message.into())
    }

    pub fn failure_with_message(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self::failure(error).with_metadata("message", message.into())
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<Value> {
        self.data
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn metadata(&self) -> &serde_json::Map<String, Value> {
        &self.metadata
    }

    pub fn message(&self) -> Option<&str> {
        self.metadata.get("message").and_then(Value::as_str)
    }

    /// Stamps the measured wall-clock duration and completion time.
    pub(crate) fn complete(&mut self, duration: Duration) {
        self.duration = duration;
        self.timestamp = Utc::now();
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_micros() as f64 / 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = f64::deserialize(deserializer)?;
        if !millis.is_finite() || millis < 0.0 {
            return Err(serde::de::Error::custom("duration must be a non-negative number"));
        }
        Ok(Duration::from_micros((millis * 1000.0).round() as u64))
    }
}

/// An incremental status update emitted while a function runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub current: u64,
    pub total: u64,
    pub percentage: f64,
    pub message: String,
    #[serde(default)]
    pub stage: String,
    pub timestamp: DateTime<Utc>,
}

impl Progress {
    pub fn new(current: u64, total: u64, message: impl Into<String>) -> Self {
        Self {
            current,
            total,
            percentage: percentage_of(current, total),
            message: message.into(),
            stage: String::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = stage.into();
        self
    }

    /// Recomputes `percentage` from `current` and `total`, ignoring whatever
    /// the emitter put there.
    pub fn normalized(mut self) -> Self {
        self.percentage = percentage_of(self.current, self.total);
        self
    }
}

/// `current / total * 100`, clamped to `[0, 100]`; zero when `total` is zero.
pub fn percentage_of(current: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (current as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Pretty-printed JSON for logs and terminal output.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|err| {
        warn!("Failed to serialize value to JSON: {}", err);
        "{}".to_string()
    })
}

pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Wraps `callback` so every event it sees has a recomputed percentage and a
/// `current` that never goes backwards within the call.
pub(crate) fn monotonic(callback: ProgressCallback) -> ProgressCallback {
    let high_water = AtomicU64::new(0);
    Arc::new(move |mut progress: Progress| {
        let previous = high_water.fetch_max(progress.current, Ordering::SeqCst);
        progress.current = progress.current.max(previous);
        callback(progress.normalized());
    })
}
