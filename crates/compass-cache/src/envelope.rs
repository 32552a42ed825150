// SPDX-FileCopyrightText: 2026 Compass Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stored record format: `{"savedAt": <epoch ms>, "data": <payload>}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Why a stored record could not be trusted.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record has no valid savedAt")]
    InvalidSavedAt,

    #[error("record has no data")]
    MissingData,
}

/// A cached payload plus the time it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEnvelope {
    #[serde(rename = "savedAt")]
    pub saved_at: i64,
    pub data: Value,
}

impl CacheEnvelope {
    pub fn new(saved_at: i64, data: Value) -> Self {
        Self { saved_at, data }
    }

    /// Parses and checks a raw record.
    ///
    /// `savedAt` must be a present, integral, non-negative number and `data`
    /// must be present. Anything else is treated as corruption.
    pub fn decode(raw: &str) -> Result<Self, EnvelopeError> {
        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(mut map) = value else {
            return Err(EnvelopeError::NotAnObject);
        };

        let saved_at = map
            .get("savedAt")
            .and_then(Value::as_i64)
            .filter(|ms| *ms >= 0)
            .ok_or(EnvelopeError::InvalidSavedAt)?;
        let data = map.remove("data").ok_or(EnvelopeError::MissingData)?;

        Ok(Self { saved_at, data })
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Age of the record at `now_ms`. Negative when the clock went backwards.
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.saved_at)
    }
}
