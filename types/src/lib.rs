//! Core domain types for Refine.
//!
//! This crate intentionally has no IO, no async, and no UI dependencies.
//! Types here are shared by the provider client, the engine, and the TUI.

mod text;

pub use text::{take_chars, truncate_preview};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed system instruction sent with every optimization request.
pub const SYSTEM_INSTRUCTION: &str = "You are an expert Prompt Engineer. Rewrite user prompt using: Persona -> Context -> Task -> Constraints -> Output Format.";

/// Maximum number of history entries kept in memory and on disk.
pub const HISTORY_CAPACITY: usize = 50;

/// Capability a model must advertise to be offered in the selector.
pub const GENERATE_CONTENT_METHOD: &str = "generateContent";

// ============================================================================
// Credential
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("API key must not be empty")]
pub struct EmptyKeyError;

/// Google API key.
///
/// Note: `Debug` is manually implemented to redact the key value, preventing
/// accidental credential disclosure in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey(<redacted>)")
    }
}

impl ApiKey {
    /// Build a key from user or file input. Surrounding whitespace is trimmed.
    pub fn new(raw: impl Into<String>) -> Result<Self, EmptyKeyError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EmptyKeyError);
        }
        if trimmed.len() == raw.len() {
            Ok(Self(raw))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Temperature
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("temperature {0} is outside 0.0..=1.0")]
pub struct TemperatureError(pub f32);

/// Sampling temperature bounded to `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Temperature(f32);

impl Temperature {
    pub const MIN: f32 = 0.0;
    pub const MAX: f32 = 1.0;
    /// Slider resolution: 20 steps across the range.
    pub const STEP: f32 = 0.05;
    pub const DEFAULT: Temperature = Temperature(0.7);

    pub fn new(value: f32) -> Result<Self, TemperatureError> {
        if value.is_finite() && (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(TemperatureError(value))
        }
    }

    /// Clamp into range. NaN maps to the default.
    #[must_use]
    pub fn clamped(value: f32) -> Self {
        if value.is_nan() {
            return Self::DEFAULT;
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    #[must_use]
    pub const fn value(self) -> f32 {
        self.0
    }

    #[must_use]
    pub fn step_up(self) -> Self {
        Self::snapped(self.0 + Self::STEP)
    }

    #[must_use]
    pub fn step_down(self) -> Self {
        Self::snapped(self.0 - Self::STEP)
    }

    fn snapped(value: f32) -> Self {
        let steps = (value / Self::STEP).round();
        Self::clamped(steps * Self::STEP)
    }
}

impl Default for Temperature {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for Temperature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

// ============================================================================
// Models
// ============================================================================

/// One entry of the model selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    pub display_name: String,
    /// Remote identifier. Empty marks a sentinel that must never be dispatched.
    pub api_id: String,
}

impl ModelDescriptor {
    pub fn new(display_name: impl Into<String>, api_id: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            api_id: api_id.into(),
        }
    }

    #[must_use]
    pub fn is_dispatchable(&self) -> bool {
        !self.api_id.is_empty()
    }
}

/// A model as reported by the remote listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteModel {
    /// Fully-qualified identifier, e.g. `models/gemini-2.0-flash`.
    pub name: String,
    pub supported_generation_methods: Vec<String>,
}

impl RemoteModel {
    #[must_use]
    pub fn supports(&self, method: &str) -> bool {
        self.supported_generation_methods.iter().any(|m| m == method)
    }
}

// ============================================================================
// Optimization request / result
// ============================================================================

/// Snapshot taken at trigger time and consumed once by the background task.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationRequest {
    pub source: String,
    pub model_id: String,
    pub temperature: Temperature,
}

/// Outcome of one optimization attempt.
///
/// Failures carry their description as `text` so it can be shown inline.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    pub text: String,
    pub tokens: Option<u64>,
    pub success: bool,
    pub request: OptimizationRequest,
}

impl OptimizationResult {
    #[must_use]
    pub fn succeeded(request: OptimizationRequest, text: String, tokens: Option<u64>) -> Self {
        Self {
            text,
            tokens,
            success: true,
            request,
        }
    }

    #[must_use]
    pub fn failed(request: OptimizationRequest, error: impl std::fmt::Display) -> Self {
        Self {
            text: format!("Gemini Error: {error}"),
            tokens: None,
            success: false,
            request,
        }
    }
}

// ============================================================================
// History
// ============================================================================

/// One persisted optimization.
///
/// Field names match the on-disk format. `timestamp` is accepted as a legacy
/// spelling of `ts`; the store drops it when both are present, since serde
/// rejects the pair as a duplicate field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(alias = "timestamp", default = "unknown_timestamp")]
    pub ts: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub tokens: Option<u64>,
}

fn unknown_timestamp() -> String {
    "??:??".to_string()
}

// ============================================================================
// UI options
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UiOptions {
    pub ascii_only: bool,
    pub high_contrast: bool,
}
