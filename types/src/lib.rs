//! Core domain types for Atlas.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the runtime.
//!
//! The central type is [`Event`]: every event travelling over the bus is one
//! variant of it, so subscribers match on a typed payload instead of probing
//! an untyped map. Consumers that need ad-hoc events use [`Event::Custom`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Event Names
// ============================================================================

/// Stable event names used as bus keys.
pub mod names {
    pub const API_SUCCESS: &str = "api:success";
    pub const API_ERROR: &str = "api:error";
    pub const APP_INITIALIZED: &str = "app:initialized";
    pub const APP_FALLBACK: &str = "app:fallback";
    pub const FEATURE_LOADED: &str = "feature:loaded";
    pub const FEATURE_FAILED: &str = "feature:failed";
    pub const NOTIFY: &str = "ui:notify";
    pub const UNCAUGHT_ERROR: &str = "error:uncaught";
    pub const UNHANDLED_REJECTION: &str = "error:unhandled";
}

// ============================================================================
// Payloads
// ============================================================================

/// A request that completed with a success status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSuccess {
    pub url: String,
    pub method: String,
    pub status: u16,
    pub duration_ms: u64,
}

/// A request attempt that failed.
///
/// `status` is present only when the server answered with a non-success code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiFailure {
    pub url: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub error: String,
    pub duration_ms: u64,
}

/// Severity of a user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyLevel {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl NotifyLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Event
// ============================================================================

/// Everything that can be published on the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// An API request attempt succeeded.
    ApiSuccess(ApiSuccess),
    /// An API request attempt failed (emitted once per attempt, retries included).
    ApiError(ApiFailure),
    /// Foundational modules are loaded and configuration is merged.
    AppInitialized { modules: Vec<String> },
    /// Core initialization failed and the fallback capability set is active.
    AppFallback { reason: String },
    /// An optional feature bundle was detected and instantiated.
    FeatureLoaded { feature: String },
    /// An optional feature bundle failed; the rest of boot continued.
    FeatureFailed { feature: String, error: String },
    /// A user-facing notification raised through the `ui` module.
    Notify { level: NotifyLevel, message: String },
    /// A panic intercepted by the global hook.
    UncaughtError {
        message: String,
        location: Option<String>,
    },
    /// A background task finished with an error nobody awaited.
    UnhandledRejection { task: String, message: String },
    /// A consumer-defined event.
    Custom { name: String, data: Value },
}

impl Event {
    /// The bus key this event is delivered under.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::ApiSuccess(_) => names::API_SUCCESS,
            Self::ApiError(_) => names::API_ERROR,
            Self::AppInitialized { .. } => names::APP_INITIALIZED,
            Self::AppFallback { .. } => names::APP_FALLBACK,
            Self::FeatureLoaded { .. } => names::FEATURE_LOADED,
            Self::FeatureFailed { .. } => names::FEATURE_FAILED,
            Self::Notify { .. } => names::NOTIFY,
            Self::UncaughtError { .. } => names::UNCAUGHT_ERROR,
            Self::UnhandledRejection { .. } => names::UNHANDLED_REJECTION,
            Self::Custom { name, .. } => name,
        }
    }

    /// Convenience constructor for consumer events.
    #[must_use]
    pub fn custom(name: impl Into<String>, data: Value) -> Self {
        Self::Custom {
            name: name.into(),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_events_use_stable_names() {
        let ok = Event::ApiSuccess(ApiSuccess {
            url: "http://localhost/api/regions".into(),
            method: "GET".into(),
            status: 200,
            duration_ms: 3,
        });
        assert_eq!(ok.name(), "api:success");
        assert_eq!(
            Event::AppFallback {
                reason: "boom".into()
            }
            .name(),
            "app:fallback"
        );
    }

    #[test]
    fn custom_event_uses_its_own_name() {
        let event = Event::custom("gallery:opened", serde_json::json!({ "id": 7 }));
        assert_eq!(event.name(), "gallery:opened");
    }

    #[test]
    fn api_failure_omits_missing_status() {
        let failure = ApiFailure {
            url: "http://localhost/x".into(),
            method: "GET".into(),
            status: None,
            error: "timed out".into(),
            duration_ms: 50,
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert!(json.get("status").is_none());
    }

    #[test]
    fn notify_level_display() {
        assert_eq!(NotifyLevel::Warning.to_string(), "warning");
        assert_eq!(NotifyLevel::default(), NotifyLevel::Info);
    }
}
