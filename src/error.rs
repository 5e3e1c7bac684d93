//! Error taxonomy for the connection facade and tool handlers.

use thiserror::Error;

use crate::api::ApiError;

/// Failure of a facade operation or tool handler.
///
/// The "missing layer" variants form a hierarchy following the connection
/// chain: application → project manager → project → media pool / timeline.
/// A deeper accessor always reports the shallowest missing layer.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum ResolveError {
    /// The application handle (or its project manager) is unavailable
    #[error("{0}")]
    NotConnected(String),
    /// No project is currently open
    #[error("No project currently open")]
    NoProject,
    /// The open project has no current timeline
    #[error("No timeline currently active")]
    NoTimeline,
    /// The open project's media pool is unavailable
    #[error("Failed to get Media Pool")]
    NoMediaPool,
    /// No media pool clip with this name
    #[error("Clip '{0}' not found")]
    ClipNotFound(String),
    /// No item in the current timeline with this unique id
    #[error("Timeline item with ID '{0}' not found")]
    TimelineItemNotFound(String),
    /// A named timeline, folder, album or project lookup found nothing
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
    /// Value outside an enumerated domain
    #[error("Invalid value for '{param}'{}", valid_suffix(.valid_values))]
    InvalidParameter { param: String, valid_values: Vec<String> },
    /// Value rejected by a parameter rule
    #[error("Invalid value for parameter '{param}': {value}")]
    InvalidValue { param: String, value: String },
    /// The external application reported a failure
    #[error(transparent)]
    Api(#[from] ApiError),
}

fn valid_suffix(valid_values: &[String]) -> String {
    if valid_values.is_empty() {
        String::new()
    } else {
        format!(". Must be one of: {}", valid_values.join(", "))
    }
}

impl ResolveError {
    pub fn not_connected() -> Self {
        Self::NotConnected("Not connected to DaVinci Resolve".to_string())
    }

    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound { kind, name: name.into() }
    }

    pub fn invalid_parameter<S: ToString>(param: impl Into<String>, valid_values: &[S]) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            valid_values: valid_values.iter().map(ToString::to_string).collect(),
        }
    }

    /// True for the connection-chain conditions (not connected, no project,
    /// no timeline, no media pool).
    pub fn is_missing_layer(&self) -> bool {
        matches!(self, Self::NotConnected(_) | Self::NoProject | Self::NoTimeline | Self::NoMediaPool)
    }

    /// Stable machine-readable name of the condition.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConnected(_) => "not_connected",
            Self::NoProject => "no_project",
            Self::NoTimeline => "no_timeline",
            Self::NoMediaPool => "no_media_pool",
            Self::ClipNotFound(_) => "clip_not_found",
            Self::TimelineItemNotFound(_) => "timeline_item_not_found",
            Self::NotFound { .. } => "not_found",
            Self::InvalidParameter { .. } | Self::InvalidValue { .. } => "invalid_parameter",
            Self::Api(_) => "api_error",
        }
    }
}

pub type Result<T, E = ResolveError> = std::result::Result<T, E>;
