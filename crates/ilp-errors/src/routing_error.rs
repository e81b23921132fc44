use thiserror::Error;

/// Errors for route resolution and the static route configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RoutingError {
    #[error("no route found for address {0}")]
    NoRoute(String),
    #[error("invalid route prefix {prefix}: {reason}")]
    InvalidPrefix { prefix: String, reason: String },
}
