use thiserror::Error;

/// Errors raised while loading or validating a [`crate::config::ControllerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse controller config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("`{field}` must be finite and positive, got {value}")]
    NotPositive { field: &'static str, value: f32 },
    #[error("`{field}` must be finite and non-negative, got {value}")]
    Negative { field: &'static str, value: f32 },
    #[error("`slope_limit` must lie within [0, 90] degrees, got {0}")]
    SlopeLimit(f32),
    #[error("gravity direction must be a finite non-zero vector")]
    DegenerateGravity,
    #[error("glide curve needs at least one key")]
    EmptyGlideCurve,
    #[error("`{0}` must be at least 1")]
    ZeroCount(&'static str),
}
