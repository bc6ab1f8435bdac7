use crate::condition::ConditionKind;

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("too many conditions: {count} (limit {limit})")]
    TooManyConditions { count: usize, limit: usize },
    #[error("too many allowed domains: {count} (limit {limit})")]
    TooManyDomains { count: usize, limit: usize },
    #[error("refresh interval must be at least 1000ms, got {0}ms")]
    InvalidRefreshInterval(u64),
    #[error("weather endpoint is required when weather or temperature conditions are present")]
    MissingWeatherEndpoint,
    #[error("session global name cannot be empty")]
    InvalidSessionGlobal,
    #[error("failed to encode script data: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("unrecognized {kind} value {value:?}, expected one of: {}", .kind.allowed_values().join(", "))]
    UnrecognizedValue { kind: ConditionKind, value: String },
    #[error("variation cannot be empty")]
    EmptyVariation,
}
