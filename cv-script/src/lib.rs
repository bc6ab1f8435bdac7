pub mod condition;
pub mod domain;
pub mod error;
pub mod evaluate;
pub mod generator;

pub use condition::{
    Condition, ConditionKind, Predicate, Rule, TemperatureBand, TimeOfDay, WeatherBucket,
};
pub use domain::{DomainPattern, glob_to_regex, is_allowed, is_valid_domain_pattern};
pub use error::{GenerateError, RuleError};
pub use evaluate::{EvaluationContext, WeatherReading, first_match};
pub use generator::{
    DEFAULT_REFRESH_INTERVAL_MS, DEFAULT_SESSION_GLOBAL, DEFAULT_WEATHER_ENDPOINT,
    GeneratorOptions, MAX_ALLOWED_DOMAINS, MAX_CONDITIONS, ProjectBundle, ScriptGenerator,
    generate,
};
