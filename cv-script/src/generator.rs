use serde::Serialize;
use tracing::debug;

use crate::{
    condition::{Condition, ConditionKind, Rule},
    error::GenerateError,
};

mod fragments;

pub const MAX_CONDITIONS: usize = 256;
pub const MAX_ALLOWED_DOMAINS: usize = 256;
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 5 * 60 * 1000;
pub const DEFAULT_WEATHER_ENDPOINT: &str = "/api/weather";
pub const DEFAULT_SESSION_GLOBAL: &str = "conditionalVariations";
const MIN_REFRESH_INTERVAL_MS: u64 = 1_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// URL the script queries with `lat`/`lon` for weather and temperature rules.
    pub weather_endpoint: String,
    pub refresh_interval_ms: u64,
    /// `window` property the session object is published under.
    pub session_global: String,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            weather_endpoint: DEFAULT_WEATHER_ENDPOINT.to_string(),
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            session_global: DEFAULT_SESSION_GLOBAL.to_string(),
        }
    }
}

/// Everything the generator needs for one project, resolved together.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProjectBundle {
    pub conditions: Vec<Condition>,
    pub allowed_domains: Vec<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ScriptGenerator {
    options: GeneratorOptions,
}

#[derive(Serialize)]
struct EmittedCondition<'a> {
    kind: &'static str,
    value: &'static str,
    variation: &'a str,
}

/// Generates a script with [`GeneratorOptions::default`].
pub fn generate(
    conditions: &[Condition],
    allowed_domains: &[String],
) -> Result<String, GenerateError> {
    ScriptGenerator::default().generate(conditions, allowed_domains)
}

impl ScriptGenerator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    pub fn generate_bundle(&self, bundle: &ProjectBundle) -> Result<String, GenerateError> {
        self.generate(&bundle.conditions, &bundle.allowed_domains)
    }

    pub fn generate(
        &self,
        conditions: &[Condition],
        allowed_domains: &[String],
    ) -> Result<String, GenerateError> {
        if conditions.len() > MAX_CONDITIONS {
            return Err(GenerateError::TooManyConditions {
                count: conditions.len(),
                limit: MAX_CONDITIONS,
            });
        }
        if allowed_domains.len() > MAX_ALLOWED_DOMAINS {
            return Err(GenerateError::TooManyDomains {
                count: allowed_domains.len(),
                limit: MAX_ALLOWED_DOMAINS,
            });
        }
        if self.options.refresh_interval_ms < MIN_REFRESH_INTERVAL_MS {
            return Err(GenerateError::InvalidRefreshInterval(
                self.options.refresh_interval_ms,
            ));
        }
        if self.options.session_global.trim().is_empty() {
            return Err(GenerateError::InvalidSessionGlobal);
        }

        let rules = resolve_rules(conditions);
        let has_kind = |kind: ConditionKind| rules.iter().any(|rule| rule.kind() == kind);
        let needs_time = has_kind(ConditionKind::TimeOfDay);
        let needs_weather = has_kind(ConditionKind::Weather);
        let needs_temperature = has_kind(ConditionKind::Temperature);
        let needs_lookup = needs_weather || needs_temperature;
        if needs_lookup && self.options.weather_endpoint.trim().is_empty() {
            return Err(GenerateError::MissingWeatherEndpoint);
        }

        let emitted = rules
            .iter()
            .map(|rule| EmittedCondition {
                kind: rule.kind().as_str(),
                value: rule.predicate.value(),
                variation: rule.variation.as_str(),
            })
            .collect::<Vec<_>>();

        let mut lines = vec![fragments::PRELUDE.to_string()];
        lines.push(format!("  var ALLOWED_DOMAINS = {};", js_literal(&allowed_domains)?));
        lines.push(format!("  var CONDITIONS = {};", js_literal(&emitted)?));
        lines.push(format!(
            "  var REFRESH_INTERVAL_MS = {};",
            self.options.refresh_interval_ms
        ));
        lines.push(format!(
            "  var SESSION_GLOBAL = {};",
            js_literal(&self.options.session_global)?
        ));
        if needs_lookup {
            lines.push(format!(
                "  var WEATHER_ENDPOINT = {};",
                js_literal(&self.options.weather_endpoint)?
            ));
        }
        lines.push(String::new());
        lines.push(fragments::DOMAIN_GUARD.to_string());

        if needs_time {
            lines.push(String::new());
            lines.push(fragments::TIME_EVALUATOR.to_string());
        }
        if needs_lookup {
            lines.push(String::new());
            lines.push(fragments::WEATHER_LOOKUP.to_string());
        }
        if needs_weather {
            lines.push(String::new());
            lines.push(fragments::WEATHER_EVALUATOR.to_string());
        }
        if needs_temperature {
            lines.push(String::new());
            lines.push(fragments::TEMPERATURE_EVALUATOR.to_string());
        }

        lines.push(String::new());
        lines.push(fragments::DISPATCH_OPEN.to_string());
        if needs_time {
            lines.push(fragments::DISPATCH_TIME.to_string());
        }
        if needs_weather {
            lines.push(fragments::DISPATCH_WEATHER.to_string());
        }
        if needs_temperature {
            lines.push(fragments::DISPATCH_TEMPERATURE.to_string());
        }
        lines.push(fragments::DISPATCH_CLOSE.to_string());

        lines.push(String::new());
        lines.push(fragments::ORCHESTRATION.to_string());
        lines.push(String::new());
        lines.push(fragments::SESSION.to_string());
        lines.push(String::new());
        lines.push(fragments::EPILOGUE.to_string());
        lines.push(String::new());

        Ok(join_lines(&lines))
    }
}

// Conditions that can never match are dropped here; input order is kept.
fn resolve_rules(conditions: &[Condition]) -> Vec<Rule> {
    conditions
        .iter()
        .enumerate()
        .filter_map(|(index, condition)| match Rule::from_condition(condition) {
            Ok(rule) => Some(rule),
            Err(err) => {
                debug!("condition index={index} never matches: {err}");
                None
            }
        })
        .collect()
}

fn join_lines(lines: &[String]) -> String {
    lines.join("\n")
}

/// JSON is valid JavaScript once the two line separators JSON permits inside
/// strings are escaped. `</` is broken up so an inlined copy cannot close a
/// surrounding `<script>` element.
fn js_literal<T: Serialize + ?Sized>(value: &T) -> Result<String, GenerateError> {
    let json = serde_json::to_string(value)?;
    Ok(json
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029")
        .replace("</", "<\\/"))
}
