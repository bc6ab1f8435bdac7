//! Server-side evaluation of rules. The generated script applies the same
//! semantics in the browser; these functions back previews and tests.

use serde::{Deserialize, Serialize};

use crate::condition::{Predicate, Rule, TemperatureBand, WeatherBucket};

/// A weather lookup result, in the shape the weather endpoint returns it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    #[serde(rename = "weather")]
    pub classification: String,
    #[serde(rename = "temperature")]
    pub temperature_celsius: f64,
}

#[derive(Clone, Copy, Debug)]
pub struct EvaluationContext<'a> {
    /// Local hour of day, `0..24`.
    pub hour: u32,
    /// `None` when geolocation or the weather lookup failed.
    pub weather: Option<&'a WeatherReading>,
}

impl<'a> EvaluationContext<'a> {
    pub fn at_hour(hour: u32) -> Self {
        Self {
            hour,
            weather: None,
        }
    }

    pub fn with_weather(mut self, reading: &'a WeatherReading) -> Self {
        self.weather = Some(reading);
        self
    }
}

impl Predicate {
    pub fn matches(&self, context: &EvaluationContext<'_>) -> bool {
        match self {
            Predicate::TimeOfDay(bucket) => bucket.contains(context.hour),
            Predicate::Weather(bucket) => context.weather.is_some_and(|reading| {
                WeatherBucket::from_classification(&reading.classification) == Some(*bucket)
            }),
            Predicate::Temperature(band) => context
                .weather
                .is_some_and(|reading| band.contains(reading.temperature_celsius)),
        }
    }
}

impl Rule {
    /// The rule's variation when it matches, `None` otherwise.
    pub fn evaluate(&self, context: &EvaluationContext<'_>) -> Option<&str> {
        (self.predicate.matches(context) && !self.variation.is_empty())
            .then_some(self.variation.as_str())
    }
}

/// First variation in rule order whose predicate matches.
pub fn first_match<'r, I>(rules: I, context: &EvaluationContext<'_>) -> Option<&'r str>
where
    I: IntoIterator<Item = &'r Rule>,
{
    rules.into_iter().find_map(|rule| rule.evaluate(context))
}

impl TemperatureBand {
    pub fn of_reading(reading: &WeatherReading) -> Option<Self> {
        TemperatureBand::from_celsius(reading.temperature_celsius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::TimeOfDay;

    fn reading(classification: &str, temperature_celsius: f64) -> WeatherReading {
        WeatherReading {
            classification: classification.to_string(),
            temperature_celsius,
        }
    }

    #[test]
    fn weather_rules_need_a_reading() {
        let rule = Rule::new(Predicate::Weather(WeatherBucket::Sunny), "sun");
        assert_eq!(rule.evaluate(&EvaluationContext::at_hour(9)), None);

        let clear = reading("CLEAR", 20.0);
        let context = EvaluationContext::at_hour(9).with_weather(&clear);
        assert_eq!(rule.evaluate(&context), Some("sun"));

        let rain = reading("RAIN", 20.0);
        let context = EvaluationContext::at_hour(9).with_weather(&rain);
        assert_eq!(rule.evaluate(&context), None);
    }

    #[test]
    fn first_match_follows_rule_order() {
        let rules = vec![
            Rule::new(Predicate::Temperature(TemperatureBand::Above25C), "hot"),
            Rule::new(Predicate::TimeOfDay(TimeOfDay::Evening), "evening-a"),
            Rule::new(Predicate::TimeOfDay(TimeOfDay::Evening), "evening-b"),
        ];
        assert_eq!(first_match(&rules, &EvaluationContext::at_hour(18)), Some("evening-a"));

        let heat = reading("CLEAR", 31.0);
        let context = EvaluationContext::at_hour(18).with_weather(&heat);
        assert_eq!(first_match(&rules, &context), Some("hot"));
        assert_eq!(first_match(&rules, &EvaluationContext::at_hour(8)), None);
    }

    #[test]
    fn reading_decodes_from_weather_endpoint_shape() {
        let decoded: WeatherReading =
            serde_json::from_str(r#"{"weather":"SNOW","temperature":-3.5}"#).expect("decode");
        assert_eq!(decoded, reading("SNOW", -3.5));
        assert_eq!(TemperatureBand::of_reading(&decoded), Some(TemperatureBand::Below0C));
    }
}
