use serde::{Deserialize, Serialize};

use crate::error::RuleError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionKind {
    TimeOfDay,
    Weather,
    Temperature,
}

impl ConditionKind {
    pub const ALL: [ConditionKind; 3] = [
        ConditionKind::TimeOfDay,
        ConditionKind::Weather,
        ConditionKind::Temperature,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConditionKind::TimeOfDay => "TIME_OF_DAY",
            ConditionKind::Weather => "WEATHER",
            ConditionKind::Temperature => "TEMPERATURE",
        }
    }

    pub fn allowed_values(self) -> &'static [&'static str] {
        match self {
            ConditionKind::TimeOfDay => &["MORNING", "AFTERNOON", "EVENING", "NIGHT"],
            ConditionKind::Weather => &["SUNNY", "CLOUDY", "RAINY", "SNOWY"],
            ConditionKind::Temperature => &["BELOW_0C", "0C_TO_15C", "15C_TO_25C", "ABOVE_25C"],
        }
    }

    /// Weather and temperature rules require a geolocation grant and a weather lookup.
    pub fn needs_weather(self) -> bool {
        matches!(self, ConditionKind::Weather | ConditionKind::Temperature)
    }
}

impl std::fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A condition record as stored and exchanged with the dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(alias = "type")]
    pub kind: ConditionKind,
    pub value: String,
    pub variation: String,
}

impl Condition {
    pub fn new(kind: ConditionKind, value: impl Into<String>, variation: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            variation: variation.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn from_value(value: &str) -> Option<Self> {
        match value {
            "MORNING" => Some(TimeOfDay::Morning),
            "AFTERNOON" => Some(TimeOfDay::Afternoon),
            "EVENING" => Some(TimeOfDay::Evening),
            "NIGHT" => Some(TimeOfDay::Night),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeOfDay::Morning => "MORNING",
            TimeOfDay::Afternoon => "AFTERNOON",
            TimeOfDay::Evening => "EVENING",
            TimeOfDay::Night => "NIGHT",
        }
    }

    /// Buckets a local hour of day. Hours outside `0..24` have no bucket.
    pub fn from_hour(hour: u32) -> Option<Self> {
        match hour {
            5..=11 => Some(TimeOfDay::Morning),
            12..=16 => Some(TimeOfDay::Afternoon),
            17..=21 => Some(TimeOfDay::Evening),
            22..=23 | 0..=4 => Some(TimeOfDay::Night),
            _ => None,
        }
    }

    pub fn contains(self, hour: u32) -> bool {
        TimeOfDay::from_hour(hour) == Some(self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WeatherBucket {
    Sunny,
    Cloudy,
    Rainy,
    Snowy,
}

impl WeatherBucket {
    pub fn from_value(value: &str) -> Option<Self> {
        match value {
            "SUNNY" => Some(WeatherBucket::Sunny),
            "CLOUDY" => Some(WeatherBucket::Cloudy),
            "RAINY" => Some(WeatherBucket::Rainy),
            "SNOWY" => Some(WeatherBucket::Snowy),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WeatherBucket::Sunny => "SUNNY",
            WeatherBucket::Cloudy => "CLOUDY",
            WeatherBucket::Rainy => "RAINY",
            WeatherBucket::Snowy => "SNOWY",
        }
    }

    /// Classification reported by the weather provider for this bucket.
    pub fn provider_classification(self) -> &'static str {
        match self {
            WeatherBucket::Sunny => "CLEAR",
            WeatherBucket::Cloudy => "CLOUDS",
            WeatherBucket::Rainy => "RAIN",
            WeatherBucket::Snowy => "SNOW",
        }
    }

    pub fn from_classification(classification: &str) -> Option<Self> {
        match classification {
            "CLEAR" => Some(WeatherBucket::Sunny),
            "CLOUDS" => Some(WeatherBucket::Cloudy),
            "RAIN" => Some(WeatherBucket::Rainy),
            "SNOW" => Some(WeatherBucket::Snowy),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TemperatureBand {
    Below0C,
    From0To15C,
    From15To25C,
    Above25C,
}

impl TemperatureBand {
    pub fn from_value(value: &str) -> Option<Self> {
        match value {
            "BELOW_0C" => Some(TemperatureBand::Below0C),
            "0C_TO_15C" => Some(TemperatureBand::From0To15C),
            "15C_TO_25C" => Some(TemperatureBand::From15To25C),
            "ABOVE_25C" => Some(TemperatureBand::Above25C),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TemperatureBand::Below0C => "BELOW_0C",
            TemperatureBand::From0To15C => "0C_TO_15C",
            TemperatureBand::From15To25C => "15C_TO_25C",
            TemperatureBand::Above25C => "ABOVE_25C",
        }
    }

    /// Half-open Celsius bands. NaN falls in no band.
    pub fn from_celsius(celsius: f64) -> Option<Self> {
        if celsius.is_nan() {
            None
        } else if celsius < 0.0 {
            Some(TemperatureBand::Below0C)
        } else if celsius < 15.0 {
            Some(TemperatureBand::From0To15C)
        } else if celsius < 25.0 {
            Some(TemperatureBand::From15To25C)
        } else {
            Some(TemperatureBand::Above25C)
        }
    }

    pub fn contains(self, celsius: f64) -> bool {
        TemperatureBand::from_celsius(celsius) == Some(self)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Predicate {
    TimeOfDay(TimeOfDay),
    Weather(WeatherBucket),
    Temperature(TemperatureBand),
}

impl Predicate {
    pub fn parse(kind: ConditionKind, value: &str) -> Option<Self> {
        match kind {
            ConditionKind::TimeOfDay => TimeOfDay::from_value(value).map(Predicate::TimeOfDay),
            ConditionKind::Weather => WeatherBucket::from_value(value).map(Predicate::Weather),
            ConditionKind::Temperature => {
                TemperatureBand::from_value(value).map(Predicate::Temperature)
            }
        }
    }

    pub fn kind(&self) -> ConditionKind {
        match self {
            Predicate::TimeOfDay(_) => ConditionKind::TimeOfDay,
            Predicate::Weather(_) => ConditionKind::Weather,
            Predicate::Temperature(_) => ConditionKind::Temperature,
        }
    }

    pub fn value(&self) -> &'static str {
        match self {
            Predicate::TimeOfDay(bucket) => bucket.as_str(),
            Predicate::Weather(bucket) => bucket.as_str(),
            Predicate::Temperature(band) => band.as_str(),
        }
    }
}

/// The typed form of a [`Condition`]: a predicate plus the variation it applies.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rule {
    pub predicate: Predicate,
    pub variation: String,
}

impl Rule {
    pub fn new(predicate: Predicate, variation: impl Into<String>) -> Self {
        Self {
            predicate,
            variation: variation.into(),
        }
    }

    pub fn from_condition(condition: &Condition) -> Result<Self, RuleError> {
        let predicate = Predicate::parse(condition.kind, &condition.value).ok_or_else(|| {
            RuleError::UnrecognizedValue {
                kind: condition.kind,
                value: condition.value.clone(),
            }
        })?;
        if condition.variation.is_empty() {
            return Err(RuleError::EmptyVariation);
        }
        Ok(Rule::new(predicate, condition.variation.clone()))
    }

    pub fn kind(&self) -> ConditionKind {
        self.predicate.kind()
    }
}

impl TryFrom<&Condition> for Rule {
    type Error = RuleError;

    fn try_from(condition: &Condition) -> Result<Self, Self::Error> {
        Rule::from_condition(condition)
    }
}
