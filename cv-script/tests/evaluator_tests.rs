use script::{
    Condition, ConditionKind, EvaluationContext, Predicate, Rule, TemperatureBand, TimeOfDay,
    WeatherReading, first_match,
};

fn reading(classification: &str, temperature_celsius: f64) -> WeatherReading {
    WeatherReading {
        classification: classification.to_string(),
        temperature_celsius,
    }
}

#[test]
fn time_windows_are_inclusive_low_exclusive_high() {
    assert_eq!(TimeOfDay::from_hour(5), Some(TimeOfDay::Morning));
    assert_eq!(TimeOfDay::from_hour(4), Some(TimeOfDay::Night));
    assert_eq!(TimeOfDay::from_hour(11), Some(TimeOfDay::Morning));
    assert_eq!(TimeOfDay::from_hour(12), Some(TimeOfDay::Afternoon));
    assert_eq!(TimeOfDay::from_hour(16), Some(TimeOfDay::Afternoon));
    assert_eq!(TimeOfDay::from_hour(17), Some(TimeOfDay::Evening));
    assert_eq!(TimeOfDay::from_hour(21), Some(TimeOfDay::Evening));
    assert_eq!(TimeOfDay::from_hour(22), Some(TimeOfDay::Night));
    assert_eq!(TimeOfDay::from_hour(23), Some(TimeOfDay::Night));
    assert_eq!(TimeOfDay::from_hour(0), Some(TimeOfDay::Night));
    assert_eq!(TimeOfDay::from_hour(24), None);
}

#[test]
fn every_hour_falls_in_exactly_one_window() {
    let windows = [
        TimeOfDay::Morning,
        TimeOfDay::Afternoon,
        TimeOfDay::Evening,
        TimeOfDay::Night,
    ];
    for hour in 0..24 {
        let hits = windows.iter().filter(|window| window.contains(hour)).count();
        assert_eq!(hits, 1, "hour {hour}");
    }
}

#[test]
fn temperature_bands_split_at_zero_fifteen_and_twenty_five() {
    assert_eq!(TemperatureBand::from_celsius(-0.1), Some(TemperatureBand::Below0C));
    assert_eq!(TemperatureBand::from_celsius(0.0), Some(TemperatureBand::From0To15C));
    assert_eq!(TemperatureBand::from_celsius(14.999), Some(TemperatureBand::From0To15C));
    assert_eq!(TemperatureBand::from_celsius(15.0), Some(TemperatureBand::From15To25C));
    assert_eq!(TemperatureBand::from_celsius(24.99), Some(TemperatureBand::From15To25C));
    assert_eq!(TemperatureBand::from_celsius(25.0), Some(TemperatureBand::Above25C));
    assert_eq!(TemperatureBand::from_celsius(f64::NAN), None);
    assert_eq!(TemperatureBand::from_celsius(14.999).map(TemperatureBand::as_str), Some("0C_TO_15C"));
    assert_eq!(TemperatureBand::from_celsius(15.0).map(TemperatureBand::as_str), Some("15C_TO_25C"));
}

#[test]
fn first_match_prefers_input_order_among_same_kind() {
    let rules = [
        Condition::new(ConditionKind::TimeOfDay, "MORNING", "first"),
        Condition::new(ConditionKind::TimeOfDay, "MORNING", "second"),
    ]
    .iter()
    .map(|condition| Rule::from_condition(condition).expect("rule"))
    .collect::<Vec<_>>();
    assert_eq!(first_match(&rules, &EvaluationContext::at_hour(8)), Some("first"));
}

#[test]
fn missing_weather_reading_only_disables_weather_rules() {
    let rules = vec![
        Rule::new(Predicate::Weather(script::WeatherBucket::Sunny), "v-sun"),
        Rule::new(Predicate::TimeOfDay(TimeOfDay::Morning), "v-morning"),
    ];
    assert_eq!(first_match(&rules, &EvaluationContext::at_hour(8)), Some("v-morning"));

    let sunny = reading("CLEAR", 18.0);
    let context = EvaluationContext::at_hour(8).with_weather(&sunny);
    assert_eq!(first_match(&rules, &context), Some("v-sun"));
}

#[test]
fn temperature_rules_use_the_shared_reading() {
    let rules = vec![
        Rule::new(Predicate::Temperature(TemperatureBand::Below0C), "frost"),
        Rule::new(Predicate::Temperature(TemperatureBand::From0To15C), "mild"),
    ];
    let cold = reading("SNOW", -4.0);
    let cool = reading("CLOUDS", 9.5);
    assert_eq!(
        first_match(&rules, &EvaluationContext::at_hour(3).with_weather(&cold)),
        Some("frost")
    );
    assert_eq!(
        first_match(&rules, &EvaluationContext::at_hour(3).with_weather(&cool)),
        Some("mild")
    );
}
