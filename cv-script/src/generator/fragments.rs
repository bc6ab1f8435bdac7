// JavaScript emitted into every generated script. Fragments are written at one
// level of indentation inside the wrapping IIFE.

pub(super) const PRELUDE: &str = r#"(function () {
  "use strict";"#;

pub(super) const EPILOGUE: &str = r#"  var session = createSession();
  window[SESSION_GLOBAL] = session;
  session.start();
})();"#;

pub(super) const DOMAIN_GUARD: &str = r#"  function globToRegExp(pattern) {
    var escaped = String(pattern).replace(/[.+?^${}()|[\]\\]/g, "\\$&");
    return new RegExp("^" + escaped.replace(/\*/g, ".*") + "$");
  }

  function isAllowed(hostname, patterns) {
    if (patterns.length === 0) {
      return true;
    }
    return patterns.some(function (pattern) {
      return globToRegExp(pattern).test(hostname);
    });
  }

  if (!isAllowed(window.location.hostname, ALLOWED_DOMAINS)) {
    console.error("This script is not authorized to run on this domain.");
    return;
  }"#;

pub(super) const TIME_EVALUATOR: &str = r#"  function checkTime(value, variation) {
    var hour = new Date().getHours();
    switch (value) {
      case "MORNING":
        return hour >= 5 && hour < 12 ? variation : "";
      case "AFTERNOON":
        return hour >= 12 && hour < 17 ? variation : "";
      case "EVENING":
        return hour >= 17 && hour < 22 ? variation : "";
      case "NIGHT":
        return hour >= 22 || hour < 5 ? variation : "";
      default:
        return "";
    }
  }"#;

pub(super) const WEATHER_LOOKUP: &str = r#"  function currentPosition() {
    return new Promise(function (resolve, reject) {
      if (typeof navigator === "undefined" || !navigator.geolocation) {
        reject(new Error("geolocation is unavailable"));
        return;
      }
      navigator.geolocation.getCurrentPosition(resolve, reject);
    });
  }

  async function fetchWeather() {
    var position = await currentPosition();
    var separator = WEATHER_ENDPOINT.indexOf("?") === -1 ? "?" : "&";
    var url = WEATHER_ENDPOINT + separator +
      "lat=" + encodeURIComponent(position.coords.latitude) +
      "&lon=" + encodeURIComponent(position.coords.longitude);
    var response = await fetch(url);
    if (!response.ok) {
      throw new Error("weather endpoint responded with status " + response.status);
    }
    return response.json();
  }

  function readWeather(cycle) {
    if (!cycle.weather) {
      cycle.weather = fetchWeather();
    }
    return cycle.weather;
  }"#;

pub(super) const WEATHER_EVALUATOR: &str = r#"  async function checkWeather(cycle, value, variation) {
    try {
      var reading = await readWeather(cycle);
      switch (value) {
        case "SUNNY":
          return reading.weather === "CLEAR" ? variation : "";
        case "CLOUDY":
          return reading.weather === "CLOUDS" ? variation : "";
        case "RAINY":
          return reading.weather === "RAIN" ? variation : "";
        case "SNOWY":
          return reading.weather === "SNOW" ? variation : "";
        default:
          return "";
      }
    } catch (error) {
      console.error("Weather check failed:", error);
      return "";
    }
  }"#;

pub(super) const TEMPERATURE_EVALUATOR: &str = r#"  async function checkTemperature(cycle, value, variation) {
    try {
      var reading = await readWeather(cycle);
      var temperature = reading.temperature;
      if (typeof temperature !== "number" || isNaN(temperature)) {
        return "";
      }
      switch (value) {
        case "BELOW_0C":
          return temperature < 0 ? variation : "";
        case "0C_TO_15C":
          return temperature >= 0 && temperature < 15 ? variation : "";
        case "15C_TO_25C":
          return temperature >= 15 && temperature < 25 ? variation : "";
        case "ABOVE_25C":
          return temperature >= 25 ? variation : "";
        default:
          return "";
      }
    } catch (error) {
      console.error("Temperature check failed:", error);
      return "";
    }
  }"#;

pub(super) const DISPATCH_OPEN: &str = r#"  function evaluate(cycle, condition) {
    switch (condition.kind) {"#;

pub(super) const DISPATCH_TIME: &str = r#"      case "TIME_OF_DAY":
        return checkTime(condition.value, condition.variation);"#;

pub(super) const DISPATCH_WEATHER: &str = r#"      case "WEATHER":
        return checkWeather(cycle, condition.value, condition.variation);"#;

pub(super) const DISPATCH_TEMPERATURE: &str = r#"      case "TEMPERATURE":
        return checkTemperature(cycle, condition.value, condition.variation);"#;

pub(super) const DISPATCH_CLOSE: &str = r#"      default:
        return "";
    }
  }"#;

pub(super) const ORCHESTRATION: &str = r#"  function settle(cycle, condition) {
    return new Promise(function (resolve) {
      resolve(evaluate(cycle, condition));
    }).then(function (result) {
      return typeof result === "string" ? result : "";
    }, function (error) {
      console.error("Condition check failed:", error);
      return "";
    });
  }

  function applyVariation(variation) {
    var url = new URL(window.location.href);
    url.searchParams.set("variation", variation);
    window.history.replaceState(window.history.state, "", url.toString());
  }

  async function checkAllConditions() {
    var cycle = {};
    var results = await Promise.all(CONDITIONS.map(function (condition) {
      return settle(cycle, condition);
    }));
    var variation = results.find(function (result) {
      return result !== "";
    });
    if (!variation) {
      return "";
    }
    applyVariation(variation);
    return variation;
  }"#;

pub(super) const SESSION: &str = r#"  function createSession() {
    var timer = null;
    var inFlight = null;

    function refresh() {
      if (inFlight) {
        return inFlight;
      }
      inFlight = checkAllConditions().catch(function (error) {
        console.error("Variation refresh failed:", error);
        return "";
      }).then(function (variation) {
        inFlight = null;
        return variation;
      });
      return inFlight;
    }

    return {
      start: function () {
        if (timer !== null) {
          return;
        }
        refresh();
        timer = setInterval(refresh, REFRESH_INTERVAL_MS);
      },
      stop: function () {
        if (timer === null) {
          return;
        }
        clearInterval(timer);
        timer = null;
      },
      refresh: refresh,
      isRunning: function () {
        return timer !== null;
      }
    };
  }"#;
