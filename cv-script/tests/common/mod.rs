#![allow(dead_code, unused_imports)]

use std::rc::Rc;

use boa_engine::{Context, Source, job::SimpleJobQueue};

pub use script::{
    Condition, ConditionKind, EvaluationContext, GeneratorOptions, Rule, ScriptGenerator,
    WeatherReading, first_match, generate, is_allowed,
};

// Minimal browser surface used by generated scripts: location, history, URL,
// console, interval timers, a Date with a controllable hour, geolocation and
// fetch. Everything the script does is recorded on `__`-prefixed globals.
const BOOTSTRAP_ENV: &str = r##"
globalThis.window = globalThis;
globalThis.__log = { log: [], warn: [], error: [] };
globalThis.__format = function (args) {
  return Array.prototype.map.call(args, function (item) {
    if (item !== null && typeof item === "object" && "message" in item) {
      return String(item.message);
    }
    return String(item);
  }).join(" ");
};
globalThis.console = {
  log: function () { __log.log.push(__format(arguments)); },
  warn: function () { __log.warn.push(__format(arguments)); },
  error: function () { __log.error.push(__format(arguments)); }
};
globalThis.__timers = [];
globalThis.setInterval = function (callback, delay) {
  __timers.push({ callback: callback, delay: delay, active: true });
  return __timers.length;
};
globalThis.clearInterval = function (id) {
  var timer = __timers[id - 1];
  if (timer) {
    timer.active = false;
  }
};
globalThis.__fireTimers = function () {
  __timers.forEach(function (timer) {
    if (timer.active) {
      timer.callback();
    }
  });
};
globalThis.URL = function (href) {
  var hashAt = href.indexOf("#");
  var hash = hashAt === -1 ? "" : href.slice(hashAt);
  var rest = hashAt === -1 ? href : href.slice(0, hashAt);
  var queryAt = rest.indexOf("?");
  var base = queryAt === -1 ? rest : rest.slice(0, queryAt);
  var query = queryAt === -1 ? "" : rest.slice(queryAt + 1);
  var pairs = query === "" ? [] : query.split("&").map(function (pair) {
    var eq = pair.indexOf("=");
    return eq === -1 ? [pair, ""] : [pair.slice(0, eq), pair.slice(eq + 1)];
  });
  this.searchParams = {
    set: function (key, value) {
      var encoded = encodeURIComponent(String(value));
      var replaced = false;
      pairs = pairs.filter(function (pair) {
        if (pair[0] !== key) {
          return true;
        }
        if (replaced) {
          return false;
        }
        pair[1] = encoded;
        replaced = true;
        return true;
      });
      if (!replaced) {
        pairs.push([key, encoded]);
      }
    }
  };
  this.toString = function () {
    var search = pairs.map(function (pair) { return pair[0] + "=" + pair[1]; }).join("&");
    return base + (search === "" ? "" : "?" + search) + hash;
  };
};
globalThis.location = { hostname: "", href: "" };
globalThis.__replaced = [];
globalThis.history = {
  state: null,
  replaceState: function (state, title, url) {
    __replaced.push(String(url));
    location.href = String(url);
  }
};
globalThis.__now = { hour: 0 };
globalThis.Date = function () {};
Date.prototype.getHours = function () { return __now.hour; };
globalThis.__geolocationRequests = 0;
globalThis.__fetches = [];
"##;

#[derive(Clone, Debug)]
pub enum Geolocation {
    Granted { latitude: f64, longitude: f64 },
    Denied,
    Unavailable,
}

#[derive(Clone, Debug)]
pub enum WeatherFetch {
    Json(String),
    Status(u16),
    NetworkError,
    Pending,
}

#[derive(Clone, Debug)]
pub struct BrowserEnv {
    pub hostname: String,
    pub href: String,
    pub hour: u32,
    pub geolocation: Geolocation,
    pub fetch: WeatherFetch,
}

impl Default for BrowserEnv {
    fn default() -> Self {
        Self {
            hostname: "example.com".to_string(),
            href: "https://example.com/landing?utm_source=mail".to_string(),
            hour: 8,
            geolocation: Geolocation::Denied,
            fetch: WeatherFetch::NetworkError,
        }
    }
}

impl BrowserEnv {
    pub fn on_host(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            href: format!("https://{hostname}/"),
            ..Self::default()
        }
    }

    pub fn at_hour(mut self, hour: u32) -> Self {
        self.hour = hour;
        self
    }

    pub fn with_weather(mut self, weather: &str, temperature: f64) -> Self {
        self.geolocation = Geolocation::Granted {
            latitude: 52.52,
            longitude: 13.405,
        };
        self.fetch = WeatherFetch::Json(format!(
            r#"{{"weather":{},"temperature":{temperature}}}"#,
            js_string(weather)
        ));
        self
    }

    pub fn with_geolocation(mut self, geolocation: Geolocation) -> Self {
        self.geolocation = geolocation;
        self
    }

    pub fn with_fetch(mut self, fetch: WeatherFetch) -> Self {
        self.fetch = fetch;
        self
    }

    fn bootstrap(&self) -> String {
        let mut lines = vec![
            format!("location.hostname = {};", js_string(&self.hostname)),
            format!("location.href = {};", js_string(&self.href)),
            format!("__now.hour = {};", self.hour),
        ];
        lines.push(match &self.geolocation {
            Geolocation::Granted {
                latitude,
                longitude,
            } => format!(
                "globalThis.navigator = {{ geolocation: {{ getCurrentPosition: function (success) {{ __geolocationRequests++; success({{ coords: {{ latitude: {latitude}, longitude: {longitude} }} }}); }} }} }};"
            ),
            Geolocation::Denied => "globalThis.navigator = { geolocation: { getCurrentPosition: function (success, failure) { __geolocationRequests++; failure({ code: 1, message: \"User denied Geolocation\" }); } } };".to_string(),
            Geolocation::Unavailable => "globalThis.navigator = {};".to_string(),
        });
        let response = match &self.fetch {
            WeatherFetch::Json(body) => format!(
                "return Promise.resolve({{ ok: true, status: 200, json: function () {{ return Promise.resolve({body}); }} }});"
            ),
            WeatherFetch::Status(status) => format!(
                "return Promise.resolve({{ ok: false, status: {status}, json: function () {{ return Promise.resolve({{}}); }} }});"
            ),
            WeatherFetch::NetworkError => {
                "return Promise.reject(new TypeError(\"Failed to fetch\"));".to_string()
            }
            WeatherFetch::Pending => "return new Promise(function () {});".to_string(),
        };
        lines.push(format!(
            "globalThis.fetch = function (url) {{ __fetches.push(String(url)); {response} }};"
        ));
        lines.join("\n")
    }
}

pub struct Browser {
    context: Context,
}

impl Browser {
    pub fn launch(env: &BrowserEnv) -> Self {
        let context = Context::builder()
            .job_queue(Rc::new(SimpleJobQueue::new()))
            .build()
            .expect("context should build");
        let mut browser = Self { context };
        browser.exec(BOOTSTRAP_ENV);
        browser.exec(&env.bootstrap());
        browser
    }

    /// Evaluates `source` and drains the promise job queue.
    pub fn exec(&mut self, source: &str) {
        if let Err(err) = self.context.eval(Source::from_bytes(source.as_bytes())) {
            panic!("script evaluation failed: {err}");
        }
        self.context.run_jobs();
    }

    pub fn eval_string(&mut self, expression: &str) -> String {
        let value = match self.context.eval(Source::from_bytes(expression.as_bytes())) {
            Ok(value) => value,
            Err(err) => panic!("expression evaluation failed: {err}"),
        };
        value
            .to_string(&mut self.context)
            .expect("value should convert to string")
            .to_std_string_escaped()
    }

    pub fn eval_json(&mut self, expression: &str) -> serde_json::Value {
        let text = self.eval_string(&format!("JSON.stringify({expression})"));
        serde_json::from_str(&text).expect("expression should produce json")
    }

    pub fn eval_strings(&mut self, expression: &str) -> Vec<String> {
        serde_json::from_value(self.eval_json(expression)).expect("expression should be strings")
    }

    pub fn replaced_urls(&mut self) -> Vec<String> {
        self.eval_strings("__replaced")
    }

    pub fn location_href(&mut self) -> String {
        self.eval_string("location.href")
    }

    pub fn console_errors(&mut self) -> Vec<String> {
        self.eval_strings("__log.error")
    }

    pub fn fetched_urls(&mut self) -> Vec<String> {
        self.eval_strings("__fetches")
    }

    pub fn geolocation_requests(&mut self) -> u64 {
        self.eval_json("__geolocationRequests")
            .as_u64()
            .expect("counter should be numeric")
    }

    /// Delays of the intervals that are still active.
    pub fn active_intervals(&mut self) -> Vec<u64> {
        serde_json::from_value(self.eval_json(
            "__timers.filter(function (t) { return t.active; }).map(function (t) { return t.delay; })",
        ))
        .expect("delays should be numeric")
    }

    pub fn fire_timers(&mut self) {
        self.exec("__fireTimers();");
    }

    pub fn set_hour(&mut self, hour: u32) {
        self.exec(&format!("__now.hour = {hour};"));
    }

    pub fn has_session(&mut self, name: &str) -> bool {
        self.eval_string(&format!("typeof window[{}]", js_string(name))) == "object"
    }
}

pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).expect("string should encode")
}

pub fn condition(kind: ConditionKind, value: &str, variation: &str) -> Condition {
    Condition::new(kind, value, variation)
}

pub fn domains(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(|pattern| pattern.to_string()).collect()
}

/// Generates a script for `conditions` and runs it in a fresh browser.
pub fn run_generated(conditions: &[Condition], allowed: &[&str], env: &BrowserEnv) -> Browser {
    let script = generate(conditions, &domains(allowed)).expect("script should generate");
    let mut browser = Browser::launch(env);
    browser.exec(&script);
    browser
}
