use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

use config::{Config, Environment, File};
use script::GeneratorOptions;
use serde::{Deserialize, Deserializer};
use tracing::info;
use url::Url;

/// Looked up in the working directory when no `--config` path is given.
pub const DEFAULT_CONFIG_NAME: &str = "cv-server";
pub const ENV_PREFIX: &str = "CV";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid listen_addr `{0}`")]
    ListenAddr(String),
    #[error("invalid {field} `{value}`: {source}")]
    Url {
        field: &'static str,
        value: String,
        source: url::ParseError,
    },
    #[error("script.refresh_interval_ms must be at least 1000, got {0}")]
    RefreshInterval(u64),
    #[error("script.session_global cannot be empty")]
    SessionGlobal,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Origin the embed code and the script's weather endpoint point at.
    pub public_base_url: String,
    /// Snapshot file; an empty value disables persistence.
    #[serde(deserialize_with = "empty_path_as_none")]
    pub state_path: Option<PathBuf>,
    pub weather: WeatherConfig,
    pub script: ScriptConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_key: String,
    pub api_base_url: String,
    pub request_timeout_ms: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    pub refresh_interval_ms: u64,
    pub session_global: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            public_base_url: "http://localhost:3000".to_string(),
            state_path: Some(PathBuf::from(".cv-server/state.json")),
            weather: WeatherConfig::default(),
            script: ScriptConfig::default(),
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base_url: "https://api.openweathermap.org/data/2.5/weather".to_string(),
            request_timeout_ms: 5_000,
        }
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        let options = GeneratorOptions::default();
        Self {
            refresh_interval_ms: options.refresh_interval_ms,
            session_global: options.session_global,
        }
    }
}

impl ServerConfig {
    /// Layers an optional file under `CV__*` environment variables, e.g.
    /// `CV__WEATHER__API_KEY` sets `weather.api_key`. An explicit `path` must
    /// exist; the default `cv-server.{toml,json,yaml}` may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => {
                info!("loading config from {}", path.display());
                File::from(path).required(true)
            }
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };
        let config = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        parse_url("public_base_url", &self.public_base_url)?;
        parse_url("weather.api_base_url", &self.weather.api_base_url)?;
        if self.script.refresh_interval_ms < 1_000 {
            return Err(ConfigError::RefreshInterval(self.script.refresh_interval_ms));
        }
        if self.script.session_global.trim().is_empty() {
            return Err(ConfigError::SessionGlobal);
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_addr
            .trim()
            .parse()
            .map_err(|_| ConfigError::ListenAddr(self.listen_addr.clone()))
    }

    pub fn script_url(&self, project_id: &str) -> String {
        format!("{}/api/scripts/{project_id}", self.base_url())
    }

    pub fn generator_options(&self) -> GeneratorOptions {
        GeneratorOptions {
            weather_endpoint: format!("{}/api/weather", self.base_url()),
            refresh_interval_ms: self.script.refresh_interval_ms,
            session_global: self.script.session_global.clone(),
        }
    }

    fn base_url(&self) -> &str {
        self.public_base_url.trim().trim_end_matches('/')
    }
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|source| ConfigError::Url {
        field,
        value: value.to_string(),
        source,
    })
}

fn empty_path_as_none<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write_config(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "cv-server-config-{}-{name}.toml",
            std::process::id()
        ));
        fs::write(&path, body).expect("write config");
        path
    }

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(
            config.generator_options().weather_endpoint,
            "http://localhost:3000/api/weather"
        );
    }

    #[test]
    fn file_values_override_defaults() {
        let path = write_config(
            "override",
            r#"
listen_addr = "127.0.0.1:8088"
public_base_url = "https://cv.example.net/"
state_path = ""

[weather]
api_key = "secret"

[script]
refresh_interval_ms = 60000
"#,
        );
        let config = ServerConfig::load(Some(&path)).expect("config loads");
        let _ = fs::remove_file(&path);

        assert_eq!(config.socket_addr().expect("addr").port(), 8088);
        assert_eq!(config.state_path, None);
        assert_eq!(config.weather.api_key, "secret");
        assert_eq!(config.weather.request_timeout_ms, 5_000);
        assert_eq!(config.script.session_global, "conditionalVariations");
        assert_eq!(
            config.script_url("p-1"),
            "https://cv.example.net/api/scripts/p-1"
        );
        assert_eq!(config.generator_options().refresh_interval_ms, 60_000);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join("cv-server-config-does-not-exist.toml");
        assert!(matches!(
            ServerConfig::load(Some(&path)),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn rejects_bad_values() {
        let config = ServerConfig {
            listen_addr: "not-an-addr".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ListenAddr(_))));

        let mut config = ServerConfig::default();
        config.script.refresh_interval_ms = 10;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RefreshInterval(10))
        ));

        let config = ServerConfig {
            public_base_url: "localhost".to_string(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Url {
                field: "public_base_url",
                ..
            })
        ));
    }
}
