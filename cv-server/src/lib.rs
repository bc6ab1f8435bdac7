mod config;
mod logging;
mod server;
mod state;
mod store;
mod weather;

pub use crate::config::{ConfigError, ScriptConfig, ServerConfig, WeatherConfig};
pub use logging::init as init_logging;
pub use server::build_app;
pub use state::AppState;
pub use store::PersistError;
pub use weather::{WeatherClient, WeatherError};
