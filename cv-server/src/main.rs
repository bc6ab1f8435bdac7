use std::{env, path::PathBuf};

use cv_server::{AppState, ServerConfig, build_app, init_logging};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = match parse_cli_args() {
        Ok(CliAction::Run(cli)) => cli,
        Ok(CliAction::Help) => {
            print_cli_help();
            return Ok(());
        }
        Ok(CliAction::Version) => {
            println!("{}", binary_version_text());
            return Ok(());
        }
        Err(err) => {
            eprintln!("error: {err}\n");
            print_cli_help();
            return Err(err.into());
        }
    };

    init_logging()?;
    info!("{}", binary_version_text());

    let config = ServerConfig::load(cli.config_path.as_deref())?;
    let addr = config.socket_addr()?;
    let state = AppState::new(config)?;
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("script server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Default)]
struct CliArgs {
    config_path: Option<PathBuf>,
}

enum CliAction {
    Run(CliArgs),
    Help,
    Version,
}

fn parse_cli_args() -> Result<CliAction, String> {
    let mut args = env::args().skip(1);
    let mut cli = CliArgs::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(CliAction::Help),
            "-V" | "--version" => return Ok(CliAction::Version),
            "-c" | "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| format!("missing value for {arg}"))?;
                if value.trim().is_empty() {
                    return Err(format!("value for {arg} cannot be empty"));
                }
                cli.config_path = Some(PathBuf::from(value));
            }
            _ => return Err(format!("unknown argument: {arg}")),
        }
    }
    Ok(CliAction::Run(cli))
}

fn print_cli_help() {
    eprintln!(concat!(
        "Usage: cv-server [options]\n\n",
        "Options:\n",
        "  -c, --config <PATH>    Config file (default: ./cv-server.toml if present)\n",
        "  -V, --version          Show version with git metadata\n",
        "  -h, --help             Show this help\n\n",
        "Every setting can be overridden from the environment, e.g.\n",
        "CV__LISTEN_ADDR, CV__PUBLIC_BASE_URL, CV__STATE_PATH, CV__WEATHER__API_KEY.\n"
    ));
}

fn binary_version_text() -> String {
    let binary = env!("CARGO_PKG_NAME");
    let git_tag = option_env!("CV_BUILD_GIT_TAG").unwrap_or("untagged");
    let git_commit = option_env!("CV_BUILD_GIT_COMMIT").unwrap_or("unknown");
    let git_dirty = option_env!("CV_BUILD_GIT_DIRTY").unwrap_or("false");
    let dirty = matches!(git_dirty, "true" | "1" | "yes" | "dirty");

    if dirty {
        format!("{binary} {git_tag} (dirty commit: {git_commit})")
    } else {
        format!("{binary} {git_tag}")
    }
}
