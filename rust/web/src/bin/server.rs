//! Standalone game server binary
//!
//! Usage: cargo run -p gambit_web --bin gambit-web-server -- --port 4800

use clap::Parser;
use gambit_ai::ModelKind;
use gambit_web::logging::LogFormat;
use gambit_web::settings::CONFIG_ENV;
use gambit_web::{AppContext, AppSettings, ServerConfig, WebServer};
use std::path::PathBuf;

/// Chess room server: AI games over WebSocket and two-player relay rooms.
#[derive(Debug, Parser)]
#[command(name = "gambit-web-server", version, about)]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind to
    #[arg(short, long, env = "PORT", default_value_t = gambit_web::server::DEFAULT_PORT)]
    port: u16,

    /// TOML settings file (engine defaults)
    #[arg(long, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Default AI model for new rooms (minimax or stockfish)
    #[arg(long)]
    model: Option<ModelKind>,

    /// Path of the UCI search engine executable
    #[arg(long)]
    search_path: Option<PathBuf>,

    /// Default difficulty for new rooms (0-10)
    #[arg(long)]
    level: Option<u8>,

    /// Browser origin allowed by CORS; repeat for several
    #[arg(long = "allow-origin")]
    allowed_origins: Vec<String>,

    /// Log output format (pretty or json)
    #[arg(long, default_value = "pretty")]
    log_format: LogFormat,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let config = ServerConfig::new(self.host.clone(), self.port);
        if self.allowed_origins.is_empty() {
            config
        } else {
            config.with_allowed_origins(self.allowed_origins.iter().cloned())
        }
    }

    /// Settings from file and environment, then command-line overrides.
    fn settings(&self) -> Result<AppSettings, gambit_web::SettingsError> {
        let config_path = self.config.clone();
        let mut settings = AppSettings::load(|key| {
            if key == CONFIG_ENV {
                return config_path
                    .as_ref()
                    .map(|path| path.to_string_lossy().into_owned());
            }
            std::env::var(key).ok()
        })?;

        if let Some(model) = self.model {
            settings.default_model = model;
        }
        if let Some(path) = &self.search_path {
            settings.search_path = path.clone();
        }
        if let Some(level) = self.level {
            settings.default_level = level;
        }

        settings.validate()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    gambit_web::init_logging(args.log_format)?;

    let settings = args.settings()?;
    let config = args.server_config();

    tracing::info!(
        host = %config.host(),
        port = config.port(),
        model = %settings.default_model,
        level = settings.default_level,
        search_path = %settings.search_path.display(),
        "starting gambit web server"
    );

    let context = AppContext::with_settings(config, settings)?;
    let handle = WebServer::from_context(context).start().await?;

    tracing::info!("server running at ws://{}/ws", handle.address());

    tokio::signal::ctrl_c().await?;

    tracing::info!("shutting down server");
    handle.shutdown().await?;
    tracing::info!("server stopped cleanly");

    Ok(())
}
