mod api;
mod auth;
mod config;
mod db;
mod error;
mod models;
mod pipeline;
mod schema;
mod seeding;
mod services;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use axum::Router;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, ServerConfig};
use crate::db::DbPool;
use crate::services::ai::ProviderGateway;
use crate::services::ai_service::AiService;
use crate::services::youtube_service::YoutubeService;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub ai_service: Arc<AiService>,
    pub youtube: Arc<YoutubeService>,
    // Failed login attempts per username: (count, window start)
    pub login_attempts: Arc<RwLock<HashMap<String, (u32, SystemTime)>>>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Result<Self> {
        let gateway = ProviderGateway::new(config.ai.clone())?;
        let youtube = YoutubeService::new(&config.youtube)?;
        Ok(Self {
            db,
            config: Arc::new(config),
            ai_service: Arc::new(AiService::new(gateway)),
            youtube: Arc::new(youtube),
            login_attempts: Arc::new(RwLock::new(HashMap::new())),
        })
    }
}

use clap::Parser;

const DEFAULT_CONFIG_PATH: &str = "server-config.toml";

#[derive(Parser)]
#[command(version, author = "SCRIPTFLOW AUTHORS", about = "Scriptflow Server\nLicensed under AGPLv3\nCreated by SCRIPTFLOW AUTHORS", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Generate a default configuration template to stdout
    #[arg(long)]
    generate_config: bool,
}

/// Interactive first-run setup. Writes `server-config.toml` and returns what
/// it wrote.
fn run_onboarding() -> Result<Config> {
    use crate::config::{AiConfig, DatabaseConfig, HttpsConfig, JwtConfig, LoggingConfig, YoutubeConfig};
    use dialoguer::{theme::ColorfulTheme, Input};

    let theme = ColorfulTheme::default();
    println!("Welcome to Scriptflow Server!");
    println!("No configuration file was found, so let's create one.\n");

    let host: String = Input::with_theme(&theme)
        .with_prompt("Listen address")
        .default("0.0.0.0".to_string())
        .interact_text()?;
    let port: u16 = Input::with_theme(&theme)
        .with_prompt("Listen port")
        .default(8080)
        .interact_text()?;
    let db_url: String = Input::with_theme(&theme)
        .with_prompt("SQLite database")
        .default("sqlite://scriptflow.db".to_string())
        .interact_text()?;
    let referer: String = Input::with_theme(&theme)
        .with_prompt("Public URL (sent to OpenRouter as the referer)")
        .default(format!("http://localhost:{}", port))
        .interact_text()?;

    let config = Config {
        server: ServerConfig {
            host,
            port,
            https: Some(HttpsConfig {
                enabled: false,
                cert_path: "certs/cert.pem".to_string(),
                key_path: "certs/key.pem".to_string(),
            }),
            ui_path: None,
        },
        database: DatabaseConfig { url: db_url },
        jwt: JwtConfig {
            secret: uuid::Uuid::new_v4().to_string(),
            expiration_hours: 24,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
        },
        ai: AiConfig {
            referer,
            ..AiConfig::default()
        },
        youtube: YoutubeConfig::default(),
    };

    std::fs::write(DEFAULT_CONFIG_PATH, toml::to_string_pretty(&config)?)?;
    println!("\nSaved {}\n", DEFAULT_CONFIG_PATH);
    Ok(config)
}

fn load_config(cli: &Cli) -> Result<(Config, String)> {
    let path = cli.config.clone().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    if std::path::Path::new(&path).exists() {
        return Ok((Config::load(&path)?, path));
    }

    // Onboard only when no path was given and someone is at the terminal
    if cli.config.is_none() && console::user_attended() {
        return Ok((run_onboarding()?, path));
    }

    anyhow::bail!(
        "Configuration file '{}' not found. Run with --generate-config to see a template.",
        path
    )
}

fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("scriptflow_server={},tower_http=debug", level).into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn build_app(state: AppState, ui_path: &str) -> Router {
    // Unknown paths fall back to the client's index.html
    let ui = ServeDir::new(ui_path).not_found_service(ServeFile::new(format!("{}/index.html", ui_path)));

    Router::new()
        .nest("/api", api::routes(state.clone()))
        .fallback_service(ui)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn serve(app: Router, server: &ServerConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid host/port: {}", e))?;

    match server.https.as_ref().filter(|h| h.enabled) {
        Some(https) => {
            use axum_server::tls_rustls::RustlsConfig;

            for file in [&https.cert_path, &https.key_path] {
                if !std::path::Path::new(file).exists() {
                    anyhow::bail!("TLS file not found: {}", file);
                }
            }
            let tls = RustlsConfig::from_pem_file(&https.cert_path, &https.key_path).await?;

            tracing::info!("Server listening on {} (HTTPS)", addr);
            axum_server::bind_rustls(addr, tls)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(addr).await?;
            tracing::info!("Server listening on {} (HTTP)", addr);
            axum::serve(listener, app).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.generate_config {
        println!("{}", Config::default_template());
        return Ok(());
    }

    let (config, config_path) = match load_config(&cli) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    init_tracing(&config.logging.level);
    tracing::info!("Loaded configuration from {}", config_path);

    let pool = db::create_pool(&config.database.url)?;
    db::run_migrations(&mut pool.get()?)?;
    seeding::seed_defaults(&pool)?;
    tracing::info!("Database ready at {}", config.database.url);

    let ui_path = config.server.ui_path.clone().unwrap_or_else(|| "static".to_string());
    tracing::info!("Serving UI from {}", ui_path);

    let server = config.server.clone();
    let state = AppState::new(pool, config)?;
    serve(build_app(state, &ui_path), &server).await
}
