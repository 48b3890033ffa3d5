use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use fieldlex::{AppState, router};
use lexicon_db::Lexicon;
use lexicon_fdo::{Session, SessionConfig};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_LEXICON: &str = "lexicon.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = load_config();
    info!("binding to {}:{}", config.host, config.port);
    info!(
        "homograph cap {}, gloss limit {} characters",
        config.session.homograph_cap, config.session.max_gloss_len
    );
    if config.read_only {
        info!("serving read-only");
    }

    let start = Instant::now();
    let lexicon = if config.lexicon_path.exists() {
        let lexicon = Lexicon::load(&config.lexicon_path)?;
        info!(
            "loaded {} objects from {} in {} ms",
            lexicon.object_count(),
            config.lexicon_path.display(),
            start.elapsed().as_millis()
        );
        lexicon
    } else {
        info!(
            "{} not found; starting with an empty lexicon",
            config.lexicon_path.display()
        );
        Lexicon::new()
    };

    let state = AppState {
        session: Arc::new(Mutex::new(Session::new(lexicon, config.session))),
        snapshot_path: Some(config.lexicon_path.clone()),
        read_only: config.read_only,
    };

    let app = router(state).layer(TraceLayer::new_for_http());
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.host, config.port))?;
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Clone)]
struct Config {
    host: String,
    port: u16,
    lexicon_path: PathBuf,
    read_only: bool,
    session: SessionConfig,
}

fn load_config() -> Config {
    let mut read_only = false;
    let mut cli_lexicon: Option<PathBuf> = None;
    let mut args = env::args().skip(1).peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--read-only" => read_only = true,
            "--lexicon" => {
                if let Some(path) = args.next() {
                    cli_lexicon = Some(PathBuf::from(path));
                }
            }
            _ => {
                if let Some(path) = arg.strip_prefix("--lexicon=") {
                    cli_lexicon = Some(PathBuf::from(path));
                }
            }
        }
    }

    let host = env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let lexicon_path = cli_lexicon
        .or_else(|| env::var("LEXICON_PATH").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LEXICON));

    let defaults = SessionConfig::default();
    let homograph_cap = env::var("HOMOGRAPH_CAP")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(defaults.homograph_cap);
    let max_gloss_len = env::var("MAX_GLOSS_LEN")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(defaults.max_gloss_len);

    Config {
        host,
        port,
        lexicon_path,
        read_only,
        session: SessionConfig {
            homograph_cap,
            max_gloss_len,
        },
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .init();
}
