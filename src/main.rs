use std::io::Write;
use log::{info, error};
use comment_relay::commentrelay::config::ServerConfig;
use comment_relay::commentrelay::init;

const CONFIG_PATH_VAR: &str = "COMMENT_RELAY_CONFIG";

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}:{}] {} - {}",
                buf.timestamp_millis(),
                record.module_path().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .init();
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_logger();

    info!("Comment relay starting up");

    let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| "config.toml".to_string());
    let config = match ServerConfig::load(&path) {
        Ok(config) => {
            info!("Configuration loaded successfully");
            config
        },
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
        }
    };

    info!("🚀 Starting {} on {}", config.id, config.addr);
    if let Err(e) = init(config).await {
        error!("❌ Error in server: {e}");
        return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
    }

    Ok(())
}
