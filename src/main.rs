use log::error;
use rsmtpd::config::EngineConfig;

#[tokio::main]
async fn main() {
    env_logger::init_from_env(env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"));

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Locating and parsing a handler-chain file is left to whatever embeds
    // this binary; run with no chain config falls back to the reject-all
    // safety default.
    if let Err(e) = rsmtpd::run(config, None).await {
        error!("Application error: {}", e);
        std::process::exit(1);
    }
}
