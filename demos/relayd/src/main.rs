use relaycast::prelude::*;

/// Environment variable naming a JSON config file.
const CONFIG_ENV: &str = "RELAYD_CONFIG";

/// Builds the config from an optional file path and an optional bind
/// address override (the first command-line argument).
fn load_config(
    path: Option<String>,
    bind_override: Option<String>,
) -> Result<RelayConfig, RelayError> {
    let mut config = match path {
        Some(path) => RelayConfig::from_json_file(path)?,
        None => RelayConfig::default(),
    };
    if let Some(addr) = bind_override {
        config.bind_addr = addr;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging("info");

    let config = load_config(
        std::env::var(CONFIG_ENV).ok(),
        std::env::args().nth(1),
    )?;
    tracing::info!(
        bind = %config.bind_addr,
        ban_window = ?config.policy.ban_window,
        message_interval = ?config.policy.message_interval,
        strike_limit = config.policy.strike_limit,
        "starting relayd"
    );

    let server = RelayServer::builder().config(config).build().await?;
    server.run().await?;
    Ok(())
}
