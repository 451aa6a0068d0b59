use clap::Parser;

use palaver::client::cli_client;
use palaver::client::config::{ClientConfig, TokenStoreKind};
use palaver::utils::logger;

/// Terminal client for one-to-one conversations.
#[derive(Debug, Parser)]
#[command(name = "palaver", version, about)]
struct Cli {
    /// REST base URL, overrides API_BASE_URL
    #[arg(long)]
    api_base_url: Option<String>,

    /// Push channel base URL, overrides WS_BASE_URL
    #[arg(long)]
    ws_base_url: Option<String>,

    /// Where the session token is kept, overrides TOKEN_STORE
    #[arg(long, value_enum)]
    token_store: Option<TokenStoreKind>,

    /// Log filter, overrides LOG_LEVEL
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut ClientConfig) {
        if let Some(url) = self.api_base_url {
            config.api_base_url = url;
        }
        if let Some(url) = self.ws_base_url {
            config.ws_base_url = url;
        }
        if let Some(kind) = self.token_store {
            config.token_store = kind;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = ClientConfig::from_env();
    cli.apply(&mut config);

    logger::init(&config.log_level);
    config.validate()?;

    cli_client::run(config).await
}
