use clap::Parser;
use tracing_subscriber::EnvFilter;

use osb_cli::cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(cli.log_json);

    let (mut config, config_path) = osb_cli::cli::load_config(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    match cli.command {
        Command::Config(ConfigCommand::Validate) => {
            if !osb_cli::cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => osb_cli::cli::config::show(&config),
        command => {
            tracing::debug!(config = %config_path, "loaded configuration");
            osb_cli::cli::broker::run(&config, command).await
        }
    }
}

/// Initialize stderr-only tracing so diagnostics never mix with the JSON
/// printed on stdout. Defaults to `warn`.
fn init_cli_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
