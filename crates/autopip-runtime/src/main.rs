//! autopip: replay and inspection front end for the automatic
//! Picture-in-Picture engine.

use clap::Parser;

mod cli;
mod cmd_inspect;
mod cmd_replay;

use autopip_runtime::config_file;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let fallback = match args.command {
        cli::Command::Replay(_) => "warn",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(cli::log_filter(fallback)))
        .with_writer(std::io::stderr)
        .init();

    let config = config_file::load_or_default(args.config.as_deref())?;
    if let Some(path) = &args.config {
        tracing::debug!(path = %path.display(), "settings loaded");
    }

    match args.command {
        cli::Command::Replay(opts) => {
            cmd_replay::cmd_replay(&opts.scenario, &config, opts.json).await?;
        }
        cli::Command::Config => cmd_inspect::cmd_config(&config)?,
        cli::Command::Sites => cmd_inspect::cmd_sites(&config),
        cli::Command::Classify(opts) => {
            cmd_inspect::cmd_classify(&config, opts.width, opts.height);
        }
    }

    Ok(())
}
