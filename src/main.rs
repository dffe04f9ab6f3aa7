mod commands;

mod cli {
    use anyhow::Result;
    use clap::{Parser, Subcommand};
    use std::path::PathBuf;

    use super::commands;

    #[derive(Parser, Debug)]
    #[clap(author, version, about, long_about = None)]
    pub struct Roastd {
        #[clap(subcommand)]
        cmd: Command,
    }

    #[derive(Debug, Subcommand)]
    pub enum Command {
        /// Generate a participant keypair and write it to file.
        GenerateKeypair {
            /// Force overwrite if the file exists.
            #[clap(short, long)]
            force: bool,

            /// Write the keypair to this file.
            file: PathBuf,
        },

        /// Start the coordination server.
        Start {
            /// Override the session lifetime in seconds.
            #[clap(long)]
            session_ttl: Option<u64>,

            /// Override the login challenge lifetime in seconds.
            #[clap(long)]
            challenge_ttl: Option<u64>,

            /// Bind to host:port.
            #[clap(short, long, default_value = "0.0.0.0:7007")]
            bind: String,

            /// Config file to load.
            #[clap(short, long)]
            config: PathBuf,
        },
    }

    pub(super) async fn run() -> Result<()> {
        let args = Roastd::parse();
        match args.cmd {
            Command::GenerateKeypair { file, force } => {
                commands::generate_keypair::run(file, force).await?
            }
            Command::Start {
                session_ttl,
                challenge_ttl,
                bind,
                config,
            } => {
                commands::server::run(
                    session_ttl,
                    challenge_ttl,
                    bind,
                    config,
                )
                .await?
            }
        }
        Ok(())
    }
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::{
        layer::SubscriberExt, util::SubscriberInitExt,
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| {
                "roastd=info,roast_server=info".into()
            }),
        ))
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    if let Err(e) = cli::run().await {
        tracing::error!("{}", e);
    }

    Ok(())
}
