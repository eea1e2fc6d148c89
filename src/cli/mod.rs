use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod chat;
pub mod serve;

use crate::core::init_tracing;

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Run the web server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Talk through a decision in the terminal
    Chat {},
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    // Handle each sub command
    match args.command {
        Some(Command::Serve { host, port }) => {
            // axum logs rejections from built-in extractors with the `axum::rejection`
            // target, at `TRACE` level. `axum::rejection=trace` enables showing those events
            init_tracing(&format!(
                "{}=debug,tower_http=debug,axum::rejection=trace",
                env!("CARGO_CRATE_NAME")
            ));
            serve::run(host, port).await?;
        }
        Some(Command::Chat {}) => {
            // Keep the terminal quiet unless asked otherwise
            init_tracing("warn");
            chat::run().await?;
        }
        None => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["dilemma", "serve"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Serve {
                host: "127.0.0.1".to_string(),
                port: "2222".to_string(),
            })
        );
    }

    #[test]
    fn test_serve_with_host_and_port() {
        let cli =
            Cli::try_parse_from(["dilemma", "serve", "--host", "0.0.0.0", "--port", "8080"])
                .unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Serve {
                host: "0.0.0.0".to_string(),
                port: "8080".to_string(),
            })
        );
    }

    #[test]
    fn test_chat() {
        let cli = Cli::try_parse_from(["dilemma", "chat"]).unwrap();
        assert_eq!(cli.command, Some(Command::Chat {}));
    }

    #[test]
    fn test_no_command() {
        let cli = Cli::try_parse_from(["dilemma"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn test_unknown_command() {
        assert!(Cli::try_parse_from(["dilemma", "index"]).is_err());
    }
}
