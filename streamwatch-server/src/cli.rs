use clap::{ArgGroup, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "streamwatch",
    about = "Streamwatch - Perforce stream size monitor",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short, long, env = "STREAMWATCH_PORT", default_value = "5000")]
    pub port: u16,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(short, long, env = "STREAMWATCH_CONFIG", help = "Path to config.yaml")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the HTTP server and scheduler (default if no command specified)")]
    Serve {
        #[arg(short, long, env = "STREAMWATCH_PORT", default_value = "5000")]
        port: u16,
    },

    #[command(about = "Reconcile the server registry with the config file")]
    SyncServers,

    #[command(about = "Reconcile the stream catalog of one server with the depot")]
    SyncStreams {
        #[arg(help = "Server id")]
        server: i64,
    },

    #[command(about = "Measure streams now")]
    #[command(group(ArgGroup::new("target").required(true).args(["all", "server", "stream"])))]
    Refresh {
        #[arg(long, help = "Refresh every stream of every active server")]
        all: bool,

        #[arg(long, help = "Refresh every stream of one server")]
        server: Option<i64>,

        #[arg(long, help = "Refresh a single stream")]
        stream: Option<i64>,
    },

    #[command(about = "List servers with stream totals")]
    Servers {
        #[arg(short, long, help = "Output as JSON")]
        json: bool,
    },

    #[command(about = "Show engine totals")]
    Status,

    #[command(about = "Check depot login of every active server")]
    AuthCheck,

    #[command(about = "Log in to depot servers and store tickets in the shared tickets file")]
    Login {
        #[arg(long, help = "Only this server id (default: every active server)")]
        server: Option<i64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_requires_target() {
        assert!(Cli::try_parse_from(["streamwatch", "refresh"]).is_err());
        assert!(Cli::try_parse_from(["streamwatch", "refresh", "--all", "--stream", "3"]).is_err());

        let cli = Cli::try_parse_from(["streamwatch", "refresh", "--server", "2"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Refresh { all: false, server: Some(2), stream: None })
        ));
    }

    #[test]
    fn test_login_server_is_optional() {
        let cli = Cli::try_parse_from(["streamwatch", "login"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Login { server: None })));

        let cli = Cli::try_parse_from(["streamwatch", "login", "--server", "3"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Login { server: Some(3) })));
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["streamwatch", "--config", "/tmp/sw.yaml"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/sw.yaml")));
    }
}
