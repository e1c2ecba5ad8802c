//! Command-line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pty-tunnel")]
#[command(author, version, about = "Tunnel a terminal session over any byte stream")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture this terminal and forward it through a transport command
    /// Example: pty-tunnel front -- ssh box pty-tunnel host
    Front(FrontArgs),

    /// Run a program in a pseudo-terminal and serve it on stdin/stdout
    Host(HostArgs),

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigAction {
    /// Write a configuration file with default settings
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the configuration in effect
    Show,
    /// Print the configuration file path
    Path,
}

#[derive(Args, Debug, Default)]
pub struct FrontArgs {
    /// Carry the transport as base64 text
    #[arg(long)]
    pub base64: bool,

    /// Do not send an EOF frame when local input ends
    #[arg(long)]
    pub no_eof: bool,

    /// Discard transport output until the host's greeting marker
    #[arg(long)]
    pub expect_greeting: bool,

    /// Leave ^C and ^Z to the local terminal instead of forwarding them
    #[arg(long)]
    pub cbreak: bool,

    /// Transport command and its arguments
    #[arg(
        value_name = "CMD",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

#[derive(Args, Debug, Default)]
pub struct HostArgs {
    /// Carry the transport as base64 text
    #[arg(long)]
    pub base64: bool,

    /// Write the greeting marker to stdout before serving
    #[arg(long)]
    pub greeting: bool,

    /// Use three pipes instead of a pseudo-terminal
    #[arg(long)]
    pub pipe: bool,

    /// Program to run and its arguments (default: /bin/sh)
    #[arg(value_name = "CMD", trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_front_takes_command_after_separator() {
        let cli = Cli::try_parse_from([
            "pty-tunnel", "front", "--base64", "--", "ssh", "box", "pty-tunnel", "host", "--pipe",
            "--", "cat",
        ])
        .unwrap();

        match cli.command {
            Commands::Front(args) => {
                assert!(args.base64);
                assert!(!args.no_eof);
                assert_eq!(
                    args.command,
                    vec!["ssh", "box", "pty-tunnel", "host", "--pipe", "--", "cat"]
                );
            }
            other => panic!("expected front, got {:?}", other),
        }
    }

    #[test]
    fn test_front_requires_command() {
        assert!(Cli::try_parse_from(["pty-tunnel", "front", "--base64"]).is_err());
    }

    #[test]
    fn test_host_command_is_optional() {
        let cli = Cli::try_parse_from(["pty-tunnel", "host", "--greeting"]).unwrap();
        match cli.command {
            Commands::Host(args) => {
                assert!(args.greeting);
                assert!(args.command.is_empty());
            }
            other => panic!("expected host, got {:?}", other),
        }
    }

    #[test]
    fn test_host_program_flags_pass_through() {
        let cli =
            Cli::try_parse_from(["pty-tunnel", "host", "--pipe", "--", "ls", "-la"]).unwrap();
        match cli.command {
            Commands::Host(args) => {
                assert!(args.pipe);
                assert_eq!(args.command, vec!["ls", "-la"]);
            }
            other => panic!("expected host, got {:?}", other),
        }
    }

    #[test]
    fn test_config_actions() {
        let cli = Cli::try_parse_from(["pty-tunnel", "config", "init", "--force"]).unwrap();
        match cli.command {
            Commands::Config { action } => assert_eq!(action, ConfigAction::Init { force: true }),
            other => panic!("expected config, got {:?}", other),
        }

        let cli = Cli::try_parse_from(["pty-tunnel", "-c", "/tmp/pt.toml", "config", "show"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/pt.toml")));
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Show
            }
        ));
        assert!(Cli::try_parse_from(["pty-tunnel", "config"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["pty-tunnel", "host", "--config", "/tmp/pt.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/pt.toml")));
    }
}
