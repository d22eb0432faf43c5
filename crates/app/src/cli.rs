//! Command-line argument structures.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(about = "Inspect and watch file-backed request collections", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Quiet period before a file change is picked up (ms)
    #[arg(long, global = true)]
    pub debounce_ms: Option<u64>,

    /// How long own writes are remembered for echo suppression (ms)
    #[arg(long, global = true)]
    pub settle_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new, empty collection
    Init {
        /// Collection directory
        path: PathBuf,

        /// Collection name (default: the directory name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Print the folder and request tree
    Tree {
        /// Collection directory
        path: PathBuf,
    },

    /// Print a request with every variable substituted
    Resolve {
        /// Collection directory
        path: PathBuf,

        /// Request id (`users/list.request.yaml`) or display name
        request: String,

        /// Environment to activate, by name
        #[arg(short, long)]
        env: Option<String>,

        /// Runtime override, `key=value`; may be repeated
        #[arg(short = 'v', long = "var", value_parser = parse_override)]
        vars: Vec<(String, String)>,
    },

    /// Report duplicate order keys and unreadable files
    Check {
        /// Collection directory
        path: PathBuf,
    },

    /// Follow external edits until interrupted
    Watch {
        /// Collection directory
        path: PathBuf,
    },
}

fn parse_override(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err("variable name must not be empty".to_string());
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_override() {
        assert_eq!(
            parse_override("token=a=b").unwrap(),
            ("token".to_string(), "a=b".to_string())
        );
        assert!(parse_override("token").is_err());
        assert!(parse_override("=x").is_err());
    }

    #[test]
    fn test_resolve_arguments() {
        let cli = Cli::parse_from([
            "courier",
            "--debounce-ms",
            "20",
            "resolve",
            "./api",
            "List Users",
            "--env",
            "dev",
            "-v",
            "token=abc",
        ]);
        assert_eq!(cli.debounce_ms, Some(20));
        match cli.command {
            Commands::Resolve {
                request, env, vars, ..
            } => {
                assert_eq!(request, "List Users");
                assert_eq!(env.as_deref(), Some("dev"));
                assert_eq!(vars, vec![("token".to_string(), "abc".to_string())]);
            }
            other => unreachable!("parsed {other:?}"),
        }
    }
}
