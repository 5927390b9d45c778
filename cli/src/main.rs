//! vhdl-client - command-line front end for a VHDL language server.
//!
//! ```text
//! vhdl-client files                      # every file the server analysed
//! vhdl-client entities                   # every entity, as library.name
//! vhdl-client instantiate work.fifo      # instantiation template
//! vhdl-client create-project             # scaffold hdl-prj.json
//! vhdl-client watch                      # keep the server up, restart on descriptor edits
//! ```

mod commands;
mod control;
mod watch;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use vhdl_config::ClientConfig;

#[derive(Parser, Debug)]
#[command(name = "vhdl-client")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Project root; repeat for several. Defaults to the current directory
    #[arg(long = "root", value_name = "DIR", global = true)]
    roots: Vec<PathBuf>,

    /// Launch the server with verbose flags and a trace file
    #[arg(long, global = true)]
    debug: bool,

    /// Configuration file (default: ~/.config/vhdl-client/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every file known to the server
    Files,

    /// List every entity known to the server
    Entities,

    /// Print an instantiation template for an entity
    Instantiate {
        /// Entity name, optionally prefixed with its library (default: work)
        entity: String,
        /// Instance label
        #[arg(long, value_name = "NAME")]
        instance: Option<String>,
        /// Emit editor snippet placeholders
        #[arg(long)]
        snippet: bool,
    },

    /// Create hdl-prj.json in the first root
    CreateProject {
        /// Sources to list; all VHDL/Verilog files under the root when omitted
        files: Vec<PathBuf>,
        /// Overwrite an existing descriptor
        #[arg(long)]
        force: bool,
    },

    /// Run the server and restart it whenever a project descriptor changes
    Watch,
}

/// Settings shared by every subcommand.
pub(crate) struct Workspace {
    pub config: ClientConfig,
    pub roots: Vec<PathBuf>,
    pub debug: bool,
}

fn init_tracing(log_file: Option<&Path>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let mut warning = None;
    if let Some(path) = log_file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                tracing_subscriber::registry()
                    .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                    .with(env_filter)
                    .init();
                tracing::debug!(path = %path.display(), "Logging initialized");
                return;
            }
            Err(e) => warning = Some(format!("Failed to open log file {}: {e}", path.display())),
        }
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
    if let Some(warning) = warning {
        tracing::warn!("{warning}");
    }
}

/// Canonical roots; the current directory when none were given.
fn resolve_roots(roots: &[PathBuf]) -> Result<Vec<PathBuf>> {
    if roots.is_empty() {
        let cwd = std::env::current_dir().context("cannot determine the current directory")?;
        return Ok(vec![cwd]);
    }
    let mut resolved: Vec<PathBuf> = Vec::with_capacity(roots.len());
    for root in roots {
        let canonical = root
            .canonicalize()
            .with_context(|| format!("root {} is not accessible", root.display()))?;
        if !resolved.contains(&canonical) {
            resolved.push(canonical);
        }
    }
    Ok(resolved)
}

async fn run(cli: Cli, config: ClientConfig) -> Result<()> {
    let ws = Workspace {
        config,
        roots: resolve_roots(&cli.roots)?,
        debug: cli.debug,
    };

    match cli.command {
        Command::Files => commands::files(&ws).await,
        Command::Entities => commands::entities(&ws).await,
        Command::Instantiate {
            entity,
            instance,
            snippet,
        } => commands::instantiate(&ws, &entity, instance.as_deref(), snippet).await,
        Command::CreateProject { files, force } => commands::create_project(&ws, &files, force),
        Command::Watch => watch::run(&ws).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = ClientConfig::load(cli.config.as_deref());
    let log_file = config.as_ref().ok().and_then(|c| c.log.file.clone());
    init_tracing(log_file.as_deref());

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(anyhow::Error::new(e).context("failed to load configuration")),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "vhdl-client",
            "entities",
            "--root",
            "/a",
            "--root",
            "/b",
            "--debug",
        ])
        .unwrap();
        assert!(matches!(cli.command, Command::Entities));
        assert_eq!(cli.roots, [PathBuf::from("/a"), PathBuf::from("/b")]);
        assert!(cli.debug);
    }

    #[test]
    fn instantiate_arguments() {
        let cli = Cli::try_parse_from([
            "vhdl-client",
            "instantiate",
            "lib.fifo",
            "--instance",
            "u_fifo",
            "--snippet",
        ])
        .unwrap();
        match cli.command {
            Command::Instantiate {
                entity,
                instance,
                snippet,
            } => {
                assert_eq!(entity, "lib.fifo");
                assert_eq!(instance.as_deref(), Some("u_fifo"));
                assert!(snippet);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn create_project_takes_files() {
        let cli =
            Cli::try_parse_from(["vhdl-client", "create-project", "a.vhd", "b.v", "--force"])
                .unwrap();
        match cli.command {
            Command::CreateProject { files, force } => {
                assert_eq!(files, [PathBuf::from("a.vhd"), PathBuf::from("b.v")]);
                assert!(force);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn instantiate_requires_an_entity() {
        assert!(Cli::try_parse_from(["vhdl-client", "instantiate"]).is_err());
    }

    #[test]
    fn resolve_roots_deduplicates() {
        let here = std::env::current_dir().unwrap();
        let roots = resolve_roots(&[here.clone(), here.join(".")]).unwrap();
        assert_eq!(roots, [here.canonicalize().unwrap()]);
    }

    #[test]
    fn resolve_roots_rejects_missing() {
        assert!(resolve_roots(&[PathBuf::from("/nonexistent/vhdl-client-root")]).is_err());
    }
}
