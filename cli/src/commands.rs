//! One-shot subcommands: start the server, ask, print, stop.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tokio::sync::mpsc;
use vhdl_lsp::protocol::file_uri_to_path;
use vhdl_lsp::{
    ConnectionManager, LanguageClient, MessageLevel, ServerEvent, ServerStopReason,
};
use vhdl_project::{InstantiationStyle, create_project as scaffold, instantiation};
use vhdl_types::{Disposable, Entity, SourceFile};

use crate::Workspace;

/// Library assumed for an entity named without one.
const DEFAULT_LIBRARY: &str = "work";

/// Relay server messages into the log until the client is gone.
pub(crate) async fn log_server_events(mut events: mpsc::Receiver<ServerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            ServerEvent::Message { level, text, show } => match level {
                MessageLevel::Error => tracing::error!(show, "server: {text}"),
                MessageLevel::Warning => tracing::warn!(show, "server: {text}"),
                MessageLevel::Info => tracing::info!(show, "server: {text}"),
                MessageLevel::Log => tracing::debug!(show, "server: {text}"),
            },
            ServerEvent::Stopped {
                reason: ServerStopReason::Exited,
            } => tracing::debug!("Language server closed its output"),
            ServerEvent::Stopped {
                reason: ServerStopReason::Failed(e),
            } => tracing::warn!("Lost the language server: {e}"),
        }
    }
}

/// A connection for the lifetime of one subcommand.
pub(crate) struct Session {
    manager: ConnectionManager<LanguageClient>,
}

impl Session {
    pub async fn open(ws: &Workspace) -> Result<Self> {
        let options = ws.config.server_options(ws.roots.clone(), ws.debug);
        let (client, events) = LanguageClient::new(options);
        tokio::spawn(log_server_events(events));

        let manager = ConnectionManager::new(client);
        manager
            .start()
            .await
            .context("failed to start the language server")?;
        Ok(Self { manager })
    }

    pub fn client(&self) -> Result<&LanguageClient> {
        self.manager
            .client()
            .map(|client| &**client)
            .context("language client is gone")
    }

    pub async fn close(mut self) {
        self.manager.stop().await;
        self.manager.dispose();
    }
}

pub async fn files(ws: &Workspace) -> Result<()> {
    let session = Session::open(ws).await?;
    let files = session.client()?.list_files().await;
    session.close().await;

    for file in files.context("failed to list files")? {
        println!("{}", file_line(&file));
    }
    Ok(())
}

/// `fe name dir`, tab separated, plus the resolved path when the server
/// sent a file URI.
fn file_line(file: &SourceFile) -> String {
    let mut line = format!("{}\t{}\t{}", file.fe, file.name, file.dir);
    if let Some(path) = file.uri.as_deref().and_then(file_uri_to_path) {
        line.push_str(&format!("\t{}", path.display()));
    }
    line
}

pub async fn entities(ws: &Workspace) -> Result<()> {
    let session = Session::open(ws).await?;
    let entities = session.client()?.list_entities().await;
    session.close().await;

    let mut names: Vec<String> = entities
        .context("failed to list entities")?
        .iter()
        .map(Entity::qualified_name)
        .collect();
    names.sort();
    names.dedup();
    for name in names {
        println!("{name}");
    }
    Ok(())
}

pub async fn instantiate(
    ws: &Workspace,
    name: &str,
    instance: Option<&str>,
    snippet: bool,
) -> Result<()> {
    let Some(entity) = Entity::parse(name, DEFAULT_LIBRARY) else {
        bail!("invalid entity name {name:?}; expected [library.]entity");
    };

    let session = Session::open(ws).await?;
    let interface = session.client()?.entity_interface(&entity).await;
    session.close().await;

    let Some(interface) = interface
        .with_context(|| format!("failed to fetch the interface of {}", entity.qualified_name()))?
    else {
        bail!("the server does not know entity {}", entity.qualified_name());
    };

    let style = if snippet {
        InstantiationStyle::Snippet
    } else {
        InstantiationStyle::Plain
    };
    print!("{}", instantiation(&entity, &interface, instance, style));
    Ok(())
}

pub fn create_project(ws: &Workspace, files: &[PathBuf], force: bool) -> Result<()> {
    let root = ws.roots.first().context("no project root")?;
    let outcome = scaffold(root, files, force)?;

    for skipped in &outcome.skipped {
        eprintln!("skipped {} (not a VHDL or Verilog source)", skipped.display());
    }
    println!(
        "created {} with {} file(s)",
        outcome.path.display(),
        outcome.descriptor.files.len()
    );
    Ok(())
}
