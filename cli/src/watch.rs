//! `watch`: keep one server alive and restart it on descriptor changes.
//!
//! The event loop owns the [`WorkspaceRoots`]; watchers only send events,
//! and the forwarder task turns them into [`ConnectionManager::restart`]
//! calls on its own clone of the manager.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use vhdl_lsp::{ConnectionManager, LanguageClient};
use vhdl_types::{ClientState, Disposable};
use vhdl_watch::{RootChange, WorkspaceRoots, forward_events};

use crate::Workspace;
use crate::commands::log_server_events;
use crate::control::{ControlCommand, HELP};

enum Flow {
    Continue,
    Quit,
}

pub async fn run(ws: &Workspace) -> Result<()> {
    let options = ws.config.server_options(ws.roots.clone(), ws.debug);
    let (client, events) = LanguageClient::new(options);
    tokio::spawn(log_server_events(events));
    tokio::spawn(log_state_changes(client.subscribe()));
    let mut manager = ConnectionManager::new(client);

    // A server that fails to come up is retried on the next descriptor
    // change or `restart`.
    if let Err(e) = manager.start().await {
        tracing::warn!("Language server did not start: {e}");
    }

    let (mut roots, watch_events) = WorkspaceRoots::new(ws.config.watch.descriptor.as_str());
    for root in &ws.roots {
        observe(&mut roots, RootChange::Added(root.clone()));
    }

    let restarter = manager.clone();
    let forwarder = tokio::spawn(forward_events(
        watch_events,
        ws.config.watch.debounce,
        move |_event| {
            let manager = restarter.clone();
            async move {
                if let Err(e) = manager.restart().await {
                    tracing::warn!("Restart failed: {e}");
                }
            }
        },
    ));

    tracing::info!(roots = roots.len(), "Watching; press Ctrl-C to stop");
    eprintln!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    tracing::warn!("Cannot listen for Ctrl-C: {e}");
                }
                tracing::info!("Interrupted; shutting down");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match ControlCommand::parse(&line) {
                    Ok(Some(command)) => {
                        if let Flow::Quit = handle(command, &manager, &mut roots).await {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(message) => eprintln!("{message}"),
                },
                Ok(None) => {
                    tracing::debug!("stdin closed; waiting for Ctrl-C");
                    stdin_open = false;
                }
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {e}");
                    stdin_open = false;
                }
            },
        }
    }

    // Dropping every watcher closes the event channel, which ends the forwarder.
    roots.dispose();
    drop(roots);
    match forwarder.await {
        Ok(restarts) => tracing::debug!(restarts, "Forwarder finished"),
        Err(e) => tracing::warn!("Forwarder task failed: {e}"),
    }

    manager.stop().await;
    manager.dispose();
    Ok(())
}

/// Trace every lifecycle transition until the client is dropped.
async fn log_state_changes(mut states: watch::Receiver<ClientState>) {
    while states.changed().await.is_ok() {
        let state = *states.borrow_and_update();
        tracing::debug!(%state, "Language server state changed");
    }
}

fn observe(roots: &mut WorkspaceRoots, change: RootChange) {
    match roots.apply(&change) {
        Ok(true) => match &change {
            RootChange::Added(path) => tracing::info!(root = %path.display(), "Observing root"),
            RootChange::Removed(path) => {
                tracing::info!(root = %path.display(), "No longer observing root");
            }
        },
        Ok(false) => match &change {
            RootChange::Added(path) => eprintln!("{} is already observed", path.display()),
            RootChange::Removed(path) => eprintln!("{} is not observed", path.display()),
        },
        Err(e) => eprintln!("{e}"),
    }
}

fn status_report(state: Option<ClientState>, roots: &WorkspaceRoots) -> Vec<String> {
    let server = match state {
        Some(state) if state.is_running() => "server: running".to_string(),
        Some(state) => format!("server: {state} (use `restart` to start it)"),
        None => "server: detached".to_string(),
    };
    let mut report = vec![server];
    for root in roots.roots() {
        report.push(format!(
            "watching: {}",
            root.join(roots.descriptor()).display()
        ));
    }
    report
}

async fn handle(
    command: ControlCommand,
    manager: &ConnectionManager<LanguageClient>,
    roots: &mut WorkspaceRoots,
) -> Flow {
    match command {
        ControlCommand::Add(path) => observe(roots, RootChange::Added(path)),
        ControlCommand::Remove(path) => observe(roots, RootChange::Removed(path)),
        ControlCommand::Restart => {
            if let Err(e) = manager.restart().await {
                eprintln!("restart failed: {e}");
            }
        }
        ControlCommand::Status => {
            for line in status_report(manager.state(), roots) {
                eprintln!("{line}");
            }
        }
        ControlCommand::Quit => return Flow::Quit,
    }
    Flow::Continue
}
