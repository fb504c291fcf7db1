//! `spotnear run`: host the search service in the foreground.
//!
//! One process per state directory: the host holds an exclusive lock on
//! `spotnear.lock` next to the store for as long as it runs.

use std::fs::{File, OpenOptions};
use std::io;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use fd_lock::{RwLock, RwLockWriteGuard};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::config::Config;
use crate::discovery::{OverpassClient, UniformRandom};
use crate::location;
use crate::model::{Action, UnknownAction};
use crate::presenter::TerminalPresenter;
use crate::service::{Collaborators, Service, ServiceHandle};
use crate::storage::Storage;

pub(super) fn cmd_run(config: &Config, storage: Storage, start: bool) -> Result<(), String> {
    let mut lock = open_instance_lock(&storage)?;
    let _instance = hold_instance_lock(&mut lock)?;

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| format!("failed to start async runtime: {e}"))?;
    runtime.block_on(serve(config, storage, start))
}

fn open_instance_lock(storage: &Storage) -> Result<RwLock<File>, String> {
    let path = storage.instance_lock_path();
    OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .map(RwLock::new)
        .map_err(|e| format!("failed to open {}: {e}", path.display()))
}

fn hold_instance_lock(lock: &mut RwLock<File>) -> Result<RwLockWriteGuard<'_, File>, String> {
    lock.try_write().map_err(|e| match e.kind() {
        io::ErrorKind::WouldBlock => "spotnear is already running".to_string(),
        _ => format!("failed to lock state directory: {e}"),
    })
}

async fn serve(config: &Config, storage: Storage, start: bool) -> Result<(), String> {
    let lookup_timeout = Duration::from_secs(config.overpass.read_timeout_secs);
    let location = location::from_config(&config.location, lookup_timeout)
        .map_err(|e| format!("failed to set up location: {e}"))?;
    let discovery = OverpassClient::new(&config.overpass)
        .map_err(|e| format!("failed to set up discovery: {e}"))?;

    let parts = Collaborators {
        location: Arc::from(location),
        discovery: Arc::new(discovery),
        presenter: Arc::new(TerminalPresenter::new()),
        selection: Box::new(UniformRandom::new()),
    };
    let (service, handle) = Service::new(storage, config, parts);
    let service = tokio::spawn(service.run());

    if start {
        handle.send(Action::StartService);
    }
    let stdin = BufReader::new(tokio::io::stdin());
    feed_actions(stdin, &handle, wait_for_interrupt()).await;

    handle.shutdown();
    service
        .await
        .map_err(|e| format!("search service failed: {e}"))
}

/// Forward input lines to the service until `interrupt` completes.
///
/// Input reaching EOF does not end the session; only the interrupt does.
async fn feed_actions<R>(input: R, handle: &ServiceHandle, interrupt: impl Future<Output = ()>)
where
    R: AsyncBufRead + Unpin,
{
    let mut interrupt = pin!(interrupt);
    let mut lines = input.lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => match parse_line(&line) {
                    Some(Ok(action)) => {
                        tracing::debug!(%action, "action received");
                        if !handle.send(action) {
                            return;
                        }
                    }
                    Some(Err(e)) => eprintln!("{e}"),
                    None => {}
                },
                Ok(None) => {
                    tracing::debug!("input closed; running until interrupted");
                    interrupt.as_mut().await;
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "input unreadable; running until interrupted");
                    interrupt.as_mut().await;
                    return;
                }
            },
            () = interrupt.as_mut() => return,
        }
    }
}

async fn wait_for_interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for interrupt");
        std::future::pending::<()>().await;
    }
}

/// Blank lines and `#` comments are skipped.
fn parse_line(line: &str) -> Option<Result<Action, UnknownAction>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(line.parse())
}
