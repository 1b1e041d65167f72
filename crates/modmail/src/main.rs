//! `ModMail` console host.
//!
//! Runs the mail capture/archive subsystem against simulated users typed in
//! on stdin, with configuration and archive stored in the platform
//! config/data directories.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod console;
mod input;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use modmail_core::{
    ArchiveStore, Catalog, CloseOutcome, Config, FileBlobStore, Identity, Permission,
    ReqwestWebhook, SenderId, Workflow,
};

use console::ConsoleHost;
use input::{Input, USAGE};

type ConsoleWorkflow = Workflow<ConsoleHost, ReqwestWebhook>;

/// How long `quit` waits for webhook posts still in flight.
const WEBHOOK_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modmail=info,modmail_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting ModMail");

    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("modmail");
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("modmail");

    let config_path = config_dir.join("config.json");
    let config = Config::load_or_create(&config_path).with_context(|| {
        format!("failed to load configuration from {}", config_path.display())
    })?;
    info!("Configuration loaded from {:?}", config_path);

    let blob = FileBlobStore::new(data_dir);
    info!("Loading archive from {:?}", blob.dir());
    let archive = ArchiveStore::load_or_init(Box::new(blob), config.archive_capacity());
    info!(
        "Archive loaded: {} mail(s), capacity {:?}",
        archive.len(),
        config.archive_capacity()
    );

    let catalog = load_catalog(&config_dir.join("lang").join("en.json"));
    let mut workflow = Workflow::new(config, ConsoleHost::new(), archive, ReqwestWebhook::new())
        .with_catalog(catalog);

    println!("{USAGE}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match input::parse(&line) {
            Ok(Some(Input::Quit)) => break,
            Ok(Some(input)) => handle(&mut workflow, input),
            Ok(None) => {}
            Err(message) => println!("! {message}"),
        }
    }

    workflow.shutdown();
    let drained = workflow.drain_webhooks(WEBHOOK_DRAIN_TIMEOUT).await;
    if !drained.completed.is_empty() {
        info!("Finished {} webhook post(s) before exit", drained.completed.len());
    }
    info!("ModMail stopped");
    Ok(())
}

/// Loads message overrides on top of the English catalog, if the file exists.
fn load_catalog(path: &Path) -> Catalog {
    let mut catalog = Catalog::english();
    match std::fs::read_to_string(path) {
        Ok(json) => match catalog.merge_json(&json) {
            Ok(applied) => info!("Loaded {} message override(s) from {:?}", applied, path),
            Err(e) => warn!("Ignoring message overrides in {:?}: {}", path, e),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to read message overrides {:?}: {}", path, e),
    }
    catalog
}

fn handle(workflow: &mut ConsoleWorkflow, input: Input) {
    match input {
        Input::Join {
            id,
            name,
            can_use,
            admin,
        } => {
            let permissions = [(can_use, Permission::Use), (admin, Permission::Admin)]
                .into_iter()
                .filter_map(|(granted, permission)| granted.then_some(permission))
                .collect();
            workflow
                .host_mut()
                .join(Identity::new(id, name), permissions);
        }
        Input::Leave(id) => {
            let sender = SenderId(id);
            if workflow.host_mut().leave(sender).is_none() {
                println!("! user {id} is not connected");
                return;
            }
            let discarded = workflow.on_identity_disconnected(sender);
            if discarded > 0 {
                println!("* discarded {discarded} open surface(s)");
            }
        }
        Input::Command { id, name } => {
            let Some(identity) = connected(workflow, id) else {
                return;
            };
            if workflow.handle_command(&name, &identity, Utc::now()).is_none() {
                println!("! unknown command /{name}");
            }
        }
        Input::Write { id, text } => {
            let Some(surface) = workflow.host().surface_viewed_by(SenderId(id)) else {
                println!("! user {id} has nothing open");
                return;
            };
            if let Err(message) = workflow.host_mut().write_note(surface, text) {
                println!("! {message}");
            }
        }
        Input::Close(id) => {
            let Some(surface) = workflow.host().surface_viewed_by(SenderId(id)) else {
                println!("! user {id} has nothing open");
                return;
            };
            let closer = workflow.host().identity(SenderId(id)).cloned();
            let note = workflow.host().note(surface).map(str::to_string);
            let outcome =
                workflow.on_surface_closed(surface, closer.as_ref(), note.as_deref(), Utc::now());
            match outcome {
                CloseOutcome::Archived(archived) => {
                    println!("* archived mail from {}", archived.record.sender_name);
                }
                CloseOutcome::Discarded(reason) => println!("* discarded ({reason:?})"),
                CloseOutcome::Browsed | CloseOutcome::Ignored => {}
            }
        }
        Input::List => {
            workflow.host().print_state();
            println!(
                "archive: {} mail(s), {} open surface(s)",
                workflow.archive().len(),
                workflow.surfaces().len()
            );
        }
        Input::Help => println!("{USAGE}"),
        Input::Quit => {}
    }
}

fn connected(workflow: &ConsoleWorkflow, id: u64) -> Option<Identity> {
    let identity = workflow.host().identity(SenderId(id)).cloned();
    if identity.is_none() {
        println!("! user {id} is not connected");
    }
    identity
}
