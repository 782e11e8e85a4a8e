use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use gardenmap::debounce::{FieldStatus, PlantingAttributeForm};
use gardenmap::file_io::{load_map, save_map};
use gardenmap::layers::{LayerId, LayerKind, LayerState};
use gardenmap::shapes::ObjectId;
use gardenmap::{
    Action, EditorConfig, MapState, MapStore, MemoryBackend, OptimisticDispatcher,
    RemoteMessage, RemoteReconciler,
};

/// Replay an editing session against an in-memory server
#[derive(Parser, Debug)]
#[command(name = "gardenmap")]
#[command(version, about, long_about = None)]
struct Args {
    /// Map snapshot to start from (default: one empty plants layer with the nil id)
    #[arg(long, value_name = "FILE")]
    map: Option<PathBuf>,

    /// User id for this session (overrides the config file)
    #[arg(long, value_name = "ID")]
    user: Option<String>,

    /// Write the final map snapshot here
    #[arg(long, value_name = "FILE")]
    save: Option<PathBuf>,

    /// JSON list of session steps
    #[arg(value_name = "SCRIPT")]
    script: PathBuf,
}

/// One step of a session script
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Step {
    Dispatch { action: Action },
    Undo,
    Redo,
    /// An edit committed by another user
    Remote { user_id: String, action: Action },
    /// Type dates into the attribute form of the selected plantings
    Dates {
        selection: Vec<ObjectId>,
        #[serde(default)]
        add_date: Option<NaiveDate>,
        #[serde(default)]
        remove_date: Option<NaiveDate>,
    },
    /// Wait for outstanding server calls
    Flush,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;
    rt.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    let mut config = EditorConfig::load();
    if let Some(user) = args.user {
        config.user_id = Some(user);
    }
    let user = config.user_or_anonymous();

    let initial = match &args.map {
        Some(path) => load_map(path)?,
        None => MapState::new().with_layer(
            LayerId(Uuid::nil()),
            LayerState::new(LayerKind::Plants, "Plants"),
        ),
    };
    let steps = load_script(&args.script)?;

    let backend = MemoryBackend::new();
    backend.seed(initial.objects().cloned()).await;

    let (_remote_tx, remote_rx) = mpsc::channel(config.remote_buffer);
    let mut spawned = OptimisticDispatcher::spawn(
        MapStore::init(initial, config.max_history),
        Arc::new(backend.clone()),
        RemoteReconciler::new(user.clone()),
        remote_rx,
    );
    let handle = spawned.handle.clone();
    tracing::info!(%user, steps = steps.len(), "replaying session");

    for step in steps {
        match step {
            Step::Dispatch { action } => handle.dispatch(action)?,
            Step::Undo => handle.undo()?,
            Step::Redo => handle.redo()?,
            Step::Remote { user_id, action } => {
                let frame = RemoteMessage::new(user_id, action)
                    .encode()
                    .context("Failed to encode remote message")?;
                handle.receive_remote(frame)?;
            }
            Step::Dates {
                selection,
                add_date,
                remove_date,
            } => {
                let mut form =
                    PlantingAttributeForm::new(handle.clone(), selection, config.debounce());
                if add_date.is_some() {
                    form.set_add_date(add_date);
                    report_field("add date", form.add_date_status()).await?;
                    handle.flush().await?;
                }
                if remove_date.is_some() {
                    form.set_remove_date(remove_date);
                    report_field("remove date", form.remove_date_status()).await?;
                    handle.flush().await?;
                }
            }
            Step::Flush => handle.flush().await?,
        }
    }
    handle.flush().await?;

    let snapshot = handle.snapshot();
    handle.shutdown()?;
    spawned.task.await.context("Dispatcher task failed")?;

    while let Ok(notification) = spawned.notifications.try_recv() {
        println!("{}", notification);
    }

    println!(
        "{}",
        serde_json::to_string_pretty(snapshot.state.as_ref()).context("Failed to serialize map")?
    );
    eprintln!(
        "history: {}/{} applied, {} server calls",
        snapshot.cursor,
        snapshot.history_len,
        backend.calls().await.len()
    );

    if let Some(path) = args.save {
        save_map(&snapshot.state, &path)?;
        tracing::info!(path = %path.display(), "map saved");
    }
    Ok(())
}

/// Wait out the debounce delay of a form field and print a rejection
async fn report_field(field: &str, mut status: watch::Receiver<FieldStatus>) -> Result<()> {
    let settled = status
        .wait_for(|s| *s != FieldStatus::Pending)
        .await
        .context("Attribute form closed")?
        .clone();
    if let FieldStatus::Invalid(reason) = settled {
        println!("Rejected {}: {}", field, reason);
    }
    Ok(())
}

fn load_script(path: &Path) -> Result<Vec<Step>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid script {}", path.display()))
}
