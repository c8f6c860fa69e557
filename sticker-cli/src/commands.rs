//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use sticker_core::{
    Design, DesignId, DesignPatch, DesignRecord, DesignStore, Editor, ImageFetcher, Notifier,
    RetainedSurface, SceneSynchronizer, SystemClock, TracingNotifier,
};
use sticker_renderer::{
    ExportOutcome, ExportPipeline, ExportRequest, HttpImageFetcher, SystemPrintHost,
};

use crate::{Command, StudioConfig};

/// Run one subcommand, writing human-readable output to stdout.
///
/// # Errors
///
/// Returns an error if the store cannot be opened, the design is missing, or
/// the operation fails.
pub async fn run(config: &StudioConfig, command: Command) -> anyhow::Result<()> {
    let store = DesignStore::with_data_dir(&config.data_dir)
        .with_context(|| format!("Failed to open design store at {}", config.data_dir.display()))?;

    match command {
        Command::List => {
            for record in store.list() {
                println!("{}", summary_line(&record));
            }
        }
        Command::Show { id } => {
            let record = find(&store, &id)?;
            println!("{}", serde_json::to_string_pretty(&record.to_design())?);
        }
        Command::Import { path, name } => {
            let record = import(&store, &path, name)?;
            println!("{}", record.id);
        }
        Command::Delete { id } => {
            let id = parse_id(&id)?;
            store.delete(id).with_context(|| format!("Failed to delete {id}"))?;
            println!("Deleted {id}");
        }
        Command::Export { id, output } => {
            let record = find(&store, &id)?;
            let request = ExportRequest::download(output.unwrap_or_default());
            let outcome = export(config, record.to_design(), &request).await?;
            report(&outcome);
        }
        Command::Print { id } => {
            let record = find(&store, &id)?;
            let outcome = export(config, record.to_design(), &ExportRequest::print("")).await?;
            report(&outcome);
        }
        Command::Thumbnail { id } => {
            let record = find(&store, &id)?;
            let pipeline = pipeline(config)?;
            let uri = pipeline
                .thumbnail_from_design(&record.to_design(), fetcher(config)?, config.sync.clone())
                .await
                .context("Failed to render thumbnail")?;
            store.update(
                record.id,
                DesignPatch {
                    thumbnail_url: Some(uri),
                    ..DesignPatch::default()
                },
            )?;
            println!("Updated thumbnail for {}", record.id);
        }
    }
    Ok(())
}

/// Import a design JSON file into the store.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or the insert fails.
pub fn import(store: &DesignStore, path: &Path, name: Option<String>) -> anyhow::Result<DesignRecord> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut design =
        Design::from_json(&json).with_context(|| format!("Invalid design in {}", path.display()))?;
    if let Some(name) = name {
        design.name = name;
    }
    design.canvas_width = Design::clamp_canvas(design.canvas_width);
    design.canvas_height = Design::clamp_canvas(design.canvas_height);

    let record = store.insert(&design)?;
    tracing::info!("Imported {} as {}", path.display(), record.id);
    Ok(record)
}

/// Open `design` in an off-screen editor and run the export pipeline on it.
///
/// # Errors
///
/// Returns an error if the fetcher or pipeline cannot be built, or the export fails.
pub async fn export(
    config: &StudioConfig,
    design: Design,
    request: &ExportRequest,
) -> anyhow::Result<ExportOutcome> {
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let sync = SceneSynchronizer::with_parts(
        RetainedSurface::default(),
        fetcher(config)?,
        config.sync.clone(),
        Arc::clone(&notifier),
        Arc::new(SystemClock),
    );
    let mut editor = Editor::open(design, sync);

    let pipeline = pipeline(config)?;
    let outcome = pipeline.export(&mut editor, request).await?;
    Ok(outcome)
}

fn pipeline(config: &StudioConfig) -> anyhow::Result<ExportPipeline> {
    let host = Arc::new(SystemPrintHost::new(config.print_command.clone()));
    ExportPipeline::new(config.export.clone(), host, Arc::new(TracingNotifier))
        .context("Failed to create export pipeline")
}

fn fetcher(config: &StudioConfig) -> anyhow::Result<Arc<dyn ImageFetcher>> {
    let fetcher =
        HttpImageFetcher::new(config.fetcher.clone()).context("Failed to create HTTP client")?;
    Ok(Arc::new(fetcher))
}

fn parse_id(id: &str) -> anyhow::Result<DesignId> {
    DesignId::parse(id).with_context(|| format!("Invalid design id: {id}"))
}

fn find(store: &DesignStore, id: &str) -> anyhow::Result<DesignRecord> {
    let id = parse_id(id)?;
    store
        .get(id)
        .with_context(|| format!("Design not found: {id}"))
}

fn summary_line(record: &DesignRecord) -> String {
    format!(
        "{}  {:<24}  {}x{}  {} elements  updated {}",
        record.id,
        record.name,
        record.canvas_width,
        record.canvas_height,
        record.elements.len(),
        record.updated_at.format("%Y-%m-%d %H:%M")
    )
}

fn report(outcome: &ExportOutcome) {
    match outcome {
        ExportOutcome::Printed => println!("Sent to printer"),
        ExportOutcome::Downloaded {
            path,
            popup_blocked,
        } => {
            if *popup_blocked {
                println!("Printing unavailable; saved {}", path.display());
            } else {
                println!("Saved {}", path.display());
            }
        }
    }
}
