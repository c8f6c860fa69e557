//! # Sticker Studio CLI
//!
//! Command-line host for stored sticker designs.
//!
//! ## Usage
//!
//! ```bash
//! sticker import label.json --name "Jar label"
//! sticker list
//! sticker print <design-id>
//! sticker export <design-id> --output jar-label
//! ```
//!
//! ## Architecture
//!
//! - `CliArgs` - Command-line arguments parsed with clap
//! - `StudioConfig` - Store location, image loading and export settings
//! - `commands::run` - Executes one subcommand against the design store

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sticker_core::{ImageLoadConfig, SyncConfig};
use sticker_renderer::{ExportConfig, HttpFetcherConfig};

/// Command-line arguments for `sticker`.
#[derive(Debug, Clone, Parser)]
#[command(name = "sticker")]
#[command(about = "Sticker and label designer: manage, export and print designs")]
#[command(version)]
pub struct CliArgs {
    /// Directory holding stored designs
    #[arg(long, env = "STICKER_DATA_DIR", default_value = "designs")]
    pub data_dir: PathBuf,

    /// CORS proxy template for images, `{url}` is replaced by the image URL
    #[arg(long, env = "STICKER_CORS_PROXY")]
    pub cors_proxy: Option<String>,

    /// Command used to print PDFs
    #[arg(long, env = "STICKER_PRINT_COMMAND", default_value = "lp")]
    pub print_command: String,

    /// Directory receiving downloaded PDFs
    #[arg(long, env = "STICKER_DOWNLOAD_DIR", default_value = ".")]
    pub download_dir: PathBuf,

    /// Pixels per inch used to size PDF pages
    #[arg(long, default_value = "96")]
    pub dpi: f32,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List designs, most recently updated first
    List,
    /// Print a design's JSON
    Show {
        /// Design id
        id: String,
    },
    /// Import a design from a JSON file
    Import {
        /// Path to the design JSON
        path: PathBuf,
        /// Override the design name
        #[arg(long)]
        name: Option<String>,
    },
    /// Delete a design
    Delete {
        /// Design id
        id: String,
    },
    /// Export a design to a PDF file
    Export {
        /// Design id
        id: String,
        /// File name without extension (defaults to the design name)
        #[arg(long, short)]
        output: Option<String>,
    },
    /// Print a design, downloading the PDF if printing is unavailable
    Print {
        /// Design id
        id: String,
    },
    /// Regenerate a design's list-view thumbnail
    Thumbnail {
        /// Design id
        id: String,
    },
}

/// Studio configuration.
#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// Design store directory.
    pub data_dir: PathBuf,
    /// Print command.
    pub print_command: String,
    /// Surface synchronization settings.
    pub sync: SyncConfig,
    /// Export pipeline settings.
    pub export: ExportConfig,
    /// HTTP image fetching settings.
    pub fetcher: HttpFetcherConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StudioConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data_dir: PathBuf::from("designs"),
            print_command: "lp".to_string(),
            sync: SyncConfig::default(),
            export: ExportConfig::default(),
            fetcher: HttpFetcherConfig::default(),
        }
    }
}

impl From<&CliArgs> for StudioConfig {
    fn from(args: &CliArgs) -> Self {
        let mut images = ImageLoadConfig::default();
        if let Some(proxy) = args.cors_proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            images = images.with_proxy(proxy);
        }
        Self {
            data_dir: args.data_dir.clone(),
            print_command: args.print_command.clone(),
            sync: SyncConfig {
                images,
                ..SyncConfig::default()
            },
            export: ExportConfig {
                dpi: args.dpi,
                download_dir: args.download_dir.clone(),
                ..ExportConfig::default()
            },
            fetcher: HttpFetcherConfig::default(),
        }
    }
}
