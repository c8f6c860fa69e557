//! The export/print pipeline.
//!
//! Quiesce → Rasterize → Paginate → Deliver. Rasterize and Paginate failures
//! abort the export; a refused print window is an alternate success that
//! downloads the PDF instead. Every call to [`ExportPipeline::export`] ends in
//! exactly one success, fallback or failure notice, and the blob URL created
//! for delivery is revoked on every path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sticker_core::{
    ActiveRegistry, CoreError, Design, DesignId, Editor, ElementId, ImageFetcher, Notifier,
    RetainedSurface, SceneSynchronizer, Surface, SyncConfig, SystemClock,
};

use crate::deliver::{write_download, BlobRegistry, PrintHost};
use crate::error::{RenderError, RenderResult};
use crate::export::SurfaceRasterizer;
use crate::image::{fit_png, png_data_uri};
use crate::pdf::paginate;

/// An editor shared between the UI and detached views.
pub type SharedEditor<S> = Arc<tokio::sync::Mutex<Editor<S>>>;

/// Pipeline timing and output settings.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Pause after the quiesce redraw.
    pub settle_delay: Duration,
    /// Upper bound on waiting for pending image loads.
    pub settle_timeout: Duration,
    /// Pause between the print window loading and printing.
    pub print_delay: Duration,
    /// Delay before the blob URL is revoked.
    pub revoke_delay: Duration,
    /// Pixels per inch used to size the PDF page.
    pub dpi: f32,
    /// Preview box for thumbnails (width, height).
    pub thumbnail_box: (u32, u32),
    /// Resolution multiplier for thumbnail rasters.
    pub thumbnail_multiplier: f32,
    /// Where downloads are written.
    pub download_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(150),
            settle_timeout: Duration::from_secs(10),
            print_delay: Duration::from_millis(500),
            revoke_delay: Duration::from_secs(1),
            dpi: 96.0,
            thumbnail_box: (300, 300),
            thumbnail_multiplier: 2.0,
            download_dir: PathBuf::from("."),
        }
    }
}

/// How the caller wants the PDF delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Open a print window, downloading if it is refused.
    #[default]
    Print,
    /// Download only.
    Download,
}

/// One export invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    /// Download file stem; the design name when empty.
    pub file_name: String,
    /// Delivery mode.
    pub delivery: Delivery,
}

impl ExportRequest {
    /// Print, falling back to a download.
    #[must_use]
    pub fn print(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            delivery: Delivery::Print,
        }
    }

    /// Download only.
    #[must_use]
    pub fn download(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            delivery: Delivery::Download,
        }
    }
}

/// How a successful export was delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The print window printed the PDF.
    Printed,
    /// The PDF was written to disk.
    Downloaded {
        /// File written.
        path: PathBuf,
        /// Whether this was the fallback for a refused print window.
        popup_blocked: bool,
    },
}

/// Export failures.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Rasterization, pagination or delivery failed.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The requested document is not the active one.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Runs exports and thumbnails against editors.
pub struct ExportPipeline {
    config: ExportConfig,
    rasterizer: SurfaceRasterizer,
    blobs: BlobRegistry,
    host: Arc<dyn PrintHost>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for ExportPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportPipeline")
            .field("config", &self.config)
            .field("live_blobs", &self.blobs.live_count())
            .finish_non_exhaustive()
    }
}

impl ExportPipeline {
    /// Create a pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the blob directory cannot be created.
    pub fn new(
        config: ExportConfig,
        host: Arc<dyn PrintHost>,
        notifier: Arc<dyn Notifier>,
    ) -> RenderResult<Self> {
        Ok(Self {
            config,
            rasterizer: SurfaceRasterizer::new(),
            blobs: BlobRegistry::new()?,
            host,
            notifier,
        })
    }

    /// Replace the rasterizer.
    #[must_use]
    pub fn with_rasterizer(mut self, rasterizer: SurfaceRasterizer) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    /// The pipeline configuration.
    #[must_use]
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Blob URLs created for delivery.
    #[must_use]
    pub fn blobs(&self) -> &BlobRegistry {
        &self.blobs
    }

    /// Export the editor's design to a single-page PDF and deliver it.
    ///
    /// # Errors
    ///
    /// Returns an error if rasterizing, paginating or delivering fails. A
    /// refused print window is not an error.
    pub async fn export<S: Surface>(
        &self,
        editor: &mut Editor<S>,
        request: &ExportRequest,
    ) -> Result<ExportOutcome, ExportError> {
        tracing::info!("Exporting design {:?} ({:?})", editor.design_id(), request.delivery);
        self.notifier.info("Preparing PDF...");

        let result = self.run_export(editor, request).await;
        match &result {
            Ok(ExportOutcome::Printed) => self.notifier.success("PDF sent to printer"),
            Ok(ExportOutcome::Downloaded {
                path,
                popup_blocked: true,
            }) => self.notifier.warning(&format!(
                "Print window was blocked; PDF downloaded to {}",
                path.display()
            )),
            Ok(ExportOutcome::Downloaded { path, .. }) => self
                .notifier
                .success(&format!("PDF downloaded to {}", path.display())),
            Err(e) => {
                tracing::warn!("Export failed: {e}");
                self.notifier.error(&format!("Failed to export PDF: {e}"));
            }
        }
        result
    }

    /// Export the document registered as active, provided it is `design_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IdentityMismatch`] (wrapped) when another document
    /// is active, or any error from [`ExportPipeline::export`].
    pub async fn print_active<S: Surface>(
        &self,
        registry: &ActiveRegistry<SharedEditor<S>>,
        design_id: DesignId,
        request: &ExportRequest,
    ) -> Result<ExportOutcome, ExportError> {
        let editor = match registry.require_active(design_id) {
            Ok(editor) => editor,
            Err(e) => {
                tracing::warn!("Refusing to print: {e}");
                self.notifier.error(&format!("Failed to export PDF: {e}"));
                return Err(e.into());
            }
        };
        let mut editor = editor.lock().await;
        self.export(&mut editor, request).await
    }

    /// Thumbnail of a live editor as a PNG data URI.
    ///
    /// # Errors
    ///
    /// Returns an error if rasterizing or encoding fails.
    pub async fn thumbnail_from_editor<S: Surface>(
        &self,
        editor: &mut Editor<S>,
    ) -> RenderResult<String> {
        let selected = self.quiesce(editor).await;
        let raster = self
            .rasterizer
            .rasterize(editor.surface(), self.config.thumbnail_multiplier);
        restore_selection(editor, selected);

        let (max_w, max_h) = self.config.thumbnail_box;
        let fitted = fit_png(&raster?.png, max_w, max_h)?;
        Ok(png_data_uri(&fitted))
    }

    /// Thumbnail of a design that is not open, via a temporary off-screen editor.
    ///
    /// # Errors
    ///
    /// Returns an error if rasterizing or encoding fails.
    pub async fn thumbnail_from_design(
        &self,
        design: &Design,
        fetcher: Arc<dyn ImageFetcher>,
        sync_config: SyncConfig,
    ) -> RenderResult<String> {
        let sync = SceneSynchronizer::with_parts(
            RetainedSurface::default(),
            fetcher,
            sync_config,
            Arc::clone(&self.notifier),
            Arc::new(SystemClock),
        );
        let mut editor = Editor::open(design.clone(), sync);
        self.thumbnail_from_editor(&mut editor).await
    }

    async fn run_export<S: Surface>(
        &self,
        editor: &mut Editor<S>,
        request: &ExportRequest,
    ) -> Result<ExportOutcome, ExportError> {
        let selected = self.quiesce(editor).await;
        let raster = self.rasterizer.rasterize(editor.surface(), 1.0);
        restore_selection(editor, selected);

        let design = editor.design();
        let pdf = paginate(&raster?, design.canvas_width, design.canvas_height, self.config.dpi)?;
        let file_name = if request.file_name.trim().is_empty() {
            design.name.clone()
        } else {
            request.file_name.clone()
        };

        let url = self.blobs.create(&pdf.bytes, "pdf").await?;
        let delivered = self.deliver(&url, &file_name, &pdf.bytes, request.delivery).await;

        tokio::time::sleep(self.config.revoke_delay).await;
        self.blobs.revoke(&url);
        delivered
    }

    async fn deliver(
        &self,
        url: &str,
        file_name: &str,
        bytes: &[u8],
        delivery: Delivery,
    ) -> Result<ExportOutcome, ExportError> {
        if delivery == Delivery::Download {
            let path = write_download(&self.config.download_dir, file_name, bytes).await?;
            return Ok(ExportOutcome::Downloaded {
                path,
                popup_blocked: false,
            });
        }

        match self.host.open(url).await {
            Ok(mut window) => {
                window.loaded().await?;
                tokio::time::sleep(self.config.print_delay).await;
                window.print().await?;
                Ok(ExportOutcome::Printed)
            }
            Err(refused) => {
                tracing::warn!("{refused}; falling back to download");
                let path = write_download(&self.config.download_dir, file_name, bytes).await?;
                Ok(ExportOutcome::Downloaded {
                    path,
                    popup_blocked: true,
                })
            }
        }
    }

    /// Clear the selection, let pending images land and redraw.
    ///
    /// Returns the selection to restore afterwards.
    async fn quiesce<S: Surface>(&self, editor: &mut Editor<S>) -> Option<ElementId> {
        let selected = editor.selected();
        if let Err(e) = editor.select(None) {
            tracing::debug!("Clearing selection failed: {e}");
        }

        let settled = tokio::time::timeout(self.config.settle_timeout, editor.settle()).await;
        match settled {
            Ok(outcomes) if !outcomes.is_empty() => {
                tracing::debug!("Settled {} image loads before rasterizing", outcomes.len());
            }
            Ok(_) => {}
            Err(_) => tracing::warn!(
                "{} image loads still pending after {:?}",
                editor.synchronizer().pending_loads(),
                self.config.settle_timeout
            ),
        }

        editor.surface_mut().request_render();
        tokio::time::sleep(self.config.settle_delay).await;
        selected
    }
}

fn restore_selection<S: Surface>(editor: &mut Editor<S>, selected: Option<ElementId>) {
    if let Some(id) = selected {
        if editor.select(Some(id)).is_err() {
            tracing::debug!("Selected element {id} disappeared during export");
        }
    }
}
