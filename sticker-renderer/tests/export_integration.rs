//! Integration tests for the export/print pipeline (sticker-renderer).
//!
//! Tests page sizing, every delivery path, blob revocation, identity checks
//! and thumbnails.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use sticker_core::{
    ActiveRegistry, CoreError, Design, DesignElement, DesignId, Editor, FetchError, ImageFetcher,
    LoadStrategy, LoadedImage, NoticeLevel, RecordingNotifier, RetainedSurface, SceneSynchronizer,
    Surface, SyncConfig, SystemClock,
};
use sticker_renderer::{
    paginate, ExportConfig, ExportError, ExportOutcome, ExportPipeline, ExportRequest,
    Orientation, PrintHost, PrintRefused, PrintWindow, RenderError, RenderResult,
    SurfaceRasterizer,
};

/// Fails every image request.
struct NoImages;

#[async_trait]
impl ImageFetcher for NoImages {
    async fn fetch(&self, _url: &str, _strategy: LoadStrategy) -> Result<LoadedImage, FetchError> {
        Err(FetchError::Network("offline".into()))
    }
}

/// Refuses every window, like a popup blocker.
struct BlockingHost;

#[async_trait]
impl PrintHost for BlockingHost {
    async fn open(&self, _url: &str) -> Result<Box<dyn PrintWindow>, PrintRefused> {
        Err(PrintRefused("popup blocked".into()))
    }
}

/// Opens windows that record what they printed.
#[derive(Default)]
struct RecordingHost {
    fail_print: bool,
    opened: Arc<Mutex<Vec<String>>>,
    printed_existing_files: Arc<Mutex<Vec<PathBuf>>>,
}

struct RecordingWindow {
    path: PathBuf,
    fail_print: bool,
    printed: Arc<Mutex<Vec<PathBuf>>>,
}

#[async_trait]
impl PrintHost for RecordingHost {
    async fn open(&self, url: &str) -> Result<Box<dyn PrintWindow>, PrintRefused> {
        self.opened.lock().expect("opened").push(url.to_string());
        let path = url::Url::parse(url)
            .expect("url")
            .to_file_path()
            .expect("file url");
        Ok(Box::new(RecordingWindow {
            path,
            fail_print: self.fail_print,
            printed: Arc::clone(&self.printed_existing_files),
        }))
    }
}

#[async_trait]
impl PrintWindow for RecordingWindow {
    async fn loaded(&mut self) -> RenderResult<()> {
        Ok(())
    }

    async fn print(&mut self) -> RenderResult<()> {
        if self.fail_print {
            return Err(RenderError::Print("printer on fire".into()));
        }
        if self.path.exists() {
            self.printed.lock().expect("printed").push(self.path.clone());
        }
        Ok(())
    }
}

/// Create a landscape label design with some text.
fn label_design() -> Design {
    let mut design = Design::new("Shelf label", 842.0, 595.0);
    design
        .add_element(DesignElement::text("Pantry").at(40.0, 40.0))
        .expect("add text");
    design
        .add_element(DesignElement::text("Best before").at(40.0, 120.0))
        .expect("add text");
    design
}

fn open_editor(design: Design) -> Editor<RetainedSurface> {
    let sync = SceneSynchronizer::with_parts(
        RetainedSurface::default(),
        Arc::new(NoImages),
        SyncConfig::default(),
        Arc::new(RecordingNotifier::new()),
        Arc::new(SystemClock),
    );
    Editor::open(design, sync)
}

fn fast_config(download_dir: &std::path::Path) -> ExportConfig {
    ExportConfig {
        settle_delay: Duration::ZERO,
        print_delay: Duration::ZERO,
        revoke_delay: Duration::from_millis(10),
        download_dir: download_dir.to_path_buf(),
        ..Default::default()
    }
}

fn pipeline(
    host: Arc<dyn PrintHost>,
    download_dir: &std::path::Path,
) -> (ExportPipeline, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::new());
    let pipeline = ExportPipeline::new(fast_config(download_dir), host, notifier.clone())
        .expect("pipeline");
    (pipeline, notifier)
}

/// Exactly one of success, fallback or failure.
fn terminal_notices(notifier: &RecordingNotifier) -> usize {
    notifier.count(NoticeLevel::Success)
        + notifier.count(NoticeLevel::Warning)
        + notifier.count(NoticeLevel::Error)
}

// ==========================================================================
// Page sizing
// ==========================================================================

#[test]
fn test_raster_and_page_match_canvas() {
    let editor = open_editor(label_design());
    let raster = SurfaceRasterizer::new()
        .rasterize(editor.surface(), 1.0)
        .expect("raster");
    assert_eq!((raster.width, raster.height), (842, 595));

    let pdf = paginate(&raster, 842.0, 595.0, 96.0).expect("pdf");
    assert_eq!(pdf.orientation, Orientation::Landscape);
    assert!((pdf.page_width_px - 842.0).abs() < f32::EPSILON);
    assert!((pdf.page_height_px - 595.0).abs() < f32::EPSILON);
    assert_eq!(&pdf.bytes[0..5], b"%PDF-");
}

#[test]
fn test_portrait_design_gets_portrait_page() {
    let editor = open_editor(Design::new("Tall", 300.0, 500.0));
    let raster = SurfaceRasterizer::new()
        .rasterize(editor.surface(), 1.0)
        .expect("raster");
    let pdf = paginate(&raster, 300.0, 500.0, 96.0).expect("pdf");
    assert_eq!(pdf.orientation, Orientation::Portrait);
}

// ==========================================================================
// Delivery paths
// ==========================================================================

#[tokio::test]
async fn test_blocked_window_falls_back_to_download() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (pipeline, notifier) = pipeline(Arc::new(BlockingHost), dir.path());
    let mut editor = open_editor(label_design());

    let outcome = pipeline
        .export(&mut editor, &ExportRequest::print(""))
        .await
        .expect("export");

    let ExportOutcome::Downloaded {
        path,
        popup_blocked,
    } = outcome
    else {
        panic!("expected download fallback");
    };
    assert!(popup_blocked);
    assert_eq!(path, dir.path().join("Shelf label.pdf"));
    let bytes = std::fs::read(&path).expect("downloaded file");
    assert_eq!(&bytes[0..5], b"%PDF-");

    assert_eq!(notifier.count(NoticeLevel::Warning), 1);
    assert_eq!(terminal_notices(&notifier), 1);
    assert_eq!(pipeline.blobs().live_count(), 0);
}

#[tokio::test]
async fn test_print_window_prints_then_blob_is_revoked() {
    let dir = tempfile::tempdir().expect("tempdir");
    let host = Arc::new(RecordingHost::default());
    let (pipeline, notifier) = pipeline(host.clone(), dir.path());
    let mut editor = open_editor(label_design());

    let outcome = pipeline
        .export(&mut editor, &ExportRequest::print("label"))
        .await
        .expect("export");
    assert_eq!(outcome, ExportOutcome::Printed);

    let opened = host.opened.lock().expect("opened").clone();
    assert_eq!(opened.len(), 1);
    assert!(opened[0].starts_with("file://"));
    assert_eq!(host.printed_existing_files.lock().expect("printed").len(), 1);

    assert!(!pipeline.blobs().is_live(&opened[0]));
    assert_eq!(notifier.count(NoticeLevel::Success), 1);
    assert_eq!(terminal_notices(&notifier), 1);
}

#[tokio::test]
async fn test_failed_print_still_revokes_blob() {
    let dir = tempfile::tempdir().expect("tempdir");
    let host = Arc::new(RecordingHost {
        fail_print: true,
        ..Default::default()
    });
    let (pipeline, notifier) = pipeline(host, dir.path());
    let mut editor = open_editor(label_design());

    let err = pipeline
        .export(&mut editor, &ExportRequest::print("label"))
        .await
        .expect_err("print fails");
    assert!(matches!(err, ExportError::Render(RenderError::Print(_))));
    assert_eq!(pipeline.blobs().live_count(), 0);
    assert_eq!(notifier.count(NoticeLevel::Error), 1);
    assert_eq!(terminal_notices(&notifier), 1);
}

#[tokio::test]
async fn test_download_request_skips_print_window() {
    let dir = tempfile::tempdir().expect("tempdir");
    let host = Arc::new(RecordingHost::default());
    let (pipeline, notifier) = pipeline(host.clone(), dir.path());
    let mut editor = open_editor(label_design());

    let outcome = pipeline
        .export(&mut editor, &ExportRequest::download("custom name"))
        .await
        .expect("export");
    assert_eq!(
        outcome,
        ExportOutcome::Downloaded {
            path: dir.path().join("custom name.pdf"),
            popup_blocked: false,
        }
    );
    assert!(host.opened.lock().expect("opened").is_empty());
    assert_eq!(notifier.count(NoticeLevel::Success), 1);
}

#[tokio::test]
async fn test_empty_raster_aborts_without_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (pipeline, notifier) = pipeline(Arc::new(BlockingHost), dir.path());
    let mut editor = open_editor(label_design());
    editor.surface_mut().set_size(0, 0);

    let err = pipeline
        .export(&mut editor, &ExportRequest::print(""))
        .await
        .expect_err("empty raster");
    assert!(matches!(
        err,
        ExportError::Render(RenderError::EmptyRaster { .. })
    ));
    assert_eq!(std::fs::read_dir(dir.path()).expect("dir").count(), 0);
    assert_eq!(notifier.count(NoticeLevel::Error), 1);
    assert_eq!(terminal_notices(&notifier), 1);
}

#[tokio::test]
async fn test_selection_restored_after_export() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (pipeline, _notifier) = pipeline(Arc::new(BlockingHost), dir.path());
    let design = label_design();
    let first = design.elements[0].id;
    let mut editor = open_editor(design);
    editor.select(Some(first)).expect("select");

    pipeline
        .export(&mut editor, &ExportRequest::download(""))
        .await
        .expect("export");
    assert_eq!(editor.selected(), Some(first));
    assert_eq!(editor.synchronizer().selected_id(), Some(first));
}

// ==========================================================================
// Active document
// ==========================================================================

#[tokio::test]
async fn test_print_active_rejects_other_document() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (pipeline, notifier) = pipeline(Arc::new(BlockingHost), dir.path());

    let open_id = DesignId::new();
    let mut design = label_design();
    design.id = Some(open_id);
    let registry = ActiveRegistry::new();
    let _registration = registry.register(
        open_id,
        Arc::new(tokio::sync::Mutex::new(open_editor(design))),
    );

    let err = pipeline
        .print_active(&registry, DesignId::new(), &ExportRequest::print(""))
        .await
        .expect_err("mismatch");
    assert!(matches!(
        err,
        ExportError::Core(CoreError::IdentityMismatch { .. })
    ));
    assert_eq!(notifier.count(NoticeLevel::Error), 1);

    let outcome = pipeline
        .print_active(&registry, open_id, &ExportRequest::print(""))
        .await
        .expect("active document prints");
    assert!(matches!(outcome, ExportOutcome::Downloaded { .. }));
}

// ==========================================================================
// Thumbnails
// ==========================================================================

fn decode_data_uri(uri: &str) -> image::DynamicImage {
    let encoded = uri
        .strip_prefix("data:image/png;base64,")
        .expect("png data uri");
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .expect("base64");
    image::load_from_memory(&bytes).expect("png")
}

#[tokio::test]
async fn test_thumbnail_fits_preview_box() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (pipeline, _notifier) = pipeline(Arc::new(BlockingHost), dir.path());

    let uri = pipeline
        .thumbnail_from_design(&label_design(), Arc::new(NoImages), SyncConfig::default())
        .await
        .expect("thumbnail");
    let img = decode_data_uri(&uri);
    assert_eq!(img.width(), 300);
    assert!(img.height() < 300);
}

#[tokio::test]
async fn test_live_and_offscreen_thumbnails_match() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (pipeline, _notifier) = pipeline(Arc::new(BlockingHost), dir.path());
    let design = label_design();

    let mut editor = open_editor(design.clone());
    let live = pipeline
        .thumbnail_from_editor(&mut editor)
        .await
        .expect("live thumbnail");
    let offscreen = pipeline
        .thumbnail_from_design(&design, Arc::new(NoImages), SyncConfig::default())
        .await
        .expect("offscreen thumbnail");
    assert_eq!(live, offscreen);
}
