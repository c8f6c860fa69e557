//! End-to-end tests for the `sticker` commands against a temporary store.

use std::path::Path;
use std::time::Duration;

use sticker_cli::{commands, Command, StudioConfig};
use sticker_core::{Design, DesignElement, DesignStore};
use sticker_renderer::{ExportConfig, ExportOutcome, ExportRequest};

fn write_design(dir: &Path, design: &Design) -> std::path::PathBuf {
    let path = dir.join("label.json");
    std::fs::write(&path, design.to_json().expect("json")).expect("write design");
    path
}

fn jar_label() -> Design {
    let mut design = Design::new("Jar label", 400.0, 300.0);
    design
        .add_element(DesignElement::text("Strawberry jam").at(20.0, 20.0))
        .expect("add text");
    design
}

fn studio(root: &Path) -> StudioConfig {
    StudioConfig {
        data_dir: root.join("designs"),
        print_command: "sticker-test-no-such-printer".to_string(),
        export: ExportConfig {
            settle_delay: Duration::ZERO,
            print_delay: Duration::ZERO,
            revoke_delay: Duration::ZERO,
            download_dir: root.join("downloads"),
            ..ExportConfig::default()
        },
        ..StudioConfig::default()
    }
}

// ==========================================================================
// Store commands
// ==========================================================================

#[test]
fn test_import_applies_name_and_clamps_canvas() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = studio(dir.path());
    let store = DesignStore::with_data_dir(&config.data_dir).expect("store");

    let mut oversized = jar_label();
    oversized.canvas_width = 10_000.0;
    let path = write_design(dir.path(), &oversized);

    let record =
        commands::import(&store, &path, Some("Pantry".to_string())).expect("import");
    assert_eq!(record.name, "Pantry");
    assert!((record.canvas_width - Design::clamp_canvas(10_000.0)).abs() < f32::EPSILON);
    assert_eq!(record.elements.len(), 1);

    let reopened = DesignStore::with_data_dir(&config.data_dir).expect("reopen");
    assert!(reopened.get(record.id).is_some());
}

#[test]
fn test_import_rejects_invalid_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = DesignStore::new();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ not json").expect("write");

    assert!(commands::import(&store, &path, None).is_err());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_delete_removes_design() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = studio(dir.path());
    let store = DesignStore::with_data_dir(&config.data_dir).expect("store");
    let record = store.insert(&jar_label()).expect("insert");
    drop(store);

    commands::run(
        &config,
        Command::Delete {
            id: record.id.to_string(),
        },
    )
    .await
    .expect("delete");

    let store = DesignStore::with_data_dir(&config.data_dir).expect("reopen");
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_unknown_id_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = studio(dir.path());

    let result = commands::run(
        &config,
        Command::Show {
            id: "not-a-uuid".to_string(),
        },
    )
    .await;
    assert!(result.is_err());
}

// ==========================================================================
// Export and print
// ==========================================================================

#[tokio::test]
async fn test_export_writes_pdf_to_download_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = studio(dir.path());
    let mut design = jar_label();
    design.id = Some(sticker_core::DesignId::new());

    let outcome = commands::export(&config, design, &ExportRequest::download("jam"))
        .await
        .expect("export");

    let ExportOutcome::Downloaded {
        path,
        popup_blocked,
    } = outcome
    else {
        panic!("expected a download");
    };
    assert!(!popup_blocked);
    assert_eq!(path, config.export.download_dir.join("jam.pdf"));
    let bytes = std::fs::read(&path).expect("pdf");
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_print_without_printer_falls_back_to_download() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = studio(dir.path());
    let mut design = jar_label();
    design.id = Some(sticker_core::DesignId::new());

    let outcome = commands::export(&config, design, &ExportRequest::print(""))
        .await
        .expect("export");

    match outcome {
        ExportOutcome::Downloaded {
            path,
            popup_blocked,
        } => {
            assert!(popup_blocked);
            assert_eq!(path, config.export.download_dir.join("Jar label.pdf"));
            assert!(path.exists());
        }
        ExportOutcome::Printed => panic!("no printer should be available"),
    }
}

#[tokio::test]
async fn test_export_of_unsaved_design() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = studio(dir.path());
    let design = jar_label();
    assert!(design.id.is_none());

    let outcome = commands::export(&config, design, &ExportRequest::download(""))
        .await
        .expect("export");
    assert_eq!(
        outcome,
        ExportOutcome::Downloaded {
            path: config.export.download_dir.join("Jar label.pdf"),
            popup_blocked: false,
        }
    );
}

#[tokio::test]
async fn test_thumbnail_is_stored_on_the_record() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = studio(dir.path());
    let store = DesignStore::with_data_dir(&config.data_dir).expect("store");
    let record = store.insert(&jar_label()).expect("insert");
    assert!(record.thumbnail_url.is_none());
    drop(store);

    commands::run(
        &config,
        Command::Thumbnail {
            id: record.id.to_string(),
        },
    )
    .await
    .expect("thumbnail");

    let store = DesignStore::with_data_dir(&config.data_dir).expect("reopen");
    let updated = store.get(record.id).expect("record");
    let uri = updated.thumbnail_url.expect("thumbnail set");
    assert!(uri.starts_with("data:image/png;base64,"));
    assert!(updated.updated_at > record.updated_at);
}
