//! Persistence round trips through real files on disk.

use campus_core::domain::DayStatus;
use campus_core::{Core, CoreError};
use chrono::Local;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

async fn connected_core(dir: &std::path::Path) -> Core {
    let core = Core::new_with_config(dir.to_path_buf()).await.unwrap();
    let ledger_dir = core.config().read().await.ledger_dir();
    core.connect(ledger_dir).await.unwrap();
    core
}

#[tokio::test]
async fn ledger_survives_restart() {
    let dir = tempdir().unwrap();
    let today = Local::now().date_naive();

    let core = connected_core(dir.path()).await;
    let ana = core
        .register("García, Ana", "Teacher", "Math", "img-a".to_string())
        .await
        .unwrap();
    core.register("Liu", "Student", "History", "img-b".to_string())
        .await
        .unwrap();
    assert!(core.set_status(ana.id, DayStatus::Present, today).await.unwrap());

    assert!(core.save().await.unwrap());
    // A second save has nothing new to write.
    assert!(!core.save().await.unwrap());
    core.shutdown().await.unwrap();

    let reopened = connected_core(dir.path()).await;
    let roster = reopened.roster().await;
    assert_eq!(roster.len(), 2);
    assert_eq!(roster[0].name, "García, Ana");
    assert_eq!(roster[0].id, ana.id);

    let log = reopened.log().await;
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].user_id, ana.id);
    assert_eq!(reopened.day_stats(today).await.present, 1);
    assert!(!reopened.is_dirty().await);
}

#[tokio::test]
async fn corrupt_roster_file_rejected_on_connect() {
    let dir = tempdir().unwrap();

    // Seed the ledger directory with a file whose header lacks the
    // image column.
    let ledger_dir = {
        let core = Core::new_with_config(dir.path().to_path_buf()).await.unwrap();
        core.config().read().await.ledger_dir()
    };
    std::fs::create_dir_all(&ledger_dir).unwrap();
    std::fs::write(ledger_dir.join("database.csv"), "a,b,c\n1,2,3\n").unwrap();

    let core = Core::new_with_config(dir.path().to_path_buf()).await.unwrap();
    let err = core.connect(ledger_dir).await.unwrap_err();
    assert!(matches!(err, CoreError::Codec(_)));
    assert!(core.roster().await.is_empty());
}

#[tokio::test]
async fn export_then_import_replaces_collections() {
    let source_dir = tempdir().unwrap();
    let target_dir = tempdir().unwrap();
    let today = Local::now().date_naive();

    let source = connected_core(source_dir.path()).await;
    let ana = source
        .register("Ana", "Teacher", "Math", "img-a".to_string())
        .await
        .unwrap();
    source
        .register("Liu", "Student", "History", "img-b".to_string())
        .await
        .unwrap();
    assert!(source.set_status(ana.id, DayStatus::Late, today).await.unwrap());

    let roster_csv = source.export_roster().await;
    let log_csv = source.export_log().await;

    let target = connected_core(target_dir.path()).await;
    target
        .register("Stale", "Student", "Art", "img-c".to_string())
        .await
        .unwrap();

    assert_eq!(target.import_roster(roster_csv.into_bytes()).await.unwrap(), 2);
    assert_eq!(target.import_log(log_csv.into_bytes()).await.unwrap(), 1);

    let roster = target.roster().await;
    assert_eq!(roster.len(), 2);
    assert!(roster.iter().all(|i| i.name != "Stale"));
    assert_eq!(target.day_stats(today).await.late, 1);
}

#[tokio::test]
async fn malformed_import_leaves_store_untouched() {
    let dir = tempdir().unwrap();
    let core = connected_core(dir.path()).await;
    core.register("Ana", "Teacher", "Math", "img-a".to_string())
        .await
        .unwrap();

    let err = core.import_roster(b"not,a,roster\n".to_vec()).await.unwrap_err();
    assert!(matches!(err, CoreError::Codec(_)));
    assert_eq!(core.roster().await.len(), 1);
}
