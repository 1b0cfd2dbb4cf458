//! Durability tests for the snapshot-backed memory store.

use repair_kit::input::{CarFields, ComponentInput, LaborInput, OwnerFields};
use repair_kit::serialization::{SnapshotEnvelope, CURRENT_SCHEMA_VERSION, SNAPSHOT_MAGIC};
use repair_kit::{Error, JobController, MemoryStore, Money};

fn init_logging() {
    env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();
}

async fn seeded(path: &std::path::Path) -> (JobController<MemoryStore>, repair_kit::JobId) {
    init_logging();
    let store = MemoryStore::open(path).await.expect("Failed to open store");
    let controller = JobController::new(store);

    let job = controller
        .register_owner_and_car(
            OwnerFields::new("A. Khan", "0300-000").with_address("Main Road"),
            CarFields::new("Civic", 2020, "ABC-1"),
        )
        .await
        .expect("Failed to register")
        .job_id;
    controller
        .replace_labors(
            job,
            vec![
                LaborInput::new("engine check", 500),
                LaborInput::new("oil change", "199.99"),
            ],
        )
        .await
        .expect("Failed to replace labors");
    controller
        .add_component(job, ComponentInput::new("brake pad", 300).with_fault("worn"))
        .await
        .expect("Failed to add component");
    controller
        .calculate_profit(job, 1500)
        .await
        .expect("Failed to calculate profit");

    (controller, job)
}

#[tokio::test]
async fn test_reopened_store_returns_same_view() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("ledger.bin");

    let (controller, job) = seeded(&path).await;
    let before = controller.get_job_full(job).await.expect("read");
    assert!(path.exists());
    drop(controller);

    let reopened = JobController::new(MemoryStore::open(&path).await.expect("reopen"));
    let after = reopened.get_job_full(job).await.expect("read");

    assert_eq!(before, after);
    assert_eq!(after.totals.profit, Some(Money::from_minor(50001)));
}

#[tokio::test]
async fn test_reopened_store_continues_sequences() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("ledger.bin");

    let (controller, first) = seeded(&path).await;
    drop(controller);

    let (reopened, second) = seeded(&path).await;
    assert_ne!(first, second);

    let jobs = reopened.list_jobs().await.expect("list");
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[1].labors[0].name, "engine check");
}

#[tokio::test]
async fn test_deleted_job_stays_deleted_after_reopen() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("ledger.bin");

    let (controller, job) = seeded(&path).await;
    controller.delete_job(job).await.expect("delete");
    drop(controller);

    let store = MemoryStore::open(&path).await.expect("reopen");
    let stats = store.stats().await;
    assert_eq!(stats.jobs, 0);
    assert_eq!(stats.labor_items, 0);
    assert_eq!(stats.owners, 1);
    assert_eq!(stats.cars, 1);
}

#[tokio::test]
async fn test_commits_leave_no_staging_files() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("ledger.bin");

    let (controller, job) = seeded(&path).await;
    controller.delete_job(job).await.expect("delete");

    let names: Vec<_> = std::fs::read_dir(dir.path())
        .expect("Failed to list dir")
        .map(|entry| entry.expect("entry").file_name())
        .collect();
    assert_eq!(names, vec![std::ffi::OsString::from("ledger.bin")]);
}

#[tokio::test]
async fn test_deleted_owner_stays_deleted_after_reopen() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("ledger.bin");

    let (controller, job) = seeded(&path).await;
    let owner = controller.get_job_full(job).await.expect("read").owner;
    controller.delete_owner(owner.id).await.expect("delete owner");
    drop(controller);

    let stats = MemoryStore::open(&path).await.expect("reopen").stats().await;
    assert_eq!(stats.owners, 0);
    assert_eq!(stats.cars, 0);
    assert_eq!(stats.jobs, 0);
    assert_eq!(stats.component_items, 0);
}

#[tokio::test]
async fn test_open_rejects_foreign_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("ledger.bin");
    tokio::fs::write(&path, b"not a snapshot at all")
        .await
        .expect("write");

    let result = MemoryStore::open(&path).await;
    assert!(matches!(result, Err(Error::InvalidSnapshot(_))));
}

#[tokio::test]
async fn test_open_rejects_other_schema_version() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("ledger.bin");

    let envelope = SnapshotEnvelope {
        magic: SNAPSHOT_MAGIC,
        version: CURRENT_SCHEMA_VERSION + 1,
        payload: (),
    };
    let bytes = postcard::to_allocvec(&envelope).expect("encode");
    tokio::fs::write(&path, bytes).await.expect("write");

    let result = MemoryStore::open(&path).await;
    assert!(matches!(result, Err(Error::VersionMismatch { .. })));
}
