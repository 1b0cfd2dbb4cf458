//! In-memory store (default, async, optionally durable).
//!
//! All tables live behind one async mutex. A transaction owns the lock for
//! its whole lifetime, writes straight into the tables and records an undo
//! entry per change; rollback (explicit, on drop, or after a failed
//! snapshot write) replays the undo log backwards.
//!
//! With a snapshot path, every committing transaction that changed anything
//! rewrites the snapshot file (write to a staging file, then rename) before
//! the commit is reported as successful. The write runs on a blocking task
//! that owns the locked tables: if the committing future is cancelled, the
//! task still finishes and either keeps the changes (file written) or rolls
//! them back (write failed), so the file and the tables never disagree.

use super::{Store, Transaction};
use crate::entity::{
    Car, CarId, ComponentId, ComponentItem, Job, JobId, LaborId, LaborItem, Owner, OwnerId, Record,
};
use crate::error::{Error, Result};
use crate::input::{NewCar, NewComponent, NewLabor, NewOwner};
use crate::serialization::{decode_snapshot, encode_snapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Last identifier handed out per table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Sequences {
    owner: u64,
    car: u64,
    job: u64,
    labor: u64,
    component: u64,
}

fn next(counter: &mut u64) -> u64 {
    *counter += 1;
    *counter
}

/// The five relations plus id sequences. This is the snapshot payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct Tables {
    sequences: Sequences,
    owners: BTreeMap<OwnerId, Owner>,
    cars: BTreeMap<CarId, Car>,
    jobs: BTreeMap<JobId, Job>,
    labors: BTreeMap<JobId, Vec<LaborItem>>,
    components: BTreeMap<JobId, Vec<ComponentItem>>,
}

/// A job removed together with its line items.
struct RemovedJob {
    job: Job,
    labors: Option<Vec<LaborItem>>,
    components: Option<Vec<ComponentItem>>,
}

impl Tables {
    fn remove_job(&mut self, id: JobId) -> Option<RemovedJob> {
        let job = self.jobs.remove(&id)?;
        Some(RemovedJob {
            job,
            labors: self.labors.remove(&id),
            components: self.components.remove(&id),
        })
    }

    fn restore_job(&mut self, removed: RemovedJob) {
        let job_id = removed.job.id;
        self.jobs.insert(job_id, removed.job);
        restore(&mut self.labors, job_id, removed.labors);
        restore(&mut self.components, job_id, removed.components);
    }
}

/// Inverse of one applied change.
enum Undo {
    InsertedOwner(OwnerId),
    InsertedCar(CarId),
    InsertedJob(JobId),
    UpdatedJob(Job),
    ReplacedLabors(JobId, Option<Vec<LaborItem>>),
    AppendedComponent(JobId),
    DeletedJob(RemovedJob),
    DeletedOwner {
        owner: Owner,
        cars: Vec<Car>,
        jobs: Vec<RemovedJob>,
    },
}

/// Thread-safe async in-memory store.
///
/// Cloning is cheap and every clone shares the same tables.
///
/// # Example
///
/// ```no_run
/// use repair_kit::store::{MemoryStore, Store, Transaction};
/// use repair_kit::input::OwnerFields;
///
/// #[tokio::main]
/// async fn main() -> repair_kit::Result<()> {
///     let store = MemoryStore::open("ledger.bin").await?;
///
///     let mut tx = store.begin().await?;
///     let owner = OwnerFields::new("A. Khan", "0300-000").validate()?;
///     tx.insert_owner(owner).await?;
///     tx.commit().await?;
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    snapshot_path: Option<Arc<PathBuf>>,
}

impl MemoryStore {
    /// Create an empty, purely in-memory store.
    pub fn new() -> Self {
        MemoryStore {
            tables: Arc::new(Mutex::new(Tables::default())),
            snapshot_path: None,
        }
    }

    /// Open a durable store backed by the snapshot file at `path`.
    ///
    /// A missing file starts an empty store; the file is created on the
    /// first commit.
    ///
    /// # Errors
    ///
    /// - `Error::StoreError`: the file exists but cannot be read
    /// - `Error::InvalidSnapshot` / `Error::VersionMismatch` /
    ///   `Error::DeserializationError`: the file is not a usable snapshot
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let tables = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let tables: Tables = decode_snapshot(&bytes)?;
                info!(
                    "✓ Store loaded snapshot {} ({} jobs)",
                    path.display(),
                    tables.jobs.len()
                );
                tables
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Store snapshot {} not found, starting empty", path.display());
                Tables::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(MemoryStore {
            tables: Arc::new(Mutex::new(tables)),
            snapshot_path: Some(Arc::new(path)),
        })
    }

    /// Snapshot file in use, if the store is durable.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref().map(PathBuf::as_path)
    }

    /// Row counts per relation.
    pub async fn stats(&self) -> StoreStats {
        let tables = self.tables.lock().await;

        StoreStats {
            owners: tables.owners.len(),
            cars: tables.cars.len(),
            jobs: tables.jobs.len(),
            labor_items: tables.labors.values().map(Vec::len).sum(),
            component_items: tables.components.values().map(Vec::len).sum(),
        }
    }

    /// Print store statistics to debug log.
    pub async fn log_stats(&self) {
        let stats = self.stats().await;
        debug!(
            "Store Stats: {} owners, {} cars, {} jobs, {} labor items, {} component items",
            stats.owners, stats.cars, stats.jobs, stats.labor_items, stats.component_items
        );
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction> {
        let tables = Arc::clone(&self.tables).lock_owned().await;
        let sequences_at_begin = tables.sequences;

        Ok(MemoryTransaction {
            state: TxState {
                tables,
                undo: Vec::new(),
                sequences_at_begin,
                finished: false,
            },
            snapshot_path: self.snapshot_path.clone(),
        })
    }
}

/// Row counts per relation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreStats {
    pub owners: usize,
    pub cars: usize,
    pub jobs: usize,
    pub labor_items: usize,
    pub component_items: usize,
}

/// Transaction over a [`MemoryStore`].
///
/// Holds the store lock until committed, rolled back or dropped.
pub struct MemoryTransaction {
    state: TxState,
    snapshot_path: Option<Arc<PathBuf>>,
}

/// Locked tables plus the undo log of the changes applied so far.
///
/// Dropped unfinished, it rolls the changes back.
struct TxState {
    tables: OwnedMutexGuard<Tables>,
    undo: Vec<Undo>,
    sequences_at_begin: Sequences,
    finished: bool,
}

impl TxState {
    fn require_job(&self, id: JobId) -> Result<()> {
        if self.tables.jobs.contains_key(&id) {
            Ok(())
        } else {
            Err(Error::not_found(Job::table(), id))
        }
    }

    fn undo_all(&mut self) {
        if self.undo.is_empty() {
            return;
        }

        let undo = std::mem::take(&mut self.undo);
        warn!("⚠ Store ROLLBACK {} change(s)", undo.len());

        let tables = &mut *self.tables;
        for entry in undo.into_iter().rev() {
            match entry {
                Undo::InsertedOwner(id) => {
                    tables.owners.remove(&id);
                }
                Undo::InsertedCar(id) => {
                    tables.cars.remove(&id);
                }
                Undo::InsertedJob(id) => {
                    tables.jobs.remove(&id);
                }
                Undo::UpdatedJob(job) => {
                    tables.jobs.insert(job.id, job);
                }
                Undo::ReplacedLabors(job_id, previous) => {
                    restore(&mut tables.labors, job_id, previous);
                }
                Undo::AppendedComponent(job_id) => {
                    if let Some(items) = tables.components.get_mut(&job_id) {
                        items.pop();
                        if items.is_empty() {
                            tables.components.remove(&job_id);
                        }
                    }
                }
                Undo::DeletedJob(removed) => tables.restore_job(removed),
                Undo::DeletedOwner { owner, cars, jobs } => {
                    tables.owners.insert(owner.id, owner);
                    for car in cars {
                        tables.cars.insert(car.id, car);
                    }
                    for removed in jobs {
                        tables.restore_job(removed);
                    }
                }
            }
        }
        tables.sequences = self.sequences_at_begin;
    }

    /// Write `bytes` to the snapshot file and keep the changes.
    ///
    /// Blocking. On error the state is dropped unfinished and rolls back.
    fn persist(mut self, path: &Path, bytes: Vec<u8>) -> Result<()> {
        let staging = staging_path(path);

        let written =
            std::fs::write(&staging, &bytes).and_then(|()| std::fs::rename(&staging, path));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&staging);
            return Err(e.into());
        }

        self.finished = true;
        debug!("✓ Store SNAPSHOT {} ({} bytes)", path.display(), bytes.len());
        Ok(())
    }
}

impl Drop for TxState {
    fn drop(&mut self) {
        if !self.finished {
            self.undo_all();
        }
    }
}

fn restore<T>(table: &mut BTreeMap<JobId, Vec<T>>, job_id: JobId, previous: Option<Vec<T>>) {
    match previous {
        Some(items) => {
            table.insert(job_id, items);
        }
        None => {
            table.remove(&job_id);
        }
    }
}

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Staging file next to `path`, unique per commit and process.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("snapshot"));
    name.push(format!(
        ".{}.{}.tmp",
        std::process::id(),
        STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    path.with_file_name(name)
}

impl Transaction for MemoryTransaction {
    async fn insert_owner(&mut self, owner: NewOwner) -> Result<Owner> {
        let id = OwnerId(next(&mut self.state.tables.sequences.owner));
        let owner = Owner {
            id,
            name: owner.name,
            phone: owner.phone,
            address: owner.address,
        };

        self.state.tables.owners.insert(id, owner.clone());
        self.state.undo.push(Undo::InsertedOwner(id));
        debug!("✓ Store INSERT {}", owner.record_key());
        Ok(owner)
    }

    async fn insert_car(&mut self, owner_id: OwnerId, car: NewCar) -> Result<Car> {
        if !self.state.tables.owners.contains_key(&owner_id) {
            return Err(Error::not_found(Owner::table(), owner_id));
        }

        let id = CarId(next(&mut self.state.tables.sequences.car));
        let car = Car {
            id,
            owner_id,
            model: car.model,
            year: car.year,
            license_plate: car.license_plate,
        };

        self.state.tables.cars.insert(id, car.clone());
        self.state.undo.push(Undo::InsertedCar(id));
        debug!("✓ Store INSERT {} (owner {})", car.record_key(), owner_id);
        Ok(car)
    }

    async fn insert_job(&mut self, car_id: CarId) -> Result<Job> {
        if !self.state.tables.cars.contains_key(&car_id) {
            return Err(Error::not_found(Car::table(), car_id));
        }

        let id = JobId(next(&mut self.state.tables.sequences.job));
        let job = Job::open(id, car_id);

        self.state.tables.jobs.insert(id, job.clone());
        self.state.undo.push(Undo::InsertedJob(id));
        debug!("✓ Store INSERT {} (car {})", job.record_key(), car_id);
        Ok(job)
    }

    async fn owner(&mut self, id: OwnerId) -> Result<Option<Owner>> {
        Ok(self.state.tables.owners.get(&id).cloned())
    }

    async fn car(&mut self, id: CarId) -> Result<Option<Car>> {
        Ok(self.state.tables.cars.get(&id).cloned())
    }

    async fn job(&mut self, id: JobId) -> Result<Option<Job>> {
        Ok(self.state.tables.jobs.get(&id).cloned())
    }

    async fn owners(&mut self) -> Result<Vec<Owner>> {
        Ok(self.state.tables.owners.values().cloned().collect())
    }

    async fn cars(&mut self) -> Result<Vec<Car>> {
        Ok(self.state.tables.cars.values().cloned().collect())
    }

    async fn jobs(&mut self) -> Result<Vec<Job>> {
        Ok(self.state.tables.jobs.values().cloned().collect())
    }

    async fn labors(&mut self, job_id: JobId) -> Result<Vec<LaborItem>> {
        Ok(self
            .state
            .tables
            .labors
            .get(&job_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn components(&mut self, job_id: JobId) -> Result<Vec<ComponentItem>> {
        Ok(self
            .state
            .tables
            .components
            .get(&job_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_labors(
        &mut self,
        job_id: JobId,
        labors: Vec<NewLabor>,
    ) -> Result<Vec<LaborItem>> {
        self.state.require_job(job_id)?;

        let tables = &mut *self.state.tables;
        let items: Vec<LaborItem> = labors
            .into_iter()
            .map(|labor| LaborItem {
                id: LaborId(next(&mut tables.sequences.labor)),
                job_id,
                name: labor.name,
                pay: labor.pay,
            })
            .collect();

        let previous = tables.labors.insert(job_id, items.clone());
        self.state.undo.push(Undo::ReplacedLabors(job_id, previous));
        debug!("✓ Store REPLACE labors of job:{} ({} items)", job_id, items.len());
        Ok(items)
    }

    async fn append_component(
        &mut self,
        job_id: JobId,
        component: NewComponent,
    ) -> Result<ComponentItem> {
        self.state.require_job(job_id)?;

        let item = ComponentItem {
            id: ComponentId(next(&mut self.state.tables.sequences.component)),
            job_id,
            name: component.name,
            fault: component.fault,
            price: component.price,
        };

        self.state
            .tables
            .components
            .entry(job_id)
            .or_default()
            .push(item.clone());
        self.state.undo.push(Undo::AppendedComponent(job_id));
        debug!("✓ Store APPEND {} to job:{}", item.record_key(), job_id);
        Ok(item)
    }

    async fn update_job(&mut self, job: Job) -> Result<()> {
        let id = job.id;
        match self.state.tables.jobs.insert(id, job) {
            Some(previous) => {
                self.state.undo.push(Undo::UpdatedJob(previous));
                debug!("✓ Store UPDATE job:{}", id);
                Ok(())
            }
            None => {
                self.state.tables.jobs.remove(&id);
                Err(Error::not_found(Job::table(), id))
            }
        }
    }

    async fn delete_job(&mut self, id: JobId) -> Result<bool> {
        let Some(removed) = self.state.tables.remove_job(id) else {
            debug!("✗ Store DELETE job:{} -> MISSING", id);
            return Ok(false);
        };

        self.state.undo.push(Undo::DeletedJob(removed));
        debug!("✓ Store DELETE job:{} (cascade)", id);
        Ok(true)
    }

    async fn delete_owner(&mut self, id: OwnerId) -> Result<bool> {
        let tables = &mut *self.state.tables;
        let Some(owner) = tables.owners.remove(&id) else {
            debug!("✗ Store DELETE owner:{} -> MISSING", id);
            return Ok(false);
        };

        let car_ids: Vec<CarId> = tables
            .cars
            .values()
            .filter(|car| car.owner_id == id)
            .map(|car| car.id)
            .collect();
        let job_ids: Vec<JobId> = tables
            .jobs
            .values()
            .filter(|job| car_ids.contains(&job.car_id))
            .map(|job| job.id)
            .collect();

        let cars: Vec<Car> = car_ids
            .iter()
            .filter_map(|car_id| tables.cars.remove(car_id))
            .collect();
        let jobs: Vec<RemovedJob> = job_ids
            .into_iter()
            .filter_map(|job_id| tables.remove_job(job_id))
            .collect();

        debug!(
            "✓ Store DELETE owner:{} (cascade {} cars, {} jobs)",
            id,
            cars.len(),
            jobs.len()
        );
        self.state.undo.push(Undo::DeletedOwner { owner, cars, jobs });
        Ok(true)
    }

    async fn commit(self) -> Result<()> {
        let MemoryTransaction {
            mut state,
            snapshot_path,
        } = self;
        let changes = state.undo.len();

        match snapshot_path {
            Some(path) if changes > 0 => {
                let bytes = encode_snapshot(&*state.tables)?;
                tokio::task::spawn_blocking(move || state.persist(&path, bytes)).await??;
            }
            _ => state.finished = true,
        }

        if changes > 0 {
            debug!("✓ Store COMMIT {} change(s)", changes);
        }
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        let mut state = self.state;
        state.undo_all();
        state.finished = true;
        Ok(())
    }
}
