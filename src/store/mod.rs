//! Persistence store abstraction.
//!
//! The controller only talks to storage through [`Store`] and
//! [`Transaction`]. Every controller operation opens exactly one transaction
//! and either commits it or lets it roll back, so an operation is applied
//! completely or not at all.
//!
//! Implementations: [`MemoryStore`] (in-process, optional snapshot file). A
//! SQL-backed store implements the same pair of traits with one database
//! transaction per [`Transaction`].

use crate::entity::{Car, CarId, ComponentItem, Job, JobId, LaborItem, Owner, OwnerId};
use crate::error::Result;
use crate::input::{NewCar, NewComponent, NewLabor, NewOwner};

pub mod memory;

pub use memory::{MemoryStore, MemoryTransaction, StoreStats};

/// Entry point to a persistence backend.
///
/// **IMPORTANT:** Methods use `&self`; implementations share their state
/// internally (the in-memory store wraps its tables in an `Arc`), so a
/// `Store` is cheap to clone into every request handler.
#[allow(async_fn_in_trait)]
pub trait Store: Send + Sync + Clone {
    type Transaction: Transaction;

    /// Open a transaction.
    ///
    /// # Errors
    /// Returns `Error::StoreError` if the backend cannot start one.
    async fn begin(&self) -> Result<Self::Transaction>;

    /// Health check - verify the backend is reachable.
    ///
    /// # Errors
    /// Returns `Err` if the backend is not accessible
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// One unit of work against the store.
///
/// Changes become visible to other transactions only after
/// [`commit`](Transaction::commit). Dropping a transaction without
/// committing rolls it back; this also covers cancellation on timeout.
///
/// Foreign keys are enforced here: inserting a car for a missing owner,
/// a job for a missing car, or line items for a missing job fails with
/// `Error::NotFound`.
#[allow(async_fn_in_trait)]
pub trait Transaction: Send + Sized {
    async fn insert_owner(&mut self, owner: NewOwner) -> Result<Owner>;

    async fn insert_car(&mut self, owner_id: OwnerId, car: NewCar) -> Result<Car>;

    /// Open a new job with no payment and no line items.
    async fn insert_job(&mut self, car_id: CarId) -> Result<Job>;

    async fn owner(&mut self, id: OwnerId) -> Result<Option<Owner>>;

    async fn car(&mut self, id: CarId) -> Result<Option<Car>>;

    async fn job(&mut self, id: JobId) -> Result<Option<Job>>;

    /// All owners, ordered by id.
    async fn owners(&mut self) -> Result<Vec<Owner>>;

    /// All cars, ordered by id.
    async fn cars(&mut self) -> Result<Vec<Car>>;

    /// All jobs, ordered by id.
    async fn jobs(&mut self) -> Result<Vec<Job>>;

    /// Labor items of a job in insertion order.
    async fn labors(&mut self, job_id: JobId) -> Result<Vec<LaborItem>>;

    /// Component items of a job in insertion order.
    async fn components(&mut self, job_id: JobId) -> Result<Vec<ComponentItem>>;

    /// Overwrite the whole labor set of a job.
    async fn replace_labors(&mut self, job_id: JobId, labors: Vec<NewLabor>)
        -> Result<Vec<LaborItem>>;

    /// Append one component to a job.
    async fn append_component(
        &mut self,
        job_id: JobId,
        component: NewComponent,
    ) -> Result<ComponentItem>;

    /// Store the payment/profit fields of an existing job.
    async fn update_job(&mut self, job: Job) -> Result<()>;

    /// Remove a job with its line items. Returns `false` if it did not exist.
    async fn delete_job(&mut self, id: JobId) -> Result<bool>;

    /// Remove an owner with every car, job and line item under it.
    /// Returns `false` if it did not exist.
    async fn delete_owner(&mut self, id: OwnerId) -> Result<bool>;

    /// Make all changes durable and visible.
    ///
    /// # Errors
    /// Returns `Err` if persisting fails; the changes are rolled back.
    /// If the returned future is dropped before it resolves, the outcome is
    /// decided by the backend and must be the same for readers and for
    /// durable storage.
    async fn commit(self) -> Result<()>;

    /// Discard all changes.
    async fn rollback(self) -> Result<()> {
        drop(self);
        Ok(())
    }
}
