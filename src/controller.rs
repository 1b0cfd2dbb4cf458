//! Job lifecycle controller.
//!
//! Orchestrates every workflow step against a [`Store`]:
//!
//! ```text
//! register ──► job open ──calculate_profit──► priced ──delete_job──► closed
//!                 ▲                              │
//!                 └── replace_labors / add_component (profit invalidated)
//! ```
//!
//! Each operation runs in exactly one store transaction bounded by
//! [`ControllerConfig::store_timeout`]. Validation happens before the
//! transaction opens, so rejected input never touches the store.

use crate::aggregate::{aggregate, CostSummary};
use crate::config::ControllerConfig;
use crate::entity::{
    Car, CarId, ComponentItem, Job, JobId, JobStatus, LaborItem, Owner, OwnerId, Record,
};
use crate::error::{Error, ErrorKind, Result};
use crate::input::{CarFields, ComponentInput, LaborInput, OwnerFields};
use crate::money::{Money, NumericInput};
use crate::observability::{ControllerMetrics, NoOpMetrics, Operation};
use crate::store::{Store, Transaction};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

/// Result of a registration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub owner: Owner,
    pub car: Car,
    pub job_id: JobId,
}

/// Result of a profit calculation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfitQuote {
    pub job_id: JobId,
    pub client_payment: Money,
    pub profit: Money,
}

/// Totals block of a full job view.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobTotals {
    pub total_labor_cost: Money,
    pub total_component_cost: Money,
    /// Last recorded payment; kept when line items change.
    pub client_payment: Option<Money>,
    /// `null` until priced, and again after any line-item change.
    pub profit: Option<Money>,
}

impl JobTotals {
    fn new(summary: CostSummary, client_payment: Option<Money>) -> Self {
        JobTotals {
            total_labor_cost: summary.total_labor_cost,
            total_component_cost: summary.total_component_cost,
            client_payment,
            profit: summary.profit,
        }
    }
}

/// A job joined with its owner, car, line items and derived totals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobFull {
    pub job_id: JobId,
    pub status: JobStatus,
    pub owner: Owner,
    pub car: Car,
    pub labors: Vec<LaborItem>,
    pub components: Vec<ComponentItem>,
    pub totals: JobTotals,
}

/// One row of the owners-with-cars table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OwnerCarRow {
    pub owner_id: OwnerId,
    pub name: String,
    pub phone: String,
    pub address: Option<String>,
    pub car_id: CarId,
    pub model: String,
    pub year: i32,
    pub license_plate: String,
}

/// Job lifecycle controller.
///
/// Cheap to clone; clones share the store and metrics.
///
/// # Example
///
/// ```
/// use repair_kit::{JobController, MemoryStore};
/// use repair_kit::input::{CarFields, ComponentInput, LaborInput, OwnerFields};
/// use repair_kit::Money;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> repair_kit::Result<()> {
/// let controller = JobController::new(MemoryStore::new());
///
/// let registration = controller
///     .register_owner_and_car(
///         OwnerFields::new("A. Khan", "0300-000"),
///         CarFields::new("Civic", 2020, "ABC-1"),
///     )
///     .await?;
/// let job = registration.job_id;
///
/// controller
///     .replace_labors(job, vec![LaborInput::new("engine check", 500), LaborInput::new("oil change", 200)])
///     .await?;
/// controller
///     .add_component(job, ComponentInput::new("brake pad", 300).with_fault("worn"))
///     .await?;
///
/// let quote = controller.calculate_profit(job, 1500).await?;
/// assert_eq!(quote.profit, Money::from(500));
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct JobController<S: Store> {
    store: S,
    config: ControllerConfig,
    metrics: Arc<dyn ControllerMetrics>,
}

impl<S: Store> JobController<S> {
    /// Create a controller with default configuration and no-op metrics.
    pub fn new(store: S) -> Self {
        JobController {
            store,
            config: ControllerConfig::default(),
            metrics: Arc::new(NoOpMetrics),
        }
    }

    /// Set custom configuration.
    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Arc<dyn ControllerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Bound `work` by the store timeout and report it to metrics.
    ///
    /// A timed-out `work` future is dropped, which rolls back its
    /// transaction.
    async fn run<T, F>(&self, op: Operation, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timer = Instant::now();
        let result = match tokio::time::timeout(self.config.store_timeout, work).await {
            Ok(result) => result,
            Err(elapsed) => Err(Error::from(elapsed)),
        };

        match &result {
            Ok(_) => {
                self.metrics.record_success(op, timer.elapsed());
                info!("✓ {} succeeded in {:?}", op, timer.elapsed());
            }
            Err(e) => {
                self.metrics.record_failure(op, e, timer.elapsed());
                match e.kind() {
                    ErrorKind::Store => warn!("✗ {} failed: {}", op, e),
                    _ => debug!("✗ {} rejected: {}", op, e),
                }
            }
        }
        result
    }

    /// Create an owner, a car for that owner and the car's first job.
    ///
    /// All three records are written in one transaction: a store failure at
    /// any step leaves none of them behind.
    ///
    /// # Errors
    ///
    /// - `Error::ValidationError`: a required field is blank or the year is
    ///   not a plausible integer
    /// - `Error::StoreError`: persisting failed or timed out
    pub async fn register_owner_and_car(
        &self,
        owner: OwnerFields,
        car: CarFields,
    ) -> Result<Registration> {
        self.run(Operation::RegisterOwnerAndCar, async {
            let owner = owner.validate()?;
            let car = car.validate(&self.config)?;

            let mut tx = self.store.begin().await?;
            let owner = tx.insert_owner(owner).await?;
            let car = tx.insert_car(owner.id, car).await?;
            let job = tx.insert_job(car.id).await?;
            tx.commit().await?;

            Ok(Registration {
                owner,
                car,
                job_id: job.id,
            })
        })
        .await
    }

    /// Add a car to an existing owner and open its first job.
    ///
    /// # Errors
    ///
    /// - `Error::ValidationError`: a required car field is blank or the year
    ///   is not a plausible integer
    /// - `Error::NotFound`: the owner does not exist
    /// - `Error::StoreError`: persisting failed or timed out
    pub async fn register_car(
        &self,
        owner_id: OwnerId,
        car: CarFields,
    ) -> Result<Registration> {
        self.run(Operation::RegisterCar, async {
            let car = car.validate(&self.config)?;

            let mut tx = self.store.begin().await?;
            let owner = load_owner(&mut tx, owner_id).await?;
            let car = tx.insert_car(owner.id, car).await?;
            let job = tx.insert_job(car.id).await?;
            tx.commit().await?;

            Ok(Registration {
                owner,
                car,
                job_id: job.id,
            })
        })
        .await
    }

    /// Overwrite the labor table of a job; an empty list clears it.
    ///
    /// Invalidates a cached profit.
    ///
    /// # Errors
    ///
    /// - `Error::ValidationError`: a pay amount is beyond [`Money::MAX_ABS`]
    /// - `Error::NotFound`: the job does not exist
    /// - `Error::StoreError`: persisting failed or timed out
    pub async fn replace_labors(
        &self,
        job_id: JobId,
        labors: Vec<LaborInput>,
    ) -> Result<Vec<LaborItem>> {
        self.run(Operation::ReplaceLabors, async {
            let labors = labors
                .into_iter()
                .map(LaborInput::coerce)
                .collect::<Result<Vec<_>>>()?;

            let mut tx = self.store.begin().await?;
            let job = load_job(&mut tx, job_id).await?;
            let items = tx.replace_labors(job_id, labors).await?;
            invalidate_profit(&mut tx, job).await?;
            tx.commit().await?;

            Ok(items)
        })
        .await
    }

    /// Append one component to a job.
    ///
    /// Invalidates a cached profit.
    ///
    /// # Errors
    ///
    /// - `Error::ValidationError`: the price is beyond [`Money::MAX_ABS`]
    /// - `Error::NotFound`: the job does not exist
    /// - `Error::StoreError`: persisting failed or timed out
    pub async fn add_component(
        &self,
        job_id: JobId,
        component: ComponentInput,
    ) -> Result<ComponentItem> {
        self.run(Operation::AddComponent, async {
            let component = component.coerce()?;

            let mut tx = self.store.begin().await?;
            let job = load_job(&mut tx, job_id).await?;
            let item = tx.append_component(job_id, component).await?;
            invalidate_profit(&mut tx, job).await?;
            tx.commit().await?;

            Ok(item)
        })
        .await
    }

    /// Append several components, each in its own transaction.
    ///
    /// Returns one result per input, in input order; a failure on one item
    /// does not stop the others.
    pub async fn add_components(
        &self,
        job_id: JobId,
        components: Vec<ComponentInput>,
    ) -> Vec<Result<ComponentItem>> {
        let mut results = Vec::with_capacity(components.len());
        for component in components {
            results.push(self.add_component(job_id, component).await);
        }
        results
    }

    /// Record the client payment and cache the resulting profit.
    ///
    /// Recalculating overwrites both values.
    ///
    /// # Errors
    ///
    /// - `Error::ValidationError`: payment is missing, non-numeric, not
    ///   finite or out of range (the job is left untouched)
    /// - `Error::NotFound`: the job does not exist
    /// - `Error::StoreError`: persisting failed or timed out
    pub async fn calculate_profit(
        &self,
        job_id: JobId,
        payment: impl Into<NumericInput>,
    ) -> Result<ProfitQuote> {
        let payment = payment.into();

        self.run(Operation::CalculateProfit, async {
            let payment = payment.to_money_strict("payment")?;

            let mut tx = self.store.begin().await?;
            let mut job = load_job(&mut tx, job_id).await?;
            let labors = tx.labors(job_id).await?;
            let components = tx.components(job_id).await?;

            let profit = aggregate(&labors, &components, None)?.profit_for(payment)?;
            job.client_payment = Some(payment);
            job.profit = Some(profit);
            tx.update_job(job).await?;
            tx.commit().await?;

            Ok(ProfitQuote {
                job_id,
                client_payment: payment,
                profit,
            })
        })
        .await
    }

    /// Read a job with owner, car, line items and totals in one transaction.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound`: the job does not exist
    /// - `Error::StoreError`: reading failed or timed out
    pub async fn get_job_full(&self, job_id: JobId) -> Result<JobFull> {
        self.run(Operation::GetJobFull, async {
            let mut tx = self.store.begin().await?;
            let job = load_job(&mut tx, job_id).await?;
            let full = assemble(&mut tx, job).await?;
            tx.rollback().await?;
            Ok(full)
        })
        .await
    }

    /// Delete a job and its line items. Owner and car are kept.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound`: the job does not exist (including a repeated
    ///   delete)
    /// - `Error::StoreError`: persisting failed or timed out
    pub async fn delete_job(&self, job_id: JobId) -> Result<()> {
        self.run(Operation::DeleteJob, async {
            let mut tx = self.store.begin().await?;
            if !tx.delete_job(job_id).await? {
                return Err(Error::not_found(Job::table(), job_id));
            }
            tx.commit().await
        })
        .await
    }

    /// Delete an owner together with all of their cars, jobs and line items.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound`: the owner does not exist
    /// - `Error::StoreError`: persisting failed or timed out
    pub async fn delete_owner(&self, owner_id: OwnerId) -> Result<()> {
        self.run(Operation::DeleteOwner, async {
            let mut tx = self.store.begin().await?;
            if !tx.delete_owner(owner_id).await? {
                return Err(Error::not_found(Owner::table(), owner_id));
            }
            tx.commit().await
        })
        .await
    }

    /// Every owner, ordered by id.
    pub async fn list_owners(&self) -> Result<Vec<Owner>> {
        self.run(Operation::ListOwners, async {
            let mut tx = self.store.begin().await?;
            let owners = tx.owners().await?;
            tx.rollback().await?;
            Ok(owners)
        })
        .await
    }

    /// Every car, ordered by id.
    pub async fn list_cars(&self) -> Result<Vec<Car>> {
        self.run(Operation::ListCars, async {
            let mut tx = self.store.begin().await?;
            let cars = tx.cars().await?;
            tx.rollback().await?;
            Ok(cars)
        })
        .await
    }

    /// Every job as a full view, ordered by job id.
    pub async fn list_jobs(&self) -> Result<Vec<JobFull>> {
        self.run(Operation::ListJobs, async {
            let mut tx = self.store.begin().await?;
            let jobs = tx.jobs().await?;

            let mut views = Vec::with_capacity(jobs.len());
            for job in jobs {
                views.push(assemble(&mut tx, job).await?);
            }
            tx.rollback().await?;
            Ok(views)
        })
        .await
    }

    /// One row per car joined with its owner, ordered by car id.
    pub async fn list_owners_with_cars(&self) -> Result<Vec<OwnerCarRow>> {
        self.run(Operation::ListOwnersWithCars, async {
            let mut tx = self.store.begin().await?;
            let cars = tx.cars().await?;

            let mut rows = Vec::with_capacity(cars.len());
            for car in cars {
                let owner = load_owner(&mut tx, car.owner_id).await?;
                rows.push(OwnerCarRow {
                    owner_id: owner.id,
                    name: owner.name,
                    phone: owner.phone,
                    address: owner.address,
                    car_id: car.id,
                    model: car.model,
                    year: car.year,
                    license_plate: car.license_plate,
                });
            }
            tx.rollback().await?;
            Ok(rows)
        })
        .await
    }

    /// Health check - verify the store is reachable.
    pub async fn health_check(&self) -> Result<bool> {
        tokio::time::timeout(self.config.store_timeout, self.store.health_check()).await?
    }
}

async fn load_job<T: Transaction>(tx: &mut T, id: JobId) -> Result<Job> {
    tx.job(id)
        .await?
        .ok_or_else(|| Error::not_found(Job::table(), id))
}

async fn load_owner<T: Transaction>(tx: &mut T, id: OwnerId) -> Result<Owner> {
    tx.owner(id)
        .await?
        .ok_or_else(|| Error::not_found(Owner::table(), id))
}

async fn invalidate_profit<T: Transaction>(tx: &mut T, mut job: Job) -> Result<()> {
    if job.profit.is_none() {
        return Ok(());
    }
    debug!("Invalidating cached profit of {}", job.record_key());
    job.invalidate_profit();
    tx.update_job(job).await
}

/// Join a job with its car, owner and line items and run the aggregator.
async fn assemble<T: Transaction>(tx: &mut T, job: Job) -> Result<JobFull> {
    let car = tx
        .car(job.car_id)
        .await?
        .ok_or_else(|| Error::not_found(Car::table(), job.car_id))?;
    let owner = load_owner(tx, car.owner_id).await?;
    let labors = tx.labors(job.id).await?;
    let components = tx.components(job.id).await?;

    let summary = aggregate(&labors, &components, job.priced_payment())?;

    Ok(JobFull {
        job_id: job.id,
        status: job.status(),
        owner,
        car,
        labors,
        components,
        totals: JobTotals::new(summary, job.client_payment),
    })
}
