//! # repair-kit
//!
//! Repair-job cost ledger for vehicle workshops.
//!
//! A workshop registers a car owner and the car, which opens a repair job.
//! Labor items and component items are recorded against the job, and once
//! the client payment is known the profit is derived from it:
//!
//! ```text
//! profit = client_payment - Σ labor.pay - Σ component.price
//! ```
//!
//! ## Features
//!
//! - **Transactional:** Every operation commits completely or not at all
//! - **Decimal Money:** Amounts never pass through binary floating point
//! - **Lenient Line Items:** Unusable amounts are recorded as zero, never rejected
//! - **Store Agnostic:** Controller talks to a [`Store`] trait; in-memory store included
//! - **Durable Option:** [`MemoryStore::open`] persists a versioned snapshot on each commit
//! - **HTTP Boundary:** Optional axum router behind the `http` feature
//!
//! ## Quick Start
//!
//! ```
//! use repair_kit::input::{CarFields, ComponentInput, LaborInput, OwnerFields};
//! use repair_kit::{JobController, MemoryStore, Money};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> repair_kit::Result<()> {
//! // 1. Create a controller (clone it into every request handler)
//! let controller = JobController::new(MemoryStore::new());
//!
//! // 2. Register owner and car; a job is opened for the car
//! let registration = controller
//!     .register_owner_and_car(
//!         OwnerFields::new("A. Khan", "0300-000"),
//!         CarFields::new("Civic", 2020, "ABC-1"),
//!     )
//!     .await?;
//!
//! // 3. Record work
//! controller
//!     .replace_labors(registration.job_id, vec![LaborInput::new("engine check", 500)])
//!     .await?;
//! controller
//!     .add_component(registration.job_id, ComponentInput::new("brake pad", 300))
//!     .await?;
//!
//! // 4. Price it
//! let quote = controller.calculate_profit(registration.job_id, 1000).await?;
//! assert_eq!(quote.profit, Money::from(200));
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod aggregate;
pub mod config;
pub mod controller;
pub mod entity;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod input;
pub mod money;
pub mod observability;
pub mod serialization;
pub mod store;

// Re-exports for convenience
pub use aggregate::{aggregate, CostSummary};
pub use config::{ControllerConfig, ServerConfig};
pub use controller::{JobController, JobFull, JobTotals, OwnerCarRow, ProfitQuote, Registration};
pub use entity::{
    Car, CarId, ComponentId, ComponentItem, Job, JobId, JobStatus, LaborId, LaborItem, Owner,
    OwnerId, Record,
};
pub use error::{Error, ErrorKind, Result};
pub use money::{Money, NumericInput};
pub use store::{MemoryStore, Store, Transaction};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
