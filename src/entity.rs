//! Persisted records: owners, cars, jobs and their line items.

use crate::money::Money;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                $name(v)
            }
        }

        impl From<$name> for u64 {
            fn from(v: $name) -> Self {
                v.0
            }
        }
    };
}

record_id!(
    /// Identifier of an [`Owner`].
    OwnerId
);
record_id!(
    /// Identifier of a [`Car`].
    CarId
);
record_id!(
    /// Identifier of a [`Job`].
    JobId
);
record_id!(
    /// Identifier of a [`LaborItem`].
    LaborId
);
record_id!(
    /// Identifier of a [`ComponentItem`].
    ComponentId
);

/// Trait implemented by every record the store persists.
///
/// # Example
///
/// ```
/// use repair_kit::entity::{Job, JobId, CarId, Record};
///
/// let job = Job::open(JobId(3), CarId(1));
/// assert_eq!(job.record_key(), "job:3");
/// ```
pub trait Record: Clone + Send + Sync {
    /// Type of the record's identifier.
    type Id: Copy + Ord + fmt::Display + Into<u64> + Send + Sync + 'static;

    /// Return the record's identifier.
    fn id(&self) -> Self::Id;

    /// Table name, used in log lines and `NotFound` errors.
    fn table() -> &'static str;

    /// Display key in `"{table}:{id}"` form.
    fn record_key(&self) -> String {
        format!("{}:{}", Self::table(), self.id())
    }
}

/// A workshop customer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    pub name: String,
    pub phone: String,
    pub address: Option<String>,
}

/// A vehicle registered to one owner.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Car {
    pub id: CarId,
    pub owner_id: OwnerId,
    pub model: String,
    pub year: i32,
    pub license_plate: String,
}

/// A repair engagement on one car.
///
/// `profit` is a cached result of the last profit calculation. It is cleared
/// whenever the line items change, while `client_payment` is kept.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub car_id: CarId,
    pub client_payment: Option<Money>,
    pub profit: Option<Money>,
}

/// Implicit job lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// No valid profit: never priced, or line items changed since.
    Open,
    /// Payment recorded and profit cached for the current line items.
    Priced,
}

impl Job {
    /// A freshly opened job with nothing recorded.
    pub fn open(id: JobId, car_id: CarId) -> Self {
        Job {
            id,
            car_id,
            client_payment: None,
            profit: None,
        }
    }

    pub fn status(&self) -> JobStatus {
        if self.profit.is_some() {
            JobStatus::Priced
        } else {
            JobStatus::Open
        }
    }

    /// The payment to price against, only while the cached profit is valid.
    pub fn priced_payment(&self) -> Option<Money> {
        self.profit.and(self.client_payment)
    }

    /// Drop the cached profit after a line-item change.
    pub fn invalidate_profit(&mut self) {
        self.profit = None;
    }
}

/// A billable labor line on a job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaborItem {
    pub id: LaborId,
    pub job_id: JobId,
    pub name: String,
    pub pay: Money,
}

/// A replaced-part line on a job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentItem {
    pub id: ComponentId,
    pub job_id: JobId,
    pub name: String,
    pub fault: Option<String>,
    pub price: Money,
}

impl Record for Owner {
    type Id = OwnerId;

    fn id(&self) -> OwnerId {
        self.id
    }

    fn table() -> &'static str {
        "owner"
    }
}

impl Record for Car {
    type Id = CarId;

    fn id(&self) -> CarId {
        self.id
    }

    fn table() -> &'static str {
        "car"
    }
}

impl Record for Job {
    type Id = JobId;

    fn id(&self) -> JobId {
        self.id
    }

    fn table() -> &'static str {
        "job"
    }
}

impl Record for LaborItem {
    type Id = LaborId;

    fn id(&self) -> LaborId {
        self.id
    }

    fn table() -> &'static str {
        "labor"
    }
}

impl Record for ComponentItem {
    type Id = ComponentId;

    fn id(&self) -> ComponentId {
        self.id
    }

    fn table() -> &'static str {
        "component"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_key_generation() {
        let car = Car {
            id: CarId(12),
            owner_id: OwnerId(4),
            model: "Civic".to_string(),
            year: 2020,
            license_plate: "ABC-1".to_string(),
        };

        assert_eq!(car.record_key(), "car:12");
        assert_eq!(Car::table(), "car");
    }

    #[test]
    fn test_job_status_follows_cached_profit() {
        let mut job = Job::open(JobId(1), CarId(1));
        assert_eq!(job.status(), JobStatus::Open);
        assert_eq!(job.priced_payment(), None);

        job.client_payment = Some(Money::from(1500));
        job.profit = Some(Money::from(500));
        assert_eq!(job.status(), JobStatus::Priced);
        assert_eq!(job.priced_payment(), Some(Money::from(1500)));

        job.invalidate_profit();
        assert_eq!(job.status(), JobStatus::Open);
        assert_eq!(job.client_payment, Some(Money::from(1500)));
        assert_eq!(job.priced_payment(), None);
    }

    #[test]
    fn test_ids_serialize_transparently() {
        assert_eq!(serde_json::to_string(&JobId(9)).unwrap(), "9");
        let id: OwnerId = serde_json::from_str("3").unwrap();
        assert_eq!(id, OwnerId(3));
    }
}
