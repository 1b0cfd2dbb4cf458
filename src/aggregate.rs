//! Job cost aggregation.
//!
//! Pure functions over a job's current line items: the same items and payment
//! always give the same summary. Sums are not clamped, so negative amounts
//! that reached the store surface unchanged.

use crate::entity::{ComponentItem, LaborItem};
use crate::error::{Error, Result};
use crate::money::Money;
use serde::{Deserialize, Serialize};

/// Derived totals for one job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostSummary {
    pub total_labor_cost: Money,
    pub total_component_cost: Money,
    /// Present only when a payment was supplied.
    pub profit: Option<Money>,
}

impl CostSummary {
    /// Labor plus component cost.
    pub fn total_cost(&self) -> Result<Money> {
        self.total_labor_cost
            .checked_add(self.total_component_cost)
            .ok_or_else(|| overflow("total cost"))
    }

    /// `payment - total_labor_cost - total_component_cost`.
    pub fn profit_for(&self, payment: Money) -> Result<Money> {
        payment
            .checked_sub(self.total_labor_cost)
            .and_then(|p| p.checked_sub(self.total_component_cost))
            .ok_or_else(|| overflow("profit"))
    }
}

fn overflow(what: &str) -> Error {
    Error::ValidationError(format!("{} is out of the representable range", what))
}

pub fn total_labor_cost(labors: &[LaborItem]) -> Result<Money> {
    Money::checked_sum(labors.iter().map(|l| l.pay)).ok_or_else(|| overflow("labor total"))
}

pub fn total_component_cost(components: &[ComponentItem]) -> Result<Money> {
    Money::checked_sum(components.iter().map(|c| c.price))
        .ok_or_else(|| overflow("component total"))
}

/// Compute `{ total_labor_cost, total_component_cost, profit }`.
///
/// `profit = payment - total_labor_cost - total_component_cost` when a
/// payment is given, otherwise absent.
///
/// # Errors
///
/// Returns `Error::ValidationError` if a total leaves the decimal range.
///
/// # Example
///
/// ```
/// use repair_kit::aggregate::aggregate;
/// use repair_kit::Money;
///
/// # fn main() -> repair_kit::Result<()> {
/// let summary = aggregate(&[], &[], Some(Money::from(100)))?;
/// assert_eq!(summary.profit, Some(Money::from(100)));
/// assert_eq!(aggregate(&[], &[], None)?.profit, None);
/// # Ok(())
/// # }
/// ```
pub fn aggregate(
    labors: &[LaborItem],
    components: &[ComponentItem],
    payment: Option<Money>,
) -> Result<CostSummary> {
    let mut summary = CostSummary {
        total_labor_cost: total_labor_cost(labors)?,
        total_component_cost: total_component_cost(components)?,
        profit: None,
    };
    if let Some(payment) = payment {
        summary.profit = Some(summary.profit_for(payment)?);
    }
    Ok(summary)
}
