//! Property-based tests for job cost aggregation.
//!
//! # Properties Tested
//!
//! 1. **Profit Identity**: profit = payment - Σ pay - Σ price, exactly
//! 2. **Replace Semantics**: labors read back equal the last list written
//! 3. **Append Order**: N appended components read back in call order
//! 4. **Idempotent Pricing**: repeated CalculateProfit yields the same profit
//! 5. **Snapshot Encoding**: ledger records survive the postcard envelope
//! 6. **Bounded Input**: amounts beyond `Money::MAX_ABS` are rejected, never summed

use proptest::prelude::*;
use repair_kit::aggregate::aggregate;
use repair_kit::input::{CarFields, ComponentInput, LaborInput, OwnerFields};
use repair_kit::serialization::{decode_snapshot, encode_snapshot};
use repair_kit::{
    ComponentId, ComponentItem, JobController, JobId, LaborId, LaborItem, MemoryStore, Money,
};

// ============================================================================
// Strategies
// ============================================================================

/// Amounts with up to two decimal places, positive and negative.
fn arb_money() -> impl Strategy<Value = Money> {
    (-10_000_000i64..10_000_000).prop_map(Money::from_minor)
}

fn arb_labors() -> impl Strategy<Value = Vec<(String, Money)>> {
    prop::collection::vec(("[a-z ]{1,12}", arb_money()), 0..8)
}

fn arb_components() -> impl Strategy<Value = Vec<(String, Money)>> {
    prop::collection::vec(("[a-z ]{1,12}", arb_money()), 0..8)
}

fn labor_items(labors: &[(String, Money)]) -> Vec<LaborItem> {
    labors
        .iter()
        .enumerate()
        .map(|(i, (name, pay))| LaborItem {
            id: LaborId(i as u64 + 1),
            job_id: JobId(1),
            name: name.clone(),
            pay: *pay,
        })
        .collect()
}

fn component_items(components: &[(String, Money)]) -> Vec<ComponentItem> {
    components
        .iter()
        .enumerate()
        .map(|(i, (name, price))| ComponentItem {
            id: ComponentId(i as u64 + 1),
            job_id: JobId(1),
            name: name.clone(),
            fault: None,
            price: *price,
        })
        .collect()
}

fn sum(amounts: &[(String, Money)]) -> Money {
    Money::checked_sum(amounts.iter().map(|(_, amount)| *amount)).expect("sum in range")
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

async fn registered() -> (JobController<MemoryStore>, JobId) {
    let controller = JobController::new(MemoryStore::new());
    let job = controller
        .register_owner_and_car(
            OwnerFields::new("A. Khan", "0300-000"),
            CarFields::new("Civic", 2020, "ABC-1"),
        )
        .await
        .expect("Failed to register")
        .job_id;
    (controller, job)
}

// ============================================================================
// Property 1: Profit Identity (pure aggregator)
// ============================================================================

proptest! {
    #[test]
    fn prop_profit_identity(
        labors in arb_labors(),
        components in arb_components(),
        payment in arb_money(),
    ) {
        let summary = aggregate(
            &labor_items(&labors),
            &component_items(&components),
            Some(payment),
        )
        .expect("aggregate");

        let labor_total = sum(&labors);
        let component_total = sum(&components);
        let expected = payment
            .checked_sub(labor_total)
            .and_then(|p| p.checked_sub(component_total));

        prop_assert_eq!(summary.total_labor_cost, labor_total);
        prop_assert_eq!(summary.total_component_cost, component_total);
        prop_assert_eq!(summary.profit, expected);
    }

    #[test]
    fn prop_no_payment_no_profit(labors in arb_labors()) {
        let summary = aggregate(&labor_items(&labors), &[], None).expect("aggregate");
        prop_assert_eq!(summary.profit, None);
    }
}

// ============================================================================
// Properties 2-4: Controller round trips
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_replace_labors_reads_back_last_list(
        first in arb_labors(),
        second in arb_labors(),
    ) {
        let full = runtime().block_on(async {
            let (controller, job) = registered().await;
            for labors in [&first, &second] {
                let inputs = labors
                    .iter()
                    .map(|(name, pay)| LaborInput::new(name.clone(), *pay))
                    .collect();
                controller.replace_labors(job, inputs).await.expect("replace");
            }
            controller.get_job_full(job).await.expect("read")
        });

        let read_back: Vec<(String, Money)> = full
            .labors
            .iter()
            .map(|l| (l.name.clone(), l.pay))
            .collect();
        let total = sum(&second);

        prop_assert_eq!(read_back, second);
        prop_assert_eq!(full.totals.total_labor_cost, total);
    }

    #[test]
    fn prop_components_append_in_order(components in arb_components()) {
        let full = runtime().block_on(async {
            let (controller, job) = registered().await;
            for (name, price) in &components {
                controller
                    .add_component(job, ComponentInput::new(name.clone(), *price))
                    .await
                    .expect("append");
            }
            controller.get_job_full(job).await.expect("read")
        });

        let read_back: Vec<(String, Money)> = full
            .components
            .iter()
            .map(|c| (c.name.clone(), c.price))
            .collect();
        let total = sum(&components);

        prop_assert_eq!(read_back, components);
        prop_assert_eq!(full.totals.total_component_cost, total);
    }

    #[test]
    fn prop_calculate_profit_is_idempotent(
        labors in arb_labors(),
        components in arb_components(),
        payment in arb_money(),
    ) {
        let (first, second) = runtime().block_on(async {
            let (controller, job) = registered().await;
            let inputs = labors
                .iter()
                .map(|(name, pay)| LaborInput::new(name.clone(), *pay))
                .collect();
            controller.replace_labors(job, inputs).await.expect("replace");
            for (name, price) in &components {
                controller
                    .add_component(job, ComponentInput::new(name.clone(), *price))
                    .await
                    .expect("append");
            }

            let first = controller.calculate_profit(job, payment).await.expect("first");
            let second = controller.calculate_profit(job, payment).await.expect("second");
            (first, second)
        });

        prop_assert_eq!(first, second);
    }
}

// ============================================================================
// Property 5: Snapshot encoding of ledger records
// ============================================================================

proptest! {
    #[test]
    fn prop_snapshot_preserves_line_items(
        labors in arb_labors(),
        components in arb_components(),
    ) {
        let records = (labor_items(&labors), component_items(&components));

        let bytes = encode_snapshot(&records).expect("encode");
        let decoded: (Vec<LaborItem>, Vec<ComponentItem>) = decode_snapshot(&bytes).expect("decode");

        prop_assert_eq!(decoded, records);
    }
}

// ============================================================================
// Property 6: Bounded input
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_out_of_range_pay_is_rejected(
        labors in arb_labors(),
        excess in 1i64..i64::MAX - Money::MAX_ABS,
        negative in any::<bool>(),
    ) {
        let huge = if negative { -(Money::MAX_ABS + excess) } else { Money::MAX_ABS + excess };

        let (result, full) = runtime().block_on(async {
            let (controller, job) = registered().await;
            let mut inputs: Vec<LaborInput> = labors
                .iter()
                .map(|(name, pay)| LaborInput::new(name.clone(), *pay))
                .collect();
            inputs.push(LaborInput::new("rebuild", huge));

            let result = controller.replace_labors(job, inputs).await;
            (result, controller.get_job_full(job).await.expect("read"))
        });

        prop_assert!(matches!(result, Err(repair_kit::Error::ValidationError(_))));
        prop_assert!(full.labors.is_empty());
    }
}
