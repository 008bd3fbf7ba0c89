//! Tests for CommissionCalculator: level filling and per-purchase compression

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{TimeZone, Utc};
use rstest::rstest;
use rust_decimal::Decimal;

use partnet::domain::{
    CommissionCalculator, CommissionPlan, CommissionStatus, PurchaseEvent, UplineChainEntry,
};
use partnet::util::testing;

const A: u64 = 10;
const B: u64 = 20;
const C: u64 = 30;
const D: u64 = 40;
const BUYER: u64 = 99;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn entries(spec: &[(u64, bool)]) -> Vec<UplineChainEntry> {
    spec.iter().copied().map(UplineChainEntry::from).collect()
}

#[test]
fn given_inactive_second_partner_when_calculating_then_next_active_fills_level_two() {
    testing::init_test_setup();
    let calc = CommissionCalculator::default();
    let chain = entries(&[(A, true), (B, false), (C, true), (D, true)]);

    let records = calc.calculate_purchase_commissions(dec("1000"), BUYER, &chain);

    let got: Vec<_> = records
        .iter()
        .map(|r| (r.level, r.partner_id, r.amount, r.compressed))
        .collect();
    assert_eq!(
        got,
        vec![
            (1, A, dec("200"), false),
            (2, C, dec("100"), true),
            (3, D, dec("50"), false),
        ]
    );
    let total: Decimal = records.iter().map(|r| r.amount).sum();
    assert_eq!(total, dec("350"));
    assert!(records.iter().all(|r| r.status == CommissionStatus::Pending));
    assert!(records.iter().all(|r| r.source_partner_id == BUYER));
    assert!(records[1].notes.is_some());
    assert!(records[0].notes.is_none());
}

#[test]
fn given_only_inactive_partners_when_calculating_then_nothing_issued() {
    let calc = CommissionCalculator::default();
    let chain = entries(&[(A, false), (B, false)]);

    assert!(calc
        .calculate_purchase_commissions(dec("500"), BUYER, &chain)
        .is_empty());
}

#[rstest]
#[case("0.01")]
#[case("1000")]
#[case("123456.789")]
fn given_empty_chain_when_calculating_then_nothing_issued(#[case] amount: &str) {
    let calc = CommissionCalculator::default();
    assert!(calc
        .calculate_purchase_commissions(dec(amount), BUYER, &[])
        .is_empty());
}

#[test]
fn given_full_active_chain_when_calculating_then_all_five_levels_paid() {
    let calc = CommissionCalculator::default();
    let chain = entries(&[(1, true), (2, true), (3, true), (4, true), (5, true), (6, true)]);

    let records = calc.calculate_purchase_commissions(dec("200"), BUYER, &chain);

    let levels: Vec<_> = records.iter().map(|r| (r.level, r.partner_id)).collect();
    assert_eq!(levels, vec![(1, 1), (2, 2), (3, 3), (4, 4), (5, 5)]);
    let total: Decimal = records.iter().map(|r| r.amount).sum();
    assert_eq!(total, dec("90"));
}

#[test]
fn given_long_inactive_run_when_calculating_then_one_level_consumes_it() {
    let calc = CommissionCalculator::default();
    let chain = entries(&[(1, false), (2, false), (3, false), (4, true), (5, true)]);

    let records = calc.calculate_purchase_commissions(dec("100"), BUYER, &chain);

    let got: Vec<_> = records
        .iter()
        .map(|r| (r.level, r.partner_id, r.compressed))
        .collect();
    assert_eq!(got, vec![(1, 4, true), (2, 5, false)]);
}

#[test]
fn given_trailing_inactive_partner_when_calculating_then_level_dropped() {
    let calc = CommissionCalculator::default();
    let chain = entries(&[(1, true), (2, false)]);

    let records = calc.calculate_purchase_commissions(dec("100"), BUYER, &chain);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].partner_id, 1);
}

#[rstest]
#[case(&[(1, true), (2, false), (3, true), (4, false), (5, true), (6, true), (7, true)])]
#[case(&[(1, false), (2, true), (3, true), (4, true), (5, true), (6, true)])]
#[case(&[(1, true), (2, true), (3, true), (4, true), (5, true)])]
#[case(&[(1, false), (2, false), (3, false), (4, false), (5, false)])]
fn given_any_chain_when_calculating_then_payout_bounded_and_levels_unique(
    #[case] spec: &[(u64, bool)],
) {
    let calc = CommissionCalculator::default();
    let chain = entries(spec);
    let amount = dec("1000");

    let records = calc.calculate_purchase_commissions(amount, BUYER, &chain);

    let total: Decimal = records.iter().map(|r| r.amount).sum();
    assert!(total <= amount * dec("0.45"));

    let mut levels: Vec<_> = records.iter().map(|r| r.level).collect();
    levels.dedup();
    assert_eq!(levels.len(), records.len());
    assert!(levels.windows(2).all(|w| w[0] < w[1]));

    for r in &records {
        assert!(chain
            .iter()
            .any(|e| e.partner_id == r.partner_id && e.is_active));
    }
}

#[test]
fn given_same_inputs_when_calculating_twice_then_same_payouts() {
    let calc = CommissionCalculator::default();
    let chain = entries(&[(A, true), (B, false), (C, true), (D, true)]);

    let first = calc.calculate_purchase_commissions(dec("777.77"), BUYER, &chain);
    let second = calc.calculate_purchase_commissions(dec("777.77"), BUYER, &chain);

    assert_eq!(first.len(), second.len());
    assert!(first.iter().zip(&second).all(|(a, b)| a.same_payout(b)));
    assert!(first
        .iter()
        .zip(&second)
        .all(|(a, b)| a.commission_id != b.commission_id));
}

#[test]
fn given_custom_plan_when_calculating_then_its_depth_and_rates_apply() {
    let mut rates = BTreeMap::new();
    rates.insert(1, dec("12.5"));
    rates.insert(2, dec("2.5"));
    let calc = CommissionCalculator::new(CommissionPlan::new(2, rates).unwrap());
    let chain = entries(&[(1, true), (2, true), (3, true)]);

    let records = calc.calculate_purchase_commissions(dec("80"), BUYER, &chain);

    let got: Vec<_> = records.iter().map(|r| (r.partner_id, r.amount)).collect();
    assert_eq!(got, vec![(1, dec("10")), (2, dec("2"))]);
}

#[test]
fn given_batch_when_calculating_in_parallel_then_results_follow_input_order() {
    let calc = CommissionCalculator::default();
    let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let events: Vec<PurchaseEvent> = (1..=50u64)
        .map(|buyer| PurchaseEvent {
            buyer,
            amount: Decimal::from(buyer * 10),
            chain: entries(&[(1000 + buyer, true), (2000, false), (3000, true)]),
        })
        .collect();

    let results = calc.calculate_batch(&events, ts);

    assert_eq!(results.len(), events.len());
    for (event, records) in events.iter().zip(&results) {
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].partner_id, 1000 + event.buyer);
        assert_eq!(records[0].amount, event.amount * dec("0.2"));
        assert_eq!(records[1].partner_id, 3000);
        assert!(records.iter().all(|r| r.timestamp == ts));
    }

    let mut ids: Vec<_> = results.iter().flatten().map(|r| r.commission_id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 100);
}

#[test]
fn given_very_large_purchase_when_calculating_then_commissions_without_panic() {
    let calc = CommissionCalculator::default();
    let amount = dec("10000000000000000000000000000");

    let records = calc.calculate_purchase_commissions(amount, BUYER, &[UplineChainEntry::active(A)]);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].amount, dec("2000000000000000000000000000"));
}

#[test]
fn given_plan_with_255_levels_when_chain_is_longer_then_each_level_paid_once() {
    let rates: BTreeMap<u8, Decimal> = (1..=u8::MAX).map(|level| (level, dec("0.1"))).collect();
    let calc = CommissionCalculator::new(CommissionPlan::new(u8::MAX, rates).unwrap());
    let chain: Vec<_> = (1..=300u64).map(UplineChainEntry::active).collect();

    let records = calc.calculate_purchase_commissions(dec("1000"), BUYER, &chain);

    assert_eq!(records.len(), 255);
    assert_eq!(records.first().map(|r| r.level), Some(1));
    assert_eq!(records.last().map(|r| (r.level, r.partner_id)), Some((255, 255)));
}
