//! Tests for loading and applying scenario files

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use tempfile::TempDir;

use partnet::application::{ApplicationError, Scenario};
use partnet::config::Settings;
use partnet::domain::{PartnerStatus, UplineChainEntry};
use partnet::infrastructure::di::ServiceContainer;
use partnet::infrastructure::traits::{FixedClock, RealFileSystem};
use partnet::util::testing;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn container() -> ServiceContainer {
    testing::init_test_setup();
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
    ));
    ServiceContainer::with_deps(Settings::default(), Arc::new(RealFileSystem), clock).unwrap()
}

fn demo_path() -> &'static Path {
    Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/demos/compression.toml"))
}

#[test]
fn given_demo_scenario_when_applied_then_lapsed_partner_compressed_away() {
    let c = container();
    let scenario = Scenario::load(c.fs.as_ref(), demo_path()).unwrap();

    let outcomes = scenario.apply(&c.partners, &c.purchases).unwrap();

    assert_eq!(outcomes.len(), 2);
    let first: Vec<_> = outcomes[0]
        .commissions
        .iter()
        .map(|r| (r.level, r.partner_id, r.amount))
        .collect();
    assert_eq!(
        first,
        vec![(1, 4, dec("200")), (2, 2, dec("100")), (3, 1, dec("50"))]
    );
    assert_eq!(outcomes[1].total_paid(), dec("75.15"));
    assert_eq!(c.ledger.get_total_commissions(3, None, None, None), Decimal::ZERO);

    let network = c.network.read().unwrap();
    assert_eq!(network.get_partner(4).unwrap().upline_id, Some(2));
    assert!(!network.is_active(3));
    assert_eq!(
        c.partners.get_partner(3).unwrap().status,
        PartnerStatus::Inactive
    );
    assert_eq!(c.partners.get_partner(1).unwrap().full_name(), "Ada Root");
}

#[test]
fn given_missing_file_when_loading_then_scenario_error() {
    let c = container();
    let temp = TempDir::new().unwrap();

    let err = Scenario::load(c.fs.as_ref(), &temp.path().join("none.toml")).unwrap_err();

    assert!(matches!(err, ApplicationError::Scenario { .. }));
}

#[test]
fn given_purchase_by_unknown_buyer_when_applied_then_error() {
    let c = container();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("orphan.toml");
    fs::write(
        &path,
        r#"
[[partners]]
id = 1

[[purchases]]
buyer = 2
amount = "10"
"#,
    )
    .unwrap();

    let scenario = Scenario::load(c.fs.as_ref(), &path).unwrap();

    assert!(scenario.apply(&c.partners, &c.purchases).is_err());
}

#[test]
fn given_upline_listed_after_child_when_built_then_auto_node_moves_under_its_sponsor() {
    let c = container();
    let scenario = Scenario::parse(
        r#"
[[partners]]
id = 2
upline = 1

[[partners]]
id = 9
name = "Top Sponsor"

[[partners]]
id = 1
upline = 9
name = "Late Root"
"#,
        Path::new("order.toml"),
    )
    .unwrap();

    scenario.build_network(&c.partners).unwrap();

    let network = c.network.read().unwrap();
    assert_eq!(network.len(), 3);
    assert_eq!(network.get_partner(1).unwrap().downline_ids, vec![2]);
    assert_eq!(network.get_partner(1).unwrap().upline_id, Some(9));
    assert_eq!(network.get_downline(9, true), vec![1, 2]);
    assert_eq!(
        network.get_upline_chain(2, 5),
        [1, 9].map(UplineChainEntry::active).to_vec()
    );
    assert_eq!(c.partners.get_partner(1).unwrap().upline_id, Some(9));
}
