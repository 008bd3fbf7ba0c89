//! Environment overrides live in their own test binary: they mutate process state.

use std::str::FromStr;

use rust_decimal::Decimal;

use partnet::config::Settings;

#[test]
fn given_env_overrides_when_loading_then_single_rate_and_currency_replaced() {
    std::env::set_var("PARTNET_PLAN__RATES__2", "7.5");
    std::env::set_var("PARTNET_DISPLAY__CURRENCY", "GBP");

    let result = Settings::load_from(None, None);

    std::env::remove_var("PARTNET_PLAN__RATES__2");
    std::env::remove_var("PARTNET_DISPLAY__CURRENCY");

    let settings = result.unwrap();
    assert_eq!(settings.display.currency, "GBP");
    let plan = settings.commission_plan().unwrap();
    assert_eq!(plan.rate_for(2), Some(Decimal::from_str("7.5").unwrap()));
    assert_eq!(plan.rate_for(1), Some(Decimal::from(20)));
}
