//! Terminal output formatting with colors
//!
//! Respects NO_COLOR, CLICOLOR, CLICOLOR_FORCE automatically.

use colored::Colorize;
use rust_decimal::Decimal;

use crate::domain::{round_for_display, CommissionRecord, UplineChainEntry};

/// Print error (red bold "error:" prefix) to stderr
pub fn error(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

/// Print warning (yellow "Warning:" prefix) to stderr
pub fn warning(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "Warning".yellow(), msg);
}

/// Print completed action (green label)
pub fn action(label: &str, msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}: {}", label.green(), msg);
}

/// Print section header (cyan bold)
pub fn header(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg.to_string().cyan().bold());
}

/// Print indented detail (no color)
pub fn detail(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("  {}", msg);
}

/// Print plain output (no color, for data)
pub fn info(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg);
}

/// Amount rounded for display with its currency.
pub fn money(amount: Decimal, currency: &str) -> String {
    format!("{:.2} {}", round_for_display(amount), currency)
}

/// One commission as a table row.
pub fn commission_line(record: &CommissionRecord, currency: &str) -> String {
    let line = format!(
        "#{:<4} L{} -> {:<6} {:>12} ({}%)",
        record.commission_id,
        record.level,
        record.partner_id,
        money(record.amount, currency),
        record.rate.normalize()
    );
    if record.compressed {
        format!("{} {}", line, "[compressed]".yellow())
    } else {
        line
    }
}

/// One upline chain step.
pub fn chain_line(level: usize, entry: &UplineChainEntry) -> String {
    let state = if entry.is_active {
        "active".green()
    } else {
        "inactive".red()
    };
    format!("{}. {} {}", level, entry.partner_id, state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_rounds_half_even() {
        assert_eq!(money(Decimal::new(1125, 3), "EUR"), "1.12 EUR");
        assert_eq!(money(Decimal::from(200), "EUR"), "200.00 EUR");
    }
}
