//! Micro-unit amount arithmetic
//!
//! The bridged stablecoin has 6 decimals on both chains. Amounts are parsed
//! from decimal strings exactly (no binary floating point), carried as
//! integer micro-units, and only turned back into decimal text for display.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Integer amount scaled by 10^6
pub type MicroAmount = u128;

/// Decimals of the bridged token
pub const MICRO_DECIMALS: u32 = 6;

/// Micro-units per whole token
pub const MICRO_PER_UNIT: u128 = 1_000_000;

/// Default number of fractional digits shown by [`from_micro_units`]
pub const DEFAULT_DISPLAY_DECIMALS: u32 = 2;

/// Longest amount string accepted for parsing
const MAX_AMOUNT_LEN: usize = 64;

/// Decimal digits of `u128::MAX`
const U128_MAX_DIGITS: i64 = 39;

/// Parse a decimal amount string into micro-units, flooring extra precision.
///
/// Thousands separators (`,`) are accepted in groups of three so display
/// output parses back.
pub fn to_micro_units(amount: &str) -> Result<MicroAmount> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(BridgeError::validation("Amount is empty"));
    }
    if trimmed.len() > MAX_AMOUNT_LEN {
        return Err(BridgeError::validation(format!(
            "Amount is longer than {} characters",
            MAX_AMOUNT_LEN
        )));
    }
    let cleaned = strip_grouping(trimmed).ok_or_else(|| {
        BridgeError::validation(format!("Invalid thousands grouping in amount {:?}", amount))
    })?;

    let value = BigDecimal::from_str(&cleaned)
        .map_err(|e| BridgeError::validation(format!("Invalid amount {:?}: {}", amount, e)))?;
    if value.sign() == Sign::Minus {
        return Err(BridgeError::validation(format!(
            "Amount must not be negative: {}",
            amount
        )));
    }

    floor_to_micro(&value)
}

/// Format micro-units with `decimals` fractional digits and `,` grouping.
///
/// Rounds half-up; `decimals` is capped at 6.
pub fn from_micro_units(amount: MicroAmount, decimals: u32) -> String {
    let decimals = decimals.min(MICRO_DECIMALS);
    let divisor = 10u128.pow(MICRO_DECIMALS - decimals);
    let rounded = amount / divisor + u128::from(amount % divisor * 2 >= divisor);

    let unit = 10u128.pow(decimals);
    let whole = group_thousands(&(rounded / unit).to_string());
    if decimals == 0 {
        return whole;
    }
    format!(
        "{}.{:0width$}",
        whole,
        rounded % unit,
        width = decimals as usize
    )
}

/// Canonical ungrouped decimal with trailing zeros trimmed (`1500000` -> `"1.5"`)
pub fn micro_to_decimal_string(amount: MicroAmount) -> String {
    let whole = amount / MICRO_PER_UNIT;
    let frac = amount % MICRO_PER_UNIT;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:06}", frac);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

fn floor_to_micro(value: &BigDecimal) -> Result<MicroAmount> {
    floor_to_integer(&(value * BigDecimal::from(MICRO_PER_UNIT as u64)))
}

/// Remove `,` separators, requiring 1-3 leading digits and then groups of 3
/// in the integer part. `None` on malformed grouping.
fn strip_grouping(amount: &str) -> Option<String> {
    if !amount.contains(',') {
        return Some(amount.to_string());
    }

    let (integer, fraction) = match amount.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (amount, None),
    };
    if fraction.is_some_and(|f| f.contains(',')) {
        return None;
    }

    let mut groups = integer.split(',');
    let head = groups.next()?;
    let digits = |g: &str| g.chars().all(|c| c.is_ascii_digit());
    if head.is_empty() || head.len() > 3 || !digits(head) {
        return None;
    }
    if !groups.all(|g| g.len() == 3 && digits(g)) {
        return None;
    }
    Some(amount.replace(',', ""))
}

/// Floor toward zero, checking magnitude before any rescaling so a large
/// exponent cannot expand into a huge integer.
fn floor_to_integer(value: &BigDecimal) -> Result<u128> {
    let (unscaled, scale) = value.as_bigint_and_exponent();
    let digit_count = unscaled.magnitude().to_string().len() as i64;
    let integer_digits = digit_count.saturating_sub(scale);
    if integer_digits <= 0 {
        return Ok(0);
    }
    if integer_digits > U128_MAX_DIGITS {
        return Err(BridgeError::validation("Amount out of range"));
    }

    let (digits, _) = value.with_scale(0).into_bigint_and_exponent();
    u128::try_from(digits)
        .map_err(|_| BridgeError::validation(format!("Amount out of range: {}", value)))
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

// ============================================================================
// Fee Calculation
// ============================================================================

/// Bridge fee schedule: a percentage with a minimum floor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Fee in percent of the bridged amount (0.25 = 0.25%)
    pub fee_percent: BigDecimal,
    /// Minimum fee in whole tokens
    pub min_fee: BigDecimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            fee_percent: BigDecimal::new(BigInt::from(25), 2), // 0.25%
            min_fee: BigDecimal::new(BigInt::from(100), 2),    // 1.00
        }
    }
}

impl FeeSchedule {
    pub fn new(fee_percent: BigDecimal, min_fee: BigDecimal) -> Self {
        Self {
            fee_percent,
            min_fee,
        }
    }

    /// Parse both values from decimal strings
    pub fn from_strs(fee_percent: &str, min_fee: &str) -> Result<Self> {
        let parse = |name: &str, value: &str| {
            BigDecimal::from_str(value.trim())
                .map_err(|e| BridgeError::Config(format!("Invalid {} {:?}: {}", name, value, e)))
        };
        let schedule = Self::new(parse("fee percent", fee_percent)?, parse("min fee", min_fee)?);
        for value in [&schedule.fee_percent, &schedule.min_fee] {
            floor_to_integer(value)
                .map_err(|_| BridgeError::Config(format!("Fee value out of range: {}", value)))?;
        }

        if schedule.fee_percent.sign() == Sign::Minus || schedule.min_fee.sign() == Sign::Minus {
            return Err(BridgeError::Config(
                "Fee percent and min fee must not be negative".to_string(),
            ));
        }
        Ok(schedule)
    }

    /// `max(amount * fee_percent / 100, min_fee)`
    pub fn compute_bridge_fee(&self, amount: &BigDecimal) -> BigDecimal {
        let percentage = amount * &self.fee_percent / BigDecimal::from(100);
        if percentage > self.min_fee {
            percentage
        } else {
            self.min_fee.clone()
        }
    }

    /// Same rule in micro-units; the percentage part is floored
    pub fn compute_bridge_fee_micro(&self, amount: MicroAmount) -> Result<MicroAmount> {
        let amount = BigDecimal::from(BigInt::from(amount));
        let percentage = floor_to_integer(&(amount * &self.fee_percent / BigDecimal::from(100)))?;
        let floor = floor_to_micro(&self.min_fee)?;
        Ok(percentage.max(floor))
    }

    /// Fee for a decimal amount string, formatted for display
    pub fn fee_for_display(&self, amount: &str) -> Result<String> {
        let micro = to_micro_units(amount)?;
        Ok(from_micro_units(
            self.compute_bridge_fee_micro(micro)?,
            DEFAULT_DISPLAY_DECIMALS,
        ))
    }

    /// Amount left after the fee, saturating at zero
    pub fn net_amount_micro(&self, amount: MicroAmount) -> Result<MicroAmount> {
        Ok(amount.saturating_sub(self.compute_bridge_fee_micro(amount)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_to_micro_units() {
        assert_eq!(to_micro_units("1").unwrap(), 1_000_000);
        assert_eq!(to_micro_units("0.000001").unwrap(), 1);
        assert_eq!(to_micro_units("12.345678").unwrap(), 12_345_678);
        assert_eq!(to_micro_units("1,234.5").unwrap(), 1_234_500_000);
        assert_eq!(to_micro_units(" 0 ").unwrap(), 0);
    }

    #[test]
    fn test_to_micro_units_floors_extra_precision() {
        assert_eq!(to_micro_units("0.0000019").unwrap(), 1);
        assert_eq!(to_micro_units("1.9999999").unwrap(), 1_999_999);
    }

    #[test]
    fn test_to_micro_units_is_exact_where_floats_drift() {
        // 1.005 * 1e6 is 1004999.9999999999 in binary floating point
        assert_eq!(to_micro_units("1.005").unwrap(), 1_005_000);
        assert_eq!(to_micro_units("0.29").unwrap(), 290_000);
    }

    #[test]
    fn test_to_micro_units_rejects_bad_input() {
        assert!(matches!(to_micro_units(""), Err(BridgeError::Validation(_))));
        assert!(matches!(to_micro_units("abc"), Err(BridgeError::Validation(_))));
        assert!(matches!(to_micro_units("-1"), Err(BridgeError::Validation(_))));
        assert!(matches!(
            to_micro_units("1e40"),
            Err(BridgeError::Validation(_))
        ));
    }

    #[test]
    fn test_to_micro_units_rejects_huge_exponent_quickly() {
        let forty_nines = "9".repeat(40);
        let started = std::time::Instant::now();
        for input in ["1e99999999", "1E400", forty_nines.as_str()] {
            assert!(
                matches!(to_micro_units(input), Err(BridgeError::Validation(_))),
                "{} should be out of range",
                input
            );
        }
        assert_eq!(to_micro_units("1e-99999999").unwrap(), 0);
        assert!(matches!(
            to_micro_units(&"1".repeat(65)),
            Err(BridgeError::Validation(_))
        ));
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
    }

    #[test]
    fn test_to_micro_units_grouping() {
        assert_eq!(to_micro_units("1,234,567.5").unwrap(), 1_234_567_500_000);
        assert_eq!(to_micro_units("999,000").unwrap(), 999_000_000_000);
        for input in ["1,2,3", ",123", "1234,567", "1,23", "12,345.6,7", "1,,000"] {
            assert!(
                matches!(to_micro_units(input), Err(BridgeError::Validation(_))),
                "{} should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_from_micro_units() {
        assert_eq!(from_micro_units(0, 2), "0.00");
        assert_eq!(from_micro_units(1_000_000, 2), "1.00");
        assert_eq!(from_micro_units(1_234_567_890_000, 2), "1,234,567.89");
        assert_eq!(from_micro_units(12_345_678, 6), "12.345678");
        assert_eq!(from_micro_units(5_000_000, 0), "5");
    }

    #[test]
    fn test_from_micro_units_rounds_half_up() {
        assert_eq!(from_micro_units(1_005_000, 2), "1.01");
        assert_eq!(from_micro_units(1_004_999, 2), "1.00");
        assert_eq!(from_micro_units(999_999_500_000, 0), "1,000,000");
    }

    #[test]
    fn test_amount_roundtrip_exact() {
        for (input, decimals) in [
            ("0.000001", 6),
            ("12.5", 1),
            ("1,234.567891", 6),
            ("1,000,000.00", 2),
            ("42", 0),
        ] {
            let micro = to_micro_units(input).unwrap();
            assert_eq!(from_micro_units(micro, decimals), input);
        }
    }

    #[test]
    fn test_micro_to_decimal_string() {
        assert_eq!(micro_to_decimal_string(1_500_000), "1.5");
        assert_eq!(micro_to_decimal_string(1_000_000), "1");
        assert_eq!(micro_to_decimal_string(1), "0.000001");
        assert_eq!(micro_to_decimal_string(0), "0");
        assert_eq!(
            to_micro_units(&micro_to_decimal_string(123_456_789)).unwrap(),
            123_456_789
        );
    }

    #[test]
    fn test_fee_floor_applies_to_small_amounts() {
        let schedule = FeeSchedule::default();
        // 100 * 0.25% = 0.25 < 1.00
        assert_eq!(schedule.compute_bridge_fee(&dec("100")), dec("1.00"));
        assert_eq!(schedule.compute_bridge_fee(&dec("0")), dec("1.00"));
        assert_eq!(schedule.compute_bridge_fee(&dec("0.000001")), dec("1.00"));
    }

    #[test]
    fn test_fee_percentage_wins_above_floor() {
        let schedule = FeeSchedule::default();
        assert_eq!(schedule.compute_bridge_fee(&dec("10000")), dec("25.00"));
        assert_eq!(schedule.fee_for_display("10000").unwrap(), "25.00");
        assert_eq!(schedule.fee_for_display("100").unwrap(), "1.00");
    }

    #[test]
    fn test_fee_micro() {
        let schedule = FeeSchedule::default();
        assert_eq!(
            schedule.compute_bridge_fee_micro(10_000 * MICRO_PER_UNIT).unwrap(),
            25 * MICRO_PER_UNIT
        );
        assert_eq!(schedule.compute_bridge_fee_micro(0).unwrap(), MICRO_PER_UNIT);
        // 1234.567891 * 0.25% = 3.08641972.. floored to 3.086419
        assert_eq!(
            schedule.compute_bridge_fee_micro(1_234_567_891).unwrap(),
            3_086_419
        );
    }

    #[test]
    fn test_net_amount_saturates() {
        let schedule = FeeSchedule::default();
        assert_eq!(schedule.net_amount_micro(500_000).unwrap(), 0);
        assert_eq!(
            schedule.net_amount_micro(10_000 * MICRO_PER_UNIT).unwrap(),
            9_975 * MICRO_PER_UNIT
        );
    }

    #[test]
    fn test_fee_schedule_from_strs() {
        let schedule = FeeSchedule::from_strs("0.5", "2").unwrap();
        assert_eq!(schedule.compute_bridge_fee(&dec("1000")), dec("5"));
        assert!(FeeSchedule::from_strs("abc", "1").is_err());
        assert!(FeeSchedule::from_strs("-0.1", "1").is_err());
        assert!(FeeSchedule::from_strs("0.25", "1e99999999").is_err());
    }
}
