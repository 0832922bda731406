//! Settlement line code
//!
//! Encodes a bill's identifying fields into the 48-digit line used by
//! banking interchange. Layout:
//!
//! ```text
//! [3 bank][1 currency='9'][5 wallet][15 our-number part 1]
//! [1 check digit][5 date factor][10 amount in cents][8 our-number part 2]
//! ```
//!
//! Encoding is a pure function of its inputs.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const LINE_CODE_LEN: usize = 48;

const CURRENCY_CODE: char = '9';
const BANK_CODE_LEN: usize = 3;
const WALLET_CODE_LEN: usize = 5;
const OUR_NUMBER_MAX_LEN: usize = 23;
const OUR_NUMBER_PART1_LEN: usize = 15;
const OUR_NUMBER_PART2_LEN: usize = 8;
const DATE_FACTOR_LEN: usize = 5;
const DATE_FACTOR_MAX: i64 = 99_999;
const DOCUMENT_VALUE_LEN: usize = 10;
const MAX_CENTS: u64 = 9_999_999_999;

/// Day zero of the due-date factor
pub const DATE_FACTOR_EPOCH: NaiveDate = match NaiveDate::from_ymd_opt(1997, 10, 7) {
    Some(date) => date,
    None => panic!("invalid date factor epoch"),
};


#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineCodeError {
    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Amount {0} exceeds the 10-digit cents field")]
    AmountOverflow(Decimal),

    #[error("Generated line code has {0} digits, expected 48")]
    InvalidLength(usize),
}

impl LineCodeError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

/// Fields a line code is derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineCodeFields<'a> {
    pub bank_code: &'a str,
    pub wallet_code: &'a str,
    pub our_number: &'a str,
    pub due_date: NaiveDate,
    pub amount: Decimal,
}

/// A validated 48-digit settlement line
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LineCode(String);

impl LineCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bank_code(&self) -> &str {
        &self.0[..3]
    }

    pub fn check_digit(&self) -> u8 {
        self.0.as_bytes()[24] - b'0'
    }

    pub fn date_factor(&self) -> &str {
        &self.0[25..30]
    }

    pub fn document_value(&self) -> &str {
        &self.0[30..40]
    }
}

impl fmt::Display for LineCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LineCode {
    type Error = LineCodeError;

    /// Accepts a stored line code. Only the shape is checked.
    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() != LINE_CODE_LEN || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(LineCodeError::InvalidLength(value.len()));
        }
        Ok(Self(value))
    }
}

impl From<LineCode> for String {
    fn from(code: LineCode) -> Self {
        code.0
    }
}

/// Build the settlement line for a bill.
pub fn encode(fields: &LineCodeFields<'_>) -> Result<LineCode, LineCodeError> {
    let bank = pad_digits("bank code", fields.bank_code, BANK_CODE_LEN)?;
    let wallet = pad_digits("wallet code", fields.wallet_code, WALLET_CODE_LEN)?;
    let our_number = digits_only("our number", fields.our_number, OUR_NUMBER_MAX_LEN)?;

    let split = our_number.len().min(OUR_NUMBER_PART1_LEN);
    let (part1, part2) = our_number.split_at(split);

    let mut line = String::with_capacity(LINE_CODE_LEN);
    line.push_str(&bank);
    line.push(CURRENCY_CODE);
    line.push_str(&wallet);
    line.push_str(&format!("{:0>width$}", part1, width = OUR_NUMBER_PART1_LEN));

    let check = check_digit(&line);
    line.push(char::from(b'0' + check));
    line.push_str(&date_factor(fields.due_date));
    line.push_str(&document_value(fields.amount)?);
    line.push_str(&format!("{:0>width$}", part2, width = OUR_NUMBER_PART2_LEN));

    if line.len() != LINE_CODE_LEN {
        return Err(LineCodeError::InvalidLength(line.len()));
    }

    Ok(LineCode(line))
}

/// Weighted check digit over a digit string.
///
/// Digits are weighted 2,1,2,1... from the right. A product above 9 is
/// folded by summing its own digits.
pub fn check_digit(digits: &str) -> u8 {
    let sum: u32 = digits
        .bytes()
        .rev()
        .enumerate()
        .map(|(i, b)| {
            let weight = if i % 2 == 0 { 2 } else { 1 };
            let product = u32::from(b - b'0') * weight;
            if product > 9 {
                product / 10 + product % 10
            } else {
                product
            }
        })
        .sum();

    match sum % 10 {
        0 => 0,
        rem => (10 - rem) as u8,
    }
}

/// Days since the factor epoch, clamped to five digits.
pub fn date_factor(due_date: NaiveDate) -> String {
    let days = (due_date - DATE_FACTOR_EPOCH)
        .num_days()
        .clamp(0, DATE_FACTOR_MAX);
    format!("{:0>width$}", days, width = DATE_FACTOR_LEN)
}

/// Amount in integer cents, zero-padded to ten digits.
pub fn document_value(amount: Decimal) -> Result<String, LineCodeError> {
    if amount <= Decimal::ZERO {
        return Err(LineCodeError::invalid("amount", "must be positive"));
    }

    let cents = amount * Decimal::ONE_HUNDRED;
    if !cents.fract().is_zero() {
        return Err(LineCodeError::invalid("amount", "has fractions of a cent"));
    }

    match cents.to_u64() {
        Some(value) if value <= MAX_CENTS => {
            Ok(format!("{:0>width$}", value, width = DOCUMENT_VALUE_LEN))
        }
        _ => Err(LineCodeError::AmountOverflow(amount)),
    }
}

fn digits_only(field: &'static str, raw: &str, max_len: usize) -> Result<String, LineCodeError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(LineCodeError::invalid(field, "must not be empty"));
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LineCodeError::invalid(field, "must contain only digits"));
    }
    if value.len() > max_len {
        return Err(LineCodeError::invalid(
            field,
            format!("must have at most {} digits", max_len),
        ));
    }
    Ok(value.to_string())
}

fn pad_digits(field: &'static str, raw: &str, width: usize) -> Result<String, LineCodeError> {
    let value = digits_only(field, raw, width)?;
    Ok(format!("{:0>width$}", value, width = width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn fields<'a>(our_number: &'a str, due_date: NaiveDate, amount: Decimal) -> LineCodeFields<'a> {
        LineCodeFields {
            bank_code: "001",
            wallet_code: "17",
            our_number,
            due_date,
            amount,
        }
    }

    #[test]
    fn test_worked_example() {
        let due = DATE_FACTOR_EPOCH + Duration::days(10);
        let code = encode(&fields("12345678901234567890123", due, dec!(1234.56))).unwrap();

        assert_eq!(code.as_str().len(), LINE_CODE_LEN);
        assert_eq!(code.date_factor(), "00010");
        assert_eq!(code.document_value(), "0000123456");
        assert_eq!(
            code.as_str(),
            "001900017123456789012345300010000012345667890123"
        );
        assert_eq!(code.check_digit(), 3);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let due = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let a = encode(&fields("998877", due, dec!(10.00))).unwrap();
        let b = encode(&fields("998877", due, dec!(10.00))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_fields_are_left_padded() {
        let due = DATE_FACTOR_EPOCH;
        let code = encode(&LineCodeFields {
            bank_code: "1",
            wallet_code: "9",
            our_number: "42",
            due_date: due,
            amount: dec!(0.01),
        })
        .unwrap();

        let s = code.as_str();
        assert_eq!(&s[0..3], "001");
        assert_eq!(&s[3..4], "9");
        assert_eq!(&s[4..9], "00009");
        assert_eq!(&s[9..24], "000000000000042");
        assert_eq!(&s[25..30], "00000");
        assert_eq!(&s[30..40], "0000000001");
        assert_eq!(&s[40..48], "00000000");
    }

    #[test]
    fn test_check_digit_folds_by_digit_sum() {
        // 9 * 2 = 18 folds to 1 + 8 = 9, so sum 9 and digit 1
        assert_eq!(check_digit("9"), 1);
        // 5 * 2 = 10 folds to 1, plus 1 * 1 = 1, sum 2, digit 8
        assert_eq!(check_digit("15"), 8);
        assert_eq!(check_digit("0000"), 0);
    }

    #[test]
    fn test_date_factor_epoch() {
        assert_eq!(DATE_FACTOR_EPOCH.to_string(), "1997-10-07");
        assert_eq!(date_factor(DATE_FACTOR_EPOCH), "00000");
    }

    #[test]
    fn test_date_factor_clamps() {
        let before = DATE_FACTOR_EPOCH - Duration::days(3);
        assert_eq!(date_factor(before), "00000");

        let far = DATE_FACTOR_EPOCH + Duration::days(150_000);
        assert_eq!(date_factor(far), "99999");
    }

    #[test]
    fn test_amount_ceiling() {
        assert_eq!(document_value(dec!(99999999.99)).unwrap(), "9999999999");
        assert!(matches!(
            document_value(dec!(100000000.00)),
            Err(LineCodeError::AmountOverflow(_))
        ));
    }

    #[test]
    fn test_rejects_sub_cent_amount() {
        assert!(matches!(
            document_value(dec!(1.005)),
            Err(LineCodeError::InvalidField { field: "amount", .. })
        ));
    }

    #[test]
    fn test_rejects_bad_fields() {
        let due = DATE_FACTOR_EPOCH;
        let long_bank = LineCodeFields {
            bank_code: "0012",
            ..fields("1", due, dec!(1))
        };
        assert!(matches!(
            encode(&long_bank),
            Err(LineCodeError::InvalidField { field: "bank code", .. })
        ));

        let letters = fields("12A4", due, dec!(1));
        assert!(matches!(
            encode(&letters),
            Err(LineCodeError::InvalidField { field: "our number", .. })
        ));

        let too_long = fields("123456789012345678901234", due, dec!(1));
        assert!(encode(&too_long).is_err());

        let empty_wallet = LineCodeFields {
            wallet_code: " ",
            ..fields("1", due, dec!(1))
        };
        assert!(encode(&empty_wallet).is_err());
    }

    #[test]
    fn test_stored_line_code_shape() {
        assert!(LineCode::try_from("1".repeat(48)).is_ok());
        assert!(matches!(
            LineCode::try_from("1".repeat(47)),
            Err(LineCodeError::InvalidLength(47))
        ));
    }
}
