//! Decimal money amounts and loosely-typed numeric input.
//!
//! All monetary values in the ledger are exact decimals ([`Money`]). Form
//! input arrives as [`NumericInput`] and is coerced in one of two ways:
//!
//! | Coercion | Used for | Unparsable / missing / non-finite |
//! |----------|----------|-----------------------------------|
//! | lenient  | labor pay, component price | becomes `0` |
//! | strict   | client payment | `Error::ValidationError` |
//!
//! Both coercions reject amounts beyond [`Money::MAX_ABS`], so totals over
//! stored line items stay far away from the decimal range. Arithmetic is
//! checked and reports overflow instead of panicking.

use crate::error::{Error, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::{Error as _, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An exact decimal amount of money.
///
/// Serializes as a JSON number for human-readable formats and as the exact
/// 16-byte decimal representation for binary formats (snapshots).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Largest absolute amount accepted for a single input value.
    pub const MAX_ABS: i64 = 1_000_000_000_000_000;

    pub fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Build from minor units, e.g. `Money::from_minor(1250)` is `12.50`.
    pub fn from_minor(units: i64) -> Self {
        Money(Decimal::new(units, 2))
    }

    /// Parse decimal text such as `"12.50"`, `" 300 "` or `"1.5e3"`.
    ///
    /// Returns `None` for blank or non-numeric text.
    pub fn parse(text: &str) -> Option<Money> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Decimal::from_str(text)
            .or_else(|_| Decimal::from_scientific(text))
            .ok()
            .map(Money)
    }

    /// Convert a float, going through its shortest decimal rendering so that
    /// `0.1` becomes exactly `0.1`. Non-finite values yield `None`.
    pub fn from_f64(value: f64) -> Option<Money> {
        if !value.is_finite() {
            return None;
        }
        Money::parse(&value.to_string())
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Sum of `amounts`; `None` on overflow.
    pub fn checked_sum<I>(amounts: I) -> Option<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, Money::checked_add)
    }

    /// Whether the amount is accepted from input (`|amount| <= MAX_ABS`).
    pub fn is_within_limit(&self) -> bool {
        self.0.abs() <= Decimal::from(Money::MAX_ABS)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl FromStr for Money {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Money::parse(s).ok_or_else(|| Error::ValidationError(format!("not a number: {:?}", s)))
    }
}

impl From<i64> for Money {
    fn from(v: i64) -> Self {
        Money(Decimal::from(v))
    }
}

impl From<i32> for Money {
    fn from(v: i32) -> Self {
        Money(Decimal::from(v))
    }
}

impl From<Decimal> for Money {
    fn from(v: Decimal) -> Self {
        Money(v)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            if self.0.fract().is_zero() {
                if let Some(whole) = self.0.to_i64() {
                    return serializer.serialize_i64(whole);
                }
            }
            match self.0.to_f64() {
                Some(f) => serializer.serialize_f64(f),
                None => serializer.serialize_str(&self.to_string()),
            }
        } else {
            let bytes: [u8; 16] = self.0.serialize();
            bytes.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let input = NumericInput::deserialize(deserializer)?;
            input.to_money().ok_or_else(|| {
                D::Error::custom(format!("expected a finite decimal, got {}", input))
            })
        } else {
            let bytes = <[u8; 16]>::deserialize(deserializer)?;
            Ok(Money(Decimal::deserialize(bytes)))
        }
    }
}

/// A numeric value as it arrives from a form field.
///
/// Accepts JSON `null`, integers, floats and text. Any other JSON value
/// deserializes to [`NumericInput::Unparsable`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericInput {
    /// Field absent or `null`.
    #[default]
    Missing,
    Integer(i64),
    Float(f64),
    Text(String),
    /// Any other JSON value (bool, object, array). Never a usable amount.
    #[serde(skip_serializing)]
    Unparsable(NotANumber),
}

/// Any JSON value that cannot hold an amount, consumed and discarded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NotANumber;

impl<'de> Deserialize<'de> for NotANumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        IgnoredAny::deserialize(deserializer)?;
        Ok(NotANumber)
    }
}

impl NumericInput {
    /// Exact money value, if the input holds a finite decimal.
    pub fn to_money(&self) -> Option<Money> {
        match self {
            NumericInput::Missing => None,
            NumericInput::Integer(v) => Some(Money::from(*v)),
            NumericInput::Float(v) => Money::from_f64(*v),
            NumericInput::Text(t) => Money::parse(t),
            NumericInput::Unparsable(_) => None,
        }
    }

    /// Coerce permissively: anything unparsable counts as zero.
    ///
    /// # Errors
    ///
    /// Returns `Error::ValidationError` if the amount exceeds [`Money::MAX_ABS`].
    pub fn to_money_lenient(&self, field: &str) -> Result<Money> {
        match self.to_money() {
            Some(amount) => within_limit(field, amount),
            None => Ok(Money::ZERO),
        }
    }

    /// Coerce strictly, naming `field` in the validation error.
    pub fn to_money_strict(&self, field: &str) -> Result<Money> {
        let amount = self.to_money().ok_or_else(|| {
            Error::ValidationError(format!("{} must be a finite number, got {}", field, self))
        })?;
        within_limit(field, amount)
    }

    /// Whole-number value; integral floats and numeric text are accepted.
    pub fn to_integer(&self) -> Option<i64> {
        match self {
            NumericInput::Missing => None,
            NumericInput::Integer(v) => Some(*v),
            NumericInput::Float(v) => {
                if v.is_finite() && v.fract() == 0.0 && v.abs() <= i64::MAX as f64 {
                    Some(*v as i64)
                } else {
                    None
                }
            }
            NumericInput::Text(t) => t.trim().parse::<i64>().ok(),
            NumericInput::Unparsable(_) => None,
        }
    }
}

fn within_limit(field: &str, amount: Money) -> Result<Money> {
    if amount.is_within_limit() {
        Ok(amount)
    } else {
        Err(Error::ValidationError(format!(
            "{} is out of range: {} exceeds {}",
            field,
            amount,
            Money::MAX_ABS
        )))
    }
}

impl fmt::Display for NumericInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericInput::Missing => write!(f, "nothing"),
            NumericInput::Integer(v) => write!(f, "{}", v),
            NumericInput::Float(v) => write!(f, "{}", v),
            NumericInput::Text(t) => write!(f, "{:?}", t),
            NumericInput::Unparsable(_) => write!(f, "a non-numeric value"),
        }
    }
}

impl From<i64> for NumericInput {
    fn from(v: i64) -> Self {
        NumericInput::Integer(v)
    }
}

impl From<i32> for NumericInput {
    fn from(v: i32) -> Self {
        NumericInput::Integer(i64::from(v))
    }
}

impl From<f64> for NumericInput {
    fn from(v: f64) -> Self {
        NumericInput::Float(v)
    }
}

impl From<&str> for NumericInput {
    fn from(v: &str) -> Self {
        NumericInput::Text(v.to_string())
    }
}

impl From<String> for NumericInput {
    fn from(v: String) -> Self {
        NumericInput::Text(v)
    }
}

impl From<Money> for NumericInput {
    fn from(v: Money) -> Self {
        NumericInput::Text(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_parse() {
        assert_eq!(Money::parse("12.50"), Some(Money::from_minor(1250)));
        assert_eq!(Money::parse(" 300 "), Some(Money::from(300)));
        assert_eq!(Money::parse("1.5e3"), Some(Money::from(1500)));
        assert_eq!(Money::parse(""), None);
        assert_eq!(Money::parse("abc"), None);
    }

    #[test]
    fn test_money_from_f64_is_exact() {
        assert_eq!(Money::from_f64(0.1), Money::parse("0.1"));
        assert_eq!(Money::from_f64(f64::NAN), None);
        assert_eq!(Money::from_f64(f64::INFINITY), None);
    }

    #[test]
    fn test_money_sum_and_arithmetic() {
        let items = [Money::from(500), Money::from(200), Money::from_minor(-50)];
        assert_eq!(Money::checked_sum(items), Some(Money::from_minor(69950)));
        assert_eq!(
            Money::from(1500).checked_sub(Money::from(1000)),
            Some(Money::from(500))
        );
        assert!(Money::ZERO
            .checked_sub(Money::from(1))
            .unwrap()
            .is_negative());
        assert!(!Money::ZERO.is_negative());
    }

    #[test]
    fn test_money_overflow_is_reported() {
        let max = Money::new(Decimal::MAX);
        assert_eq!(max.checked_add(max), None);
        assert_eq!(Money::new(Decimal::MIN).checked_sub(max), None);
        assert_eq!(Money::checked_sum([max, Money::from(1)]), None);
        assert!(!max.is_within_limit());
        assert!(Money::from(Money::MAX_ABS).is_within_limit());
    }

    #[test]
    fn test_money_json_shape() {
        assert_eq!(serde_json::to_string(&Money::from(700)).unwrap(), "700");
        assert_eq!(
            serde_json::to_string(&Money::from_minor(1250)).unwrap(),
            "12.5"
        );
        let back: Money = serde_json::from_str("\"12.50\"").unwrap();
        assert_eq!(back, Money::from_minor(1250));
        assert!(serde_json::from_str::<Money>("\"twelve\"").is_err());
    }

    #[test]
    fn test_money_binary_is_exact() {
        let value = Money::parse("0.1")
            .unwrap()
            .checked_add(Money::parse("0.2").unwrap())
            .unwrap();
        let bytes = postcard::to_allocvec(&value).unwrap();
        let back: Money = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(back, Money::parse("0.3").unwrap());
    }

    #[test]
    fn test_numeric_input_deserialize() {
        let parsed: Vec<NumericInput> =
            serde_json::from_str(r#"[null, 5, 2.5, "7.25"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                NumericInput::Missing,
                NumericInput::Integer(5),
                NumericInput::Float(2.5),
                NumericInput::Text("7.25".to_string()),
            ]
        );
    }

    #[test]
    fn test_numeric_input_lenient() {
        let lenient = |input: NumericInput| input.to_money_lenient("pay").unwrap();
        assert_eq!(lenient(NumericInput::from("oops")), Money::ZERO);
        assert_eq!(lenient(NumericInput::Missing), Money::ZERO);
        assert_eq!(lenient(NumericInput::from(f64::NAN)), Money::ZERO);
        assert_eq!(lenient(NumericInput::Unparsable(NotANumber)), Money::ZERO);
        assert_eq!(lenient(NumericInput::from("200")), Money::from(200));
    }

    #[test]
    fn test_numeric_input_rejects_huge_amounts() {
        let huge = NumericInput::from("79228162514264337593543950335");
        assert!(matches!(
            huge.to_money_lenient("pay"),
            Err(Error::ValidationError(_))
        ));
        assert!(matches!(
            huge.to_money_strict("payment"),
            Err(Error::ValidationError(_))
        ));
        assert!(NumericInput::from(Money::MAX_ABS)
            .to_money_strict("payment")
            .is_ok());
    }

    #[test]
    fn test_numeric_input_accepts_any_json_value() {
        let parsed: Vec<NumericInput> =
            serde_json::from_str(r#"[true, {"amount": 5}, [1, 2]]"#).unwrap();
        assert!(parsed
            .iter()
            .all(|input| *input == NumericInput::Unparsable(NotANumber)));
        assert!(parsed.iter().all(|input| input.to_money().is_none()));
    }

    #[test]
    fn test_numeric_input_strict() {
        assert!(matches!(
            NumericInput::from("abc").to_money_strict("payment"),
            Err(Error::ValidationError(_))
        ));
        assert!(matches!(
            NumericInput::from(f64::INFINITY).to_money_strict("payment"),
            Err(Error::ValidationError(_))
        ));
        assert_eq!(
            NumericInput::from(1500).to_money_strict("payment").unwrap(),
            Money::from(1500)
        );
    }

    #[test]
    fn test_numeric_input_integer() {
        assert_eq!(NumericInput::from(2020).to_integer(), Some(2020));
        assert_eq!(NumericInput::from(2020.0).to_integer(), Some(2020));
        assert_eq!(NumericInput::from(2020.5).to_integer(), None);
        assert_eq!(NumericInput::from(" 2020 ").to_integer(), Some(2020));
        assert_eq!(NumericInput::from("20x0").to_integer(), None);
        assert_eq!(NumericInput::Missing.to_integer(), None);
    }
}
