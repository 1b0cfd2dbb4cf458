//! Caller input for the controller operations and its validation.
//!
//! Raw form fields (`OwnerFields`, `CarFields`, `LaborInput`,
//! `ComponentInput`) are turned into the validated `New*` values the store
//! accepts. Registration fields are checked strictly; line items follow the
//! permissive policy where unusable amounts count as zero.

use crate::config::ControllerConfig;
use crate::error::{Error, Result};
use crate::money::{Money, NumericInput};
use serde::{Deserialize, Serialize};

/// Owner fields from the registration form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnerFields {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: NumericOrText,
    #[serde(default)]
    pub address: Option<String>,
}

/// Car fields from the registration form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CarFields {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub year: NumericInput,
    #[serde(default)]
    pub license_plate: String,
}

/// One row of the labor table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LaborInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pay: NumericInput,
}

/// One component to append to a job.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fault: Option<String>,
    #[serde(default)]
    pub price: NumericInput,
}

/// Phone numbers arrive as text or as a bare number from older clients.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericOrText {
    #[default]
    Missing,
    Number(u64),
    Text(String),
}

impl NumericOrText {
    fn into_text(self) -> String {
        match self {
            NumericOrText::Missing => String::new(),
            NumericOrText::Number(n) => n.to_string(),
            NumericOrText::Text(t) => t,
        }
    }
}

impl From<&str> for NumericOrText {
    fn from(v: &str) -> Self {
        NumericOrText::Text(v.to_string())
    }
}

/// Validated owner ready for insertion.
#[derive(Clone, Debug, PartialEq)]
pub struct NewOwner {
    pub name: String,
    pub phone: String,
    pub address: Option<String>,
}

/// Validated car ready for insertion.
#[derive(Clone, Debug, PartialEq)]
pub struct NewCar {
    pub model: String,
    pub year: i32,
    pub license_plate: String,
}

/// Coerced labor line.
#[derive(Clone, Debug, PartialEq)]
pub struct NewLabor {
    pub name: String,
    pub pay: Money,
}

/// Coerced component line.
#[derive(Clone, Debug, PartialEq)]
pub struct NewComponent {
    pub name: String,
    pub fault: Option<String>,
    pub price: Money,
}

fn required(field: &str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::ValidationError(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl OwnerFields {
    pub fn new(name: impl Into<String>, phone: impl Into<String>) -> Self {
        OwnerFields {
            name: name.into(),
            phone: NumericOrText::Text(phone.into()),
            address: None,
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Check required fields and normalize whitespace.
    pub fn validate(self) -> Result<NewOwner> {
        Ok(NewOwner {
            name: required("owner name", self.name)?,
            phone: required("owner phone", self.phone.into_text())?,
            address: optional(self.address),
        })
    }
}

impl CarFields {
    pub fn new(
        model: impl Into<String>,
        year: impl Into<NumericInput>,
        license_plate: impl Into<String>,
    ) -> Self {
        CarFields {
            model: model.into(),
            year: year.into(),
            license_plate: license_plate.into(),
        }
    }

    /// Check required fields and the plausible year range from `config`.
    pub fn validate(self, config: &ControllerConfig) -> Result<NewCar> {
        let model = required("car model", self.model)?;
        let license_plate = required("car license plate", self.license_plate)?;
        let year = self
            .year
            .to_integer()
            .and_then(|y| i32::try_from(y).ok())
            .filter(|y| config.year_range().contains(y))
            .ok_or_else(|| {
                Error::ValidationError(format!(
                    "car year must be an integer between {} and {}, got {}",
                    config.year_range().start(),
                    config.year_range().end(),
                    self.year
                ))
            })?;

        Ok(NewCar {
            model,
            year,
            license_plate,
        })
    }
}

impl LaborInput {
    pub fn new(name: impl Into<String>, pay: impl Into<NumericInput>) -> Self {
        LaborInput {
            name: name.into(),
            pay: pay.into(),
        }
    }

    /// Labor names are free text; pay falls back to zero.
    pub fn coerce(self) -> Result<NewLabor> {
        Ok(NewLabor {
            pay: self.pay.to_money_lenient("pay")?,
            name: self.name,
        })
    }
}

impl ComponentInput {
    pub fn new(name: impl Into<String>, price: impl Into<NumericInput>) -> Self {
        ComponentInput {
            name: name.into(),
            fault: None,
            price: price.into(),
        }
    }

    pub fn with_fault(mut self, fault: impl Into<String>) -> Self {
        self.fault = Some(fault.into());
        self
    }

    /// Price falls back to zero; a blank fault is dropped.
    pub fn coerce(self) -> Result<NewComponent> {
        Ok(NewComponent {
            price: self.price.to_money_lenient("price")?,
            fault: optional(self.fault),
            name: self.name,
        })
    }
}
