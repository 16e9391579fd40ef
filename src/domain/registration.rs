use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RegistrationError, Result};

/// Payment status written to the row of every committed registration.
pub const PAYMENT_STATUS_SUCCESS: &str = "Success";

/// A positive amount in major currency units (rupees).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(RegistrationError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Amount in minor units (paise), rounded half away from zero.
    pub fn to_minor_units(&self) -> Result<i64> {
        (self.0 * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or_else(|| RegistrationError::ValidationError("Amount is too large".to_string()))
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = RegistrationError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// Body of `check-registration`.
#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

impl AvailabilityQuery {
    pub fn validate(&self) -> Result<()> {
        if self.email.trim().is_empty() || self.phone.trim().is_empty() {
            return Err(RegistrationError::ValidationError(
                "email and phone are required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Body of `register` as sent by the registration form.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub amount: Decimal,
    #[serde(default, alias = "package")]
    pub package_type: String,
    #[serde(default)]
    pub address: Option<String>,
}

/// A registration request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Applicant {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub package: String,
    pub address: Option<String>,
    pub amount: Amount,
}

impl RegistrationRequest {
    pub fn validate(self) -> Result<Applicant> {
        let required = |field: &str, value: String| -> Result<String> {
            let value = value.trim().to_string();
            if value.is_empty() {
                Err(RegistrationError::ValidationError(format!(
                    "{field} is required"
                )))
            } else {
                Ok(value)
            }
        };

        let name = required("name", self.name)?;
        let email = required("email", self.email)?;
        let phone = required("phone", self.phone)?;
        let package = required("packageType", self.package_type)?;

        if !email.contains('@') {
            return Err(RegistrationError::ValidationError(format!(
                "'{email}' is not a valid email address"
            )));
        }

        Ok(Applicant {
            name,
            email,
            phone,
            package,
            address: self
                .address
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty()),
            amount: Amount::new(self.amount)?,
        })
    }
}

/// Order id and ticket number handed out for one registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifiers {
    pub order_id: String,
    pub ticket_number: String,
}

impl Identifiers {
    pub fn generate(ticket_prefix: &str, now: DateTime<Utc>) -> Self {
        let suffix = rand::thread_rng().gen_range(0..10_000);
        Self::from_parts(ticket_prefix, now.timestamp_millis(), suffix)
    }

    pub fn from_parts(ticket_prefix: &str, millis: i64, suffix: u16) -> Self {
        Self {
            order_id: format!("ORDER_{millis}_{suffix:04}"),
            ticket_number: format!("{ticket_prefix}{suffix:04}"),
        }
    }
}

/// An accepted registration waiting for the gateway callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRegistration {
    pub order_id: String,
    pub event: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub package: String,
    pub ticket_number: String,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

impl PendingRegistration {
    pub fn new(
        event: &str,
        applicant: Applicant,
        ids: Identifiers,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            order_id: ids.order_id,
            event: event.to_string(),
            name: applicant.name,
            email: applicant.email,
            phone: applicant.phone,
            address: applicant.address,
            package: applicant.package,
            ticket_number: ids.ticket_number,
            amount: applicant.amount,
            created_at,
        }
    }
}

/// One row of the durable registration sheet.
///
/// Every column is kept as text so that rows written by hand into the
/// spreadsheet still load; unknown columns are ignored and missing ones are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistrationRow {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub package: String,
    pub ticket_number: String,
    pub amount: String,
    pub timestamp: String,
    pub payment_status: String,
    pub transaction_id: String,
    pub order_id: String,
}

impl RegistrationRow {
    pub const COLUMNS: [&'static str; 11] = [
        "name",
        "email",
        "phone",
        "address",
        "package",
        "ticketNumber",
        "amount",
        "timestamp",
        "paymentStatus",
        "transactionId",
        "orderId",
    ];

    pub fn committed(pending: &PendingRegistration, transaction_id: &str) -> Self {
        Self {
            name: pending.name.clone(),
            email: pending.email.clone(),
            phone: pending.phone.clone(),
            address: pending.address.clone().unwrap_or_default(),
            package: pending.package.clone(),
            ticket_number: pending.ticket_number.clone(),
            amount: pending.amount.to_string(),
            timestamp: pending.created_at.to_rfc3339(),
            payment_status: PAYMENT_STATUS_SUCCESS.to_string(),
            transaction_id: transaction_id.to_string(),
            order_id: pending.order_id.clone(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        let value = match column {
            "name" => &self.name,
            "email" => &self.email,
            "phone" => &self.phone,
            "address" => &self.address,
            "package" => &self.package,
            "ticketNumber" => &self.ticket_number,
            "amount" => &self.amount,
            "timestamp" => &self.timestamp,
            "paymentStatus" => &self.payment_status,
            "transactionId" => &self.transaction_id,
            "orderId" => &self.order_id,
            _ => return None,
        };
        Some(value)
    }

    fn slot(&mut self, column: &str) -> Option<&mut String> {
        let slot = match column {
            "name" => &mut self.name,
            "email" => &mut self.email,
            "phone" => &mut self.phone,
            "address" => &mut self.address,
            "package" => &mut self.package,
            "ticketNumber" => &mut self.ticket_number,
            "amount" => &mut self.amount,
            "timestamp" => &mut self.timestamp,
            "paymentStatus" => &mut self.payment_status,
            "transactionId" => &mut self.transaction_id,
            "orderId" => &mut self.order_id,
            _ => return None,
        };
        Some(slot)
    }

    /// Builds a row from a header line and the matching cell values.
    pub fn from_cells(headers: &[String], cells: &[String]) -> Self {
        let mut row = Self::default();
        for (header, cell) in headers.iter().zip(cells) {
            if let Some(slot) = row.slot(header.trim()) {
                *slot = cell.clone();
            }
        }
        row
    }

    /// Cells in the order of `headers`; unknown headers get an empty cell.
    pub fn to_cells(&self, headers: &[String]) -> Vec<String> {
        headers
            .iter()
            .map(|h| self.get(h.trim()).unwrap_or_default().to_string())
            .collect()
    }

    /// Lines to append for this row: the row alone, laid out under `header`
    /// when the sheet already has one, otherwise the default header followed
    /// by the row.
    pub fn append_lines(&self, header: Option<Vec<String>>) -> Vec<Vec<String>> {
        match header.filter(|h| h.iter().any(|c| !c.trim().is_empty())) {
            Some(header) => vec![self.to_cells(&header)],
            None => {
                let header: Vec<String> = Self::COLUMNS.iter().map(|c| c.to_string()).collect();
                let cells = self.to_cells(&header);
                vec![header, cells]
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    Email,
    Phone,
}

impl fmt::Display for DuplicateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateField::Email => write!(f, "Email"),
            DuplicateField::Phone => write!(f, "Phone number"),
        }
    }
}

/// Linear scan for an existing registration with the same email or phone.
///
/// Email wins when both match, so the message names the field the user most
/// likely reused.
pub fn find_duplicate(rows: &[RegistrationRow], email: &str, phone: &str) -> Option<DuplicateField> {
    let email = email.trim();
    let phone = phone.trim();
    if rows.iter().any(|row| row.email == email) {
        return Some(DuplicateField::Email);
    }
    if rows.iter().any(|row| row.phone == phone) {
        return Some(DuplicateField::Phone);
    }
    None
}
