//! Bill domain model

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::result::{Error, Result};

/// Vendor label attached to every bill scraped from the portal
pub const VENDOR: &str = "Semidao";

/// Document category under which bill files are stored
pub const DOCUMENT_CATEGORY: &str = "invoice";

/// Textual date format used by the portal's bill table
pub const BILL_DATE_FORMAT: &str = "%d/%m/%Y";

/// One row of the bill table, as text, before validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBillRow {
    pub date_text: String,
    pub reference_text: String,
    pub amount_text: String,
    /// `href` of the first anchor in the row, if any
    pub document_href: Option<String>,
}

impl RawBillRow {
    /// The document href, if present and non-empty
    pub fn document_href(&self) -> Option<&str> {
        self.document_href
            .as_deref()
            .map(str::trim)
            .filter(|href| !href.is_empty())
    }
}

/// A normalized invoice entry scraped from the portal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillRecord {
    pub amount: Decimal,
    pub date: NaiveDate,
    pub vendor: String,
    /// Absolute URL of the downloadable invoice document
    pub document_url: String,
    /// Reference text shown next to the bill on the portal
    pub reference: String,
}

impl BillRecord {
    /// Build a record from a raw table row.
    ///
    /// `document_url` is the plain concatenation of `base_url` and the row's
    /// href. Fails when the href is missing, or when the amount or date text
    /// does not parse.
    pub fn from_raw(raw: &RawBillRow, base_url: &str) -> Result<Self> {
        let href = raw.document_href().ok_or_else(|| {
            Error::validation(format!(
                "bill ref. \"{}\" has no document URL",
                raw.reference_text
            ))
        })?;

        let amount = parse_amount(&raw.amount_text)?;
        let date = parse_bill_date(&raw.date_text)?;

        Ok(Self {
            amount,
            date,
            vendor: VENDOR.to_string(),
            document_url: format!("{}{}", base_url, href),
            reference: raw.reference_text.trim().to_string(),
        })
    }

    /// Calculate fingerprint hash for deduplication
    ///
    /// Uses vendor, bill date and amount. Two bills with the same fingerprint
    /// are considered the same bill, whatever their document URL.
    pub fn fingerprint(&self) -> String {
        let amount = if self.amount == Decimal::ZERO {
            Decimal::ZERO.abs()
        } else {
            self.amount
        };
        let fingerprint_str = format!(
            "{}|{}|{:.2}",
            self.vendor.to_lowercase(),
            self.date.format("%Y-%m-%d"),
            amount
        );

        let mut hasher = Sha256::new();
        hasher.update(fingerprint_str.as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..8])
    }

    /// File name used when storing the bill document
    pub fn document_file_name(&self) -> String {
        let extension = self
            .document_url
            .rsplit('/')
            .next()
            .and_then(|last| last.split(['?', '#']).next())
            .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext))
            .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("pdf")
            .to_lowercase();

        format!(
            "{}_{:.2}_{}.{}",
            self.date.format("%Y-%m-%d"),
            self.amount,
            self.vendor.to_lowercase(),
            extension
        )
    }
}

/// Length of the leading decimal number in `text`
///
/// Accepts an optional sign, digits with at most one `.`, and an optional
/// exponent. Returns 0 when no digit is found.
fn numeric_prefix_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }

    if digits == 0 {
        return 0;
    }

    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    end
}

/// Parse the bill amount from the leading number of the cell text
///
/// Leading whitespace is skipped and anything after the number is ignored,
/// so `"42.50 €"` reads as 42.50 and `"42,50"` as 42. Text that does not
/// start with a number is invalid.
pub fn parse_amount(text: &str) -> Result<Decimal> {
    let trimmed = text.trim();
    let invalid = || Error::validation(format!("invalid bill amount \"{}\"", trimmed));

    let number = &trimmed[..numeric_prefix_len(trimmed)];
    if number.is_empty() {
        return Err(invalid());
    }

    let (mantissa, exponent) = match number.find(|c: char| c == 'e' || c == 'E') {
        Some(pos) => (&number[..pos], Some(&number[pos + 1..])),
        None => (number, None),
    };

    // Normalize "5." and ".5" forms
    let (sign, digits) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa.strip_prefix('+').unwrap_or(mantissa)),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    let int_part = if int_part.is_empty() { "0" } else { int_part };
    let normalized = if frac_part.is_empty() {
        format!("{}{}", sign, int_part)
    } else {
        format!("{}{}.{}", sign, int_part, frac_part)
    };

    match exponent {
        Some(exp) => Decimal::from_scientific(&format!("{}e{}", normalized, exp))
            .map(|d| d.normalize())
            .map_err(|_| invalid()),
        None => Decimal::from_str(&normalized).map_err(|_| invalid()),
    }
}

/// Parse the bill date text strictly as DD/MM/YYYY
pub fn parse_bill_date(text: &str) -> Result<NaiveDate> {
    let trimmed = text.trim();
    NaiveDate::parse_from_str(trimmed, BILL_DATE_FORMAT)
        .map_err(|_| Error::validation(format!("invalid bill date \"{}\"", trimmed)))
}

/// A bill as persisted by a bill store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredBill {
    pub id: Uuid,
    pub bill: BillRecord,
    pub fingerprint: String,
    /// Where the downloaded document was written, if it was
    pub document_path: Option<String>,
    pub tags: Vec<String>,
    pub linked_transaction_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl StoredBill {
    pub fn new(bill: BillRecord, tags: Vec<String>) -> Self {
        let fingerprint = bill.fingerprint();
        Self {
            id: Uuid::new_v4(),
            bill,
            fingerprint,
            document_path: None,
            tags,
            linked_transaction_id: None,
            created_at: Utc::now(),
        }
    }
}
