//! Addressing scheme for payment records: one composite key per member and billing month.
//!
//! A key looks like `"{member_id}_{year}-{month}"` with an unpadded month. Encoding and
//! decoding must agree bit for bit, otherwise existing records silently become unreachable.

use std::fmt;

use thiserror::Error;
use time::OffsetDateTime;

/// One billing cycle of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObligationPeriod {
    year: i32,
    month: u8,
}

/// Reasons a period or key could not be built or parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("month {0} is outside 1..=12")]
    MonthOutOfRange(u32),
    #[error("key `{0}` has no `_` separator")]
    MissingSeparator(String),
    #[error("key `{0}` has an empty member id")]
    EmptyMemberId(String),
    #[error("key `{0}` has a malformed period")]
    MalformedPeriod(String),
}

impl ObligationPeriod {
    /// Build a period, rejecting months outside `1..=12`.
    pub fn new(year: i32, month: u32) -> Result<Self, KeyError> {
        if !(1..=12).contains(&month) {
            return Err(KeyError::MonthOutOfRange(month));
        }
        Ok(Self {
            year,
            month: month as u8,
        })
    }

    /// Calendar period containing `reference`.
    pub fn containing(reference: OffsetDateTime) -> Self {
        Self {
            year: reference.year(),
            month: u8::from(reference.month()),
        }
    }

    /// Period of the current UTC date.
    pub fn current() -> Self {
        Self::containing(OffsetDateTime::now_utc())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    /// Trailing part shared by every key of this period, e.g. `"_2024-7"`.
    pub fn suffix(&self) -> String {
        format!("_{}-{}", self.year, self.month)
    }
}

impl fmt::Display for ObligationPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.month)
    }
}

/// Decoded composite key of a payment record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObligationKey {
    member_id: String,
    period: ObligationPeriod,
}

impl ObligationKey {
    /// Key string for `member_id` in `period`.
    pub fn encode(member_id: &str, period: ObligationPeriod) -> String {
        format!("{member_id}{}", period.suffix())
    }

    /// Split a key at its first `_`, then split the period at its last `-`.
    ///
    /// Zero-padded months (`"07"`) are rejected: they would never match a key produced by
    /// [`ObligationKey::encode`].
    pub fn decode(key: &str) -> Result<Self, KeyError> {
        let (member_id, period) = key
            .split_once('_')
            .ok_or_else(|| KeyError::MissingSeparator(key.to_owned()))?;
        if member_id.is_empty() {
            return Err(KeyError::EmptyMemberId(key.to_owned()));
        }

        let malformed = || KeyError::MalformedPeriod(key.to_owned());
        let (year, month) = period.rsplit_once('-').ok_or_else(malformed)?;
        if month.is_empty() || month.starts_with('0') || !month.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(malformed());
        }
        let year: i32 = year.parse().map_err(|_| malformed())?;
        let month: u32 = month.parse().map_err(|_| malformed())?;

        Ok(Self {
            member_id: member_id.to_owned(),
            period: ObligationPeriod::new(year, month)?,
        })
    }

    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    pub fn period(&self) -> ObligationPeriod {
        self.period
    }
}

impl fmt::Display for ObligationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Self::encode(&self.member_id, self.period))
    }
}
