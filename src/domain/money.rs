use std::fmt;

use serde::{Deserialize, Serialize};

/// Amounts are integer cents of LKR: Rs. 100.00 = 10000 cents.
pub type Cents = i64;

/// Fixed fee charged per billable event (Rs. 100.00).
pub const DEFAULT_COMMISSION_CENTS: Cents = 10_000;

/// Percentage of gross commission kept by the platform operator.
pub const HOST_SHARE_PERCENT: Cents = 70;

/// Percentage of gross commission paid to the developer.
pub const DEVELOPER_SHARE_PERCENT: Cents = 100 - HOST_SHARE_PERCENT;

/// Host/developer split of a gross amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSplit {
    pub host: Cents,
    pub developer: Cents,
}

/// Split a gross amount 70/30. The developer share takes the rounding
/// remainder so that `host + developer == gross` always holds.
pub fn split_shares(gross: Cents) -> ShareSplit {
    let host = gross * HOST_SHARE_PERCENT / 100;
    ShareSplit {
        host,
        developer: gross - host,
    }
}

/// Format cents as a decimal string.
/// Example: 10000 -> "100.00", -250 -> "-2.50"
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Format cents with the rupee prefix used on statements.
pub fn format_lkr(cents: Cents) -> String {
    format!("Rs. {}", format_cents(cents))
}

/// Parse a decimal string into cents.
/// Example: "100" -> 10000, "12.5" -> 1250, "0.05" -> 5
pub fn parse_cents(input: &str) -> Result<Cents, ParseCentsError> {
    let input = input.trim();
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(ParseCentsError::InvalidFormat);
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(ParseCentsError::InvalidFormat);
    }

    let units: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| ParseCentsError::InvalidFormat)?
    };

    // Extra precision beyond cents is truncated
    let fraction_cents: i64 = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<i64>().map_err(|_| ParseCentsError::InvalidFormat)? * 10,
        _ => fraction[..2]
            .parse()
            .map_err(|_| ParseCentsError::InvalidFormat)?,
    };

    let cents = units
        .checked_mul(100)
        .and_then(|c| c.checked_add(fraction_cents))
        .ok_or(ParseCentsError::Overflow)?;
    Ok(if negative { -cents } else { cents })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseCentsError {
    InvalidFormat,
    Overflow,
}

impl fmt::Display for ParseCentsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseCentsError::InvalidFormat => write!(f, "invalid money format"),
            ParseCentsError::Overflow => write!(f, "amount is too large"),
        }
    }
}

impl std::error::Error for ParseCentsError {}
