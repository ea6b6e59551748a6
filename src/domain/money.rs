use {
    super::error::PipelineError,
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Non-negative amount in minor units (cents, kobo, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MoneyAmount(i64);

impl MoneyAmount {
    pub const ZERO: MoneyAmount = MoneyAmount(0);

    pub fn new(minor: i64) -> Result<Self, PipelineError> {
        if minor < 0 {
            return Err(PipelineError::Validation(format!(
                "MoneyAmount cannot be negative, got: {minor}"
            )));
        }
        Ok(Self(minor))
    }

    pub fn minor(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: MoneyAmount) -> Option<MoneyAmount> {
        self.0.checked_add(other.0).map(MoneyAmount)
    }

    pub fn checked_sub(self, other: MoneyAmount) -> Option<MoneyAmount> {
        self.0
            .checked_sub(other.0)
            .filter(|&v| v >= 0)
            .map(MoneyAmount)
    }

    /// Parses a decimal such as `"50.00"` or `"7.5"` into minor units.
    pub fn from_decimal_str(s: &str) -> Result<Self, PipelineError> {
        Self::new(parse_minor_units(s)?)
    }
}

impl fmt::Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Parses a signed decimal with at most two fraction digits into minor units.
///
/// Gateways send amounts both as JSON numbers and as strings; both go through
/// here so no value ever passes through an `f64`.
pub fn parse_minor_units(s: &str) -> Result<i64, PipelineError> {
    let invalid = || PipelineError::Validation(format!("invalid decimal amount: {s:?}"));
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let (whole, frac) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    // Trailing zeros beyond the second digit carry no value ("50.000").
    let frac = frac.trim_end_matches('0');
    if frac.len() > 2 {
        return Err(PipelineError::Validation(format!(
            "amount has more than two fraction digits: {s:?}"
        )));
    }
    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let frac: i64 = format!("{frac:0<2}").parse().map_err(|_| invalid())?;
    let minor = whole
        .checked_mul(100)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(invalid)?;
    Ok(if negative { -minor } else { minor })
}

/// Reads an amount out of a JSON string or number.
pub fn minor_units_from_json(value: &serde_json::Value) -> Result<i64, PipelineError> {
    match value {
        serde_json::Value::String(s) => parse_minor_units(s),
        serde_json::Value::Number(n) => parse_minor_units(&n.to_string()),
        other => Err(PipelineError::Validation(format!(
            "amount must be a string or number, got: {other}"
        ))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Ngn,
    Usdt,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Usd => "usd",
            Self::Eur => "eur",
            Self::Gbp => "gbp",
            Self::Ngn => "ngn",
            Self::Usdt => "usdt",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Currency {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "usd" => Ok(Self::Usd),
            "eur" => Ok(Self::Eur),
            "gbp" => Ok(Self::Gbp),
            "ngn" => Ok(Self::Ngn),
            "usdt" => Ok(Self::Usdt),
            other => Err(PipelineError::Validation(format!(
                "unknown currency: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: MoneyAmount,
    currency: Currency,
}

impl Money {
    pub fn new(amount: MoneyAmount, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn amount(&self) -> MoneyAmount {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_amounts() {
        assert_eq!(parse_minor_units("50.00").unwrap(), 5000);
        assert_eq!(parse_minor_units("50").unwrap(), 5000);
        assert_eq!(parse_minor_units("7.5").unwrap(), 750);
        assert_eq!(parse_minor_units(".25").unwrap(), 25);
        assert_eq!(parse_minor_units("-3.10").unwrap(), -310);
        assert_eq!(parse_minor_units("12.340").unwrap(), 1234);
    }

    #[test]
    fn rejects_garbage_and_sub_cent_amounts() {
        assert!(parse_minor_units("").is_err());
        assert!(parse_minor_units("abc").is_err());
        assert!(parse_minor_units("1.234").is_err());
        assert!(parse_minor_units("1e3").is_err());
        assert!(parse_minor_units(".").is_err());
    }

    #[test]
    fn json_numbers_and_strings() {
        assert_eq!(minor_units_from_json(&serde_json::json!(50.0)).unwrap(), 5000);
        assert_eq!(minor_units_from_json(&serde_json::json!(12)).unwrap(), 1200);
        assert_eq!(minor_units_from_json(&serde_json::json!("0.99")).unwrap(), 99);
        assert!(minor_units_from_json(&serde_json::json!(null)).is_err());
    }

    #[test]
    fn displays_two_fraction_digits() {
        assert_eq!(MoneyAmount::new(5000).unwrap().to_string(), "50.00");
        assert_eq!(MoneyAmount::new(7).unwrap().to_string(), "0.07");
    }
}
