//! Conversions between whole-number percents (config files, console output)
//! and decimal fractions (everything inside the engine).

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PercentError {
    #[error("empty percentage value")]
    Empty,

    #[error("not a number: {0}")]
    NotANumber(String),

    #[error("percentage must be finite")]
    NotFinite,
}

/// 10.0 -> 0.10
pub fn to_decimal(whole: f64) -> f64 {
    whole / 100.0
}

/// 0.10 -> 10.0
pub fn to_whole(decimal: f64) -> f64 {
    decimal * 100.0
}

/// Parse `"10"`, `"10%"` or `" 2.5 % "` into a decimal fraction.
pub fn parse_percent(input: &str) -> Result<f64, PercentError> {
    let trimmed = input.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    if number.is_empty() {
        return Err(PercentError::Empty);
    }
    let value: f64 = number
        .parse()
        .map_err(|_| PercentError::NotANumber(number.to_string()))?;
    if !value.is_finite() {
        return Err(PercentError::NotFinite);
    }
    Ok(to_decimal(value))
}

/// Parse a comma-separated list of percentages.
pub fn parse_percent_list(input: &str) -> Result<Vec<f64>, PercentError> {
    input
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(parse_percent)
        .collect()
}

/// 0.1234 with 2 places -> "12.34%"
pub fn format_percent(decimal: f64, places: usize) -> String {
    format!("{:.*}%", places, to_whole(decimal))
}

/// `0 < value <= 1`
pub fn is_positive_fraction(value: f64) -> bool {
    value.is_finite() && value > 0.0 && value <= 1.0
}

/// `0 <= value < 1`
pub fn is_open_fraction(value: f64) -> bool {
    value.is_finite() && (0.0..1.0).contains(&value)
}

/// `0 <= value <= 1`
pub fn is_closed_fraction(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}
