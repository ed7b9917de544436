//! Conversion between decimal strings and double-precision values
//!
//! Stored values stay text until a stage needs them numerically. Parsers here
//! return `Option` so that callers can attach the field/variable context to
//! the resulting `Error::NumericFormat`.

/// Fractional digits used when re-serializing computed values, unless
/// overridden on the command line
pub const DEFAULT_PRECISION: usize = 8;

/// Strict decimal parse; `None` for empty, malformed, or partially-consumed
/// input
pub fn parse_number(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Magnitude of a stored field value, ignoring at most one leading sign
///
/// A field value may carry a leading `+` or `-` that marks the direction of
/// an uncertainty; the magnitude is what aggregation and ranking consume.
pub fn parse_magnitude(s: &str) -> Option<f64> {
    let stripped = match s.as_bytes().first() {
        Some(b'+') | Some(b'-') => &s[1..],
        _ => s,
    };
    parse_number(stripped).map(f64::abs)
}

/// Render `x` in fixed-point notation with exactly `precision` fractional
/// digits
pub fn format_number(x: f64, precision: usize) -> String {
    format!("{:.*}", precision, x)
}
