//! Signed duration formatting for timer and pool displays

/// Format signed seconds as `[-]HH:MM:SS`.
///
/// Digits come from the absolute value; a leading `-` marks negative input.
/// Hours are not wrapped, so large magnitudes simply widen the hour field.
pub fn format_signed(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let abs_secs = seconds.unsigned_abs();
    format!(
        "{}{:02}:{:02}:{:02}",
        sign,
        abs_secs / 3600,
        (abs_secs % 3600) / 60,
        abs_secs % 60
    )
}

/// Format signed seconds as compact `[-]M:SS`, minutes unbounded.
pub fn format_clock(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let abs_secs = seconds.unsigned_abs();
    format!("{}{}:{:02}", sign, abs_secs / 60, abs_secs % 60)
}
