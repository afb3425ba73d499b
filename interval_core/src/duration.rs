//! Clock and rep-count normalization.
//!
//! Workout documents write times as `m:ss` and counts as `N reps`; everything
//! downstream works in whole seconds and plain integers.

/// Combine minute and second digit strings into a number of seconds
///
/// Returns None when either part is not made of ASCII digits or the result
/// does not fit in a `u32`. Seconds above 59 are accepted and carried
/// (`1:75` is 135 seconds).
pub fn clock_seconds(minutes: &str, seconds: &str) -> Option<u32> {
    let minutes = parse_digits(minutes)?;
    let seconds = parse_digits(seconds)?;
    minutes.checked_mul(60)?.checked_add(seconds)
}

/// Parse an `m:ss` clock string into seconds
pub fn parse_clock(text: &str) -> Option<u32> {
    let (minutes, seconds) = text.trim().split_once(':')?;
    clock_seconds(minutes.trim(), seconds.trim())
}

/// Parse a rep count such as `10 reps`, `1 rep` or `15 REPS`
pub fn parse_reps(text: &str) -> Option<u32> {
    let (count, unit) = text.trim().split_once(char::is_whitespace)?;
    let unit = unit.trim().to_ascii_lowercase();
    if unit == "rep" || unit == "reps" {
        parse_digits(count)
    } else {
        None
    }
}

/// Format seconds as `m:ss`
pub fn format_clock(total_seconds: u32) -> String {
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

fn parse_digits(text: &str) -> Option<u32> {
    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clock_examples() {
        assert_eq!(parse_clock("1:30"), Some(90));
        assert_eq!(parse_clock("0:05"), Some(5));
        assert_eq!(parse_clock("10:00"), Some(600));
        assert_eq!(parse_clock("99:59"), Some(5999));
    }

    #[test]
    fn test_parse_clock_all_minute_second_pairs() {
        for m in 0..=20u32 {
            for s in 0..60u32 {
                let text = format!("{}:{:02}", m, s);
                assert_eq!(parse_clock(&text), Some(m * 60 + s), "{}", text);
            }
        }
    }

    #[test]
    fn test_parse_clock_rejects_garbage() {
        assert_eq!(parse_clock("invalid"), None);
        assert_eq!(parse_clock("1:"), None);
        assert_eq!(parse_clock(":30"), None);
        assert_eq!(parse_clock("-1:30"), None);
        assert_eq!(parse_clock("1:3a"), None);
    }

    #[test]
    fn test_clock_seconds_overflow_is_none() {
        assert_eq!(clock_seconds("99999999999", "00"), None);
        assert_eq!(clock_seconds("71582789", "00"), None);
    }

    #[test]
    fn test_parse_reps_units() {
        assert_eq!(parse_reps("10 reps"), Some(10));
        assert_eq!(parse_reps("1 rep"), Some(1));
        assert_eq!(parse_reps("15 REPS"), Some(15));
        assert_eq!(parse_reps("10 sets"), None);
        assert_eq!(parse_reps("reps"), None);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(5), "0:05");
        assert_eq!(format_clock(90), "1:30");
        assert_eq!(format_clock(3600), "60:00");
    }
}
