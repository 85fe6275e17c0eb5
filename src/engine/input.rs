use super::timer::MAX_TIMER_SECONDS;

/// Render a seconds value as the `MM:SS` clock text.
pub fn format_clock(seconds: u32) -> String {
    let seconds = seconds.min(MAX_TIMER_SECONDS);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Parse free-text clock input into seconds.
///
/// Accepts `MM`, `MM:SS`, and partial colon forms. Everything except digits
/// and colons is discarded first; minutes clamp to `[0, 99]` and seconds to
/// `[0, 59]`, so malformed input coerces to the nearest valid clock value
/// instead of being rejected.
pub fn parse_timer_text(value: &str) -> u32 {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ':')
        .collect();

    let mut parts = cleaned.splitn(2, ':');
    let minutes = parse_component(parts.next().unwrap_or("")).min(99);
    let seconds = match parts.next() {
        Some(rest) => parse_component(rest).min(59),
        None => 0,
    };

    minutes * 60 + seconds
}

fn parse_component(digits: &str) -> u32 {
    // Keep only leading digits so "5:30:99" parses its second field as 30.
    let digits: String = digits.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_number_is_minutes() {
        assert_eq!(parse_timer_text("5"), 300);
        assert_eq!(parse_timer_text("18"), 18 * 60);
    }

    #[test]
    fn minutes_and_seconds() {
        assert_eq!(parse_timer_text("5:30"), 330);
        assert_eq!(parse_timer_text("00:59"), 59);
    }

    #[test]
    fn out_of_range_components_clamp() {
        assert_eq!(parse_timer_text("99:99"), 99 * 60 + 59);
        assert_eq!(parse_timer_text("120"), 99 * 60);
    }

    #[test]
    fn partial_colon_forms() {
        assert_eq!(parse_timer_text(":70"), 59);
        assert_eq!(parse_timer_text("7:"), 420);
        assert_eq!(parse_timer_text(":"), 0);
    }

    #[test]
    fn garbage_is_stripped_not_rejected() {
        // Digits survive stripping and are read as one minutes field.
        assert_eq!(parse_timer_text(" 1m 2s "), 720);
        assert_eq!(parse_timer_text("abc"), 0);
        assert_eq!(parse_timer_text(""), 0);
    }

    #[test]
    fn clock_formatting_pads() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(1140), "19:00");
        assert_eq!(format_clock(5999), "99:59");
        assert_eq!(format_clock(u32::MAX), "99:59");
    }
}
