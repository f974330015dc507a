//! Display formatting for pace, elapsed time and distance.

/// Pace shown when no meaningful pace can be computed yet.
pub const ZERO_PACE: &str = "0'00\"";

/// Average pace in minutes per kilometer, rendered as `M'SS"`.
pub fn format_pace(elapsed_ms: i64, distance_meters: f64) -> String {
    if elapsed_ms <= 0 || !(distance_meters > 0.0) {
        return ZERO_PACE.to_string();
    }

    let minutes_per_km = (elapsed_ms as f64 / 1000.0 / 60.0) / (distance_meters / 1000.0);
    if !minutes_per_km.is_finite() {
        return ZERO_PACE.to_string();
    }

    let mut minutes = minutes_per_km.floor() as u64;
    let mut seconds = ((minutes_per_km - minutes as f64) * 60.0).round() as u64;
    if seconds >= 60 {
        minutes += 1;
        seconds -= 60;
    }

    format!("{minutes}'{seconds:02}\"")
}

/// Countdown-style `MM:SS`. There is no hours field; minutes keep counting past 59.
pub fn format_elapsed(milliseconds: u64) -> String {
    let total_seconds = milliseconds / 1000;
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Meters with one decimal and a comma every third digit, e.g. `12,345.6`.
pub fn format_distance(meters: f64) -> String {
    let fixed = format!("{:.1}", meters);
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, "0"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{sign}{grouped}.{fraction}")
}
