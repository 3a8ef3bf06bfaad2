//! Human-readable formatting of check values

/// Formats a value for a result summary
pub type RenderFn = fn(f64) -> String;

const KIB: f64 = 1024.0;
const MIB: f64 = KIB * 1024.0;
const GIB: f64 = MIB * 1024.0;
const TIB: f64 = GIB * 1024.0;

/// Format a percentage with two decimals
pub fn percent(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Format a byte count with binary prefixes
pub fn bytes(value: f64) -> String {
    let abs = value.abs();
    if abs >= TIB {
        format!("{:.2} TiB", value / TIB)
    } else if abs >= GIB {
        format!("{:.2} GiB", value / GIB)
    } else if abs >= MIB {
        format!("{:.2} MiB", value / MIB)
    } else if abs >= KIB {
        format!("{:.2} KiB", value / KIB)
    } else {
        format!("{:.0} B", value)
    }
}

/// Format a byte rate with decimal prefixes
pub fn iobandwidth(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e9 {
        format!("{:.2} GB/s", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2} MB/s", value / 1e6)
    } else if abs >= 1e3 {
        format!("{:.2} kB/s", value / 1e3)
    } else {
        format!("{:.2} B/s", value)
    }
}

/// Format a link speed given in bits per second
pub fn nic_speed(value: f64) -> String {
    if value >= 1e9 {
        format!("{} GBit/s", trim_float(value / 1e9))
    } else if value >= 1e6 {
        format!("{} MBit/s", trim_float(value / 1e6))
    } else if value >= 1e3 {
        format!("{} kBit/s", trim_float(value / 1e3))
    } else {
        format!("{} Bit/s", trim_float(value))
    }
}

/// Plain number with two decimals
pub fn float(value: f64) -> String {
    format!("{:.2}", value)
}

/// Event count or rate per second
pub fn count(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// Format a duration in seconds
pub fn timespan(seconds: f64) -> String {
    if seconds < 0.001 {
        return format!("{:.0} µs", seconds * 1e6);
    }
    if seconds < 1.0 {
        return format!("{:.0} ms", seconds * 1e3);
    }
    if seconds < 60.0 {
        return format!("{:.2} s", seconds);
    }

    let total = seconds.round() as u64;
    let (days, rest) = (total / 86_400, total % 86_400);
    let (hours, rest) = (rest / 3_600, rest % 3_600);
    let (minutes, secs) = (rest / 60, rest % 60);
    if days > 0 {
        format!("{} d {} h", days, hours)
    } else if hours > 0 {
        format!("{} h {} m", hours, minutes)
    } else {
        format!("{} m {} s", minutes, secs)
    }
}

fn trim_float(value: f64) -> String {
    let text = format!("{:.2}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
