//! Brazilian Portuguese number rendering for legends and summaries.

/// Rendered in place of a value that is zero, missing or not finite.
pub const PLACEHOLDER: &str = "—";

/// `value` with `digits` decimals, `.` between thousands and `,` before
/// the decimals.
pub fn decimal(value: f64, digits: usize) -> String {
    let fixed = format!("{:.*}", digits, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::with_capacity(fixed.len() + int_part.len() / 3 + 1);
    let negative = value < 0.0 && fixed.bytes().any(|b| matches!(b, b'1'..=b'9'));
    if negative {
        out.push('-');
    }
    let len = int_part.len();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    if let Some(frac) = frac_part {
        out.push(',');
        out.push_str(frac);
    }
    out
}

fn magnitude_digits(value: f64) -> usize {
    let v = value.abs();
    if v >= 100.0 {
        0
    } else if v >= 10.0 {
        1
    } else {
        2
    }
}

fn measure(value: f64, unit: &str) -> String {
    if !value.is_finite() || value == 0.0 {
        return PLACEHOLDER.to_string();
    }
    format!("{} {unit}", decimal(value, magnitude_digits(value)))
}

pub fn hectares(value: f64) -> String {
    measure(value, "ha")
}

pub fn kilometers(value: f64) -> String {
    measure(value, "km")
}

pub fn percent(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{}%", decimal(v, 1)),
        _ => PLACEHOLDER.to_string(),
    }
}

pub fn integer(value: f64) -> String {
    if !value.is_finite() {
        return PLACEHOLDER.to_string();
    }
    decimal(value.round(), 0)
}
