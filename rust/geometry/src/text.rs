// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Number formatting and parsing shared by the text formats.

/// Formats `x` with up to 15 significant digits, trailing zeros removed,
/// switching to exponent notation for very large or very small values.
pub fn format_number(x: f64) -> String {
    if x == 0.0 {
        return "0".to_string();
    }
    if !x.is_finite() {
        return format!("{}", x);
    }
    let sci = format!("{:.14e}", x);
    let exp: i32 = sci
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);
    if !(-5..15).contains(&exp) {
        let (mantissa, _) = sci.split_once('e').unwrap_or((sci.as_str(), ""));
        let mantissa = trim_zeros(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", mantissa, sign, exp.abs());
    }
    let decimals = (14 - exp).max(0) as usize;
    trim_zeros(&format!("{:.*}", decimals, x)).to_string()
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Splits on commas and whitespace, skipping empty parts.
pub fn split_numbers(s: &str) -> impl Iterator<Item = &str> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_forms() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(-2.5), "-2.5");
        assert_eq!(format_number(0.1), "0.1");
        assert_eq!(format_number(100.0), "100");
    }

    #[test]
    fn exponent_forms() {
        assert_eq!(format_number(1e20), "1e+20");
        assert_eq!(format_number(1.5e-7), "1.5e-07");
    }

    #[test]
    fn round_trips_precision() {
        let x = 1.0 / 3.0;
        let back: f64 = format_number(x).parse().unwrap();
        assert!((back - x).abs() < 1e-14);
    }

    #[test]
    fn splits_mixed_separators() {
        let parts: Vec<&str> = split_numbers("5 1,2,3  4,5,6").collect();
        assert_eq!(parts, vec!["5", "1", "2", "3", "4", "5", "6"]);
    }
}
