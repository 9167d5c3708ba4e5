use rust_decimal::{Decimal, RoundingStrategy};

/// Two-place rounding used for every presented or exported amount.
pub fn round_cents(val: Decimal) -> Decimal {
    val.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Plain `1234.56` form with exactly two places, for CSV output.
pub fn plain(val: Decimal) -> String {
    format!("{:.2}", round_cents(val))
}

/// Format a decimal as Brazilian Real with thousands separators: R$ 1.234,56
pub fn money(val: Decimal) -> String {
    let rounded = round_cents(val);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let cents = format!("{:.2}", rounded.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut with_dots = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_dots.push('.');
        }
        with_dots.push(c);
    }
    let with_dots: String = with_dots.chars().rev().collect();

    if negative {
        format!("-R$ {with_dots},{dec_part}")
    } else {
        format!("R$ {with_dots},{dec_part}")
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(d("1234.56")), "R$ 1.234,56");
        assert_eq!(money(d("-50")), "-R$ 50,00");
        assert_eq!(money(Decimal::ZERO), "R$ 0,00");
        assert_eq!(money(d("1000000.99")), "R$ 1.000.000,99");
        assert_eq!(money(d("42.1")), "R$ 42,10");
        assert_eq!(money(d("-0.001")), "R$ 0,00");
    }

    #[test]
    fn test_plain_rounds_half_away_from_zero() {
        assert_eq!(plain(d("17.5")), "17.50");
        assert_eq!(plain(d("0.005")), "0.01");
        assert_eq!(plain(d("-0.005")), "-0.01");
        assert_eq!(plain(d("-1234.5")), "-1234.50");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
