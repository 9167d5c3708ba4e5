use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::{NormalizedRow, RawRow};

pub const INVALID_DATE: &str = "invalid date";
pub const AMOUNT_REVIEW: &str = "amount needs review";

// First format that parses wins.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%m/%d/%Y"];

/// Trim, and fold the "missing value" spellings spreadsheets produce into "".
pub fn normalize_text(raw: &str) -> String {
    let s = raw.trim();
    match s.to_lowercase().as_str() {
        "nan" | "none" | "null" | "nat" => String::new(),
        _ => s.to_string(),
    }
}

/// Parse a calendar date. Time-of-day suffixes (`T10:00:00`, ` 10:00`) are ignored.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = normalize_text(raw);
    if s.is_empty() {
        return None;
    }
    let head = s
        .split(|c: char| c == 'T' || c.is_whitespace())
        .next()
        .unwrap_or_default();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(head, fmt).ok())
}

/// Parse an amount written either as `1234.56` or as `1.234,56`.
///
/// Returns `None` for anything ambiguous (`1,234.56`) or malformed; callers
/// fall back to zero and flag the row.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let s: String = normalize_text(raw)
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '"' && *c != '$')
        .collect();

    let (negative, body) = if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        (true, inner)
    } else if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else {
        (false, s.strip_prefix('+').unwrap_or(&s))
    };

    let canonical = canonical_number(body)?;
    let value = Decimal::from_str(&canonical).ok()?;
    Some(if negative { -value } else { value })
}

fn canonical_number(body: &str) -> Option<String> {
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }
    match body.matches(',').count() {
        0 if body.matches('.').count() <= 1 => {
            let (int_part, frac) = body.split_once('.').unwrap_or((body, ""));
            join_parts(int_part, frac)
        }
        0 => Some(ungroup(body)?),
        1 => {
            let (int_part, frac) = body.split_once(',')?;
            if frac.contains('.') {
                return None;
            }
            let int_part = if int_part.contains('.') { ungroup(int_part)? } else { int_part.to_string() };
            join_parts(&int_part, frac)
        }
        _ => None,
    }
}

/// `1.234.567` -> `1234567`; groups after the first must have exactly three digits.
fn ungroup(grouped: &str) -> Option<String> {
    let mut parts = grouped.split('.');
    let head = parts.next()?;
    if head.is_empty() || head.len() > 3 {
        return None;
    }
    let mut out = head.to_string();
    for group in parts {
        if group.len() != 3 {
            return None;
        }
        out.push_str(group);
    }
    Some(out)
}

fn join_parts(int_part: &str, frac: &str) -> Option<String> {
    if int_part.is_empty() && frac.is_empty() {
        return None;
    }
    if !int_part.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let int_part = if int_part.is_empty() { "0" } else { int_part };
    if frac.is_empty() {
        Some(int_part.to_string())
    } else {
        Some(format!("{int_part}.{frac}"))
    }
}

/// Convert a mapped source row into canonical types. Never fails: problems
/// are recorded on the row and the offending value falls back to a sentinel.
pub fn normalize_row(raw: RawRow) -> NormalizedRow {
    let mut problems = Vec::new();

    let date = parse_date(&raw.date);
    if date.is_none() {
        problems.push(INVALID_DATE);
    }

    let amount = match parse_amount(&raw.amount) {
        Some(v) => v,
        None => {
            problems.push(AMOUNT_REVIEW);
            Decimal::ZERO
        }
    };

    let balance = raw
        .balance
        .as_deref()
        .map(normalize_text)
        .filter(|s| !s.is_empty())
        .and_then(|s| parse_amount(&s));

    NormalizedRow {
        date,
        description: normalize_text(&raw.description),
        doc: normalize_text(&raw.doc),
        amount,
        balance,
        problems,
        raw: raw.unmapped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    fn dec(s: &str) -> Option<Decimal> {
        Some(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-03-01"), d(2024, 3, 1));
        assert_eq!(parse_date("01/03/2024"), d(2024, 3, 1));
        assert_eq!(parse_date("01-03-2024"), d(2024, 3, 1));
        // Day-first fails on month 15, so month-first picks it up.
        assert_eq!(parse_date("03/15/2024"), d(2024, 3, 15));
    }

    #[test]
    fn test_parse_date_day_first_wins_when_both_valid() {
        assert_eq!(parse_date("02/03/2024"), d(2024, 3, 2));
    }

    #[test]
    fn test_parse_date_strips_time() {
        assert_eq!(parse_date("2024-03-01T10:15:00.000-04:00"), d(2024, 3, 1));
        assert_eq!(parse_date(" 2024-03-01 23:59:59 "), d(2024, 3, 1));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("NaN"), None);
        assert_eq!(parse_date("31/02/2024"), None);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_parse_amount_plain_decimal() {
        assert_eq!(parse_amount("1234.56"), dec("1234.56"));
        assert_eq!(parse_amount("-42.5"), dec("-42.5"));
        assert_eq!(parse_amount("0"), dec("0"));
        assert_eq!(parse_amount(".5"), dec("0.5"));
    }

    #[test]
    fn test_parse_amount_brazilian_format() {
        assert_eq!(parse_amount("1.234,56"), dec("1234.56"));
        assert_eq!(parse_amount("-1.234.567,89"), dec("-1234567.89"));
        assert_eq!(parse_amount("R$ 50,00"), dec("50.00"));
        assert_eq!(parse_amount("\"(10,50)\""), dec("-10.50"));
        assert_eq!(parse_amount("1.234.567"), dec("1234567"));
    }

    #[test]
    fn test_parse_amount_fails_closed() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("nan"), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("1,234.56"), None);
        assert_eq!(parse_amount("12.34.5"), None);
        assert_eq!(parse_amount("1,2,3"), None);
        assert_eq!(parse_amount("--5"), None);
    }

    #[test]
    fn test_normalize_row_flags_problems() {
        let row = normalize_row(RawRow {
            date: "not a date".into(),
            description: "  PIX RECEBIDO  ".into(),
            doc: "nan".into(),
            amount: "1,234.56".into(),
            balance: Some("".into()),
            ..Default::default()
        });
        assert_eq!(row.date, None);
        assert_eq!(row.amount, Decimal::ZERO);
        assert_eq!(row.description, "PIX RECEBIDO");
        assert_eq!(row.doc, "");
        assert_eq!(row.balance, None);
        assert_eq!(row.flag_reason().as_deref(), Some("invalid date; amount needs review"));
    }

    #[test]
    fn test_normalize_row_clean() {
        let row = normalize_row(RawRow {
            date: "2024-03-01".into(),
            description: "Tarifa".into(),
            doc: "123".into(),
            amount: "-2,50".into(),
            balance: Some("97,50".into()),
            ..Default::default()
        });
        assert_eq!(row.amount, Decimal::new(-250, 2));
        assert_eq!(row.balance, Some(Decimal::new(9750, 2)));
        assert!(row.flag_reason().is_none());
    }
}
