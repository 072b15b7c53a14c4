use chrono::{Datelike, Days, NaiveDate};

const MONTH_NAMES_ES: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Returns the lower-case Spanish name of a 1-based month, or "" when out of range.
pub fn spanish_month_name(month: u32) -> &'static str {
    match month {
        1..=12 => MONTH_NAMES_ES[(month - 1) as usize],
        _ => "",
    }
}

pub fn iso_week(date: NaiveDate) -> u32 {
    date.iso_week().week()
}

/// Rounds to two decimals, ties to even (the behaviour of the reports this feeds).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Trims, collapses inner whitespace and upper-cases a header or category label.
pub fn normalize_label(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Parses a day-first date as found in both feeds.
///
/// Accepts `dd/mm/YYYY`, ISO `YYYY-MM-DD`, and either of those followed by a
/// time component (spreadsheet exports often append `00:00:00`).
pub fn parse_day_first_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let date_part = trimmed
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or(trimmed);

    NaiveDate::parse_from_str(date_part, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%Y-%m-%d"))
        .ok()
}

/// Converts a spreadsheet serial date (1900 date system) to a calendar date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_days(Days::new(serial.floor() as u64))
}

/// Parses a Monitor spend cell: `,` is a thousands separator.
///
/// Returns `Some(0.0)` for an empty cell and `None` when the text is not numeric.
pub fn parse_spend(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Some(0.0);
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses a number written with either locale convention.
///
/// The rightmost of `,` and `.` is the decimal separator when both appear. A
/// lone comma is decimal; repeated commas or dots group thousands. A single
/// dot groups thousands only in the `12.000` shape (a 1-3 digit leading group
/// not starting with `0`, then exactly three digits).
/// `1.234,56` → 1234.56, `1,234.56` → 1234.56, `0.125` → 0.125, `300` → 300.
pub fn parse_localized_number(raw: &str) -> Option<f64> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let commas = compact.matches(',').count();
    let dots = compact.matches('.').count();
    let (thousands, decimal) = match (compact.rfind(','), compact.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => ('.', ','),
        (Some(_), Some(_)) => (',', '.'),
        (Some(_), None) if commas > 1 => (',', '.'),
        (Some(_), None) => ('.', ','),
        (None, Some(_)) if dots > 1 || is_grouped_thousands(&compact) => ('.', ','),
        _ => (',', '.'),
    };

    let cleaned: String = compact
        .chars()
        .filter(|&c| c != thousands)
        .map(|c| if c == decimal { '.' } else { c })
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn is_grouped_thousands(compact: &str) -> bool {
    let unsigned = compact.trim_start_matches(|c| c == '-' || c == '+');
    let Some((lead, rest)) = unsigned.split_once('.') else {
        return false;
    };
    let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    (1..=3).contains(&lead.len())
        && !lead.starts_with('0')
        && all_digits(lead)
        && rest.len() == 3
        && all_digits(rest)
}

pub fn format_day_first(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Joins the first `limit` items with ", ", appending "..." when truncated.
pub fn join_truncated(items: &[String], limit: usize) -> String {
    let mut joined = items
        .iter()
        .take(limit)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if items.len() > limit {
        joined.push_str("...");
    }
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spanish_month_name() {
        assert_eq!(spanish_month_name(1), "enero");
        assert_eq!(spanish_month_name(9), "septiembre");
        assert_eq!(spanish_month_name(12), "diciembre");
        assert_eq!(spanish_month_name(13), "");
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(255.0), 255.0);
        assert_eq!(round2(26.666666), 26.67);
        assert_eq!(round2(0.0), 0.0);
        assert_eq!(round2(-1.004), -1.0);
    }

    #[test]
    fn test_parse_day_first_date() {
        let expected = NaiveDate::from_ymd_opt(2023, 3, 9).unwrap();
        assert_eq!(parse_day_first_date("09/03/2023"), Some(expected));
        assert_eq!(parse_day_first_date(" 2023-03-09 "), Some(expected));
        assert_eq!(parse_day_first_date("2023-03-09 00:00:00"), Some(expected));
        assert_eq!(parse_day_first_date("09/03/2023 00:00"), Some(expected));
        assert_eq!(parse_day_first_date("31/02/2023"), None);
        assert_eq!(parse_day_first_date(""), None);
    }

    #[test]
    fn test_excel_serial_to_date() {
        assert_eq!(
            excel_serial_to_date(44994.0),
            NaiveDate::from_ymd_opt(2023, 3, 9)
        );
        assert_eq!(
            excel_serial_to_date(44994.75),
            NaiveDate::from_ymd_opt(2023, 3, 9)
        );
        assert_eq!(excel_serial_to_date(0.0), None);
    }

    #[test]
    fn test_parse_spend() {
        assert_eq!(parse_spend("1,234.50"), Some(1234.5));
        assert_eq!(parse_spend(""), Some(0.0));
        assert_eq!(parse_spend("n/a"), None);
    }

    #[test]
    fn test_parse_localized_number() {
        assert_eq!(parse_localized_number("1.234,56"), Some(1234.56));
        assert_eq!(parse_localized_number("12.000"), Some(12000.0));
        assert_eq!(parse_localized_number("1.234.567"), Some(1234567.0));
        assert_eq!(parse_localized_number("300"), Some(300.0));
        assert_eq!(parse_localized_number("1234.5"), Some(1234.5));
        assert_eq!(parse_localized_number("-12,5"), Some(-12.5));
        assert_eq!(parse_localized_number("0.125"), Some(0.125));
        assert_eq!(parse_localized_number("1,234.56"), Some(1234.56));
        assert_eq!(parse_localized_number("1,234,567"), Some(1234567.0));
        assert_eq!(parse_localized_number("-1.500"), Some(-1500.0));
        assert_eq!(parse_localized_number("1234.567"), Some(1234.567));
        assert_eq!(parse_localized_number("abc"), None);
        assert_eq!(parse_localized_number(""), None);
    }

    #[test]
    fn test_join_truncated() {
        let items: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        assert_eq!(join_truncated(&items, 3), "A, B, C...");
        assert_eq!(join_truncated(&items, 5), "A, B, C, D");
    }
}
