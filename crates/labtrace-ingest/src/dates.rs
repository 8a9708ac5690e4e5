//! Parses the free-form test-date text a vision provider returns into a
//! `NaiveDate`, or `None` when the input is genuinely ambiguous.
//!
//! Open question (spec §9a, left undecided upstream): what to do about
//! ambiguous dates in the long run — ask the user, accept a locale hint —
//! is unresolved. This module's answer is the narrow one the testable
//! properties pin down: return `None` and let the caller keep the raw
//! free-form string rather than guess.

use chrono::NaiveDate;

/// Two-digit year pivot: `>= 50` maps to the 1900s, `< 50` to the 2000s.
const TWO_DIGIT_PIVOT: u32 = 50;

pub fn parse_test_date(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(d);
    }

    parse_separated(trimmed)
}

fn parse_separated(s: &str) -> Option<NaiveDate> {
    let sep = if s.contains('/') {
        '/'
    } else if s.contains('-') {
        '-'
    } else if s.contains('.') {
        '.'
    } else {
        return None;
    };

    let parts: Vec<&str> = s.split(sep).collect();
    if parts.len() != 3 {
        return None;
    }

    let a: u32 = parts[0].parse().ok()?;
    let b: u32 = parts[1].parse().ok()?;
    let year = parse_year(parts[2])?;

    // a/b are day/month in some order. If exactly one of them is > 12 it
    // unambiguously identifies the day; if both are <= 12 the input is
    // ambiguous and we refuse to guess. If both are > 12 there is no valid
    // reading at all.
    let (day, month) = match (a > 12, b > 12) {
        (true, false) => (a, b),
        (false, true) => (b, a),
        (false, false) => return None,
        (true, true) => return None,
    };

    NaiveDate::from_ymd_opt(year as i32, month, day)
}

fn parse_year(s: &str) -> Option<u32> {
    let y: u32 = s.parse().ok()?;
    if s.len() == 4 {
        Some(y)
    } else if s.len() <= 2 {
        if y >= TWO_DIGIT_PIVOT {
            Some(1900 + y)
        } else {
            Some(2000 + y)
        }
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso_format() {
        assert_eq!(parse_test_date("2021-06-15"), NaiveDate::from_ymd_opt(2021, 6, 15));
    }

    #[test]
    fn parses_unambiguous_european_day_over_12() {
        assert_eq!(parse_test_date("25/03/2020"), NaiveDate::from_ymd_opt(2020, 3, 25));
    }

    #[test]
    fn rejects_ambiguous_day_and_month_both_le_12() {
        assert_eq!(parse_test_date("03/03/2017"), None);
        assert_eq!(parse_test_date("05/07/2018"), None);
    }

    #[test]
    fn two_digit_year_pivot() {
        assert_eq!(
            parse_test_date("25/03/50"),
            NaiveDate::from_ymd_opt(1950, 3, 25)
        );
        assert_eq!(
            parse_test_date("25/03/49"),
            NaiveDate::from_ymd_opt(2049, 3, 25)
        );
    }

    #[test]
    fn feb_29_only_in_leap_years() {
        assert_eq!(parse_test_date("2020-02-29"), NaiveDate::from_ymd_opt(2020, 2, 29));
        assert_eq!(parse_test_date("2019-02-29"), None);
    }

    #[test]
    fn rejects_impossible_day_and_month_both_over_12() {
        assert_eq!(parse_test_date("13/14/2020"), None);
    }

    #[test]
    fn empty_input_returns_none() {
        assert_eq!(parse_test_date(""), None);
        assert_eq!(parse_test_date("   "), None);
    }
}
