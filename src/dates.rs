// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! Calendar-date parsing shared by the check-in forms and the statistics
//! filter parameters. The mobile forms use `MM/DD/YY`; the admin dashboard
//! sends ISO `YYYY-MM-DD`. All comparisons elsewhere happen on plain
//! `NaiveDate` values, which is what normalizes the "local midnight"
//! convention: the time component never survives parsing.

use chrono::NaiveDate;

use crate::error::PlatformError;

const MMDDYY: &str = "%m/%d/%y";
const ISO: &str = "%Y-%m-%d";

/// Parse a strict `MM/DD/YY` date. Impossible calendar dates (Feb 30,
/// month 13) are rejected.
pub fn parse_mmddyy(input: &str) -> Result<NaiveDate, PlatformError> {
    NaiveDate::parse_from_str(input.trim(), MMDDYY)
        .map_err(|_| PlatformError::validation(format!("invalid MM/DD/YY date: {input:?}")))
}

/// Format a date back to the `MM/DD/YY` form the mobile forms display.
pub fn format_mmddyy(date: NaiveDate) -> String {
    date.format(MMDDYY).to_string()
}

/// Parse a filter/form date accepting either ISO `YYYY-MM-DD` or `MM/DD/YY`.
pub fn parse_flexible(input: &str) -> Result<NaiveDate, PlatformError> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, ISO)
        .or_else(|_| NaiveDate::parse_from_str(trimmed, MMDDYY))
        .map_err(|_| PlatformError::validation(format!("invalid date: {input:?}")))
}

/// Whole years between `born` and `today`, decremented when the birthday has
/// not yet happened this year. `None` when the subject would not be born yet.
pub fn age_on(born: NaiveDate, today: NaiveDate) -> Option<i32> {
    use chrono::Datelike;

    let mut age = today.year() - born.year();
    if (today.month(), today.day()) < (born.month(), born.day()) {
        age -= 1;
    }
    (age >= 0).then_some(age)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mmddyy_round_trips_to_same_calendar_date() {
        for input in ["01/01/25", "02/29/24", "12/31/99", "07/04/76", "2/5/03"] {
            let parsed = parse_mmddyy(input).unwrap();
            let reparsed = parse_mmddyy(&format_mmddyy(parsed)).unwrap();
            assert_eq!(parsed, reparsed, "round-trip drifted for {input}");
        }
    }

    #[test]
    fn impossible_dates_are_rejected() {
        assert!(parse_mmddyy("02/30/25").is_err());
        assert!(parse_mmddyy("13/01/25").is_err());
        assert!(parse_mmddyy("02/29/23").is_err());
        assert!(parse_mmddyy("00/10/25").is_err());
        assert!(parse_mmddyy("not a date").is_err());
        assert!(parse_mmddyy("").is_err());
    }

    #[test]
    fn flexible_accepts_iso_and_mmddyy() {
        let iso = parse_flexible("2025-03-15").unwrap();
        let us = parse_flexible("03/15/25").unwrap();
        assert_eq!(iso, us);
        assert!(parse_flexible("2025-02-30").is_err());
    }

    #[test]
    fn age_adjusts_for_birthday_not_yet_reached() {
        let born = NaiveDate::from_ymd_opt(1990, 6, 15).unwrap();
        let before = NaiveDate::from_ymd_opt(2025, 6, 14).unwrap();
        let on = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let after = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
        assert_eq!(age_on(born, before), Some(34));
        assert_eq!(age_on(born, on), Some(35));
        assert_eq!(age_on(born, after), Some(35));
    }

    #[test]
    fn age_is_none_before_birth() {
        let born = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(age_on(born, today), None);
    }
}
