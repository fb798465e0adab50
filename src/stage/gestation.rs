// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! Gestational-age arithmetic for the pregnancy timeline.
//!
//! Clinically the clock starts two weeks before conception, so an embryo
//! transferred on day N is already `14 + N` gestational days old on the day
//! of transfer. Everything else is plain date arithmetic off the stored
//! transfer date.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Full-term pregnancy length in gestational days (40 weeks).
pub const FULL_TERM_DAYS: i64 = 280;

/// Gestational days at which the surrogate "graduates" from the fertility
/// clinic to a regular OB (10 weeks).
pub const GRADUATION_DAYS: i64 = 70;

/// Age of the embryo at transfer. Day-5 blastocysts are the default; day-3
/// transfers still happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbryoDay {
    Three,
    Five,
}

impl EmbryoDay {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            3 => Some(Self::Three),
            5 => Some(Self::Five),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            Self::Three => 3,
            Self::Five => 5,
        }
    }

    /// Gestational days already elapsed on the day of transfer.
    pub fn offset_days(&self) -> i64 {
        14 + self.as_i32() as i64
    }
}

impl Default for EmbryoDay {
    fn default() -> Self {
        Self::Five
    }
}

/// A gestational age expressed the way clinicians write it: `W6D3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestationalAge {
    pub weeks: i64,
    pub days: i64,
    pub total_days: i64,
}

impl GestationalAge {
    pub fn display(&self) -> String {
        format!("{}w{}d", self.weeks, self.days)
    }
}

/// Signed gestational days on `on`. Negative before the transfer date ever
/// minus the offset, which only happens with bad data.
pub fn gestational_days(transfer: NaiveDate, embryo: EmbryoDay, on: NaiveDate) -> i64 {
    (on - transfer).num_days() + embryo.offset_days()
}

/// Gestational age on `on`, clamped at zero for display.
pub fn gestational_age(transfer: NaiveDate, embryo: EmbryoDay, on: NaiveDate) -> GestationalAge {
    let total = gestational_days(transfer, embryo, on).max(0);
    GestationalAge {
        weeks: total / 7,
        days: total % 7,
        total_days: total,
    }
}

/// Estimated due date: the day gestational days reach [`FULL_TERM_DAYS`].
pub fn due_date(transfer: NaiveDate, embryo: EmbryoDay) -> NaiveDate {
    transfer + Duration::days(FULL_TERM_DAYS - embryo.offset_days())
}

/// True once the pregnancy has reached the graduation threshold.
pub fn has_graduated(transfer: NaiveDate, embryo: EmbryoDay, on: NaiveDate) -> bool {
    gestational_days(transfer, embryo, on) >= GRADUATION_DAYS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn day5_offset_is_nineteen() {
        assert_eq!(EmbryoDay::Five.offset_days(), 19);
        assert_eq!(EmbryoDay::Three.offset_days(), 17);
    }

    #[test]
    fn due_date_is_transfer_plus_term_minus_offset() {
        // 2025-01-01 day-5 transfer: due 261 days later.
        let due = due_date(d(2025, 1, 1), EmbryoDay::Five);
        assert_eq!(due, d(2025, 1, 1) + Duration::days(261));
        assert_eq!(due, d(2025, 9, 19));
    }

    #[test]
    fn gestational_days_on_transfer_day_equal_offset() {
        let transfer = d(2025, 3, 10);
        assert_eq!(gestational_days(transfer, EmbryoDay::Five, transfer), 19);
        assert_eq!(gestational_days(transfer, EmbryoDay::Three, transfer), 17);
    }

    #[test]
    fn gestational_days_are_monotonic_in_date() {
        let transfer = d(2025, 1, 1);
        let mut previous = i64::MIN;
        for offset in 0..400 {
            let on = transfer + Duration::days(offset);
            let days = gestational_days(transfer, EmbryoDay::Five, on);
            assert!(days >= previous);
            previous = days;
        }
    }

    #[test]
    fn age_splits_into_weeks_and_days() {
        let transfer = d(2025, 1, 1);
        // 30 days after a day-5 transfer: 49 gestational days = 7w0d.
        let age = gestational_age(transfer, EmbryoDay::Five, transfer + Duration::days(30));
        assert_eq!(age.weeks, 7);
        assert_eq!(age.days, 0);
        assert_eq!(age.display(), "7w0d");
    }

    #[test]
    fn age_clamps_before_transfer() {
        let transfer = d(2025, 1, 1);
        let age = gestational_age(transfer, EmbryoDay::Five, d(2024, 11, 1));
        assert_eq!(age.total_days, 0);
    }

    #[test]
    fn graduation_fires_at_seventy_days() {
        let transfer = d(2025, 1, 1);
        // Day-5 transfer reaches 70 gestational days 51 days in.
        assert!(!has_graduated(transfer, EmbryoDay::Five, transfer + Duration::days(50)));
        assert!(has_graduated(transfer, EmbryoDay::Five, transfer + Duration::days(51)));
        assert!(has_graduated(transfer, EmbryoDay::Five, transfer + Duration::days(200)));
    }

    #[test]
    fn embryo_day_parses_known_values_only() {
        assert_eq!(EmbryoDay::from_i32(3), Some(EmbryoDay::Three));
        assert_eq!(EmbryoDay::from_i32(5), Some(EmbryoDay::Five));
        assert_eq!(EmbryoDay::from_i32(4), None);
    }
}
