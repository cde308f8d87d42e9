//! Calendar arithmetic on virtual time values.
//!
//! A [`TimeValue`] is a count of seconds read as a civil date and time in
//! UTC. Whatever zone the host clock lives in is folded into the value
//! before it gets here, so decomposition is the same on every host.

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

use crate::utils::{decode, encode};

pub type TimeValue = i64;

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// PM indicator in the 12h hour encoding used by [`Field::HourAmPm`].
pub const AM_PM_FLAG: u8 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Second,
    Minute,
    Hour,
    /// 12h hour (1-12) with [`AM_PM_FLAG`] set in the afternoon.
    HourAmPm,
    DayOfMonth,
    Month,
    /// Year within the century.
    Year,
    /// Days since Sunday. Never BCD.
    Weekday,
}

fn civil(t: TimeValue) -> NaiveDateTime {
    Utc.timestamp_opt(t, 0)
        .single()
        .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC)
        .naive_utc()
}

fn timestamp(dt: &NaiveDateTime) -> TimeValue {
    Utc.from_utc_datetime(dt).timestamp()
}

pub fn get(field: Field, t: TimeValue, bcd: bool) -> u8 {
    let dt = civil(t);
    match field {
        Field::Second => encode(dt.second() as u8, bcd),
        Field::Minute => encode(dt.minute() as u8, bcd),
        Field::Hour => encode(dt.hour() as u8, bcd),
        Field::HourAmPm => {
            let hour = dt.hour() as u8;
            let pm = if hour >= 12 { AM_PM_FLAG } else { 0 };
            let hour = match hour % 12 {
                0 => 12,
                h => h,
            };
            encode(hour, bcd) | pm
        }
        Field::DayOfMonth => encode(dt.day() as u8, bcd),
        Field::Month => encode(dt.month() as u8, bcd),
        Field::Year => encode(dt.year().rem_euclid(100) as u8, bcd),
        Field::Weekday => dt.weekday().num_days_from_sunday() as u8,
    }
}

/// Returns `t` with one field replaced by `value`.
///
/// Out-of-range values roll over into the neighbouring fields instead of
/// being rejected: day 31 of a 30-day month is the 1st of the next one,
/// month 13 is January of the following year. Time values outside
/// chrono's range saturate.
pub fn set(field: Field, value: i32, t: TimeValue, bcd: bool) -> TimeValue {
    let dt = civil(t);
    let raw = || i64::from(decode(value as u8, bcd));
    match field {
        Field::Second => t.saturating_add(raw() - i64::from(dt.second())),
        Field::Minute => t.saturating_add((raw() - i64::from(dt.minute())) * MINUTE),
        Field::Hour => t.saturating_add((raw() - i64::from(dt.hour())) * HOUR),
        Field::HourAmPm => {
            let val = value as u8;
            let hour = i64::from(decode(val & 0x1f, bcd) % 12);
            let hour = if val & AM_PM_FLAG != 0 { hour + 12 } else { hour };
            t.saturating_add((hour - i64::from(dt.hour())) * HOUR)
        }
        Field::DayOfMonth => t.saturating_add((raw() - i64::from(dt.day())) * DAY),
        Field::Weekday => t.saturating_add(
            (i64::from(value) - i64::from(dt.weekday().num_days_from_sunday())) * DAY,
        ),
        Field::Month => rebuild(&dt, i64::from(dt.year()), raw() - 1).unwrap_or(t),
        Field::Year => {
            let year = i64::from(dt.year());
            let century = year - year.rem_euclid(100);
            rebuild(&dt, century + raw(), i64::from(dt.month0())).unwrap_or(t)
        }
    }
}

/// Moves `dt` to another year and zero-based month, keeping the day count
/// and time of day.
fn rebuild(dt: &NaiveDateTime, year: i64, month0: i64) -> Option<TimeValue> {
    let year = year + month0.div_euclid(12);
    let month = month0.rem_euclid(12) as u32 + 1;
    let first = NaiveDate::from_ymd_opt(year as i32, month, 1)?.and_time(dt.time());
    Some(timestamp(&first) + (i64::from(dt.day()) - 1) * DAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Sunday 2021-03-14 15:09:26 UTC
    const PI_DAY: TimeValue = 1_615_734_566;

    #[test]
    fn reads_fields() {
        assert_eq!(get(Field::Second, PI_DAY, true), 0x26);
        assert_eq!(get(Field::Minute, PI_DAY, false), 9);
        assert_eq!(get(Field::Hour, PI_DAY, true), 0x15);
        assert_eq!(get(Field::DayOfMonth, PI_DAY, true), 0x14);
        assert_eq!(get(Field::Month, PI_DAY, true), 0x03);
        assert_eq!(get(Field::Year, PI_DAY, true), 0x21);
        assert_eq!(get(Field::Weekday, PI_DAY, true), 0);
    }

    #[test]
    fn twelve_hour_clock() {
        assert_eq!(get(Field::HourAmPm, PI_DAY, true), AM_PM_FLAG | 0x03);
        let midnight = PI_DAY - 15 * HOUR;
        assert_eq!(get(Field::HourAmPm, midnight, true), 0x12);
        let noon = PI_DAY - 3 * HOUR;
        assert_eq!(get(Field::HourAmPm, noon, true), AM_PM_FLAG | 0x12);
    }

    #[test]
    fn time_of_day_fields_shift_by_their_unit() {
        assert_eq!(set(Field::Second, 0x00, PI_DAY, true), PI_DAY - 26);
        assert_eq!(set(Field::Minute, 10, PI_DAY, false), PI_DAY + MINUTE);
        assert_eq!(set(Field::Hour, 0x03, PI_DAY, true), PI_DAY - 12 * HOUR);
        assert_eq!(set(Field::HourAmPm, 0x23, PI_DAY, true), PI_DAY);
        assert_eq!(set(Field::HourAmPm, 0x12, PI_DAY, true), PI_DAY - 15 * HOUR);
    }

    #[test]
    fn day_and_weekday_shift_by_days() {
        assert_eq!(set(Field::DayOfMonth, 0x15, PI_DAY, true), PI_DAY + DAY);
        assert_eq!(set(Field::Weekday, 3, PI_DAY, true), PI_DAY + 3 * DAY);
        assert_eq!(set(Field::Weekday, -1, PI_DAY, true), PI_DAY - DAY);
    }

    #[test]
    fn month_overflow_rolls_into_next_month() {
        // 2021-01-31 10:00:00 -> "2021-02-31" -> 2021-03-03
        assert_eq!(set(Field::Month, 2, 1_612_087_200, false), 1_614_765_600);
        let next_year = set(Field::Month, 13, PI_DAY, false);
        assert_eq!(get(Field::Year, next_year, false), 22);
        assert_eq!(get(Field::Month, next_year, false), 1);
    }

    #[test]
    fn year_keeps_century() {
        assert_eq!(set(Field::Year, 3, PI_DAY, true), 1_047_654_566);
        assert_eq!(get(Field::Year, 978_307_199, false), 0);
    }
}
