//! Excel serial date conversion.
//!
//! Serial 1.0 is 1899-12-31; whole days count from the 1899-12-30 epoch so
//! that modern dates agree with Excel despite its 1900 leap-year bug.

use chrono::{DateTime, NaiveDateTime};

/// Days between the Excel epoch (1899-12-30) and the Unix epoch.
const EXCEL_EPOCH_OFFSET: i64 = 25_569;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Convert an Excel serial date to a timestamp.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let days = serial.floor();
    let seconds = ((serial - days) * SECONDS_PER_DAY).round() as i64;
    let unix_seconds = (days as i64)
        .checked_sub(EXCEL_EPOCH_OFFSET)?
        .checked_mul(86_400)?
        .checked_add(seconds)?;
    DateTime::from_timestamp(unix_seconds, 0).map(|dt| dt.naive_utc())
}

/// Convert a timestamp to an Excel serial date.
pub fn datetime_to_serial(dt: NaiveDateTime) -> f64 {
    let unix_seconds = dt.and_utc().timestamp();
    unix_seconds as f64 / SECONDS_PER_DAY + EXCEL_EPOCH_OFFSET as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_known_serials() {
        let jan_1_2022 = NaiveDate::from_ymd_opt(2022, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(datetime_to_serial(jan_1_2022), 44562.0);
        assert_eq!(serial_to_datetime(44562.0), Some(jan_1_2022));
    }

    #[test]
    fn test_fractional_day() {
        let dt = serial_to_datetime(44562.5).unwrap();
        assert_eq!(dt.format("%H:%M").to_string(), "12:00");
        assert!((datetime_to_serial(dt) - 44562.5).abs() < 1e-9);
        assert!(serial_to_datetime(f64::NAN).is_none());
    }
}
