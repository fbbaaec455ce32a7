//! Seasonal soil temperature.

use chrono::{Datelike, NaiveDate, NaiveDateTime};

/// Coefficients of the yearly soil temperature fit, highest power first (°C).
const SOIL_FIT: [f64; 6] = [
    682.432357637794,
    -1583.11270499113,
    1123.72932688659,
    -227.735852646234,
    4.79875094132149,
    3.63636877831834,
];

/// Fraction of the calendar year elapsed at `t`, in `[0, 1)`.
pub fn year_fraction(t: NaiveDateTime) -> f64 {
    let year = t.year();
    let start = NaiveDate::from_ymd_opt(year, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
    let end = NaiveDate::from_ymd_opt(year + 1, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
    match (start, end) {
        (Some(start), Some(end)) => {
            let elapsed = (t - start).num_seconds() as f64;
            let total = (end - start).num_seconds() as f64;
            elapsed / total
        }
        _ => 0.0,
    }
}

/// Undisturbed soil temperature around buried pipes (°C).
pub fn soil_temperature(t: NaiveDateTime) -> f64 {
    let y = year_fraction(t);
    SOIL_FIT.iter().fold(0.0, |acc, c| acc * y + c)
}
