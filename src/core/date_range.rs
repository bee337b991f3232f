use crate::domain::model::{CalendarDate, MonthSpan, ValidationVerdict};

pub const DEFAULT_MIN_MONTHS: f64 = 1.0;

pub const MIN_SPAN_MESSAGE: &str = "Must be at least 1 month between Start and End Training dates";

/// Day difference over a flat 30-day month, plus whole months and years.
pub fn span_between(earlier: &CalendarDate, later: &CalendarDate) -> MonthSpan {
    let day_diff = later.day() as f64 - earlier.day() as f64;
    let month_diff = later.month() as f64 - earlier.month() as f64;
    let year_diff = (later.year() - earlier.year()) as f64;
    MonthSpan::new(day_diff / 30.0 + month_diff + 12.0 * year_diff)
}

/// Months from `earlier` to `later`. Unparsable input yields a non-numeric span.
pub fn months_between(earlier: &str, later: &str) -> MonthSpan {
    match (earlier.parse::<CalendarDate>(), later.parse::<CalendarDate>()) {
        (Ok(earlier), Ok(later)) => span_between(&earlier, &later),
        _ => MonthSpan::invalid(),
    }
}

/// End date minus start date must reach `min_months`. Never fails; bad input is just `Invalid`.
pub fn validate_minimum_span(start: &str, end: &str, min_months: f64) -> ValidationVerdict {
    let span = months_between(start, end);
    tracing::debug!("Month span between {:?} and {:?}: {}", start, end, span);

    if span.meets(min_months) {
        ValidationVerdict::Valid
    } else {
        ValidationVerdict::Invalid {
            reason: MIN_SPAN_MESSAGE.to_string(),
        }
    }
}
