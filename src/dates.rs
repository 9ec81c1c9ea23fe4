use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";
pub const DATE_KEY_LEN: usize = 10;

/// Calendar day of `now` in the reference time zone.
pub fn today_in(now: DateTime<Utc>, timezone: Tz) -> NaiveDate {
    now.with_timezone(&timezone).date_naive()
}

/// Date keys from `today` back to `floor` inclusive, most recent first.
/// `max_days` caps the number of columns; without it the floor is always the last key.
pub fn date_range(today: NaiveDate, floor: NaiveDate, max_days: Option<usize>) -> Vec<String> {
    let mut dates = Vec::new();
    let mut day = today;

    while day >= floor {
        if max_days.is_some_and(|max| dates.len() >= max) {
            break;
        }
        dates.push(day.format(DATE_KEY_FORMAT).to_string());
        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }

    dates
}
