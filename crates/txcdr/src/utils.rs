use crate::types::DeathReportRecord;

use chrono::{NaiveDateTime, Offset, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

/// Format of the timestamps shown in the listing, e.g. `01/02/2023 11:30 PM`.
pub const SOURCE_DATETIME_FORMAT: &str = "%m/%d/%Y %I:%M %p";

/// Counties that keep Mountain time. Everything else in Texas is Central.
pub static MOUNTAIN_TIME_COUNTIES: &[&str] = &["EL PASO", "HUDSPETH"];

/// Collapses whitespace runs and trims; a lone `-` placeholder becomes empty.
pub fn clean_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed == "-" {
        String::new()
    } else {
        collapsed
    }
}

pub fn timezone_for_county(county: &str) -> Tz {
    let county = county.to_uppercase();
    if MOUNTAIN_TIME_COUNTIES.contains(&county.as_str()) {
        chrono_tz::US::Mountain
    } else {
        chrono_tz::US::Central
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedTimestamp {
    /// Local calendar date, ISO formatted.
    pub local_date: String,
    /// UTC instant at minute precision without an offset suffix.
    pub utc: String,
}

/// Interprets `text` as a local timestamp in `tz` and converts it to UTC.
/// Returns `None` when the text is not in [`SOURCE_DATETIME_FORMAT`].
pub fn convert_local_timestamp(text: &str, tz: Tz) -> Option<ConvertedTimestamp> {
    let naive = NaiveDateTime::parse_from_str(text, SOURCE_DATETIME_FORMAT).ok()?;
    let utc = localize_to_utc(naive, tz);

    Some(ConvertedTimestamp {
        local_date: naive.date().format("%Y-%m-%d").to_string(),
        utc: utc.format("%Y-%m-%dT%H:%M").to_string(),
    })
}

fn localize_to_utc(naive: NaiveDateTime, tz: Tz) -> chrono::DateTime<Utc> {
    if let Some(local) = tz.from_local_datetime(&naive).earliest() {
        return local.with_timezone(&Utc);
    }

    // Inside a spring-forward gap: use the offset in force before the jump.
    let before_gap = tz
        .from_local_datetime(&(naive - TimeDelta::hours(3)))
        .earliest()
        .map(|dt| dt.offset().fix().local_minus_utc())
        .unwrap_or_default();
    Utc.from_utc_datetime(&(naive - TimeDelta::seconds(i64::from(before_gap))))
}

/// Sorts by `(death_datetime_utc, name)` comparing the raw strings, so
/// fallback text that is not a timestamp sorts lexically among the rest.
pub fn sort_records(records: &mut [DeathReportRecord]) {
    records.sort_by(|a, b| {
        (a.death_datetime_utc.as_str(), a.name.as_str())
            .cmp(&(b.death_datetime_utc.as_str(), b.name.as_str()))
    });
}
