//! Scheduled-delivery date calculator
//!
//! Pure calendar arithmetic: an order placed at a given moment commits to
//! a delivery date derived from the company's local weekday and hour and
//! from whether the destination is in-town. The offsets encode the
//! warehouse cutoff policy and are covered case-by-case in the tests.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc, Weekday};

use commerce_client::types::Address;
use shared::text;

use crate::context::CompanyProfile;

/// Local hour at and after which an order counts as placed after cutoff
const CUTOFF_HOUR: u32 = 17;

/// Commitment date for an order: localized to the company timezone,
/// offset per the cutoff policy, normalized to local noon, returned in
/// UTC.
pub fn compute_scheduled_date(
    order_time: DateTime<Utc>,
    profile: &CompanyProfile,
    destination: &Address,
) -> DateTime<Utc> {
    let local = order_time.with_timezone(&profile.timezone);

    let place = format!("{}, {}", destination.city, destination.province_code());
    let in_town = text::contains_ignore_accents(&place, &profile.in_town_places);

    let after_cutoff = local.hour() >= CUTOFF_HOUR;
    let weekday = local.weekday();
    let days_until_monday = 8 - i64::from(weekday.number_from_monday());

    let mut add_days = 0;
    if (after_cutoff && weekday == Weekday::Fri)
        || matches!(weekday, Weekday::Sat | Weekday::Sun)
    {
        // Weekend (or Friday after cutoff) ships Monday, Tuesday in-town.
        add_days = days_until_monday;
        if in_town {
            add_days += 1;
        }
    } else if after_cutoff && matches!(weekday, Weekday::Mon | Weekday::Tue | Weekday::Wed) {
        add_days = if in_town { 2 } else { 1 };
    } else if after_cutoff && weekday == Weekday::Thu {
        // Thursday evening in-town fast-forwards past the weekend.
        add_days = if in_town { days_until_monday } else { 1 };
    } else if in_town
        && !after_cutoff
        && matches!(weekday, Weekday::Mon | Weekday::Tue | Weekday::Wed | Weekday::Thu)
    {
        add_days = 1;
    } else if in_town && !after_cutoff && weekday == Weekday::Fri {
        add_days = days_until_monday;
    }

    let scheduled = local + Duration::days(add_days);
    profile
        .timezone
        .with_ymd_and_hms(scheduled.year(), scheduled.month(), scheduled.day(), 12, 0, 0)
        .latest()
        .map(|noon| noon.with_timezone(&Utc))
        // DST gap fallback: read the wall-clock noon as UTC
        .unwrap_or_else(|| {
            Utc.with_ymd_and_hms(scheduled.year(), scheduled.month(), scheduled.day(), 12, 0, 0)
                .single()
                .unwrap_or(order_time)
        })
}
