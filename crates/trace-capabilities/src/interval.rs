//! "In effect" queries over time-framed records.
//!
//! Two predicates with deliberately different end bounds:
//!
//! - *in effect now* (and *as of* a pinned clock) treats the end as
//!   inclusive: `start <= now && (end is None || end >= now)`.
//! - *in effect at* an instant treats the end as exclusive:
//!   `start <= t && (end is None || end > t)`.
//!
//! A record exactly at its end instant is therefore in effect "now" but not
//! "at" that instant. Records without a window are never in effect.

use chrono::{DateTime, Utc};

use trace_core::filter::RecordFilter;
use trace_core::owner::OwnerType;
use trace_core::record::Record;
use trace_core::window::WindowPredicate;
use trace_storage::EntityStore;

use crate::error::Result;

/// True when the window has started and its end, if any, is at or after now.
pub fn is_in_effect_now(record: &Record) -> bool {
    record.is_in_effect_now()
}

/// [`is_in_effect_now`] against an injected clock value.
pub fn is_in_effect_as_of(record: &Record, now: DateTime<Utc>) -> bool {
    record.is_in_effect_as_of(now)
}

/// True when the window has started by `instant` and ends strictly after it.
pub fn is_in_effect_at(record: &Record, instant: DateTime<Utc>) -> bool {
    record.is_in_effect_at(instant)
}

/// Records of `owner_type` currently in effect.
pub fn query_in_effect_now<S: EntityStore + ?Sized>(
    store: &S,
    owner_type: &OwnerType,
) -> Result<Vec<Record>> {
    query_in_effect_as_of(store, owner_type, Utc::now())
}

pub fn query_in_effect_as_of<S: EntityStore + ?Sized>(
    store: &S,
    owner_type: &OwnerType,
    now: DateTime<Utc>,
) -> Result<Vec<Record>> {
    query_with(store, owner_type, WindowPredicate::as_of(now))
}

/// Records of `owner_type` in effect at `instant` (end exclusive).
pub fn query_in_effect_at<S: EntityStore + ?Sized>(
    store: &S,
    owner_type: &OwnerType,
    instant: DateTime<Utc>,
) -> Result<Vec<Record>> {
    query_with(store, owner_type, WindowPredicate::at(instant))
}

fn query_with<S: EntityStore + ?Sized>(
    store: &S,
    owner_type: &OwnerType,
    predicate: WindowPredicate,
) -> Result<Vec<Record>> {
    let filter = RecordFilter::for_owner(owner_type).window(predicate);
    Ok(store.query_records(&filter)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use trace_core::record::RecordBuilder;
    use trace_core::window::TimeWindow;
    use trace_storage::SqliteStore;

    const CONTRACT: &str = "billing.contract";

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn contract() -> Record {
        let window = TimeWindow::new(ts(2020, 1, 1), Some(ts(2020, 6, 1))).unwrap();
        RecordBuilder::new(CONTRACT, "C-1").id("c-1").window(window).build()
    }

    #[test]
    fn end_instant_is_inclusive_for_now_and_exclusive_for_at() {
        let record = contract();
        assert!(is_in_effect_as_of(&record, ts(2020, 6, 1)));
        assert!(!is_in_effect_at(&record, ts(2020, 6, 1)));
        assert!(is_in_effect_at(&record, ts(2020, 3, 15)));
        assert!(!is_in_effect_at(&record, ts(2019, 12, 31)));
    }

    #[test]
    fn open_ended_window_in_effect_now() {
        let window = TimeWindow::open_ended(Utc::now() - Duration::days(1));
        let record = RecordBuilder::new(CONTRACT, "Open").window(window).build();
        assert!(is_in_effect_now(&record));
    }

    #[test]
    fn windowless_record_is_never_in_effect() {
        let record = RecordBuilder::new(CONTRACT, "None").build();
        assert!(!is_in_effect_now(&record));
        assert!(!is_in_effect_at(&record, ts(2020, 3, 1)));
    }

    #[test]
    fn bulk_queries_push_the_predicate_down() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_record_impl(&contract()).unwrap();
        let other = RecordBuilder::new("billing.offer", "O")
            .window(TimeWindow::open_ended(ts(2000, 1, 1)))
            .build();
        store.insert_record_impl(&other).unwrap();

        let owner = OwnerType::from(CONTRACT);
        let as_of = query_in_effect_as_of(&store, &owner, ts(2020, 6, 1)).unwrap();
        assert_eq!(as_of.len(), 1);
        assert_eq!(as_of[0].id, "c-1");

        assert!(query_in_effect_at(&store, &owner, ts(2020, 6, 1)).unwrap().is_empty());
        assert!(query_in_effect_now(&store, &owner).unwrap().is_empty());
    }
}
