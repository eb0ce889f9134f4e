//! Day buckets for the gallery grid.

use std::collections::BTreeMap;
use std::sync::Arc;

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::models::photos::Photo;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateGroup<'a> {
    /// Local calendar day, `None` for photos whose timestamp could not be read.
    pub day: Option<Date>,
    pub photos: Vec<&'a Photo>,
}

impl DateGroup<'_> {
    /// E.g. "January 1, 2024".
    pub fn label(&self) -> String {
        self.day
            .and_then(|day| {
                day.format(format_description!(
                    "[month repr:long] [day padding:none], [year]"
                ))
                .ok()
            })
            .unwrap_or_else(|| "Unknown date".to_string())
    }
}

/// The zone whose calendar days photos are grouped by.
pub trait DisplayZone: Send + Sync {
    fn offset_at(&self, at: OffsetDateTime) -> UtcOffset;
}

impl DisplayZone for UtcOffset {
    fn offset_at(&self, _at: OffsetDateTime) -> UtcOffset {
        *self
    }
}

/// The system zone, looked up per instant so daylight saving time applies to each
/// photo separately. Falls back to UTC when the zone cannot be determined.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalZone;

impl DisplayZone for LocalZone {
    fn offset_at(&self, at: OffsetDateTime) -> UtcOffset {
        UtcOffset::local_offset_at(at).unwrap_or(UtcOffset::UTC)
    }
}

/// Groups photos by the calendar day they were uploaded on. Holds no state.
#[derive(Clone)]
pub struct DateGroupingPresenter {
    zone: Arc<dyn DisplayZone>,
}

impl DateGroupingPresenter {
    pub fn new(zone: Arc<dyn DisplayZone>) -> Self {
        DateGroupingPresenter { zone }
    }

    pub fn fixed(offset: UtcOffset) -> Self {
        DateGroupingPresenter::new(Arc::new(offset))
    }

    /// Most recent day first; photos keep their input order within a day. Unreadable
    /// timestamps end up in a trailing group.
    pub fn present<'a>(&self, photos: &'a [Photo]) -> Vec<DateGroup<'a>> {
        let mut days: BTreeMap<Option<Date>, Vec<&'a Photo>> = BTreeMap::new();
        for photo in photos {
            let day = parse_upload_date(&photo.upload_date).map(|timestamp| {
                timestamp
                    .to_offset(self.zone.offset_at(timestamp))
                    .date()
            });
            days.entry(day).or_default().push(photo);
        }

        // `None` sorts first, so reversing leaves it last.
        days.into_iter()
            .rev()
            .map(|(day, photos)| DateGroup { day, photos })
            .collect()
    }
}

/// Reads an ISO-8601 upload timestamp. Timestamps without an offset are taken as UTC.
pub fn parse_upload_date(s: &str) -> Option<OffsetDateTime> {
    let s = s.trim();
    if let Ok(timestamp) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(timestamp);
    }

    let with_fraction =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
    let without_fraction = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    PrimitiveDateTime::parse(s, with_fraction)
        .or_else(|_| PrimitiveDateTime::parse(s, without_fraction))
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}
