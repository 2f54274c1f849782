use super::dto::{RawEventRecord, DATE_KEY, IMAGE_URL_KEY};
use super::model::{
    CategorySet, DefaultedField, NormalizationReport, NormalizedEvent, TemporalPartition,
    ALL_CATEGORIES, PLACEHOLDER_IMAGE_URL,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use itertools::Itertools;
use tracing::{debug, instrument};

const OFFSET_DATE_TIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
];
const NAIVE_DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn normalize(raw: Vec<RawEventRecord>) -> Vec<NormalizedEvent> {
    normalize_with_diagnostics(raw).0
}

/// Same as [`normalize`], also listing every field that fell back to its default
#[instrument(skip_all, fields(records = raw.len()))]
pub fn normalize_with_diagnostics(
    raw: Vec<RawEventRecord>,
) -> (Vec<NormalizedEvent>, NormalizationReport) {
    let mut report = NormalizationReport::default();

    let events = raw
        .into_iter()
        .enumerate()
        .map(|(index, record)| normalize_record(index, record, &mut report))
        .collect::<Vec<NormalizedEvent>>();

    if !report.is_clean() {
        debug!("{} field(s) defaulted", report.defaults.len());
    }

    (events, report)
}

fn normalize_record(
    index: usize,
    record: RawEventRecord,
    report: &mut NormalizationReport,
) -> NormalizedEvent {
    let mut extra = record.extra;

    // The normalized values replace whatever the source sent under these keys
    let mistyped_date = extra.remove(DATE_KEY).filter(|value| !value.is_null());
    extra.remove(IMAGE_URL_KEY);

    let image_url = match record.image_url {
        Some(url) if !url.is_empty() => url,
        _ => {
            debug!(index, id = ?record.id, "No image (using placeholder)");
            report.record(index, &record.id, DefaultedField::ImageUrl);
            PLACEHOLDER_IMAGE_URL.to_string()
        }
    };

    let date = match (record.date.as_deref(), mistyped_date) {
        (Some(raw_date), _) => {
            let parsed = parse_date(raw_date);

            if parsed.is_none() {
                debug!(index, id = ?record.id, "Failed to parse date '{}'", raw_date);
                report.record(index, &record.id, DefaultedField::DateUnparseable);
            }

            parsed
        }
        (None, Some(value)) => {
            debug!(index, id = ?record.id, "Date is not a string: {}", value);
            report.record(index, &record.id, DefaultedField::DateUnparseable);
            None
        }
        (None, None) => {
            report.record(index, &record.id, DefaultedField::DateMissing);
            None
        }
    };

    NormalizedEvent {
        id: record.id,
        title: record.title,
        category: record.category,
        date,
        image_url,
        extra,
    }
}

/// Accepts ISO-8601 down to year precision, offset-less values are taken as UTC
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if value.is_empty() {
        return None;
    }

    if let Ok(date) = DateTime::parse_from_rfc3339(value) {
        return Some(date.with_timezone(&Utc));
    }

    if let Some(date) = OFFSET_DATE_TIME_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(value, format).ok())
    {
        return Some(date.with_timezone(&Utc));
    }

    let naive = match value.strip_suffix(['Z', 'z']) {
        Some(utc) if utc.contains('T') => utc,
        _ => value,
    };

    if let Some(date) = NAIVE_DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(naive, format).ok())
    {
        return Some(date.and_utc());
    }

    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .ok()
        .or_else(|| parse_reduced_date(value))
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date| date.and_utc())
}

/// `YYYY-MM` and `YYYY`, starting on the first day of the period
fn parse_reduced_date(value: &str) -> Option<NaiveDate> {
    let digits = |part: &str, len: usize| {
        part.len() == len && part.bytes().all(|b| b.is_ascii_digit())
    };

    match value.split_once('-') {
        Some((year, month)) if digits(year, 4) && digits(month, 2) => {
            NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
        }
        None if digits(value, 4) => NaiveDate::from_ymd_opt(value.parse().ok()?, 1, 1),
        _ => None,
    }
}

pub fn derive_categories(events: &[NormalizedEvent]) -> CategorySet {
    CategorySet::from_distinct(
        events
            .iter()
            .filter_map(|event| event.category.as_deref())
            .filter(|category| !category.is_empty())
            .unique()
            .map(str::to_string),
    )
}

/// Events without a date always land in `past`.
///
/// Pass `reference` for deterministic results, `None` means now.
pub fn partition_by_temporal_window(
    events: &[NormalizedEvent],
    reference: Option<DateTime<Utc>>,
) -> TemporalPartition {
    let reference = reference.unwrap_or_else(Utc::now);

    let (upcoming, past) = events
        .iter()
        .cloned()
        .partition(|event| event.is_upcoming(reference));

    TemporalPartition { upcoming, past }
}

pub fn filter_by_category(events: &[NormalizedEvent], category: &str) -> Vec<NormalizedEvent> {
    if category == ALL_CATEGORIES {
        return events.to_vec();
    }

    events
        .iter()
        .filter(|event| event.has_category(category))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::model::EventId;
    use chrono::TimeZone;
    use serde_json::{json, Value};

    fn raw(value: Value) -> Vec<RawEventRecord> {
        RawEventRecord::list_from_value(value).unwrap()
    }

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    fn ids(events: &[NormalizedEvent]) -> Vec<String> {
        events
            .iter()
            .map(|event| event.id.as_ref().map(EventId::to_string).unwrap_or_default())
            .collect()
    }

    fn sample() -> Vec<NormalizedEvent> {
        normalize(raw(json!([
            { "id": 1, "date": "2030-01-01", "category": "Fundraising" },
            { "id": 2, "date": "2020-01-01", "category": "Education" },
            { "id": 3, "category": "Education" }
        ])))
    }

    #[test_log::test]
    fn should_preserve_length_and_order() {
        let events = normalize(raw(json!([{ "id": "c" }, { "id": "a" }, {}, { "id": "b" }])));

        assert_eq!(ids(&events), vec!["c", "a", "", "b"]);
    }

    #[test_log::test]
    fn should_normalize_empty_input() {
        let (events, report) = normalize_with_diagnostics(vec![]);

        assert!(events.is_empty());
        assert!(report.is_clean());
    }

    #[test_log::test]
    fn should_fall_back_to_placeholder_image() {
        let (events, report) = normalize_with_diagnostics(raw(json!([
            { "id": 1, "imageUrl": "" },
            { "id": 2 },
            { "id": 3, "imageUrl": "   " },
            { "id": 4, "imageUrl": "https://cdn.example.org/4.png" }
        ])));

        assert_eq!(events[0].image_url, PLACEHOLDER_IMAGE_URL);
        assert_eq!(events[1].image_url, PLACEHOLDER_IMAGE_URL);
        assert_eq!(events[2].image_url, "   ");
        assert_eq!(events[3].image_url, "https://cdn.example.org/4.png");
        assert_eq!(report.count(DefaultedField::ImageUrl), 2);
        assert!(!report.for_index(2).contains(&DefaultedField::ImageUrl));
    }

    #[test_log::test]
    fn should_degrade_bad_dates_to_none() {
        let events = normalize(raw(json!([
            { "id": 1, "date": "not-a-date" },
            { "id": 2, "date": null },
            { "id": 3 },
            { "id": 4, "date": "2025-02-30" },
            { "id": 5, "date": "" }
        ])));

        assert!(events.iter().all(|event| event.date.is_none()));
    }

    #[test_log::test]
    fn should_parse_every_iso_date_shape() {
        let cases = [
            ("2030", "2030-01-01T00:00:00.000Z"),
            ("2030-07", "2030-07-01T00:00:00.000Z"),
            ("2030-07-04", "2030-07-04T00:00:00.000Z"),
            ("2030-07-04T10:15", "2030-07-04T10:15:00.000Z"),
            ("2030-07-04T10:15Z", "2030-07-04T10:15:00.000Z"),
            ("2030-07-04T10:15+02:00", "2030-07-04T08:15:00.000Z"),
            ("2030-07-04T10:15-0130", "2030-07-04T11:45:00.000Z"),
            ("2030-07-04T10:15:30", "2030-07-04T10:15:30.000Z"),
            ("2030-07-04T10:15:30Z", "2030-07-04T10:15:30.000Z"),
            ("2030-07-04T10:15:30.5+02:00", "2030-07-04T08:15:30.500Z"),
            ("2030-07-04T10:15:30.250Z", "2030-07-04T10:15:30.250Z"),
            ("2030-07-04T10:15:30+0200", "2030-07-04T08:15:30.000Z"),
        ];

        for (input, expected) in cases {
            let parsed = parse_date(input)
                .unwrap_or_else(|| panic!("'{}' should be a valid date", input));

            assert_eq!(
                parsed.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                expected,
                "{}",
                input
            );
        }
    }

    #[test_log::test]
    fn should_reject_invalid_date_shapes() {
        let cases = [
            "2030-13",
            "2030-7",
            "20300",
            "2030-02-30",
            "2030-07-04T25:00Z",
            "2030-07-04T10",
            "Z",
            "next friday",
        ];

        for input in cases {
            assert_eq!(parse_date(input), None, "{}", input);
        }
    }

    #[test_log::test]
    fn should_report_date_of_wrong_type_as_unparseable() {
        let (events, report) = normalize_with_diagnostics(raw(json!([
            { "id": 1, "date": 20300101, "imageUrl": 5 },
            { "id": 2, "date": null }
        ])));

        assert_eq!(events[0].date, None);
        assert_eq!(events[0].image_url, PLACEHOLDER_IMAGE_URL);
        assert!(events[0].extra.is_empty());
        assert_eq!(
            report.for_index(0),
            vec![DefaultedField::ImageUrl, DefaultedField::DateUnparseable]
        );
        assert!(report.for_index(1).contains(&DefaultedField::DateMissing));
    }

    #[test_log::test]
    fn should_carry_wrongly_typed_fields_into_output() {
        let events = normalize(raw(json!([
            { "id": true, "category": 7, "title": null, "imageUrl": "a.png", "date": "2030-01-01" }
        ])));

        assert_eq!(
            serde_json::to_value(&events[0]).unwrap(),
            json!({
                "id": true,
                "category": 7,
                "title": null,
                "date": "2030-01-01T00:00:00.000Z",
                "imageUrl": "a.png"
            })
        );
    }

    #[test_log::test]
    fn should_canonicalize_valid_dates_to_the_same_instant() {
        let events = normalize(raw(json!([
            { "date": "2030-01-01" },
            { "date": "2030-01-01T10:15:00+02:00" },
            { "date": "2030-01-01T10:15:30.250Z" },
            { "date": "2030-01-01T10:15" },
            { "date": " 2030-01-01T10:15:30 " }
        ])));

        let dates = events
            .iter()
            .map(|event| event.canonical_date().unwrap())
            .collect::<Vec<String>>();

        assert_eq!(
            dates,
            vec![
                "2030-01-01T00:00:00.000Z",
                "2030-01-01T08:15:00.000Z",
                "2030-01-01T10:15:30.250Z",
                "2030-01-01T10:15:00.000Z",
                "2030-01-01T10:15:30.000Z",
            ]
        );
    }

    #[test_log::test]
    fn should_pass_other_fields_through() {
        let events = normalize(raw(json!([
            { "id": 9, "title": "Book Drive", "category": "Education", "location": "Library" }
        ])));

        assert_eq!(events[0].title.as_deref(), Some("Book Drive"));
        assert_eq!(events[0].category.as_deref(), Some("Education"));
        assert_eq!(events[0].extra["location"], json!("Library"));
    }

    #[test_log::test]
    fn should_report_defaulted_fields() {
        let (_, report) = normalize_with_diagnostics(raw(json!([
            { "id": 1, "imageUrl": "", "date": "bad-date" },
            { "id": 2, "imageUrl": "x.png", "date": "2030-01-01" },
            { "imageUrl": "y.png" }
        ])));

        assert_eq!(
            report.for_index(0),
            vec![DefaultedField::ImageUrl, DefaultedField::DateUnparseable]
        );
        assert!(report.for_index(1).is_empty());
        assert_eq!(report.for_index(2), vec![DefaultedField::DateMissing]);
        assert_eq!(report.defaults[0].id, Some(EventId::Number(1u64.into())));
        assert_eq!(report.defaults[2].id, None);
    }

    #[test_log::test]
    fn should_derive_categories_in_first_seen_order() {
        let events = normalize(raw(json!([
            { "category": "B" },
            { "category": "A" },
            { "category": "B" },
            { "category": null },
            { "category": "" },
            { "category": "C" }
        ])));

        let categories = derive_categories(&events);

        assert_eq!(categories.as_slice(), &["All", "B", "A", "C"]);
    }

    #[test_log::test]
    fn should_derive_only_all_from_empty_input() {
        assert_eq!(derive_categories(&[]).as_slice(), &["All"]);
    }

    #[test_log::test]
    fn should_partition_events_around_reference() {
        let partition = partition_by_temporal_window(&sample(), Some(at(2025, 1, 1)));

        assert_eq!(ids(&partition.upcoming), vec!["1"]);
        assert_eq!(ids(&partition.past), vec!["2", "3"]);
    }

    #[test_log::test]
    fn event_exactly_at_reference_is_past() {
        let events = normalize(raw(json!([{ "id": 1, "date": "2025-01-01T00:00:00Z" }])));

        let partition = partition_by_temporal_window(&events, Some(at(2025, 1, 1)));

        assert!(partition.upcoming.is_empty());
        assert_eq!(partition.past.len(), 1);
    }

    #[test_log::test]
    fn should_partition_empty_input() {
        let partition = partition_by_temporal_window(&[], Some(at(2025, 1, 1)));

        assert_eq!(partition, TemporalPartition::default());
    }

    #[test_log::test]
    fn should_default_reference_to_now() {
        let events = normalize(raw(json!([
            { "id": 1, "date": "2999-01-01" },
            { "id": 2, "date": "1999-01-01" }
        ])));

        let partition = partition_by_temporal_window(&events, None);

        assert_eq!(ids(&partition.upcoming), vec!["1"]);
        assert_eq!(ids(&partition.past), vec!["2"]);
    }

    #[test_log::test]
    fn filtering_by_all_keeps_everything() {
        let events = sample();

        let once = filter_by_category(&events, ALL_CATEGORIES);

        assert_eq!(once, events);
        assert_eq!(filter_by_category(&once, ALL_CATEGORIES), events);
    }

    #[test_log::test]
    fn filtering_by_category_is_exact_and_idempotent() {
        let mut events = sample();
        events.extend(normalize(raw(json!([
            { "id": 4, "category": "education" },
            { "id": 5, "category": " Education" },
            { "id": 6, "category": "Education" }
        ]))));

        let once = filter_by_category(&events, "Education");

        assert_eq!(ids(&once), vec!["2", "3", "6"]);
        assert_eq!(filter_by_category(&once, "Education"), once);
    }

    #[test_log::test]
    fn filtering_upcoming_events() {
        let partition = partition_by_temporal_window(&sample(), Some(at(2025, 1, 1)));

        assert_eq!(
            ids(&filter_by_category(&partition.upcoming, "Fundraising")),
            vec!["1"]
        );
        assert!(filter_by_category(&partition.upcoming, "Education").is_empty());
    }

    #[test_log::test]
    fn bad_record_lands_in_past_with_placeholder() {
        let events = normalize(raw(json!([{ "id": 1, "imageUrl": "", "date": "bad-date" }])));

        let partition = partition_by_temporal_window(&events, Some(at(2025, 1, 1)));

        assert_eq!(partition.past[0].image_url, PLACEHOLDER_IMAGE_URL);
        assert_eq!(partition.past[0].date, None);
        assert!(partition.upcoming.is_empty());
    }
}
