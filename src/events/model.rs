use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::fmt::{Display, Formatter};

pub const ALL_CATEGORIES: &str = "All";
pub const PLACEHOLDER_IMAGE_URL: &str = "/images/event-placeholder.jpg";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventId {
    Text(String),
    Number(Number),
}

impl Display for EventId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EventId::Text(id) => write!(f, "{}", id),
            EventId::Number(id) => write!(f, "{}", id),
        }
    }
}

/// An event after field-level validation.
///
/// `image_url` is never empty and `date` is either a valid instant or `None`.
/// Absent `id`, `title` and `category` are left out when serialized, a
/// value of the wrong type sent for one of them stays in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<EventId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(serialize_with = "serialize_canonical_date")]
    pub date: Option<DateTime<Utc>>,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NormalizedEvent {
    /// ISO-8601 UTC with millisecond precision, e.g. `2030-01-01T00:00:00.000Z`
    pub fn canonical_date(&self) -> Option<String> {
        self.date.map(|date| to_canonical(&date))
    }

    pub fn is_upcoming(&self, reference: DateTime<Utc>) -> bool {
        self.date.is_some_and(|date| date > reference)
    }

    /// Empty categories never match a specific filter
    pub fn has_category(&self, category: &str) -> bool {
        self.category
            .as_deref()
            .is_some_and(|own| !own.is_empty() && own == category)
    }
}

fn to_canonical(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_canonical_date<S>(date: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match date {
        Some(date) => s.serialize_str(&to_canonical(date)),
        None => s.serialize_none(),
    }
}

/// Distinct categories in first-seen order, always led by [`ALL_CATEGORIES`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CategorySet(Vec<String>);

impl CategorySet {
    pub(crate) fn from_distinct(categories: impl IntoIterator<Item = String>) -> Self {
        let mut all = vec![ALL_CATEGORIES.to_string()];
        all.extend(categories);
        Self(all)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, category: &str) -> bool {
        self.0.iter().any(|own| own == category)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false, "All" is always present
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl Default for CategorySet {
    fn default() -> Self {
        Self::from_distinct(Vec::new())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemporalPartition {
    pub upcoming: Vec<NormalizedEvent>,
    pub past: Vec<NormalizedEvent>,
}

#[derive(strum::Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultedField {
    #[strum(serialize = "date (missing)")]
    DateMissing,
    #[strum(serialize = "date (unparseable)")]
    DateUnparseable,
    #[strum(serialize = "imageUrl")]
    ImageUrl,
}

/// A field that was repaired with its default during normalization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefault {
    /// Position of the record in the fetched batch
    pub index: usize,
    pub id: Option<EventId>,
    pub field: DefaultedField,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    pub defaults: Vec<FieldDefault>,
}

impl NormalizationReport {
    pub fn is_clean(&self) -> bool {
        self.defaults.is_empty()
    }

    pub fn count(&self, field: DefaultedField) -> usize {
        self.defaults.iter().filter(|d| d.field == field).count()
    }

    pub fn for_index(&self, index: usize) -> Vec<DefaultedField> {
        self.defaults
            .iter()
            .filter(|d| d.index == index)
            .map(|d| d.field)
            .collect()
    }

    pub(crate) fn record(&mut self, index: usize, id: &Option<EventId>, field: DefaultedField) {
        self.defaults.push(FieldDefault {
            index,
            id: id.clone(),
            field,
        });
    }
}
