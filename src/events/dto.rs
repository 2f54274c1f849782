use super::model::EventId;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub(crate) const ID_KEY: &str = "id";
pub(crate) const TITLE_KEY: &str = "title";
pub(crate) const CATEGORY_KEY: &str = "category";
pub(crate) const DATE_KEY: &str = "date";
pub(crate) const IMAGE_URL_KEY: &str = "imageUrl";

// Note: every field is lenient, a wrong JSON type reads as absent and the
// original value is kept in `extra` under its own key
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawEventRecord {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: Option<EventId>,
    #[serde(default, deserialize_with = "deserialize_opt_str")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_str")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "deserialize_opt_str")]
    pub date: Option<String>,
    #[serde(rename = "imageUrl", default, deserialize_with = "deserialize_opt_str")]
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawEventRecord {
    /// Never fails: anything that isn't an object becomes an empty record
    pub fn from_value(value: Value) -> Self {
        let object = match value {
            Value::Object(object) => object,
            other => {
                warn!("Event record is not an object (treating it as empty): {}", other);
                return Self::default();
            }
        };

        let mistyped = mistyped_fields(&object);

        let mut record = serde_json::from_value::<Self>(Value::Object(object))
            .unwrap_or_else(|err| {
                warn!("Failed to read event record (treating it as empty). Err: {err}");
                Self::default()
            });

        if !mistyped.is_empty() {
            debug!(id = ?record.id, "Keeping {} field(s) of unexpected type", mistyped.len());
            record.extra.extend(mistyped);
        }

        record
    }

    /// Reads a list of records, `None` when the top level is not an array
    pub fn list_from_value(value: Value) -> Option<Vec<Self>> {
        match value {
            Value::Array(items) => Some(items.into_iter().map(Self::from_value).collect()),
            _ => None,
        }
    }
}

fn mistyped_fields(object: &Map<String, Value>) -> Vec<(String, Value)> {
    [ID_KEY, TITLE_KEY, CATEGORY_KEY, DATE_KEY, IMAGE_URL_KEY]
        .into_iter()
        .filter_map(|key| {
            let value = object.get(key)?;
            let accepted = match value {
                Value::String(_) => true,
                Value::Number(_) => key == ID_KEY,
                _ => false,
            };

            (!accepted).then(|| (key.to_string(), value.clone()))
        })
        .collect()
}

fn deserialize_id<'de, D>(d: D) -> Result<Option<EventId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(EventId::Text(s)),
        Value::Number(n) => Some(EventId::Number(n)),
        _ => None,
    })
}

fn deserialize_opt_str<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}
