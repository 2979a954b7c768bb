use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::domain::{BiobankId, CollectionId, ContactId, CountryCode, Metric, NetworkId};

pub type Attributes = BTreeMap<String, Value>;

/// A cross reference as delivered by the catalog: either the bare id or an
/// embedded `{"id": ...}` object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Reference {
    Shorthand(String),
    Detailed(ReferenceObject),
}

#[derive(Debug, Deserialize)]
struct ReferenceObject {
    id: String,
}

impl Reference {
    fn into_id(self) -> String {
        match self {
            Reference::Shorthand(id) => id,
            Reference::Detailed(obj) => obj.id,
        }
    }
}

fn reference<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    Reference::deserialize(deserializer).map(|r| T::from(r.into_id()))
}

fn optional_reference<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    let value = Option::<Reference>::deserialize(deserializer)?;
    Ok(value.map(|r| T::from(r.into_id())))
}

fn references<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: From<String>,
{
    let value = Option::<Vec<Reference>>::deserialize(deserializer)?;
    Ok(value
        .unwrap_or_default()
        .into_iter()
        .map(|r| T::from(r.into_id()))
        .collect())
}

/// Only a JSON integer is an exact count, negative ones included; strings,
/// floats and nulls are absent.
fn integer_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_i64))
}

fn order_of_magnitude<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let magnitude = match value {
        Some(Value::Number(number)) => number.as_u64(),
        Some(Value::Object(obj)) => obj.get("id").and_then(Value::as_u64),
        _ => None,
    };
    Ok(magnitude.and_then(|m| u32::try_from(m).ok()))
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Biobank {
    pub id: BiobankId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(deserialize_with = "reference")]
    pub country: CountryCode,
    #[serde(default, deserialize_with = "optional_reference")]
    pub contact: Option<ContactId>,
    #[serde(default, deserialize_with = "references")]
    pub networks: Vec<NetworkId>,
    #[serde(default, deserialize_with = "references")]
    pub collections: Vec<CollectionId>,
    #[serde(default, deserialize_with = "flag")]
    pub withdrawn: bool,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(deserialize_with = "reference")]
    pub biobank: BiobankId,
    #[serde(default, deserialize_with = "optional_reference")]
    pub parent_collection: Option<CollectionId>,
    #[serde(default, deserialize_with = "references")]
    pub sub_collections: Vec<CollectionId>,
    #[serde(default, deserialize_with = "optional_reference")]
    pub contact: Option<ContactId>,
    #[serde(default, deserialize_with = "references")]
    pub networks: Vec<NetworkId>,
    #[serde(default, deserialize_with = "optional_reference")]
    pub country: Option<CountryCode>,
    #[serde(default, deserialize_with = "integer_count")]
    pub size: Option<i64>,
    #[serde(default, deserialize_with = "integer_count")]
    pub number_of_donors: Option<i64>,
    #[serde(default, deserialize_with = "order_of_magnitude")]
    pub order_of_magnitude: Option<u32>,
    #[serde(default, deserialize_with = "order_of_magnitude")]
    pub order_of_magnitude_donors: Option<u32>,
    #[serde(default, deserialize_with = "flag")]
    pub withdrawn: bool,
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl Collection {
    pub fn is_top_level(&self) -> bool {
        self.parent_collection.is_none()
    }

    pub fn count(&self, metric: Metric) -> Option<i64> {
        match metric {
            Metric::Size => self.size,
            Metric::NumberOfDonors => self.number_of_donors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "optional_reference")]
    pub country: Option<CountryCode>,
    #[serde(default, deserialize_with = "references")]
    pub biobanks: Vec<BiobankId>,
    #[serde(default, deserialize_with = "references")]
    pub collections: Vec<CollectionId>,
    #[serde(default, deserialize_with = "references")]
    pub networks: Vec<NetworkId>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub id: NetworkId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "optional_reference")]
    pub country: Option<CountryCode>,
    #[serde(default, deserialize_with = "optional_reference")]
    pub contact: Option<ContactId>,
    #[serde(default, deserialize_with = "references")]
    pub biobanks: Vec<BiobankId>,
    #[serde(default, deserialize_with = "references")]
    pub collections: Vec<CollectionId>,
    #[serde(flatten)]
    pub attributes: Attributes,
}

/// One fact-table dimension value; `*` aggregates the dimension away.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Dimension {
    All,
    Value(String),
    #[default]
    Missing,
}

impl Dimension {
    pub fn is_all(&self) -> bool {
        matches!(self, Dimension::All)
    }
}

impl Serialize for Dimension {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Dimension::All => serializer.serialize_str("*"),
            Dimension::Value(value) => serializer.serialize_str(value),
            Dimension::Missing => serializer.serialize_none(),
        }
    }
}

fn dimension<'de, D>(deserializer: D) -> Result<Dimension, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Reference>::deserialize(deserializer)?;
    Ok(match value.map(Reference::into_id) {
        Some(id) if id == "*" => Dimension::All,
        Some(id) => Dimension::Value(id),
        None => Dimension::Missing,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub id: String,
    #[serde(deserialize_with = "reference")]
    pub collection: CollectionId,
    #[serde(default, deserialize_with = "dimension")]
    pub sex: Dimension,
    #[serde(default, deserialize_with = "dimension")]
    pub age_range: Dimension,
    #[serde(default, deserialize_with = "dimension")]
    pub sample_type: Dimension,
    #[serde(default, deserialize_with = "dimension")]
    pub disease: Dimension,
    #[serde(default, deserialize_with = "integer_count")]
    pub number_of_samples: Option<i64>,
    #[serde(default, deserialize_with = "integer_count")]
    pub number_of_donors: Option<i64>,
}

impl Fact {
    /// The grand-total row: every dimension aggregated away.
    pub fn is_all_star(&self) -> bool {
        [&self.sex, &self.age_range, &self.sample_type, &self.disease]
            .iter()
            .all(|dim| dim.is_all())
    }
}
