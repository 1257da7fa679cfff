//! Records, record identity and typed documents.
//!
//! A [`Record`] is what every backend stores: an identity plus an open field map. Typed documents
//! implement [`Document`] and are converted to and from records through serde.
//!
//! The JSON side of the service and the BSON side of the store meet here: [`json_to_bson`] and
//! [`bson_to_json`] convert field values without going through extended JSON, so ObjectIds render
//! as plain hex strings and integers keep their width.

use bson::{
    Bson, Document as BsonDocument, de::deserialize_from_bson, oid::ObjectId,
    ser::serialize_to_bson,
};
use serde::{Serialize, Serializer, de::DeserializeOwned};
use serde_json::{Map, Number, Value};
use std::fmt;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Name of the identity field in stored documents.
pub const ID_FIELD: &str = "_id";

/// The unique key of a record.
///
/// Keys are assigned by the layer (a fresh ObjectId) unless the caller brings its own, which the
/// bulk todo inserts do with integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordId {
    ObjectId(ObjectId),
    Int(i64),
    String(String),
}

impl RecordId {
    /// Generates a new ObjectId key.
    pub fn generate() -> Self {
        RecordId::ObjectId(ObjectId::new())
    }

    /// Parses a key taken from a URL path segment.
    ///
    /// 24 hex characters are an ObjectId, anything that parses as an integer is an integer and
    /// everything else is kept as a string key. Parsing never fails: an unknown key simply
    /// matches nothing.
    pub fn parse(raw: &str) -> Self {
        if let Ok(oid) = ObjectId::parse_str(raw) {
            return RecordId::ObjectId(oid);
        }
        if let Ok(value) = raw.parse::<i64>() {
            return RecordId::Int(value);
        }
        RecordId::String(raw.to_string())
    }

    /// Reads a key out of a stored `_id` value.
    pub fn from_bson(value: &Bson) -> DocumentStoreResult<Self> {
        match value {
            Bson::ObjectId(oid) => Ok(RecordId::ObjectId(*oid)),
            Bson::Int32(value) => Ok(RecordId::Int(*value as i64)),
            Bson::Int64(value) => Ok(RecordId::Int(*value)),
            Bson::String(value) => Ok(RecordId::String(value.clone())),
            other => Err(DocumentStoreError::invalid_field(
                ID_FIELD,
                format!("unsupported key type {:?}", other.element_type()),
            )),
        }
    }

    /// The key as it is stored.
    pub fn to_bson(&self) -> Bson {
        match self {
            RecordId::ObjectId(oid) => Bson::ObjectId(*oid),
            RecordId::Int(value) => Bson::Int64(*value),
            RecordId::String(value) => Bson::String(value.clone()),
        }
    }

    /// The key as it appears in JSON responses.
    pub fn to_json(&self) -> Value {
        match self {
            RecordId::ObjectId(oid) => Value::String(oid.to_hex()),
            RecordId::Int(value) => Value::from(*value),
            RecordId::String(value) => Value::String(value.clone()),
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::ObjectId(oid) => write!(f, "{}", oid.to_hex()),
            RecordId::Int(value) => write!(f, "{value}"),
            RecordId::String(value) => f.write_str(value),
        }
    }
}

impl From<ObjectId> for RecordId {
    fn from(oid: ObjectId) -> Self {
        RecordId::ObjectId(oid)
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Int(value)
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RecordId::ObjectId(oid) => serializer.serialize_str(&oid.to_hex()),
            RecordId::Int(value) => serializer.serialize_i64(*value),
            RecordId::String(value) => serializer.serialize_str(value),
        }
    }
}

/// A stored document: its key plus an open map of fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub fields: BsonDocument,
}

impl Record {
    pub fn new(id: RecordId, fields: BsonDocument) -> Self {
        Self { id, fields }
    }

    /// Splits a stored document into key and fields.
    pub fn from_document(mut document: BsonDocument) -> DocumentStoreResult<Self> {
        let id = document
            .remove(ID_FIELD)
            .ok_or_else(|| DocumentStoreError::InvalidDocument("document has no _id".into()))?;

        Ok(Self {
            id: RecordId::from_bson(&id)?,
            fields: document,
        })
    }

    /// Builds a record from caller input, taking the key from `_id` or generating one.
    pub fn from_input(mut fields: BsonDocument) -> DocumentStoreResult<Self> {
        let id = match fields.remove(ID_FIELD) {
            Some(value) => RecordId::from_bson(&value)?,
            None => RecordId::generate(),
        };

        Ok(Self { id, fields })
    }

    /// Joins key and fields back into a single document with `_id` first.
    pub fn into_document(self) -> BsonDocument {
        let mut document = BsonDocument::new();
        document.insert(ID_FIELD, self.id.to_bson());
        for (key, value) in self.fields {
            document.insert(key, value);
        }
        document
    }

    /// JSON rendering with `_id` first.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert(ID_FIELD.to_string(), self.id.to_json());
        for (key, value) in &self.fields {
            map.insert(key.clone(), bson_to_json(value));
        }
        Value::Object(map)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Converts a JSON value into the BSON value stored for it.
///
/// Integers that fit in 32 bits are stored as `Int32`, larger ones as `Int64`, everything else
/// numeric as `Double`.
pub fn json_to_bson(value: Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(value) => Bson::Boolean(value),
        Value::Number(number) => {
            if let Some(value) = number.as_i64() {
                i32::try_from(value)
                    .map(Bson::Int32)
                    .unwrap_or(Bson::Int64(value))
            } else {
                Bson::Double(number.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(value) => Bson::String(value),
        Value::Array(items) => Bson::Array(items.into_iter().map(json_to_bson).collect()),
        Value::Object(map) => Bson::Document(json_object_to_document(map)),
    }
}

/// Converts a JSON object into a BSON document, keeping key order.
pub fn json_object_to_document(map: Map<String, Value>) -> BsonDocument {
    map.into_iter()
        .map(|(key, value)| (key, json_to_bson(value)))
        .collect()
}

/// Converts a JSON body into a field map, rejecting anything that is not an object.
pub fn json_to_fields(value: Value) -> DocumentStoreResult<BsonDocument> {
    match value {
        Value::Object(map) => Ok(json_object_to_document(map)),
        other => Err(DocumentStoreError::Validation {
            field: None,
            message: format!("expected a JSON object, got {other}"),
        }),
    }
}

/// Converts a stored BSON value into its JSON rendering.
pub fn bson_to_json(value: &Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(value) => Value::Bool(*value),
        Bson::Int32(value) => Value::from(*value),
        Bson::Int64(value) => Value::from(*value),
        Bson::Double(value) => Number::from_f64(*value)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::String(value) => Value::String(value.clone()),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => Value::String(
            dt.try_to_rfc3339_string()
                .unwrap_or_else(|_| dt.timestamp_millis().to_string()),
        ),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(document) => Value::Object(
            document
                .iter()
                .map(|(key, value)| (key.clone(), bson_to_json(value)))
                .collect(),
        ),
        other => Value::String(other.to_string()),
    }
}

/// Core trait for typed documents.
///
/// A typed document is a serde struct bound to a collection. Its key is not part of the struct;
/// collections hand it back wrapped in [`Stored`].
///
/// # Example
///
/// ```ignore
/// use docrest_core::document::Document;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Movie {
///     pub title: String,
///     pub year: Option<i32>,
/// }
///
/// impl Document for Movie {
///     fn collection_name() -> &'static str {
///         "movies"
///     }
/// }
/// ```
pub trait Document: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// Returns the name of the collection this document belongs to.
    fn collection_name() -> &'static str;
}

/// Extension trait providing conversions for typed documents.
///
/// Implemented for every [`Document`].
pub trait DocumentExt: Document {
    /// Converts this document into a stored field map.
    fn to_fields(&self) -> DocumentStoreResult<BsonDocument>;

    /// Reads a document from a stored field map.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the field when the map does not fit the schema.
    fn from_fields(fields: BsonDocument) -> DocumentStoreResult<Self>;

    /// Reads a document from a JSON request body.
    ///
    /// The body goes through the same conversion as untyped input, so integer widths and
    /// ObjectId references (24 hex chars) come out the way they would be stored.
    fn from_json(value: Value) -> DocumentStoreResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_fields(&self) -> DocumentStoreResult<BsonDocument> {
        match serialize_to_bson(self)? {
            Bson::Document(mut fields) => {
                fields.remove(ID_FIELD);
                Ok(fields)
            }
            other => Err(DocumentStoreError::InvalidDocument(format!(
                "{} serialized to {:?}, expected a document",
                D::collection_name(),
                other.element_type(),
            ))),
        }
    }

    fn from_fields(fields: BsonDocument) -> DocumentStoreResult<Self> {
        deserialize_from_bson(Bson::Document(fields)).map_err(DocumentStoreError::from_input)
    }

    fn from_json(value: Value) -> DocumentStoreResult<Self> {
        Self::from_fields(json_to_fields(value)?)
    }
}

/// A typed document together with its key.
///
/// Serializes as the document's fields with `_id` in front.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Stored<D> {
    #[serde(rename = "_id")]
    pub id: RecordId,
    #[serde(flatten)]
    pub document: D,
}

impl<D: Document> Stored<D> {
    pub fn from_record(record: Record) -> DocumentStoreResult<Self> {
        Ok(Self {
            id: record.id,
            document: D::from_fields(record.fields)?,
        })
    }

    /// JSON rendering through the stored form, so references render as hex strings.
    pub fn to_json(&self) -> DocumentStoreResult<Value> {
        Ok(Record::new(self.id.clone(), self.document.to_fields()?).to_json())
    }
}

/// A partial field map used to update records.
///
/// Patches may not touch the key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch(BsonDocument);

impl Patch {
    pub fn new(fields: BsonDocument) -> DocumentStoreResult<Self> {
        if fields.contains_key(ID_FIELD) {
            return Err(DocumentStoreError::invalid_field(ID_FIELD, "the key of a record is immutable"));
        }

        Ok(Self(fields))
    }

    pub fn from_json(value: Value) -> DocumentStoreResult<Self> {
        Self::new(json_to_fields(value)?)
    }

    pub fn fields(&self) -> &BsonDocument {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Applies the patch to a field map, top-level keys only.
    pub fn apply_to(&self, fields: &mut BsonDocument) {
        for (key, value) in &self.0 {
            fields.insert(key.clone(), value.clone());
        }
    }

    pub fn into_inner(self) -> BsonDocument {
        self.0
    }
}
