//! Schema contracts.
//!
//! A [`Schema`] is an ordered list of [`FieldDescriptor`]s. The same contract
//! validates caller input before any model call and the model's reply before it
//! is handed back. Validation is a pure function: it either yields a complete
//! [`Record`] or the first [`ValidationError`] it meets, never a partial object.
//!
//! Optional fields keep three states ([`Presence`]): absent, present but empty,
//! and present with a value. JSON `null` on an optional field counts as absent.

use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use thiserror::Error;

/// Primitive type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// UTF-8 text.
    Text,
    /// Any JSON number, read as `f64`.
    Number,
    /// A media reference carried as text (`data:<mime>;base64,<payload>`).
    Media,
    /// An ordered list of text items.
    TextList,
}

impl FieldKind {
    /// Human-readable type name used in errors and prompts.
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Text => "string",
            Self::Number => "number",
            Self::Media => "data URI string",
            Self::TextList => "array of strings",
        }
    }

    fn json_schema(self, description: &str) -> Value {
        match self {
            Self::Text | Self::Media => json!({"type": "string", "description": description}),
            Self::Number => json!({"type": "number", "description": description}),
            Self::TextList => json!({
                "type": "array",
                "items": {"type": "string"},
                "description": description,
            }),
        }
    }
}

/// One field of a record contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Wire name of the field (camelCase, as callers and the model see it).
    pub name: &'static str,
    /// Primitive type.
    pub kind: FieldKind,
    /// Whether the field must be present.
    pub required: bool,
    /// What the field means. Not used for validation; shown to the model.
    pub description: &'static str,
}

impl FieldDescriptor {
    /// Declares a required field.
    pub const fn required(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self { name, kind, required: true, description }
    }

    /// Declares an optional field.
    pub const fn optional(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self { name, kind, required: false, description }
    }
}

/// Three-state value of an optional field.
#[derive(Debug, Clone, PartialEq)]
pub enum Presence<T> {
    /// The field was not supplied (or was `null`).
    Absent,
    /// The field was supplied but empty (`""` or `[]`).
    Empty,
    /// The field was supplied with a value.
    Value(T),
}

impl<T> Presence<T> {
    /// Returns `true` if the field was not supplied.
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Converts from `&Presence<T>` to `Presence<&T>`.
    pub const fn as_ref(&self) -> Presence<&T> {
        match self {
            Self::Absent => Presence::Absent,
            Self::Empty => Presence::Empty,
            Self::Value(v) => Presence::Value(v),
        }
    }

    /// The value, if one was supplied.
    pub fn value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Absent | Self::Empty => None,
        }
    }
}

/// A validated field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Text (also used for media references).
    Text(String),
    /// A number.
    Number(f64),
    /// A list of text items.
    TextList(Vec<String>),
}

/// Why a value failed its contract. Always names the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The value is not a JSON object.
    #[error("expected an object, found {found}")]
    NotAnObject {
        /// JSON type that was found instead.
        found: &'static str,
    },

    /// A required field is missing or null.
    #[error("missing required field '{field}'")]
    MissingField {
        /// Field name.
        field: String,
    },

    /// A required text field is the empty string.
    #[error("required field '{field}' must not be empty")]
    EmptyField {
        /// Field name.
        field: String,
    },

    /// A field has the wrong JSON type.
    #[error("field '{field}' must be a {expected}, found {found}")]
    TypeMismatch {
        /// Field name (list items are reported as `name[index]`).
        field: String,
        /// Declared type.
        expected: &'static str,
        /// JSON type that was found.
        found: &'static str,
    },
}

impl ValidationError {
    /// The field this error is about, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::NotAnObject { .. } => None,
            Self::MissingField { field }
            | Self::EmptyField { field }
            | Self::TypeMismatch { field, .. } => Some(field),
        }
    }
}

/// A record contract: named, ordered, immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    name: &'static str,
    fields: &'static [FieldDescriptor],
}

impl Schema {
    /// Creates a schema over the given fields.
    pub const fn new(name: &'static str, fields: &'static [FieldDescriptor]) -> Self {
        Self { name, fields }
    }

    /// Schema name, e.g. `IdentifyMaterialOutput`.
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Field descriptors in declaration order.
    pub const fn fields(&self) -> &'static [FieldDescriptor] {
        self.fields
    }

    /// Validates `value` against this contract.
    ///
    /// Fields are checked in declaration order and the first defect is
    /// returned. Unknown fields are ignored.
    pub fn validate(&self, value: &Value) -> Result<Record, ValidationError> {
        let object = value
            .as_object()
            .ok_or_else(|| ValidationError::NotAnObject { found: json_type_name(value) })?;

        let mut values = BTreeMap::new();
        for field in self.fields {
            values.insert(field.name, validate_field(field, object)?);
        }
        Ok(Record { values })
    }

    /// Renders the contract as a JSON-schema object, descriptions included.
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.to_string(), f.kind.json_schema(f.description)))
            .collect();
        let required: Vec<&str> = self.fields.iter().filter(|f| f.required).map(|f| f.name).collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

fn validate_field(
    field: &FieldDescriptor,
    object: &Map<String, Value>,
) -> Result<Presence<FieldValue>, ValidationError> {
    let raw = match object.get(field.name) {
        None | Some(Value::Null) if field.required => {
            return Err(ValidationError::MissingField { field: field.name.to_string() });
        }
        None | Some(Value::Null) => return Ok(Presence::Absent),
        Some(raw) => raw,
    };

    let mismatch = |found: &Value| ValidationError::TypeMismatch {
        field: field.name.to_string(),
        expected: field.kind.type_name(),
        found: json_type_name(found),
    };

    match field.kind {
        FieldKind::Text | FieldKind::Media => {
            let text = raw.as_str().ok_or_else(|| mismatch(raw))?;
            match (text.is_empty(), field.required) {
                (true, true) => Err(ValidationError::EmptyField { field: field.name.to_string() }),
                (true, false) => Ok(Presence::Empty),
                (false, _) => Ok(Presence::Value(FieldValue::Text(text.to_string()))),
            }
        }
        FieldKind::Number => {
            let number = raw.as_f64().ok_or_else(|| mismatch(raw))?;
            Ok(Presence::Value(FieldValue::Number(number)))
        }
        FieldKind::TextList => {
            let items = raw.as_array().ok_or_else(|| mismatch(raw))?;
            let mut list = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let text = item.as_str().ok_or_else(|| ValidationError::TypeMismatch {
                    field: format!("{}[{}]", field.name, index),
                    expected: FieldKind::Text.type_name(),
                    found: json_type_name(item),
                })?;
                list.push(text.to_string());
            }
            // A required list may be short or empty; length is not part of the contract.
            if list.is_empty() && !field.required {
                Ok(Presence::Empty)
            } else {
                Ok(Presence::Value(FieldValue::TextList(list)))
            }
        }
    }
}

/// JSON type name of a value, for error messages.
pub const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A record that passed its schema. Every declared field has an entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: BTreeMap<&'static str, Presence<FieldValue>>,
}

impl Record {
    /// Raw three-state value of a field. Undeclared names read as absent.
    pub fn get(&self, name: &str) -> Presence<&FieldValue> {
        self.values.get(name).map_or(Presence::Absent, Presence::as_ref)
    }

    /// A required text (or media) field.
    pub fn text(&self, name: &str) -> Result<&str, ValidationError> {
        match self.optional_text(name)? {
            Presence::Value(text) => Ok(text),
            Presence::Empty => Ok(""),
            Presence::Absent => Err(ValidationError::MissingField { field: name.to_string() }),
        }
    }

    /// An optional text field.
    pub fn optional_text(&self, name: &str) -> Result<Presence<&str>, ValidationError> {
        match self.get(name) {
            Presence::Absent => Ok(Presence::Absent),
            Presence::Empty => Ok(Presence::Empty),
            Presence::Value(FieldValue::Text(text)) => Ok(Presence::Value(text.as_str())),
            Presence::Value(other) => Err(wrong_variant(name, FieldKind::Text, other)),
        }
    }

    /// An optional number field.
    pub fn optional_number(&self, name: &str) -> Result<Presence<f64>, ValidationError> {
        match self.get(name) {
            Presence::Absent => Ok(Presence::Absent),
            Presence::Empty => Ok(Presence::Empty),
            Presence::Value(FieldValue::Number(n)) => Ok(Presence::Value(*n)),
            Presence::Value(other) => Err(wrong_variant(name, FieldKind::Number, other)),
        }
    }

    /// A required text-list field.
    pub fn text_list(&self, name: &str) -> Result<&[String], ValidationError> {
        match self.get(name) {
            Presence::Value(FieldValue::TextList(list)) => Ok(list),
            Presence::Empty => Ok(&[]),
            Presence::Absent => Err(ValidationError::MissingField { field: name.to_string() }),
            Presence::Value(other) => Err(wrong_variant(name, FieldKind::TextList, other)),
        }
    }
}

fn wrong_variant(name: &str, expected: FieldKind, found: &FieldValue) -> ValidationError {
    ValidationError::TypeMismatch {
        field: name.to_string(),
        expected: expected.type_name(),
        found: match found {
            FieldValue::Text(_) => "string",
            FieldValue::Number(_) => "number",
            FieldValue::TextList(_) => "array",
        },
    }
}

/// Conversion from a validated record into a typed value.
pub trait FromRecord: Sized {
    /// Builds `Self` from a record that already passed its schema.
    fn from_record(record: &Record) -> Result<Self, ValidationError>;
}
