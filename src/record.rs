//! Record data model
//!
//! The fixed 15-field record every layout persists, plus the identifiers and
//! tagged values used wherever a layout handles fields by name.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};

/// The unit of storage
///
/// Field order matches the serialized field order of the self-describing
/// layouts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub height: f32,
    pub weight: f32,
    pub balance: f64,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
    pub login_count: i32,
    pub score: f64,
    pub description: String,
}

// =============================================================================
// Field identifiers
// =============================================================================

/// Declared type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int64,
    Int32,
    Float32,
    Float64,
    Bool,
    Text,
}

impl FieldKind {
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Int64 => "int64",
            FieldKind::Int32 => "int32",
            FieldKind::Float32 => "float32",
            FieldKind::Float64 => "float64",
            FieldKind::Bool => "bool",
            FieldKind::Text => "string",
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, FieldKind::Bool | FieldKind::Text)
    }
}

/// One of the 15 record fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Username,
    Email,
    FirstName,
    LastName,
    Age,
    Height,
    Weight,
    Balance,
    IsActive,
    CreatedAt,
    UpdatedAt,
    LoginCount,
    Score,
    Description,
}

impl Field {
    /// Every field in declaration order
    pub const ALL: [Field; 15] = [
        Field::Id,
        Field::Username,
        Field::Email,
        Field::FirstName,
        Field::LastName,
        Field::Age,
        Field::Height,
        Field::Weight,
        Field::Balance,
        Field::IsActive,
        Field::CreatedAt,
        Field::UpdatedAt,
        Field::LoginCount,
        Field::Score,
        Field::Description,
    ];

    /// Stored field name
    pub fn name(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Username => "username",
            Field::Email => "email",
            Field::FirstName => "first_name",
            Field::LastName => "last_name",
            Field::Age => "age",
            Field::Height => "height",
            Field::Weight => "weight",
            Field::Balance => "balance",
            Field::IsActive => "is_active",
            Field::CreatedAt => "created_at",
            Field::UpdatedAt => "updated_at",
            Field::LoginCount => "login_count",
            Field::Score => "score",
            Field::Description => "description",
        }
    }

    /// Resolve a stored field name
    pub fn from_name(name: &str) -> Option<Field> {
        Some(match name {
            "id" => Field::Id,
            "username" => Field::Username,
            "email" => Field::Email,
            "first_name" => Field::FirstName,
            "last_name" => Field::LastName,
            "age" => Field::Age,
            "height" => Field::Height,
            "weight" => Field::Weight,
            "balance" => Field::Balance,
            "is_active" => Field::IsActive,
            "created_at" => Field::CreatedAt,
            "updated_at" => Field::UpdatedAt,
            "login_count" => Field::LoginCount,
            "score" => Field::Score,
            "description" => Field::Description,
            _ => return None,
        })
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Field::Id | Field::CreatedAt | Field::UpdatedAt => FieldKind::Int64,
            Field::Age | Field::LoginCount => FieldKind::Int32,
            Field::Height | Field::Weight => FieldKind::Float32,
            Field::Balance | Field::Score => FieldKind::Float64,
            Field::IsActive => FieldKind::Bool,
            Field::Username
            | Field::Email
            | Field::FirstName
            | Field::LastName
            | Field::Description => FieldKind::Text,
        }
    }

    /// `id` is the primary key and never changes after creation
    pub fn is_updatable(self) -> bool {
        self != Field::Id
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Field values
// =============================================================================

/// A single field value, tagged with its type
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int64(i64),
    Int32(i32),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    Text(String),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Int64(_) => FieldKind::Int64,
            FieldValue::Int32(_) => FieldKind::Int32,
            FieldValue::Float32(_) => FieldKind::Float32,
            FieldValue::Float64(_) => FieldKind::Float64,
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::Text(_) => FieldKind::Text,
        }
    }

    /// Numeric value widened to f64, `None` for bool and text
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            FieldValue::Int64(v) => Some(v as f64),
            FieldValue::Int32(v) => Some(v as f64),
            FieldValue::Float32(v) => Some(v as f64),
            FieldValue::Float64(v) => Some(v),
            FieldValue::Bool(_) | FieldValue::Text(_) => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int64(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int32(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float32(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float64(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

// =============================================================================
// Field access
// =============================================================================

impl Record {
    /// Read one field as a tagged value
    pub fn get(&self, field: Field) -> FieldValue {
        match field {
            Field::Id => FieldValue::Int64(self.id),
            Field::Username => FieldValue::Text(self.username.clone()),
            Field::Email => FieldValue::Text(self.email.clone()),
            Field::FirstName => FieldValue::Text(self.first_name.clone()),
            Field::LastName => FieldValue::Text(self.last_name.clone()),
            Field::Age => FieldValue::Int32(self.age),
            Field::Height => FieldValue::Float32(self.height),
            Field::Weight => FieldValue::Float32(self.weight),
            Field::Balance => FieldValue::Float64(self.balance),
            Field::IsActive => FieldValue::Bool(self.is_active),
            Field::CreatedAt => FieldValue::Int64(self.created_at),
            Field::UpdatedAt => FieldValue::Int64(self.updated_at),
            Field::LoginCount => FieldValue::Int32(self.login_count),
            Field::Score => FieldValue::Float64(self.score),
            Field::Description => FieldValue::Text(self.description.clone()),
        }
    }

    /// Numeric field widened to f64 without cloning text fields
    pub fn numeric(&self, field: Field) -> Option<f64> {
        match field {
            Field::Id => Some(self.id as f64),
            Field::Age => Some(self.age as f64),
            Field::Height => Some(self.height as f64),
            Field::Weight => Some(self.weight as f64),
            Field::Balance => Some(self.balance),
            Field::CreatedAt => Some(self.created_at as f64),
            Field::UpdatedAt => Some(self.updated_at as f64),
            Field::LoginCount => Some(self.login_count as f64),
            Field::Score => Some(self.score),
            _ => None,
        }
    }

    /// Overwrite one field
    ///
    /// Fails with `TypeMismatch` if the value's type is not the field's type.
    pub fn set(&mut self, field: Field, value: FieldValue) -> Result<()> {
        match (field, value) {
            (Field::Id, FieldValue::Int64(v)) => self.id = v,
            (Field::Username, FieldValue::Text(v)) => self.username = v,
            (Field::Email, FieldValue::Text(v)) => self.email = v,
            (Field::FirstName, FieldValue::Text(v)) => self.first_name = v,
            (Field::LastName, FieldValue::Text(v)) => self.last_name = v,
            (Field::Age, FieldValue::Int32(v)) => self.age = v,
            (Field::Height, FieldValue::Float32(v)) => self.height = v,
            (Field::Weight, FieldValue::Float32(v)) => self.weight = v,
            (Field::Balance, FieldValue::Float64(v)) => self.balance = v,
            (Field::IsActive, FieldValue::Bool(v)) => self.is_active = v,
            (Field::CreatedAt, FieldValue::Int64(v)) => self.created_at = v,
            (Field::UpdatedAt, FieldValue::Int64(v)) => self.updated_at = v,
            (Field::LoginCount, FieldValue::Int32(v)) => self.login_count = v,
            (Field::Score, FieldValue::Float64(v)) => self.score = v,
            (Field::Description, FieldValue::Text(v)) => self.description = v,
            (field, value) => {
                return Err(LayoutError::TypeMismatch {
                    field: field.name().to_string(),
                    expected: field.kind().name(),
                    actual: value.kind().name(),
                })
            }
        }
        Ok(())
    }
}

// =============================================================================
// Incremental assembly
// =============================================================================

/// Assembles a record from fields arriving in any order
///
/// Used by every layout that decodes field by field. `build` refuses to hand
/// out a record unless all 15 fields were supplied.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    record: Record,
    seen: u16,
}

impl RecordBuilder {
    const COMPLETE: u16 = (1 << Field::ALL.len()) - 1;

    pub fn new() -> Self {
        Self::default()
    }

    /// Supply one field; a value of the wrong type is a decode error
    pub fn set(&mut self, field: Field, value: FieldValue) -> Result<()> {
        self.record.set(field, value).map_err(|e| match e {
            LayoutError::TypeMismatch {
                field,
                expected,
                actual,
            } => LayoutError::Decode(format!(
                "field {} holds {}, expected {}",
                field, actual, expected
            )),
            other => other,
        })?;
        self.seen |= field.bit();
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.seen == Self::COMPLETE
    }

    pub fn build(self) -> Result<Record> {
        if !self.is_complete() {
            let missing: Vec<&str> = Field::ALL
                .iter()
                .filter(|f| self.seen & f.bit() == 0)
                .map(|f| f.name())
                .collect();
            return Err(LayoutError::Decode(format!(
                "record {} missing fields: {}",
                self.record.id,
                missing.join(", ")
            )));
        }
        Ok(self.record)
    }
}
