use crate::{
    bb::WireType,
    error::{Result, WireError},
};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Name of the enum member every enumeration falls back to when a wire value
/// or label is not one of its members.
pub const UNKNOWN_MEMBER: &str = "UNKNOWN";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldKind {
    Int,
    Float,
    Bool,
    Text,
    /// Carries the name of the enum definition.
    Enum(String),
    /// Carries the name of the nested message definition.
    Message(String),
    RepeatedMessage(String),
}

impl FieldKind {
    /// The framing used for this kind on the wire.
    pub fn wire_type(&self) -> WireType {
        match self {
            FieldKind::Int | FieldKind::Bool | FieldKind::Enum(_) => WireType::Varint,
            FieldKind::Float => WireType::Fixed64,
            FieldKind::Text | FieldKind::Message(_) | FieldKind::RepeatedMessage(_) => {
                WireType::LengthDelimited
            }
        }
    }

    /// The referenced definition, for enum and message kinds.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            FieldKind::Enum(name) | FieldKind::Message(name) | FieldKind::RepeatedMessage(name) => {
                Some(name.as_str())
            }
            _ => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        !matches!(self, FieldKind::Message(_) | FieldKind::RepeatedMessage(_))
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldKind::Int => write!(f, "int"),
            FieldKind::Float => write!(f, "float"),
            FieldKind::Bool => write!(f, "bool"),
            FieldKind::Text => write!(f, "text"),
            FieldKind::Enum(name) | FieldKind::Message(name) => write!(f, "{}", name),
            FieldKind::RepeatedMessage(name) => write!(f, "{}[]", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DefaultValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    /// An enum member label.
    Enum(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Presence {
    Required,
    OptionalWithDefault(DefaultValue),
    OptionalNoDefault,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub id:       u32,
    pub name:     String,
    pub kind:     FieldKind,
    pub presence: Presence,
}

impl Field {
    pub fn new(id: u32, name: &str, kind: FieldKind, presence: Presence) -> Field {
        Field {
            id,
            name: name.to_owned(),
            kind,
            presence,
        }
    }

    /// An enum member. Members reuse the field shape: `id` holds the wire value.
    pub fn member(name: &str, value: u32) -> Field {
        Field::new(value, name, FieldKind::Int, Presence::OptionalNoDefault)
    }

    pub fn is_required(&self) -> bool {
        self.presence == Presence::Required
    }

    pub fn default_value(&self) -> Option<&DefaultValue> {
        match self.presence {
            Presence::OptionalWithDefault(ref value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DefKind {
    Enum,
    Message,
}

#[derive(Debug, Clone, Serialize)]
pub struct Def {
    pub name:     String,
    pub kind:     DefKind,
    pub fields:   Vec<Field>,
    /// Field ids retired by an earlier version. They must never be reassigned.
    pub reserved: Vec<u32>,

    #[serde(skip)]
    pub field_id_to_index:   HashMap<u32, usize>,
    #[serde(skip)]
    pub field_name_to_index: HashMap<String, usize>,
}

impl Def {
    pub fn new(name: &str, kind: DefKind, fields: Vec<Field>) -> Def {
        let mut field_id_to_index = HashMap::new();
        let mut field_name_to_index = HashMap::new();
        for (i, field) in fields.iter().enumerate() {
            field_id_to_index.insert(field.id, i);
            field_name_to_index.insert(field.name.clone(), i);
        }
        Def {
            name: name.to_owned(),
            kind,
            fields,
            reserved: Vec::new(),
            field_id_to_index,
            field_name_to_index,
        }
    }

    pub fn with_reserved(mut self, ids: &[u32]) -> Def {
        self.reserved = ids.to_vec();
        self
    }

    pub fn get_field_by_id(&self, id: u32) -> Option<&Field> {
        self.field_id_to_index.get(&id).map(|&i| &self.fields[i])
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.field_name_to_index.get(name).map(|&i| &self.fields[i])
    }

    /// Like [`get_field_by_id`](#method.get_field_by_id) but treats a miss as a
    /// contract violation.
    pub fn field_by_id(&self, id: u32) -> Result<&Field> {
        self.get_field_by_id(id)
            .ok_or_else(|| WireError::field_not_found(&self.name, &id.to_string()))
    }

    pub fn field(&self, name: &str) -> Result<&Field> {
        self.get_field(name)
            .ok_or_else(|| WireError::field_not_found(&self.name, name))
    }

    /// Enum member with the given wire value.
    pub fn member_by_value(&self, value: u64) -> Option<&Field> {
        if value > u32::MAX as u64 {
            return None;
        }
        self.get_field_by_id(value as u32)
    }

    /// The designated fallback member: `UNKNOWN` when declared, otherwise the
    /// first member.
    pub fn fallback_member(&self) -> Option<&Field> {
        self.get_field(UNKNOWN_MEMBER).or_else(|| self.fields.first())
    }

    /// Maps `label` onto this enum, substituting the fallback member when the
    /// label is not declared.
    pub fn resolve_label(&self, label: &str) -> Option<&Field> {
        self.get_field(label).or_else(|| self.fallback_member())
    }
}

/// A set of definitions making up one schema version.
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    pub defs: Vec<Def>,

    #[serde(skip)]
    pub def_name_to_index: HashMap<String, usize>,
}

impl Schema {
    pub fn new(defs: Vec<Def>) -> Schema {
        let mut def_name_to_index = HashMap::new();
        for (i, def) in defs.iter().enumerate() {
            def_name_to_index.insert(def.name.clone(), i);
        }
        Schema {
            defs,
            def_name_to_index,
        }
    }

    pub fn get_def(&self, name: &str) -> Option<&Def> {
        self.def_name_to_index.get(name).map(|&i| &self.defs[i])
    }

    pub fn def(&self, name: &str) -> Result<&Def> {
        self.get_def(name).ok_or_else(|| WireError::type_not_found(name))
    }

    /// Looks up a message definition; an enum with that name is also a miss.
    pub fn message(&self, name: &str) -> Result<&Def> {
        match self.get_def(name) {
            Some(def) if def.kind == DefKind::Message => Ok(def),
            _ => Err(WireError::type_not_found(name)),
        }
    }

    pub fn enumeration(&self, name: &str) -> Result<&Def> {
        match self.get_def(name) {
            Some(def) if def.kind == DefKind::Enum => Ok(def),
            _ => Err(WireError::type_not_found(name)),
        }
    }
}
