//! Conversion between message trees and IR documents.
//!
//! Trees carry field ids, documents carry field names. Both directions walk
//! the schema definition so the IR lists fields in declaration order and the
//! tree only ever holds ids the schema declares.

use crate::types::{IrDocument, IrField, IrObject, IrValue};

use std::collections::BTreeMap;
use tracing::debug;
use vehicle_wire_schema::{
    error::{FieldPath, Result, WireError},
    schema::{Def, DefaultValue, FieldKind, Schema},
    utils::quote,
    value::Value,
};

/// An IR field the target definition does not declare. The transcoder keeps
/// it aside instead of discarding it; dropping is the migrator's decision.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmappedField {
    pub path:      FieldPath,
    pub type_name: String,
    pub name:      String,
    pub value:     IrValue,
}

#[derive(Debug)]
pub struct Transcoded<'a> {
    pub value:    Value<'a>,
    pub unmapped: Vec<UnmappedField>,
}

/// Prefix of the atom that spells out a NaN's bits, e.g. `NaN_0xfff8000000000001`.
const NAN_BITS_PREFIX: &str = "NaN_0x";

/// Formats a float so that [parse_float] yields the same bit pattern. The
/// canonical quiet NaN prints as `NaN`; any other NaN prints its raw bits.
pub fn format_float(value: f64) -> String {
    if value.is_nan() && value.to_bits() != f64::NAN.to_bits() {
        format!("{}{:016x}", NAN_BITS_PREFIX, value.to_bits())
    } else {
        format!("{:?}", value)
    }
}

/// Parses a float atom written by [format_float] or by hand.
pub fn parse_float(text: &str) -> Option<f64> {
    match text.strip_prefix(NAN_BITS_PREFIX) {
        Some(hex) => u64::from_str_radix(hex, 16)
            .ok()
            .map(f64::from_bits)
            .filter(|value| value.is_nan()),
        None => text.parse::<f64>().ok(),
    }
}

/// The IR rendering of a declared default.
pub fn default_to_ir(value: &DefaultValue) -> IrValue {
    match value {
        DefaultValue::Int(v) => IrValue::Atom(v.to_string()),
        DefaultValue::Float(v) => IrValue::Atom(format_float(*v)),
        DefaultValue::Bool(v) => IrValue::Atom(v.to_string()),
        DefaultValue::Text(v) => IrValue::Text(v.clone()),
        DefaultValue::Enum(label) => IrValue::Atom(label.clone()),
    }
}

/// Converts a decoded message into its IR document. Absent fields and empty
/// repeated fields are left out.
pub fn to_ir(value: &Value, schema: &Schema) -> Result<IrDocument> {
    match value {
        Value::Object(name, fields) => {
            let def = schema.message(name)?;
            Ok(IrDocument::new(name, object_to_ir(fields, def, schema)?))
        }
        other => Err(WireError::type_not_found(other.kind_name())),
    }
}

fn object_to_ir(fields: &BTreeMap<u32, Value>, def: &Def, schema: &Schema) -> Result<IrObject> {
    let mut object = IrObject::new();

    for field in &def.fields {
        let value = match fields.get(&field.id) {
            Some(value) => value,
            None => continue,
        };
        let ir = match value {
            Value::Absent => continue,
            Value::Int(v) => IrValue::Atom(v.to_string()),
            Value::Float(v) => IrValue::Atom(format_float(*v)),
            Value::Bool(v) => IrValue::Atom(v.to_string()),
            Value::Text(v) => IrValue::Text(v.clone()),
            Value::Enum(_, label) => IrValue::Atom((*label).to_owned()),
            Value::Object(name, nested) => IrValue::Object(object_to_ir(nested, schema.message(name)?, schema)?),
            Value::Array(_, items) if items.is_empty() => continue,
            Value::Array(name, items) => {
                let element_def = schema.message(name)?;
                let mut list = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Object(_, nested) => list.push(object_to_ir(nested, element_def, schema)?),
                        other => return Err(WireError::type_not_found(other.kind_name())),
                    }
                }
                IrValue::List(list)
            }
        };
        object.push(&field.name, ir);
    }

    Ok(object)
}

/// Rebuilds a message tree from `doc` against `schema`, checking every value's
/// literal and shape against the declared field kind.
pub fn from_ir<'a>(doc: &IrDocument, schema: &'a Schema) -> Result<Transcoded<'a>> {
    let def = schema.message(&doc.type_name)?;
    let mut unmapped = Vec::new();
    let value = object_from_ir(&doc.root, def, schema, &FieldPath::root(), &mut unmapped)?;
    Ok(Transcoded { value, unmapped })
}

fn at(field: &IrField, path: &FieldPath, message: String) -> WireError {
    WireError::IrParse {
        path: path.clone(),
        line: field.line,
        column: field.column,
        message,
    }
}

fn object_from_ir<'a>(
    object: &IrObject,
    def: &'a Def,
    schema: &'a Schema,
    path: &FieldPath,
    unmapped: &mut Vec<UnmappedField>,
) -> Result<Value<'a>> {
    let mut fields: BTreeMap<u32, Value<'a>> = BTreeMap::new();

    for ir_field in &object.fields {
        let field_path = path.child(&ir_field.name);
        let field = match def.get_field(&ir_field.name) {
            Some(field) => field,
            None => {
                unmapped.push(UnmappedField {
                    path:      field_path,
                    type_name: def.name.clone(),
                    name:      ir_field.name.clone(),
                    value:     ir_field.value.clone(),
                });
                continue;
            }
        };
        if fields.contains_key(&field.id) {
            return Err(at(ir_field, &field_path, format!("Duplicate field {}", quote(&field.name))));
        }

        let value = match (&field.kind, &ir_field.value) {
            (FieldKind::Int, IrValue::Atom(text)) => match text.parse::<i64>() {
                Ok(v) => Value::Int(v),
                Err(_) => return Err(at(ir_field, &field_path, format!("Invalid int literal {}", quote(text)))),
            },
            (FieldKind::Float, IrValue::Atom(text)) => match parse_float(text) {
                Some(v) => Value::Float(v),
                None => return Err(at(ir_field, &field_path, format!("Invalid float literal {}", quote(text)))),
            },
            (FieldKind::Bool, IrValue::Atom(text)) => match text.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => return Err(at(ir_field, &field_path, format!("Invalid bool literal {}", quote(text)))),
            },
            (FieldKind::Text, IrValue::Text(text)) => Value::Text(text.clone()),

            (FieldKind::Enum(ty), IrValue::Atom(label)) => {
                let enum_def = schema.enumeration(ty)?;
                let member = enum_def
                    .resolve_label(label)
                    .ok_or_else(|| WireError::type_not_found(&enum_def.name))?;
                if member.name != *label {
                    debug!(path = %field_path, label = %label, fallback = %member.name, "unrecognized enum label");
                }
                Value::Enum(enum_def.name.as_str(), member.name.as_str())
            }

            (FieldKind::Message(ty), IrValue::Object(nested)) => {
                object_from_ir(nested, schema.message(ty)?, schema, &field_path, unmapped)?
            }

            (FieldKind::RepeatedMessage(ty), IrValue::List(items)) => {
                let element_def = schema.message(ty)?;
                let mut values = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let element_path = path.element(&ir_field.name, i);
                    values.push(object_from_ir(item, element_def, schema, &element_path, unmapped)?);
                }
                Value::Array(element_def.name.as_str(), values)
            }

            (kind, value) => {
                return Err(at(
                    ir_field,
                    &field_path,
                    format!("Expected a value of kind {} but found {}", kind, value.kind_name()),
                ))
            }
        };

        fields.insert(field.id, value);
    }

    for field in &def.fields {
        if field.is_required() && !fields.contains_key(&field.id) {
            return Err(WireError::ir(
                &path.child(&field.name),
                format!("Missing required field {} of {}", quote(&field.name), def.name),
            ));
        }
    }

    Ok(Value::Object(def.name.as_str(), fields))
}
