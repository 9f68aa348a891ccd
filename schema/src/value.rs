use crate::{
    bb::{BufferError, ByteBuffer, ByteBufferMut, WireType, MAX_VARINT_BYTES},
    error::{Result, WireError},
    schema::{Def, DefaultValue, Field, FieldKind, Schema},
};

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;
use tracing::debug;

/// Limits applied while decoding untrusted bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Widest varint accepted before the input is rejected as malformed.
    pub max_varint_bytes: usize,
}

impl Default for DecodeOptions {
    fn default() -> DecodeOptions {
        DecodeOptions {
            max_varint_bytes: MAX_VARINT_BYTES,
        }
    }
}

/// This type holds one decoded message tree.
///
/// Values can represent anything in a [Schema](struct.Schema.html) and can be
/// converted to and from the binary wire format with it. Type names and enum
/// labels are string slices borrowed from the schema, so a Value can outlive
/// the buffer it was parsed from but can't outlive the schema. Object fields
/// are keyed by field id; names only matter to the IR.
#[derive(Clone)]
pub enum Value<'a> {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    /// `(enum type, member label)`
    Enum(&'a str, &'a str),
    Object(&'a str, BTreeMap<u32, Value<'a>>),
    /// A repeated nested message: `(element type, elements)`.
    Array(&'a str, Vec<Value<'a>>),
    /// An optional field with no value. Distinct from a field holding its default.
    Absent,
}

impl<'a> Value<'a> {
    /// An empty object of the given type.
    pub fn object(type_name: &'a str) -> Value<'a> {
        Value::Object(type_name, BTreeMap::new())
    }

    /// A convenience method to extract the value out of an [Int](#variant.Int).
    /// Returns `0` for other value kinds.
    pub fn as_int(&self) -> i64 {
        match *self {
            Value::Int(value) => value,
            _ => 0,
        }
    }

    /// A convenience method to extract the value out of a [Float](#variant.Float).
    /// Returns `0.0` for other value kinds.
    pub fn as_float(&self) -> f64 {
        match *self {
            Value::Float(value) => value,
            _ => 0.0,
        }
    }

    /// A convenience method to extract the value out of a [Bool](#variant.Bool).
    /// Returns `false` for other value kinds.
    pub fn as_bool(&self) -> bool {
        match *self {
            Value::Bool(value) => value,
            _ => false,
        }
    }

    /// Returns the text of a [Text](#variant.Text) or the label of an
    /// [Enum](#variant.Enum), and `""` for other value kinds.
    pub fn as_text(&self) -> &str {
        match *self {
            Value::Text(ref value) => value.as_str(),
            Value::Enum(_, label) => label,
            _ => "",
        }
    }

    /// Returns `("", "")` for other value kinds.
    pub fn as_enum(&self) -> (&str, &str) {
        match *self {
            Value::Enum(name, label) => (name, label),
            _ => ("", ""),
        }
    }

    /// Returns an empty slice for other value kinds.
    pub fn as_array(&self) -> &[Value<'a>] {
        match *self {
            Value::Array(_, ref values) => values.as_slice(),
            _ => &[],
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(*self, Value::Absent)
    }

    /// The message type of an object or the element type of an array.
    pub fn type_name(&self) -> Option<&'a str> {
        match *self {
            Value::Object(name, _) | Value::Array(name, _) | Value::Enum(name, _) => Some(name),
            _ => None,
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match *self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Text(_) => "text",
            Value::Enum(..) => "enum",
            Value::Object(..) => "object",
            Value::Array(..) => "array",
            Value::Absent => "absent",
        }
    }

    /// A convenience method to extract the length out of an [Array](#variant.Array).
    /// Returns `0` for other value kinds.
    pub fn len(&self) -> usize {
        match *self {
            Value::Array(_, ref values) => values.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A convenience method to append to an [Array](#variant.Array). Does
    /// nothing for other value kinds.
    pub fn push(&mut self, value: Value<'a>) {
        if let Value::Array(_, ref mut values) = *self {
            values.push(value);
        }
    }

    pub fn fields(&self) -> Option<&BTreeMap<u32, Value<'a>>> {
        match *self {
            Value::Object(_, ref fields) => Some(fields),
            _ => None,
        }
    }

    /// A convenience method to extract a field out of an [Object](#variant.Object).
    /// Returns `None` for other value kinds or if the field is absent.
    pub fn get(&self, id: u32) -> Option<&Value<'a>> {
        match *self {
            Value::Object(_, ref fields) => fields.get(&id).filter(|value| !value.is_absent()),
            _ => None,
        }
    }

    /// Like [get](#method.get) but addresses the field by its registry name.
    pub fn get_named(&self, schema: &Schema, name: &str) -> Option<&Value<'a>> {
        let def = schema.get_def(self.type_name()?)?;
        self.get(def.get_field(name)?.id)
    }

    /// The field's value, or its declared default when it is absent. Returns
    /// `None` for absent fields without a default.
    pub fn get_or_default(&self, schema: &'a Schema, name: &str) -> Option<Value<'a>> {
        let def = schema.get_def(self.type_name()?)?;
        let field = def.get_field(name)?;
        match self.get(field.id) {
            Some(value) => Some(value.clone()),
            None => Value::from_default(schema, field),
        }
    }

    /// Builds the value a field's declared default stands for.
    pub fn from_default(schema: &'a Schema, field: &Field) -> Option<Value<'a>> {
        Some(match *field.default_value()? {
            DefaultValue::Int(value) => Value::Int(value),
            DefaultValue::Float(value) => Value::Float(value),
            DefaultValue::Bool(value) => Value::Bool(value),
            DefaultValue::Text(ref value) => Value::Text(value.clone()),
            DefaultValue::Enum(ref label) => {
                let def = schema.enumeration(field.kind.type_name()?).ok()?;
                let member = def.get_field(label)?;
                Value::Enum(def.name.as_str(), member.name.as_str())
            }
        })
    }

    /// A convenience method to update a field on an [Object](#variant.Object).
    /// Does nothing for other value kinds.
    pub fn set(&mut self, id: u32, value: Value<'a>) {
        if let Value::Object(_, ref mut fields) = *self {
            fields.insert(id, value);
        }
    }

    /// A convenience method to remove a field on an [Object](#variant.Object).
    /// Does nothing for other value kinds.
    pub fn remove(&mut self, id: u32) {
        if let Value::Object(_, ref mut fields) = *self {
            fields.remove(&id);
        }
    }

    /// Decodes a message of type `type_name` from `bytes`.
    pub fn decode(schema: &'a Schema, type_name: &str, bytes: &[u8]) -> Result<Value<'a>> {
        Value::decode_with(schema, type_name, bytes, &DecodeOptions::default())
    }

    pub fn decode_with(
        schema: &'a Schema,
        type_name: &str,
        bytes: &[u8],
        options: &DecodeOptions,
    ) -> Result<Value<'a>> {
        let def = schema.message(type_name)?;
        let mut bb = ByteBuffer::new(bytes).with_max_varint_bytes(options.max_varint_bytes);
        Value::decode_message(schema, def, &mut bb)
    }

    /// Decodes every remaining field in `bb` as a message of type `def`. This
    /// is mainly useful as a helper routine for [decode](#method.decode), which
    /// you probably want to use instead.
    pub fn decode_message(
        schema: &'a Schema,
        def: &'a Def,
        bb: &mut ByteBuffer,
    ) -> Result<Value<'a>> {
        let mut fields: BTreeMap<u32, Value<'a>> = BTreeMap::new();

        while !bb.is_empty() {
            let start = bb.offset();
            let (id, wire_type) = bb.read_key().map_err(|e| malformed(def, start, e.to_string()))?;

            let field = match def.get_field_by_id(id) {
                Some(field) => field,
                None => {
                    debug!(type_name = %def.name, id, %wire_type, offset = start, "skipping unknown field");
                    bb.skip(wire_type)
                        .map_err(|e| malformed(def, start, format!("unknown field {}: {}", id, e)))?;
                    continue;
                }
            };

            let expected = field.kind.wire_type();
            if wire_type != expected {
                return Err(malformed(
                    def,
                    start,
                    format!("field {} expects {} but found {}", field.name, expected, wire_type),
                ));
            }

            let offset = bb.offset();
            let err = |e: BufferError| malformed(def, offset, format!("field {}: {}", field.name, e));

            let value = match field.kind {
                FieldKind::Int => Value::Int(bb.read_var_int64().map_err(err)?),
                FieldKind::Float => Value::Float(bb.read_double().map_err(err)?),
                FieldKind::Bool => Value::Bool(bb.read_bool().map_err(err)?),
                FieldKind::Text => Value::Text(bb.read_string().map_err(err)?.to_owned()),

                FieldKind::Enum(ref ty) => {
                    let raw = bb.read_var_uint64().map_err(err)?;
                    let enum_def = schema.enumeration(ty)?;
                    let member = match enum_def.member_by_value(raw) {
                        Some(member) => member,
                        None => {
                            debug!(type_name = %def.name, field = %field.name, raw, "unrecognized enum value");
                            enum_def
                                .fallback_member()
                                .ok_or_else(|| WireError::type_not_found(&enum_def.name))?
                        }
                    };
                    Value::Enum(enum_def.name.as_str(), member.name.as_str())
                }

                FieldKind::Message(ref ty) => {
                    let nested_def = schema.message(ty)?;
                    let mut nested = bb.read_length_delimited().map_err(err)?;
                    Value::decode_message(schema, nested_def, &mut nested)?
                }

                FieldKind::RepeatedMessage(ref ty) => {
                    let nested_def = schema.message(ty)?;
                    let mut nested = bb.read_length_delimited().map_err(err)?;
                    let element = Value::decode_message(schema, nested_def, &mut nested)?;
                    let entry = fields
                        .entry(field.id)
                        .or_insert_with(|| Value::Array(nested_def.name.as_str(), Vec::new()));
                    entry.push(element);
                    continue;
                }
            };

            fields.insert(field.id, value);
        }

        for field in &def.fields {
            if field.is_required() && !fields.contains_key(&field.id) {
                return Err(malformed(
                    def,
                    bb.offset(),
                    format!("missing required field {}", field.name),
                ));
            }
        }

        Ok(Value::Object(def.name.as_str(), fields))
    }

    /// Encodes this object into bytes using the provided `schema`. Fields are
    /// written in declaration order; absent fields are skipped.
    ///
    /// The only failure is a value that names a type, field or enum label the
    /// schema does not declare, or holds a variant its field's kind does not
    /// admit. Both are caller contract violations.
    pub fn encode(&self, schema: &Schema) -> Result<Vec<u8>> {
        let mut bb = ByteBufferMut::new();
        self.encode_bb(schema, &mut bb)?;
        Ok(bb.data())
    }

    /// Encodes the fields of this object to the end of `bb`. This is mainly
    /// useful as a helper routine for [encode](#method.encode).
    pub fn encode_bb(&self, schema: &Schema, bb: &mut ByteBufferMut) -> Result<()> {
        match *self {
            Value::Object(name, ref fields) => {
                let def = schema.message(name)?;
                // Loop over the declared fields to ensure consistent encoding order
                for field in &def.fields {
                    if let Some(value) = fields.get(&field.id) {
                        value.encode_field(schema, def, field, bb)?;
                    }
                }
                Ok(())
            }
            _ => Err(WireError::type_not_found(self.kind_name())),
        }
    }

    fn encode_field(&self, schema: &Schema, def: &Def, field: &Field, bb: &mut ByteBufferMut) -> Result<()> {
        let id = field.id;
        match (&field.kind, self) {
            (_, Value::Absent) => {}
            (FieldKind::Int, Value::Int(value)) => {
                bb.write_key(id, WireType::Varint);
                bb.write_var_int64(*value);
            }
            (FieldKind::Bool, Value::Bool(value)) => {
                bb.write_key(id, WireType::Varint);
                bb.write_bool(*value);
            }
            (FieldKind::Float, Value::Float(value)) => {
                bb.write_key(id, WireType::Fixed64);
                bb.write_double(*value);
            }
            (FieldKind::Text, Value::Text(value)) => {
                bb.write_key(id, WireType::LengthDelimited);
                bb.write_string(value);
            }
            (FieldKind::Enum(ty), Value::Enum(name, label)) if ty == name => {
                let member = schema.enumeration(name)?.field(label)?;
                bb.write_key(id, WireType::Varint);
                bb.write_var_uint64(member.id as u64);
            }
            (FieldKind::Message(ty), Value::Object(name, _)) if ty == name => {
                self.encode_nested(schema, id, bb)?;
            }
            (FieldKind::RepeatedMessage(ty), Value::Array(_, values)) => {
                for value in values {
                    match value {
                        Value::Object(name, _) if ty == name => value.encode_nested(schema, id, bb)?,
                        other => return Err(kind_mismatch(def, field, other)),
                    }
                }
            }
            (_, other) => return Err(kind_mismatch(def, field, other)),
        }
        Ok(())
    }

    fn encode_nested(&self, schema: &Schema, id: u32, bb: &mut ByteBufferMut) -> Result<()> {
        let mut nested = ByteBufferMut::new();
        self.encode_bb(schema, &mut nested)?;
        bb.write_key(id, WireType::LengthDelimited);
        bb.write_length_delimited(&nested.data());
        Ok(())
    }
}

/// A value whose variant the field's declared kind does not admit.
fn kind_mismatch(def: &Def, field: &Field, value: &Value) -> WireError {
    debug!(type_name = %def.name, field = %field.name, kind = value.kind_name(), "value does not fit field kind");
    WireError::field_not_found(&def.name, &format!("{} as {}", field.name, value.kind_name()))
}

fn malformed(def: &Def, offset: usize, reason: String) -> WireError {
    WireError::Malformed {
        offset,
        type_name: def.name.clone(),
        reason,
    }
}

/// Fields that take part in equality: absent entries and empty repeated
/// fields are indistinguishable from missing ones on the wire.
fn present<'v, 'a>(
    fields: &'v BTreeMap<u32, Value<'a>>,
) -> impl Iterator<Item = (&'v u32, &'v Value<'a>)> {
    fields.iter().filter(|(_, value)| match value {
        Value::Absent => false,
        Value::Array(_, values) => !values.is_empty(),
        _ => true,
    })
}

impl<'a> PartialEq for Value<'a> {
    /// Structural equality. Floats compare by bit pattern, object fields by id.
    fn eq(&self, other: &Value<'a>) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Enum(t1, l1), Value::Enum(t2, l2)) => t1 == t2 && l1 == l2,
            (Value::Object(n1, f1), Value::Object(n2, f2)) => n1 == n2 && present(f1).eq(present(f2)),
            (Value::Array(n1, v1), Value::Array(n2, v2)) => n1 == n2 && v1 == v2,
            (Value::Absent, Value::Absent) => true,
            _ => false,
        }
    }
}

impl<'a> Index<usize> for Value<'a> {
    type Output = Value<'a>;

    /// A convenience method that adds support for `self[index]` expressions.
    /// It will panic if this value isn't an [Array](#variant.Array) or if the
    /// provided index is out of bounds.
    fn index(&self, index: usize) -> &Value<'a> {
        match *self {
            Value::Array(_, ref values) => &values[index],
            _ => panic!("cannot index a {} value", self.kind_name()),
        }
    }
}

impl<'a> fmt::Debug for Value<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::Int(value) => fmt::Debug::fmt(&value, f),
            Value::Float(value) => fmt::Debug::fmt(&value, f),
            Value::Bool(value) => fmt::Debug::fmt(&value, f),
            Value::Text(ref value) => fmt::Debug::fmt(value, f),
            Value::Enum(name, label) => write!(f, "{}::{}", name, label),
            Value::Array(_, ref values) => fmt::Debug::fmt(values, f),
            Value::Absent => write!(f, "<absent>"),

            Value::Object(name, ref fields) => {
                let mut first = true;
                write!(f, "{} {{", name)?;
                for (id, value) in present(fields) {
                    if first {
                        first = false;
                    } else {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {:?}", id, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// Builds an object by field name, checking every name and enum label
/// against the schema.
pub struct ObjectBuilder<'a> {
    schema: &'a Schema,
    def:    &'a Def,
    fields: BTreeMap<u32, Value<'a>>,
}

impl<'a> ObjectBuilder<'a> {
    pub fn new(schema: &'a Schema, type_name: &str) -> Result<ObjectBuilder<'a>> {
        Ok(ObjectBuilder {
            schema,
            def: schema.message(type_name)?,
            fields: BTreeMap::new(),
        })
    }

    pub fn set(mut self, name: &str, value: Value<'a>) -> Result<ObjectBuilder<'a>> {
        let field = self.def.field(name)?;
        self.fields.insert(field.id, value);
        Ok(self)
    }

    /// Like [set](#method.set) but quietly skips fields this schema version
    /// does not declare.
    pub fn set_if_declared(self, name: &str, value: Value<'a>) -> Result<ObjectBuilder<'a>> {
        if self.def.get_field(name).is_some() {
            self.set(name, value)
        } else {
            Ok(self)
        }
    }

    pub fn text(self, name: &str, value: &str) -> Result<ObjectBuilder<'a>> {
        self.set(name, Value::Text(value.to_owned()))
    }

    pub fn float(self, name: &str, value: f64) -> Result<ObjectBuilder<'a>> {
        self.set(name, Value::Float(value))
    }

    pub fn flag(self, name: &str, value: bool) -> Result<ObjectBuilder<'a>> {
        self.set(name, Value::Bool(value))
    }

    /// Sets an enum field to the member named `label`.
    pub fn label(self, name: &str, label: &str) -> Result<ObjectBuilder<'a>> {
        let field = self.def.field(name)?;
        let ty = field
            .kind
            .type_name()
            .ok_or_else(|| WireError::field_not_found(&self.def.name, name))?;
        let enum_def = self.schema.enumeration(ty)?;
        let member = enum_def.field(label)?;
        let value = Value::Enum(enum_def.name.as_str(), member.name.as_str());
        self.set(name, value)
    }

    /// Appends an element to a repeated field.
    pub fn push(mut self, name: &str, value: Value<'a>) -> Result<ObjectBuilder<'a>> {
        let field = self.def.field(name)?;
        let element_type = match field.kind {
            FieldKind::RepeatedMessage(ref ty) => self.schema.message(ty)?.name.as_str(),
            _ => return Err(WireError::field_not_found(&self.def.name, name)),
        };
        self.fields
            .entry(field.id)
            .or_insert_with(|| Value::Array(element_type, Vec::new()))
            .push(value);
        Ok(self)
    }

    pub fn build(self) -> Value<'a> {
        Value::Object(self.def.name.as_str(), self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DefKind, Presence};

    fn schema() -> Schema {
        Schema::new(vec![
            Def::new(
                "Color",
                DefKind::Enum,
                vec![Field::member("UNKNOWN", 0), Field::member("RED", 1), Field::member("GREEN", 2)],
            ),
            Def::new(
                "Point",
                DefKind::Message,
                vec![
                    Field::new(1, "x", FieldKind::Float, Presence::Required),
                    Field::new(
                        2,
                        "label",
                        FieldKind::Text,
                        Presence::OptionalWithDefault(DefaultValue::Text("none".into())),
                    ),
                    Field::new(3, "count", FieldKind::Int, Presence::OptionalNoDefault),
                    Field::new(4, "on", FieldKind::Bool, Presence::OptionalNoDefault),
                    Field::new(
                        5,
                        "color",
                        FieldKind::Enum("Color".into()),
                        Presence::OptionalWithDefault(DefaultValue::Enum("RED".into())),
                    ),
                ],
            ),
            // Declaration order deliberately differs from id order
            Def::new(
                "Shape",
                DefKind::Message,
                vec![
                    Field::new(1, "name", FieldKind::Text, Presence::Required),
                    Field::new(3, "center", FieldKind::Message("Point".into()), Presence::OptionalNoDefault),
                    Field::new(2, "points", FieldKind::RepeatedMessage("Point".into()), Presence::OptionalNoDefault),
                ],
            ),
        ])
    }

    fn point<'a>(schema: &'a Schema, x: f64) -> Value<'a> {
        ObjectBuilder::new(schema, "Point").unwrap().float("x", x).unwrap().build()
    }

    fn point_bytes(x: f64) -> Vec<u8> {
        let mut bytes = vec![0x09];
        bytes.extend_from_slice(&x.to_bits().to_le_bytes());
        bytes
    }

    #[test]
    fn value_basic() {
        let schema = schema();
        let value = ObjectBuilder::new(&schema, "Point")
            .unwrap()
            .float("x", 0.5)
            .unwrap()
            .text("label", "abc")
            .unwrap()
            .label("color", "GREEN")
            .unwrap()
            .build();

        assert_eq!(value.type_name(), Some("Point"));
        assert_eq!(value.get(1), Some(&Value::Float(0.5)));
        assert_eq!(value.get_named(&schema, "label").map(|v| v.as_text()), Some("abc"));
        assert_eq!(value.get_named(&schema, "color").map(|v| v.as_enum()), Some(("Color", "GREEN")));
        assert_eq!(value.get(3), None);
        assert_eq!(value.get_named(&schema, "missing"), None);
        assert_eq!(format!("{:?}", value), "Point {1: 0.5, 2: \"abc\", 5: Color::GREEN}");
    }

    #[test]
    fn value_set_and_remove() {
        let mut value = Value::object("Point");
        value.set(1, Value::Float(1.0));
        value.set(3, Value::Absent);
        assert_eq!(value.get(1), Some(&Value::Float(1.0)));
        assert_eq!(value.get(3), None);
        value.remove(1);
        assert_eq!(value.get(1), None);
    }

    #[test]
    fn value_defaults() {
        let schema = schema();
        let value = point(&schema, 2.0);
        assert_eq!(value.get_or_default(&schema, "label"), Some(Value::Text("none".into())));
        assert_eq!(value.get_or_default(&schema, "color"), Some(Value::Enum("Color", "RED")));
        assert_eq!(value.get_or_default(&schema, "count"), None);
        assert_eq!(value.get_or_default(&schema, "x"), Some(Value::Float(2.0)));
    }

    #[test]
    fn equality_ignores_absent_and_empty_repeated() {
        let mut a = Value::object("Shape");
        a.set(1, Value::Text("s".into()));
        let mut b = a.clone();
        b.set(3, Value::Absent);
        b.set(2, Value::Array("Point", vec![]));
        assert_eq!(a, b);

        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(
            Value::Array("Point", vec![Value::object("Point"), point_of(1.0)]),
            Value::Array("Point", vec![point_of(1.0), Value::object("Point")])
        );

        fn point_of<'a>(x: f64) -> Value<'a> {
            let mut p = Value::object("Point");
            p.set(1, Value::Float(x));
            p
        }
    }

    #[test]
    fn encode_byte_layout() {
        let schema = schema();
        let value = ObjectBuilder::new(&schema, "Point")
            .unwrap()
            .set("on", Value::Bool(true))
            .unwrap()
            .set("count", Value::Int(-1))
            .unwrap()
            .label("color", "GREEN")
            .unwrap()
            .text("label", "a")
            .unwrap()
            .float("x", 1.0)
            .unwrap()
            .build();

        assert_eq!(
            value.encode(&schema).unwrap(),
            [
                0x09, 0, 0, 0, 0, 0, 0, 0xF0, 0x3F, // x
                0x12, 1, 97, // label
                0x18, 1, // count
                0x20, 1, // on
                0x28, 2, // color
            ]
        );
    }

    #[test]
    fn encode_follows_declaration_order() {
        let schema = schema();
        let shape = ObjectBuilder::new(&schema, "Shape")
            .unwrap()
            .push("points", point(&schema, 1.0))
            .unwrap()
            .set("center", point(&schema, 0.0))
            .unwrap()
            .text("name", "s")
            .unwrap()
            .build();

        let mut expected = vec![0x0A, 1, b's', 0x1A, 9];
        expected.extend(point_bytes(0.0));
        expected.extend([0x12, 9]);
        expected.extend(point_bytes(1.0));
        assert_eq!(shape.encode(&schema).unwrap(), expected);
    }

    #[test]
    fn encode_rejects_undeclared_labels() {
        let schema = schema();
        let mut value = point(&schema, 1.0);
        value.set(5, Value::Enum("Color", "BLUE"));
        assert!(matches!(value.encode(&schema), Err(WireError::SchemaNotFound { .. })));
        assert!(matches!(Value::Int(1).encode(&schema), Err(WireError::SchemaNotFound { .. })));
    }

    #[test]
    fn encode_rejects_values_of_the_wrong_kind() {
        let schema = schema();
        let mut value = point(&schema, 1.0);
        value.set(1, Value::Text("1.0".into()));
        match value.encode(&schema) {
            Err(WireError::SchemaNotFound { type_name, field }) => {
                assert_eq!(type_name, "Point");
                assert_eq!(field.as_deref(), Some("x as text"));
            }
            other => panic!("expected SchemaNotFound, got {:?}", other),
        }

        let mut shape = Value::object("Shape");
        shape.set(3, point(&schema, 0.0));
        shape.set(2, Value::Array("Point", vec![Value::Int(3)]));
        assert!(matches!(shape.encode(&schema), Err(WireError::SchemaNotFound { .. })));

        let mut shape = Value::object("Shape");
        shape.set(3, Value::Array("Point", vec![point(&schema, 0.0)]));
        assert!(matches!(shape.encode(&schema), Err(WireError::SchemaNotFound { .. })));

        let mut value = point(&schema, 1.0);
        value.set(5, Value::Enum("Shade", "GREEN"));
        assert!(matches!(value.encode(&schema), Err(WireError::SchemaNotFound { .. })));
    }

    #[test]
    fn round_trip() {
        let schema = schema();
        let shape = ObjectBuilder::new(&schema, "Shape")
            .unwrap()
            .text("name", "triangle")
            .unwrap()
            .push("points", point(&schema, 0.0))
            .unwrap()
            .push("points", point(&schema, -1.25))
            .unwrap()
            .push("points", point(&schema, f64::INFINITY))
            .unwrap()
            .set("center", point(&schema, 1.0 / 3.0))
            .unwrap()
            .build();

        let bytes = shape.encode(&schema).unwrap();
        let decoded = Value::decode(&schema, "Shape", &bytes).unwrap();
        assert_eq!(decoded, shape);
        assert_eq!(decoded.get(2).map(|v| v.len()), Some(3));
        assert_eq!(decoded.get(2).unwrap()[1].get(1), Some(&Value::Float(-1.25)));
    }

    #[test]
    fn decode_preserves_interleaved_repeated_order() {
        let schema = schema();
        let mut bytes = vec![0x12, 9];
        bytes.extend(point_bytes(1.0));
        bytes.extend([0x0A, 1, b's', 0x12, 9]);
        bytes.extend(point_bytes(2.0));

        let decoded = Value::decode(&schema, "Shape", &bytes).unwrap();
        let points = decoded.get(2).unwrap();
        assert_eq!(points.as_array().iter().map(|p| p.get(1).unwrap().as_float()).collect::<Vec<_>>(), [1.0, 2.0]);
    }

    #[test]
    fn decode_skips_unknown_fields() {
        let schema = schema();
        let mut bytes = point_bytes(4.0);
        bytes.extend([0x4A, 2, 0xAA, 0xBB]); // id 9, length-delimited
        bytes.extend([0x51, 1, 2, 3, 4, 5, 6, 7, 8]); // id 10, fixed64
        bytes.extend([0x58, 0xAC, 0x02]); // id 11, varint

        assert_eq!(Value::decode(&schema, "Point", &bytes).unwrap(), point(&schema, 4.0));
    }

    #[test]
    fn decode_unknown_enum_value_as_unknown() {
        let schema = schema();
        let mut bytes = point_bytes(1.0);
        bytes.extend([0x28, 9]);
        let decoded = Value::decode(&schema, "Point", &bytes).unwrap();
        assert_eq!(decoded.get(5), Some(&Value::Enum("Color", "UNKNOWN")));
    }

    #[test]
    fn decode_rejects_truncated_length() {
        let schema = schema();
        let mut bytes = vec![0x0A, 50];
        bytes.extend_from_slice(&[b'x'; 10]);
        match Value::decode(&schema, "Shape", &bytes) {
            Err(WireError::Malformed { offset, type_name, reason }) => {
                assert_eq!(offset, 1);
                assert_eq!(type_name, "Shape");
                assert!(reason.contains("50"), "{}", reason);
            }
            other => panic!("expected Malformed, got {:?}", other),
        }

        // Truncated inside a nested message
        let mut bytes = vec![0x0A, 1, b's', 0x1A, 9];
        bytes.extend(&point_bytes(1.0)[..5]);
        assert!(matches!(Value::decode(&schema, "Shape", &bytes), Err(WireError::Malformed { .. })));
    }

    #[test]
    fn decode_rejects_missing_required_field() {
        let schema = schema();
        match Value::decode(&schema, "Point", &[0x20, 1]) {
            Err(WireError::Malformed { reason, .. }) => assert!(reason.contains("x"), "{}", reason),
            other => panic!("expected Malformed, got {:?}", other),
        }

        // A required field missing from a nested message fails the whole decode
        let bytes = [0x0A, 1, b's', 0x1A, 2, 0x20, 1];
        match Value::decode(&schema, "Shape", &bytes) {
            Err(WireError::Malformed { type_name, .. }) => assert_eq!(type_name, "Point"),
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn decode_rejects_bad_framing() {
        let schema = schema();
        // x sent as varint
        assert!(matches!(Value::decode(&schema, "Point", &[0x08, 1]), Err(WireError::Malformed { .. })));
        // wire type 5 is not part of the format
        assert!(matches!(Value::decode(&schema, "Point", &[0x0D, 0, 0, 0, 0]), Err(WireError::Malformed { .. })));
        // field id 0
        assert!(matches!(Value::decode(&schema, "Point", &[0x00]), Err(WireError::Malformed { .. })));
        // invalid UTF-8 text
        let mut bytes = point_bytes(1.0);
        bytes.extend([0x12, 1, 0xFF]);
        assert!(matches!(Value::decode(&schema, "Point", &bytes), Err(WireError::Malformed { .. })));
    }

    #[test]
    fn decode_respects_varint_limit() {
        let schema = schema();
        let mut bytes = point_bytes(1.0);
        bytes.extend([0x18, 0x80, 0x80, 0x01]);
        assert!(Value::decode(&schema, "Point", &bytes).is_ok());

        let options = DecodeOptions { max_varint_bytes: 2 };
        assert!(matches!(
            Value::decode_with(&schema, "Point", &bytes, &options),
            Err(WireError::Malformed { .. })
        ));

        let mut bytes = point_bytes(1.0);
        bytes.push(0x18);
        bytes.extend([0xFF; 11]);
        assert!(matches!(Value::decode(&schema, "Point", &bytes), Err(WireError::Malformed { .. })));
    }

    #[test]
    fn decode_unknown_type_is_schema_error() {
        let schema = schema();
        assert!(matches!(Value::decode(&schema, "Color", &[]), Err(WireError::SchemaNotFound { .. })));
        assert!(matches!(Value::decode(&schema, "Line", &[]), Err(WireError::SchemaNotFound { .. })));
    }
}
