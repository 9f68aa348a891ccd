use serde_json::{Map, Number, Value as JsonValue};

/// One message instance in name-keyed form, labelled with its message type.
#[derive(Debug, Clone, PartialEq)]
pub struct IrDocument {
    pub type_name: String,
    pub root:      IrObject,
}

/// The fields of one composite node, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IrObject {
    pub fields: Vec<IrField>,
}

#[derive(Debug, Clone)]
pub struct IrField {
    pub name:   String,
    pub value:  IrValue,
    /// Source position when the field came from parsed text, `0` otherwise.
    pub line:   usize,
    pub column: usize,
}

/// Positions are diagnostics only and do not take part in equality.
impl PartialEq for IrField {
    fn eq(&self, other: &IrField) -> bool {
        self.name == other.name && self.value == other.value
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IrValue {
    /// A quoted text scalar.
    Text(String),
    /// A bare scalar: decimal number, `true`/`false` or an enum label.
    Atom(String),
    Object(IrObject),
    /// A repeated nested message.
    List(Vec<IrObject>),
}

impl IrDocument {
    pub fn new(type_name: &str, root: IrObject) -> IrDocument {
        IrDocument {
            type_name: type_name.to_owned(),
            root,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        let mut map = Map::new();
        map.insert(self.type_name.clone(), self.root.to_json());
        JsonValue::Object(map)
    }
}

impl IrObject {
    pub fn new() -> IrObject {
        IrObject::default()
    }

    /// First field with the given name.
    pub fn get(&self, name: &str) -> Option<&IrValue> {
        self.fields.iter().find(|field| field.name == name).map(|field| &field.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn push(&mut self, name: &str, value: IrValue) {
        self.fields.push(IrField {
            name: name.to_owned(),
            value,
            line: 0,
            column: 0,
        });
    }

    /// Builder-style [push](#method.push).
    pub fn with(mut self, name: &str, value: IrValue) -> IrObject {
        self.push(name, value);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Renders the object as JSON. Numeric and boolean atoms become JSON
    /// numbers and booleans; labels and non-finite floats stay strings.
    pub fn to_json(&self) -> JsonValue {
        let mut map = Map::new();
        for field in &self.fields {
            map.insert(field.name.clone(), field.value.to_json());
        }
        JsonValue::Object(map)
    }
}

impl IrValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            IrValue::Text(_) => "text",
            IrValue::Atom(_) => "atom",
            IrValue::Object(_) => "object",
            IrValue::List(_) => "list",
        }
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            IrValue::Atom(text) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IrObject> {
        match self {
            IrValue::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_list(&self) -> &[IrObject] {
        match self {
            IrValue::List(items) => items.as_slice(),
            _ => &[],
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            IrValue::Text(text) => JsonValue::String(text.clone()),
            IrValue::Atom(text) => atom_to_json(text),
            IrValue::Object(object) => object.to_json(),
            IrValue::List(items) => JsonValue::Array(items.iter().map(IrObject::to_json).collect()),
        }
    }
}

fn atom_to_json(text: &str) -> JsonValue {
    match text {
        "true" => return JsonValue::Bool(true),
        "false" => return JsonValue::Bool(false),
        _ => {}
    }
    if let Ok(value) = text.parse::<i64>() {
        return JsonValue::Number(value.into());
    }
    let looks_numeric = text.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '+' || c == '.');
    match text.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(number) if looks_numeric => JsonValue::Number(number),
        _ => JsonValue::String(text.to_owned()),
    }
}
