use crate::types::{IrDocument, IrObject, IrValue};
use std::fmt;
use vehicle_wire_schema::utils::quote;

/// Renders a document in the text form accepted by
/// [parse_document](../parser/fn.parse_document.html), one field per line.
pub fn write_document(doc: &IrDocument) -> String {
    let mut out = String::new();
    out.push_str(&doc.type_name);
    out.push(' ');
    write_object(&doc.root, 0, &mut out);
    out.push('\n');
    out
}

fn indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_object(object: &IrObject, depth: usize, out: &mut String) {
    if object.is_empty() {
        out.push_str("{}");
        return;
    }

    out.push_str("{\n");
    for field in &object.fields {
        indent(depth + 1, out);
        out.push_str(&field.name);
        out.push_str(": ");
        write_value(&field.value, depth + 1, out);
        out.push_str(";\n");
    }
    indent(depth, out);
    out.push('}');
}

fn write_value(value: &IrValue, depth: usize, out: &mut String) {
    match value {
        IrValue::Text(text) => out.push_str(&quote(text)),
        IrValue::Atom(text) => out.push_str(text),
        IrValue::Object(object) => write_object(object, depth, out),
        IrValue::List(items) if items.is_empty() => out.push_str("[]"),
        IrValue::List(items) => {
            out.push_str("[\n");
            for (i, item) in items.iter().enumerate() {
                indent(depth + 1, out);
                write_object(item, depth + 1, out);
                if i + 1 < items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            indent(depth, out);
            out.push(']');
        }
    }
}

impl fmt::Display for IrDocument {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&write_document(self))
    }
}
