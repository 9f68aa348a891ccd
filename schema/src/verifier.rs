use std::collections::{HashMap, HashSet};
use crate::{
    error::{Result, WireError},
    schema::{Def, DefKind, DefaultValue, FieldKind, Presence, Schema},
    utils::quote,
};

fn invalid(message: String) -> WireError {
    WireError::InvalidSchema(message)
}

/// Returns `Ok(())` if verification passed, or `Err(WireError::InvalidSchema(_))` otherwise.
pub fn verify_schema(schema: &Schema) -> Result<()> {
    // 1) Check duplicate type names
    let mut defined: HashMap<&str, DefKind> = HashMap::new();
    for def in &schema.defs {
        if defined.insert(def.name.as_str(), def.kind).is_some() {
            return Err(invalid(format!("The type {} is defined twice", quote(&def.name))));
        }
    }

    // 2) Check the members and fields of each definition
    for def in &schema.defs {
        match def.kind {
            DefKind::Enum => verify_enum(def)?,
            DefKind::Message => verify_message(schema, def, &defined)?,
        }
    }

    // 3) Check that messages do not contain themselves, directly or not
    let mut state: HashMap<&str, u8> = HashMap::new();
    fn check_recursion<'s>(
        name: &'s str,
        schema: &'s Schema,
        state: &mut HashMap<&'s str, u8>,
    ) -> Result<()> {
        let def = match schema.get_def(name) {
            Some(def) if def.kind == DefKind::Message => def,
            _ => return Ok(()),
        };
        match state.get(name).copied() {
            Some(1) => {
                return Err(invalid(format!(
                    "Recursive nesting of {} is not allowed",
                    quote(name)
                )))
            }
            Some(2) => return Ok(()),
            _ => {}
        }
        state.insert(name, 1);
        for field in &def.fields {
            if let FieldKind::Message(ref ty) | FieldKind::RepeatedMessage(ref ty) = field.kind {
                check_recursion(ty, schema, state)?;
            }
        }
        state.insert(name, 2);
        Ok(())
    }

    for def in &schema.defs {
        check_recursion(&def.name, schema, &mut state)?;
    }

    Ok(())
}

fn verify_enum(def: &Def) -> Result<()> {
    if def.fields.is_empty() {
        return Err(invalid(format!("The enum {} has no members", quote(&def.name))));
    }
    let mut names = HashSet::new();
    let mut values = HashSet::new();
    for member in &def.fields {
        if !names.insert(member.name.as_str()) {
            return Err(invalid(format!(
                "The member {} of {} is declared twice",
                quote(&member.name),
                quote(&def.name)
            )));
        }
        if !values.insert(member.id) {
            return Err(invalid(format!(
                "The value for member {} of {} is used twice",
                quote(&member.name),
                quote(&def.name)
            )));
        }
    }
    Ok(())
}

fn verify_message(schema: &Schema, def: &Def, defined: &HashMap<&str, DefKind>) -> Result<()> {
    let mut names = HashSet::new();
    let mut ids = HashSet::new();

    for field in &def.fields {
        if !names.insert(field.name.as_str()) {
            return Err(invalid(format!(
                "The field {} of {} is declared twice",
                quote(&field.name),
                quote(&def.name)
            )));
        }
        if field.id == 0 {
            return Err(invalid(format!("The id for field {} must be positive", quote(&field.name))));
        }
        if !ids.insert(field.id) {
            return Err(invalid(format!("The id for field {} is used twice", quote(&field.name))));
        }
        if def.reserved.contains(&field.id) {
            return Err(invalid(format!(
                "The id {} for field {} is reserved in {}",
                field.id,
                quote(&field.name),
                quote(&def.name)
            )));
        }

        // Check that each referenced type is defined with the right kind
        let expected = match field.kind {
            FieldKind::Enum(_) => Some(DefKind::Enum),
            FieldKind::Message(_) | FieldKind::RepeatedMessage(_) => Some(DefKind::Message),
            _ => None,
        };
        if let (Some(expected), Some(ty)) = (expected, field.kind.type_name()) {
            if defined.get(ty) != Some(&expected) {
                return Err(invalid(format!(
                    "The type {} is not defined for field {}",
                    quote(ty),
                    quote(&field.name)
                )));
            }
        }

        match (&field.presence, &field.kind) {
            (Presence::Required, FieldKind::RepeatedMessage(_)) => {
                return Err(invalid(format!(
                    "The repeated field {} cannot be required",
                    quote(&field.name)
                )));
            }
            (Presence::OptionalWithDefault(value), kind) => {
                let matches = match (value, kind) {
                    (DefaultValue::Int(_), FieldKind::Int)
                    | (DefaultValue::Float(_), FieldKind::Float)
                    | (DefaultValue::Bool(_), FieldKind::Bool)
                    | (DefaultValue::Text(_), FieldKind::Text) => true,
                    (DefaultValue::Enum(label), FieldKind::Enum(ty)) => schema
                        .get_def(ty)
                        .map(|e| e.get_field(label).is_some())
                        .unwrap_or(false),
                    _ => false,
                };
                if !matches {
                    return Err(invalid(format!(
                        "The default for field {} does not fit its kind {}",
                        quote(&field.name),
                        kind
                    )));
                }
            }
            _ => {}
        }
    }

    Ok(())
}
