use crate::{
    transcoder::default_to_ir,
    types::{IrDocument, IrObject, IrValue},
};

use std::collections::HashSet;
use tracing::{debug, warn};
use vehicle_wire_schema::{
    error::{FieldPath, Result, WireError},
    registry::SchemaVersion,
    schema::{Def, Field, FieldKind, Presence, Schema},
    utils::quote,
};

/// A source field with no counterpart in the target definition.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedField {
    pub path:       FieldPath,
    pub type_name:  String,
    pub field_name: String,
}

/// An enum label the target enumeration does not declare, replaced by its
/// fallback member.
#[derive(Debug, Clone, PartialEq)]
pub struct RemappedLabel {
    pub path:      FieldPath,
    pub enum_name: String,
    pub from:      String,
    pub to:        String,
}

/// A successful migration together with its audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct Migration {
    pub document:  IrDocument,
    pub dropped:   Vec<DroppedField>,
    pub remapped:  Vec<RemappedLabel>,
    /// Paths of target fields filled from their declared default.
    pub defaulted: Vec<FieldPath>,
}

impl Migration {
    /// True when nothing was dropped or remapped.
    pub fn is_lossless(&self) -> bool {
        self.dropped.is_empty() && self.remapped.is_empty()
    }
}

/// Migrates `doc` between two registered schema versions.
pub fn migrate(doc: &IrDocument, source: SchemaVersion, target: SchemaVersion) -> Result<Migration> {
    migrate_between(doc, source.schema(), target.schema())
}

/// Maps a document built against `source` onto `target`.
///
/// Target fields are visited in declaration order. A field present in the
/// document is copied, recursing into nested messages. A missing field takes
/// its declared default, is left out when it has none, and fails with
/// `MigrationGap` when it is required. Document fields the target does not
/// declare are dropped and reported. Scalar text is copied verbatim.
pub fn migrate_between(doc: &IrDocument, source: &Schema, target: &Schema) -> Result<Migration> {
    let source_def = source.message(&doc.type_name)?;
    let target_def = target.message(&doc.type_name)?;

    let mut migrator = Migrator {
        source,
        target,
        dropped: Vec::new(),
        remapped: Vec::new(),
        defaulted: Vec::new(),
    };
    let root = migrator.object(&doc.root, Some(source_def), target_def, &FieldPath::root())?;

    Ok(Migration {
        document:  IrDocument::new(&target_def.name, root),
        dropped:   migrator.dropped,
        remapped:  migrator.remapped,
        defaulted: migrator.defaulted,
    })
}

struct Migrator<'s> {
    source:    &'s Schema,
    target:    &'s Schema,
    dropped:   Vec<DroppedField>,
    remapped:  Vec<RemappedLabel>,
    defaulted: Vec<FieldPath>,
}

impl<'s> Migrator<'s> {
    fn object(
        &mut self,
        object: &IrObject,
        source_def: Option<&Def>,
        target_def: &Def,
        path: &FieldPath,
    ) -> Result<IrObject> {
        let mut names = HashSet::new();
        for field in &object.fields {
            if !names.insert(field.name.as_str()) {
                return Err(WireError::ir(
                    &path.child(&field.name),
                    format!("Duplicate field {}", quote(&field.name)),
                ));
            }
        }

        let mut out = IrObject::new();

        for field in &target_def.fields {
            match object.get(&field.name) {
                Some(value) => {
                    let migrated = self.value(value, field, source_def, path)?;
                    out.push(&field.name, migrated);
                }
                None => match field.presence {
                    Presence::Required => {
                        return Err(WireError::MigrationGap {
                            type_name: target_def.name.clone(),
                            field:     field.name.clone(),
                            path:      path.clone(),
                        })
                    }
                    Presence::OptionalWithDefault(ref default) => {
                        let field_path = path.child(&field.name);
                        debug!(path = %field_path, "filling declared default");
                        out.push(&field.name, default_to_ir(default));
                        self.defaulted.push(field_path);
                    }
                    Presence::OptionalNoDefault => {}
                },
            }
        }

        let type_name = source_def.map_or(target_def.name.as_str(), |def| def.name.as_str());
        for field in &object.fields {
            if target_def.get_field(&field.name).is_none() {
                let field_path = path.child(&field.name);
                warn!(path = %field_path, type_name, "dropping field the target schema does not declare");
                self.dropped.push(DroppedField {
                    path:       field_path,
                    type_name:  type_name.to_owned(),
                    field_name: field.name.clone(),
                });
            }
        }

        Ok(out)
    }

    fn value(
        &mut self,
        value: &IrValue,
        field: &Field,
        source_def: Option<&Def>,
        parent: &FieldPath,
    ) -> Result<IrValue> {
        let path = parent.child(&field.name);

        match (&field.kind, value) {
            (FieldKind::Text, IrValue::Text(_))
            | (FieldKind::Int, IrValue::Atom(_))
            | (FieldKind::Float, IrValue::Atom(_))
            | (FieldKind::Bool, IrValue::Atom(_)) => Ok(value.clone()),

            (FieldKind::Enum(ty), IrValue::Atom(label)) => {
                let enum_def = self.target.enumeration(ty)?;
                if enum_def.get_field(label).is_some() {
                    return Ok(value.clone());
                }
                let fallback = enum_def
                    .fallback_member()
                    .ok_or_else(|| WireError::type_not_found(&enum_def.name))?;
                warn!(path = %path, label = %label, fallback = %fallback.name, "remapping enum label");
                self.remapped.push(RemappedLabel {
                    path,
                    enum_name: enum_def.name.clone(),
                    from:      label.clone(),
                    to:        fallback.name.clone(),
                });
                Ok(IrValue::Atom(fallback.name.clone()))
            }

            (FieldKind::Message(ty), IrValue::Object(nested)) => {
                let target_def = self.target.message(ty)?;
                let source_def = self.nested_source(source_def, &field.name);
                Ok(IrValue::Object(self.object(nested, source_def, target_def, &path)?))
            }

            (FieldKind::RepeatedMessage(ty), IrValue::List(items)) => {
                let target_def = self.target.message(ty)?;
                let source_def = self.nested_source(source_def, &field.name);
                let mut list = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let element_path = parent.element(&field.name, i);
                    list.push(self.object(item, source_def, target_def, &element_path)?);
                }
                Ok(IrValue::List(list))
            }

            (kind, value) => Err(WireError::ir(
                &path,
                format!("Expected a value of kind {} but found {}", kind, value.kind_name()),
            )),
        }
    }

    /// The source definition of the message held by `name`, when the source
    /// declares that field as a message.
    fn nested_source(&self, source_def: Option<&Def>, name: &str) -> Option<&'s Def> {
        let ty = source_def?.get_field(name)?.kind.type_name()?;
        self.source.get_def(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;
    use vehicle_wire_schema::schema::{DefKind, DefaultValue};

    const V1_OBJECT: &str = r#"
        DetectedObject {
          id: "obj_001";
          classification: "vehicle";
          x_position: 25.3;
          confidence: 0.95;
          is_moving: true;
        }
    "#;

    #[test]
    fn drops_retired_confidence() {
        let doc = parse_document(V1_OBJECT).unwrap();
        let migration = migrate(&doc, SchemaVersion::V1, SchemaVersion::V2).unwrap();

        assert_eq!(
            migration.dropped,
            [DroppedField {
                path:       FieldPath::root().child("confidence"),
                type_name:  "DetectedObject".into(),
                field_name: "confidence".into(),
            }]
        );
        assert!(!migration.document.root.contains("confidence"));
        assert!(!migration.is_lossless());
        assert_eq!(migration.document.root.get("x_position").and_then(IrValue::as_atom), Some("25.3"));
    }

    #[test]
    fn fills_defaults_in_target_order() {
        let doc = parse_document(V1_OBJECT).unwrap();
        let migration = migrate(&doc, SchemaVersion::V1, SchemaVersion::V2).unwrap();
        let names: Vec<&str> = migration.document.root.names().collect();
        assert_eq!(
            names,
            [
                "id", "classification", "x_position", "y_position", "z_position", "x_velocity",
                "y_velocity", "width", "length", "height", "is_moving",
            ]
        );
        assert_eq!(migration.document.root.get("width").and_then(IrValue::as_atom), Some("0.0"));
        assert_eq!(migration.defaulted.len(), 7);
        assert_eq!(migration.defaulted[0].to_string(), "y_position");
    }

    #[test]
    fn does_not_invent_retired_fields() {
        // V2 -> V1: confidence has no default in V1, so it stays absent
        let doc = parse_document("DetectedObject { id: \"a\"; }").unwrap();
        let migration = migrate(&doc, SchemaVersion::V2, SchemaVersion::V1).unwrap();
        assert!(!migration.document.root.contains("confidence"));
        assert!(migration.is_lossless());
    }

    #[test]
    fn nested_paths_are_reported() {
        let text = r#"
            VehicleState {
              vehicle_id: "ADV";
              timestamp: 1.0;
              sensor_data: [
                { type: LIDAR; objects: [ { id: "a"; }, { id: "b"; confidence: 0.5; } ]; },
                { type: CAMERA; objects: [ { id: "c"; confidence: 0.7; } ]; }
              ];
            }
        "#;
        let doc = parse_document(text).unwrap();
        let migration = migrate(&doc, SchemaVersion::V1, SchemaVersion::V2).unwrap();
        let paths: Vec<String> = migration.dropped.iter().map(|d| d.path.to_string()).collect();
        assert_eq!(paths, ["sensor_data[0].objects[1].confidence", "sensor_data[1].objects[0].confidence"]);
        assert!(migration.document.root.get("latest_command").is_none());
    }

    #[test]
    fn missing_required_field_is_a_gap() {
        let doc = parse_document("VehicleState { vehicle_id: \"ADV\"; sensor_data: [ { objects: []; } ]; timestamp: 2.0; }").unwrap();
        match migrate(&doc, SchemaVersion::V1, SchemaVersion::V2) {
            Err(WireError::MigrationGap { type_name, field, path }) => {
                assert_eq!(type_name, "SensorData");
                assert_eq!(field, "type");
                assert_eq!(path.to_string(), "sensor_data[0]");
            }
            other => panic!("expected MigrationGap, got {:?}", other),
        }
    }

    #[test]
    fn scalars_are_copied_verbatim() {
        let doc = parse_document("SensorData { type: RADAR; confidence: 1.7; max_range: -inf; }").unwrap();
        let migration = migrate(&doc, SchemaVersion::V1, SchemaVersion::V2).unwrap();
        assert_eq!(migration.document.root.get("confidence").and_then(IrValue::as_atom), Some("1.7"));
        assert_eq!(migration.document.root.get("max_range").and_then(IrValue::as_atom), Some("-inf"));
    }

    #[test]
    fn unknown_labels_map_to_fallback() {
        let enum_with = |labels: &[&str]| {
            let members = labels.iter().enumerate().map(|(i, l)| Field::member(l, i as u32)).collect();
            Def::new("Mode", DefKind::Enum, members)
        };
        let message = || {
            Def::new(
                "Car",
                DefKind::Message,
                vec![Field::new(
                    1,
                    "mode",
                    FieldKind::Enum("Mode".into()),
                    Presence::OptionalWithDefault(DefaultValue::Enum("UNKNOWN".into())),
                )],
            )
        };
        let source = Schema::new(vec![enum_with(&["UNKNOWN", "MANUAL", "AUTO", "TELEOP"]), message()]);
        let target = Schema::new(vec![enum_with(&["UNKNOWN", "MANUAL", "AUTO"]), message()]);

        let doc = parse_document("Car { mode: TELEOP; }").unwrap();
        let migration = migrate_between(&doc, &source, &target).unwrap();
        assert_eq!(migration.document.root.get("mode").and_then(IrValue::as_atom), Some("UNKNOWN"));
        assert_eq!(
            migration.remapped,
            [RemappedLabel {
                path:      FieldPath::root().child("mode"),
                enum_name: "Mode".into(),
                from:      "TELEOP".into(),
                to:        "UNKNOWN".into(),
            }]
        );

        let doc = parse_document("Car { mode: AUTO; }").unwrap();
        assert!(migrate_between(&doc, &source, &target).unwrap().is_lossless());
    }

    #[test]
    fn input_is_not_mutated() {
        let doc = parse_document(V1_OBJECT).unwrap();
        let before = doc.clone();
        let _ = migrate(&doc, SchemaVersion::V1, SchemaVersion::V2).unwrap();
        assert_eq!(doc, before);
    }

    #[test]
    fn rejects_shape_mismatch_and_unknown_types() {
        let doc = parse_document("SensorData { type: LIDAR; objects: \"none\"; }").unwrap();
        match migrate(&doc, SchemaVersion::V1, SchemaVersion::V2) {
            Err(WireError::IrParse { path, .. }) => assert_eq!(path.to_string(), "objects"),
            other => panic!("expected IrParse, got {:?}", other),
        }

        let doc = parse_document("Trajectory { }").unwrap();
        assert!(matches!(
            migrate(&doc, SchemaVersion::V1, SchemaVersion::V2),
            Err(WireError::SchemaNotFound { .. })
        ));
    }

    #[test]
    fn same_version_is_identity_for_complete_documents() {
        let text = "ControlCommand { steering_angle: 2.5; throttle: 0.35; brake: 0.0; turn_signal_left: false; \
                    turn_signal_right: false; target_speed: 16.0; command_source: \"PlanningAlgorithm\"; execution_time: 0.1; }";
        let doc = parse_document(text).unwrap();
        let migration = migrate(&doc, SchemaVersion::V2, SchemaVersion::V2).unwrap();
        assert_eq!(migration.document, doc);
        assert!(migration.defaulted.is_empty());
    }
}
