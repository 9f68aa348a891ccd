//! Compiled-in definitions of the two telemetry schema versions.
//!
//! Both versions share one shape; V2 retires `DetectedObject.confidence`
//! (field 11). Each schema is built and verified on first access and is
//! read-only afterwards, so references handed out by [`schema`] can be shared
//! freely across threads.

use crate::{
    error::WireError,
    schema::{Def, DefKind, DefaultValue, Field, FieldKind, Presence, Schema},
    verifier::verify_schema,
};
use lazy_static::lazy_static;
use std::fmt;
use std::str::FromStr;

pub const VEHICLE_STATE: &str = "VehicleState";
pub const SENSOR_DATA: &str = "SensorData";
pub const SENSOR_TYPE: &str = "SensorType";
pub const DETECTED_OBJECT: &str = "DetectedObject";
pub const CONTROL_COMMAND: &str = "ControlCommand";

/// Field id of `DetectedObject.confidence` in V1, reserved in V2.
pub const DETECTED_OBJECT_CONFIDENCE_ID: u32 = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaVersion {
    V1,
    V2,
}

impl SchemaVersion {
    pub const ALL: [SchemaVersion; 2] = [SchemaVersion::V1, SchemaVersion::V2];

    pub fn schema(self) -> &'static Schema {
        schema(self)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SchemaVersion::V1 => write!(f, "v1"),
            SchemaVersion::V2 => write!(f, "v2"),
        }
    }
}

impl FromStr for SchemaVersion {
    type Err = WireError;

    fn from_str(text: &str) -> Result<SchemaVersion, WireError> {
        match text.to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(SchemaVersion::V1),
            "v2" | "2" => Ok(SchemaVersion::V2),
            _ => Err(WireError::UnknownVersion(text.to_owned())),
        }
    }
}

lazy_static! {
    static ref SCHEMA_V1: Schema = build(SchemaVersion::V1);
    static ref SCHEMA_V2: Schema = build(SchemaVersion::V2);
}

/// The registered schema for `version`.
pub fn schema(version: SchemaVersion) -> &'static Schema {
    match version {
        SchemaVersion::V1 => &SCHEMA_V1,
        SchemaVersion::V2 => &SCHEMA_V2,
    }
}

fn build(version: SchemaVersion) -> Schema {
    let schema = Schema::new(vec![
        sensor_type(),
        detected_object(version),
        sensor_data(),
        control_command(),
        vehicle_state(),
    ]);
    if let Err(err) = verify_schema(&schema) {
        panic!("registered schema {} failed verification: {}", version, err);
    }
    schema
}

fn float(id: u32, name: &str) -> Field {
    Field::new(id, name, FieldKind::Float, Presence::OptionalWithDefault(DefaultValue::Float(0.0)))
}

fn flag(id: u32, name: &str) -> Field {
    Field::new(id, name, FieldKind::Bool, Presence::OptionalWithDefault(DefaultValue::Bool(false)))
}

fn text(id: u32, name: &str) -> Field {
    Field::new(
        id,
        name,
        FieldKind::Text,
        Presence::OptionalWithDefault(DefaultValue::Text(String::new())),
    )
}

fn sensor_type() -> Def {
    Def::new(
        SENSOR_TYPE,
        DefKind::Enum,
        vec![
            Field::member("UNKNOWN", 0),
            Field::member("LIDAR", 1),
            Field::member("RADAR", 2),
            Field::member("CAMERA", 3),
            Field::member("ULTRASONIC", 4),
        ],
    )
}

fn detected_object(version: SchemaVersion) -> Def {
    let mut fields = vec![
        Field::new(1, "id", FieldKind::Text, Presence::Required),
        text(2, "classification"),
        float(3, "x_position"),
        float(4, "y_position"),
        float(5, "z_position"),
        float(6, "x_velocity"),
        float(7, "y_velocity"),
        float(8, "width"),
        float(9, "length"),
        float(10, "height"),
    ];
    if version == SchemaVersion::V1 {
        fields.push(Field::new(
            DETECTED_OBJECT_CONFIDENCE_ID,
            "confidence",
            FieldKind::Float,
            Presence::OptionalNoDefault,
        ));
    }
    fields.push(flag(12, "is_moving"));

    let def = Def::new(DETECTED_OBJECT, DefKind::Message, fields);
    match version {
        SchemaVersion::V1 => def,
        SchemaVersion::V2 => def.with_reserved(&[DETECTED_OBJECT_CONFIDENCE_ID]),
    }
}

fn sensor_data() -> Def {
    Def::new(
        SENSOR_DATA,
        DefKind::Message,
        vec![
            Field::new(1, "type", FieldKind::Enum(SENSOR_TYPE.to_owned()), Presence::Required),
            float(2, "horizontal_fov"),
            float(3, "vertical_fov"),
            float(4, "max_range"),
            float(5, "confidence"),
            flag(6, "is_calibrated"),
            Field::new(
                7,
                "objects",
                FieldKind::RepeatedMessage(DETECTED_OBJECT.to_owned()),
                Presence::OptionalNoDefault,
            ),
        ],
    )
}

fn control_command() -> Def {
    Def::new(
        CONTROL_COMMAND,
        DefKind::Message,
        vec![
            float(1, "steering_angle"),
            float(2, "throttle"),
            float(3, "brake"),
            flag(4, "turn_signal_left"),
            flag(5, "turn_signal_right"),
            float(6, "target_speed"),
            text(7, "command_source"),
            float(8, "execution_time"),
        ],
    )
}

fn vehicle_state() -> Def {
    Def::new(
        VEHICLE_STATE,
        DefKind::Message,
        vec![
            Field::new(1, "vehicle_id", FieldKind::Text, Presence::Required),
            Field::new(2, "timestamp", FieldKind::Float, Presence::Required),
            float(3, "speed"),
            float(4, "acceleration"),
            text(5, "current_driving_mode"),
            flag(6, "emergency_stop_activated"),
            Field::new(
                7,
                "sensor_data",
                FieldKind::RepeatedMessage(SENSOR_DATA.to_owned()),
                Presence::OptionalNoDefault,
            ),
            Field::new(
                8,
                "latest_command",
                FieldKind::Message(CONTROL_COMMAND.to_owned()),
                Presence::OptionalNoDefault,
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_versions_verify() {
        for version in SchemaVersion::ALL {
            assert!(verify_schema(schema(version)).is_ok());
            assert!(schema(version).message(VEHICLE_STATE).is_ok());
        }
    }

    #[test]
    fn confidence_is_retired_in_v2() {
        let v1 = schema(SchemaVersion::V1).message(DETECTED_OBJECT).unwrap();
        let v2 = schema(SchemaVersion::V2).message(DETECTED_OBJECT).unwrap();

        let confidence = v1.get_field("confidence").unwrap();
        assert_eq!(confidence.id, DETECTED_OBJECT_CONFIDENCE_ID);
        assert_eq!(confidence.presence, Presence::OptionalNoDefault);

        assert!(v2.get_field("confidence").is_none());
        assert!(v2.get_field_by_id(DETECTED_OBJECT_CONFIDENCE_ID).is_none());
        assert_eq!(v2.reserved, vec![DETECTED_OBJECT_CONFIDENCE_ID]);
        assert_eq!(v1.get_field("is_moving").map(|f| f.id), v2.get_field("is_moving").map(|f| f.id));
    }

    #[test]
    fn ids_agree_across_versions() {
        let v1 = schema(SchemaVersion::V1);
        let v2 = schema(SchemaVersion::V2);
        for def in &v2.defs {
            let old = v1.def(&def.name).unwrap();
            for field in &def.fields {
                assert_eq!(old.get_field(&field.name).map(|f| f.id), Some(field.id));
            }
        }
    }

    #[test]
    fn unknown_lookups_fail() {
        let v1 = schema(SchemaVersion::V1);
        assert!(matches!(v1.message("Trajectory"), Err(WireError::SchemaNotFound { .. })));
        assert!(matches!(
            v1.message(SENSOR_DATA).unwrap().field("range"),
            Err(WireError::SchemaNotFound { .. })
        ));
    }

    #[test]
    fn parse_versions() {
        assert_eq!("v1".parse::<SchemaVersion>().unwrap(), SchemaVersion::V1);
        assert_eq!("V2".parse::<SchemaVersion>().unwrap(), SchemaVersion::V2);
        assert_eq!("2".parse::<SchemaVersion>().unwrap(), SchemaVersion::V2);
        match "v3".parse::<SchemaVersion>() {
            Err(err @ WireError::UnknownVersion(_)) => {
                assert!(!err.is_fatal());
                assert_eq!(err.to_string(), "Unknown schema version \"v3\" (expected v1 or v2)");
            }
            other => panic!("expected UnknownVersion, got {:?}", other),
        }
        assert_eq!(SchemaVersion::V2.to_string(), "v2");
    }
}
