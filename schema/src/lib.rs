//! Schema registry, message tree and binary codec for vehicle telemetry.
//!
//! A [Schema](struct.Schema.html) is a set of enum and message definitions.
//! The two telemetry versions ship compiled in and are reached through
//! [registry::schema](registry/fn.schema.html). Messages are framed as
//! `varint(id << 3 | wire_type)` keys followed by a varint, eight
//! little-endian bytes or a length-delimited payload.
//!
//! ```
//! use vehicle_wire_schema::*;
//!
//! let schema = Schema::new(vec![
//!     Def::new("Point", DefKind::Message, vec![
//!         Field::new(1, "x", FieldKind::Float, Presence::Required),
//!         Field::new(2, "y", FieldKind::Float, Presence::OptionalNoDefault),
//!     ]),
//! ]);
//!
//! let bytes = [0x09, 0, 0, 0, 0, 0, 0, 0xE0, 0x3F, 0x11, 0, 0, 0, 0, 0, 0, 0xE0, 0xBF];
//! let value = Value::decode(&schema, "Point", &bytes).unwrap();
//! assert_eq!(format!("{:?}", value), "Point {1: 0.5, 2: -0.5}");
//! assert_eq!(value.encode(&schema).unwrap(), bytes);
//! ```

pub mod bb;
pub mod error;
pub mod registry;
pub mod schema;
pub mod utils;
pub mod value;
pub mod verifier;

pub use bb::*;
pub use error::*;
pub use registry::{SchemaVersion, CONTROL_COMMAND, DETECTED_OBJECT, SENSOR_DATA, SENSOR_TYPE, VEHICLE_STATE};
pub use schema::*;
pub use value::*;
pub use verifier::verify_schema;
