//! The name-keyed intermediate representation used to move telemetry
//! between schema versions.
//!
//! ```
//! use vehicle_wire_ir::*;
//! use vehicle_wire_schema::SchemaVersion;
//!
//! let doc = parse_document(r#"DetectedObject { id: "obj_001"; confidence: 0.95; }"#).unwrap();
//! let migration = migrate(&doc, SchemaVersion::V1, SchemaVersion::V2).unwrap();
//! assert_eq!(migration.dropped[0].field_name, "confidence");
//! assert!(migration.document.root.get("confidence").is_none());
//! ```

pub mod migrator;
pub mod parser;
pub mod tokenizer;
pub mod transcoder;
pub mod types;
pub mod writer;

pub use migrator::{migrate, migrate_between, DroppedField, Migration, RemappedLabel};
pub use parser::parse_document;
pub use transcoder::{format_float, from_ir, parse_float, to_ir, Transcoded, UnmappedField};
pub use types::*;
pub use writer::write_document;
