//! vehicle-wire
//!
//! Runtime support for vehicle telemetry packets:
//!
//! - the registered schema versions and the binary codec (re-exported from
//!   `vehicle-wire-schema`)
//! - the text IR and the migrator (re-exported from `vehicle-wire-ir`)
//! - byte-level helpers that chain them: decode, render, migrate, re-encode

pub mod sample;

pub use vehicle_wire_ir::{
    from_ir, migrate, migrate_between, parse_document, to_ir, write_document, DroppedField,
    IrDocument, IrField, IrObject, IrValue, Migration, RemappedLabel, Transcoded, UnmappedField,
};
pub use vehicle_wire_schema::{
    registry, DecodeOptions, FieldPath, ObjectBuilder, Result, Schema, SchemaVersion, Value,
    WireError, MAX_VARINT_BYTES, VEHICLE_STATE,
};

use tracing::debug;

pub mod error {
    pub use vehicle_wire_schema::error::{FieldPath, Result, WireError};
}

pub mod schema {
    pub use vehicle_wire_schema::{verify_schema, Def, DefKind, DefaultValue, Field, FieldKind, Presence, Schema};
}

/// Migrated bytes along with the migration's audit trail.
#[derive(Debug, Clone)]
pub struct MigratedBytes {
    pub bytes:     Vec<u8>,
    pub migration: Migration,
}

/// Decodes a message of type `type_name` against a registered version.
pub fn decode(
    bytes: &[u8],
    version: SchemaVersion,
    type_name: &str,
    options: &DecodeOptions,
) -> Result<Value<'static>> {
    Value::decode_with(version.schema(), type_name, bytes, options)
}

pub fn encode(value: &Value, version: SchemaVersion) -> Result<Vec<u8>> {
    value.encode(version.schema())
}

/// Decodes `bytes` and converts the tree to its IR document.
pub fn decode_to_ir(
    bytes: &[u8],
    version: SchemaVersion,
    type_name: &str,
    options: &DecodeOptions,
) -> Result<IrDocument> {
    let value = decode(bytes, version, type_name, options)?;
    to_ir(&value, version.schema())
}

/// Decodes `bytes` and renders them as IR text.
pub fn decode_to_text(
    bytes: &[u8],
    version: SchemaVersion,
    type_name: &str,
    options: &DecodeOptions,
) -> Result<String> {
    Ok(write_document(&decode_to_ir(bytes, version, type_name, options)?))
}

/// Decode a packet into a pretty-printed JSON string.
pub fn decode_to_json(
    bytes: &[u8],
    version: SchemaVersion,
    type_name: &str,
    options: &DecodeOptions,
) -> Result<String> {
    let doc = decode_to_ir(bytes, version, type_name, options)?;
    Ok(serde_json::to_string_pretty(&doc.to_json())?)
}

/// Encodes an IR document against a registered version. Fields the version
/// does not declare are returned alongside the bytes.
pub fn encode_ir(doc: &IrDocument, version: SchemaVersion) -> Result<(Vec<u8>, Vec<UnmappedField>)> {
    let transcoded = from_ir(doc, version.schema())?;
    Ok((transcoded.value.encode(version.schema())?, transcoded.unmapped))
}

/// The full pipeline: bytes under `from`, through the IR and the migrator,
/// to bytes under `to`.
pub fn migrate_bytes(
    bytes: &[u8],
    from: SchemaVersion,
    to: SchemaVersion,
    type_name: &str,
    options: &DecodeOptions,
) -> Result<MigratedBytes> {
    let doc = decode_to_ir(bytes, from, type_name, options)?;
    let migration = migrate(&doc, from, to)?;
    let (bytes, unmapped) = encode_ir(&migration.document, to)?;
    debug!(
        %from,
        %to,
        size = bytes.len(),
        dropped = migration.dropped.len(),
        unmapped = unmapped.len(),
        "migrated packet"
    );
    Ok(MigratedBytes { bytes, migration })
}
