//! The reference packet: one autonomous vehicle with a lidar tracking two
//! objects, a camera and a planner command.

use vehicle_wire_schema::{
    registry::{CONTROL_COMMAND, DETECTED_OBJECT, SENSOR_DATA, VEHICLE_STATE},
    ObjectBuilder, Result, Schema, Value,
};

struct Detection {
    id:             &'static str,
    classification: &'static str,
    position:       [f64; 3],
    velocity:       [f64; 2],
    size:           [f64; 3],
    confidence:     f64,
    is_moving:      bool,
}

const DETECTIONS: [Detection; 2] = [
    Detection {
        id:             "obj_001",
        classification: "vehicle",
        position:       [25.3, 1.5, 0.0],
        velocity:       [5.0, 0.1],
        size:           [2.0, 4.5, 1.8],
        confidence:     0.95,
        is_moving:      true,
    },
    Detection {
        id:             "obj_002",
        classification: "pedestrian",
        position:       [10.2, -2.3, 0.0],
        velocity:       [1.2, -0.5],
        size:           [0.6, 0.4, 1.7],
        confidence:     0.90,
        is_moving:      true,
    },
];

/// Builds a detected object. The confidence is only set when `schema`
/// declares it.
fn detected_object<'a>(schema: &'a Schema, detection: &Detection) -> Result<Value<'a>> {
    Ok(ObjectBuilder::new(schema, DETECTED_OBJECT)?
        .text("id", detection.id)?
        .text("classification", detection.classification)?
        .float("x_position", detection.position[0])?
        .float("y_position", detection.position[1])?
        .float("z_position", detection.position[2])?
        .float("x_velocity", detection.velocity[0])?
        .float("y_velocity", detection.velocity[1])?
        .float("width", detection.size[0])?
        .float("length", detection.size[1])?
        .float("height", detection.size[2])?
        .set_if_declared("confidence", Value::Float(detection.confidence))?
        .flag("is_moving", detection.is_moving)?
        .build())
}

fn sensor<'a>(
    schema: &'a Schema,
    label: &str,
    horizontal_fov: f64,
    vertical_fov: f64,
    max_range: f64,
    confidence: f64,
    detections: &[Detection],
) -> Result<Value<'a>> {
    let mut builder = ObjectBuilder::new(schema, SENSOR_DATA)?
        .label("type", label)?
        .float("horizontal_fov", horizontal_fov)?
        .float("vertical_fov", vertical_fov)?
        .float("max_range", max_range)?
        .float("confidence", confidence)?
        .flag("is_calibrated", true)?;
    for detection in detections {
        builder = builder.push("objects", detected_object(schema, detection)?)?;
    }
    Ok(builder.build())
}

fn control_command(schema: &Schema) -> Result<Value<'_>> {
    Ok(ObjectBuilder::new(schema, CONTROL_COMMAND)?
        .float("steering_angle", 2.5)?
        .float("throttle", 0.35)?
        .float("brake", 0.0)?
        .flag("turn_signal_left", false)?
        .flag("turn_signal_right", false)?
        .float("target_speed", 16.0)?
        .text("command_source", "PlanningAlgorithm")?
        .float("execution_time", 0.1)?
        .build())
}

/// The reference VehicleState built against `schema`.
pub fn vehicle_state(schema: &Schema) -> Result<Value<'_>> {
    Ok(ObjectBuilder::new(schema, VEHICLE_STATE)?
        .text("vehicle_id", "ADV_2025_001")?
        .float("timestamp", 1692930418.0)?
        .float("speed", 15.5)?
        .float("acceleration", 0.8)?
        .text("current_driving_mode", "AUTO")?
        .flag("emergency_stop_activated", false)?
        .push("sensor_data", sensor(schema, "LIDAR", 120.0, 30.0, 200.0, 0.98, &DETECTIONS)?)?
        .push("sensor_data", sensor(schema, "CAMERA", 60.0, 40.0, 150.0, 0.96, &[])?)?
        .set("latest_command", control_command(schema)?)?
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vehicle_wire_schema::SchemaVersion;

    #[test]
    fn sample_matches_each_version() {
        let v1 = SchemaVersion::V1.schema();
        let state = vehicle_state(v1).unwrap();
        assert_eq!(state.get_named(v1, "vehicle_id").map(|v| v.as_text()), Some("ADV_2025_001"));

        let sensors = state.get_named(v1, "sensor_data").unwrap();
        assert_eq!(sensors.len(), 2);
        assert_eq!(sensors[0].get_named(v1, "type").map(|v| v.as_text()), Some("LIDAR"));
        assert_eq!(sensors[1].get_named(v1, "objects"), None);

        let object = &sensors[0].get_named(v1, "objects").unwrap()[1];
        assert_eq!(object.get_named(v1, "confidence"), Some(&Value::Float(0.90)));

        let v2 = SchemaVersion::V2.schema();
        let state = vehicle_state(v2).unwrap();
        let object = &state.get_named(v2, "sensor_data").unwrap()[0].get_named(v2, "objects").unwrap()[0];
        assert_eq!(object.get_named(v2, "classification").map(|v| v.as_text()), Some("vehicle"));
        assert_eq!(object.get(11), None);
    }
}
