//! Wire-format contract for `AnomalyReport`.
//!
//! Downstream consumers read the flat record by field name and match the
//! category/severity labels exactly, so these tests pin both.

use citywatch_common::{Address, AnomalyReport, EventType, GeoLocation, Severity};
use serde_json::{json, Value};

fn sparse_report() -> AnomalyReport {
    AnomalyReport {
        timestamp: 1_718_035_200.5,
        event_type: EventType::WeatherRelatedDamage,
        description: "Knee-deep waterlogging under the Silk Board flyover after overnight rain."
            .to_string(),
        severity: Severity::High,
        location: GeoLocation {
            latitude: 12.9176,
            longitude: 77.6233,
            address: Address {
                formatted_address: "Silk Board Junction, Bengaluru".to_string(),
                area_name: Some("BTM Layout".to_string()),
                ..Default::default()
            },
        },
    }
}

#[test]
fn serializes_flat_record_with_wire_field_names() {
    let value = serde_json::to_value(sparse_report()).unwrap();
    let object = value.as_object().unwrap();

    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        vec![
            "area_name",
            "city",
            "country",
            "country_code",
            "description",
            "district",
            "event_type",
            "formatted_address",
            "house_number",
            "latitude",
            "longitude",
            "postal_code",
            "severity_level",
            "state",
            "street_name",
            "unix_timestamp",
        ]
    );
    assert_eq!(value["event_type"], json!("Weather-Related Damage"));
    assert_eq!(value["severity_level"], json!("High"));
    assert_eq!(value["house_number"], Value::Null);
    assert_eq!(value["area_name"], json!("BTM Layout"));
}

#[test]
fn round_trip_preserves_every_field() {
    let original = sparse_report();
    let text = serde_json::to_string(&original).unwrap();
    let parsed: AnomalyReport = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, original);

    let full = AnomalyReport {
        location: GeoLocation {
            latitude: -33.8688,
            longitude: 151.2093,
            address: Address {
                formatted_address: "1 Example St, Sydney NSW 2000, Australia".to_string(),
                house_number: Some("1".to_string()),
                street_name: Some("Example St".to_string()),
                area_name: Some("CBD".to_string()),
                city: Some("Sydney".to_string()),
                district: Some("City of Sydney".to_string()),
                state: Some("NSW".to_string()),
                country: Some("Australia".to_string()),
                country_code: Some("AU".to_string()),
                postal_code: Some("2000".to_string()),
            },
        },
        ..sparse_report()
    };
    let parsed: AnomalyReport =
        serde_json::from_str(&serde_json::to_string(&full).unwrap()).unwrap();
    assert_eq!(parsed, full);
}

#[test]
fn missing_optional_keys_parse_as_none() {
    let parsed: AnomalyReport = serde_json::from_value(json!({
        "unix_timestamp": 1718035200.0,
        "event_type": "Utility Disruption",
        "description": "Power cut across 100 Feet Road.",
        "severity_level": "Medium",
        "latitude": 12.9719,
        "longitude": 77.6412,
        "formatted_address": "100 Feet Road, Indiranagar, Bengaluru"
    }))
    .unwrap();

    assert_eq!(parsed.event_type, EventType::UtilityDisruption);
    assert!(parsed.location.address.postal_code.is_none());
    assert!(parsed.location.address.country.is_none());
}

#[test]
fn required_fields_are_enforced_on_parse() {
    let missing_latitude = json!({
        "unix_timestamp": 1718035200.0,
        "event_type": "Utility Disruption",
        "description": "Power cut.",
        "severity_level": "Medium",
        "longitude": 77.6412,
        "formatted_address": "Indiranagar"
    });
    assert!(serde_json::from_value::<AnomalyReport>(missing_latitude).is_err());

    let unknown_category = json!({
        "unix_timestamp": 1718035200.0,
        "event_type": "Power Outage",
        "description": "Power cut.",
        "severity_level": "Medium",
        "latitude": 12.97,
        "longitude": 77.64,
        "formatted_address": "Indiranagar"
    });
    assert!(serde_json::from_value::<AnomalyReport>(unknown_category).is_err());
}

#[test]
fn wire_schema_lists_enumerations_verbatim() {
    let schema = AnomalyReport::wire_schema();
    let text = serde_json::to_string(&schema).unwrap();

    for t in EventType::ALL {
        assert!(text.contains(&format!("\"{}\"", t.label())), "missing {t}");
    }
    for level in ["Low", "Medium", "High"] {
        assert!(text.contains(&format!("\"{level}\"")));
    }

    let required: Vec<&str> = schema["required"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    for field in [
        "unix_timestamp",
        "event_type",
        "description",
        "severity_level",
        "latitude",
        "longitude",
        "formatted_address",
    ] {
        assert!(required.contains(&field), "{field} should be required");
    }
    assert!(!required.contains(&"postal_code"));
}
