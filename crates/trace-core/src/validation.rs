//! Record and status validation rules.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::owner::EntityDescriptor;
use crate::record::Record;
use crate::status::StatusDefinition;

/// Error type for validation failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("owner type is required")]
    EmptyOwnerType,

    #[error("label is required")]
    EmptyLabel,

    #[error("window start {start} is after its end {end}")]
    InvertedWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("{0} records must carry a validity window")]
    MissingWindow(String),

    #[error("{0} records do not carry a validity window")]
    UnexpectedWindow(String),

    #[error("record {0} cannot be its own parent")]
    SelfParent(String),

    #[error("{0} records are not hierarchical")]
    UnsupportedParent(String),

    #[error("{0} records do not carry a status")]
    UnsupportedStatus(String),

    #[error("invalid attribute key: {0:?}")]
    InvalidAttributeKey(String),

    #[error("attribute {key} cannot be filtered on a {kind} value")]
    UnsupportedAttributeValue { key: String, kind: &'static str },

    #[error("record owner type {actual} does not match descriptor {expected}")]
    DescriptorMismatch { expected: String, actual: String },
}

/// Validates a record on its own, without knowledge of its entity type.
pub fn validate_record(record: &Record) -> Result<(), ValidationError> {
    if record.owner_type.as_str().is_empty() {
        return Err(ValidationError::EmptyOwnerType);
    }
    if record.label.trim().is_empty() {
        return Err(ValidationError::EmptyLabel);
    }
    if let Some(ref window) = record.window {
        window.check()?;
    }
    if let Some(ref parent) = record.parent_id {
        if !record.id.is_empty() && *parent == record.id {
            return Err(ValidationError::SelfParent(record.id.clone()));
        }
    }
    for key in record.attributes.keys() {
        validate_attribute_key(key)?;
    }
    Ok(())
}

/// Validates a record against the capabilities its entity type composes.
pub fn validate_record_for(
    record: &Record,
    descriptor: &EntityDescriptor,
) -> Result<(), ValidationError> {
    validate_record(record)?;

    if let Some(expected) = descriptor.owner_type() {
        if expected != record.owner_type {
            return Err(ValidationError::DescriptorMismatch {
                expected: expected.to_string(),
                actual: record.owner_type.to_string(),
            });
        }
    }

    let caps = descriptor.capabilities;
    let name = record.owner_type.as_str();
    match (caps.time_framed, record.window.is_some()) {
        (true, false) => return Err(ValidationError::MissingWindow(name.to_owned())),
        (false, true) => return Err(ValidationError::UnexpectedWindow(name.to_owned())),
        _ => {}
    }
    if !caps.hierarchy && record.parent_id.is_some() {
        return Err(ValidationError::UnsupportedParent(name.to_owned()));
    }
    if !caps.status && record.status_id.is_some() {
        return Err(ValidationError::UnsupportedStatus(name.to_owned()));
    }
    Ok(())
}

/// Validates a status definition.
pub fn validate_status(status: &StatusDefinition) -> Result<(), ValidationError> {
    if status.label.trim().is_empty() {
        return Err(ValidationError::EmptyLabel);
    }
    if status.owner_type.as_str().is_empty() {
        return Err(ValidationError::EmptyOwnerType);
    }
    Ok(())
}

/// Attribute keys end up inside JSON paths, so they are restricted to a
/// conservative identifier alphabet.
pub fn validate_attribute_key(key: &str) -> Result<(), ValidationError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidAttributeKey(key.to_owned()))
    }
}

/// Only scalar JSON values can be compared by the store.
pub fn validate_filter_value(key: &str, value: &Value) -> Result<(), ValidationError> {
    let kind = match value {
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        _ => return Ok(()),
    };
    Err(ValidationError::UnsupportedAttributeValue {
        key: key.to_owned(),
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::owner::{Capabilities, OwnerType};
    use crate::record::RecordBuilder;
    use crate::window::TimeWindow;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn empty_label_rejected() {
        let record = RecordBuilder::new("org.unit", "  ").build();
        assert_eq!(validate_record(&record), Err(ValidationError::EmptyLabel));
    }

    #[test]
    fn self_parent_rejected() {
        let record = RecordBuilder::new("org.unit", "Sales")
            .id("unit-1")
            .parent("unit-1")
            .build();
        assert!(matches!(
            validate_record(&record),
            Err(ValidationError::SelfParent(_))
        ));
    }

    #[test]
    fn inverted_window_rejected() {
        let mut record = RecordBuilder::new("org.unit", "Sales").build();
        record.window = Some(TimeWindow {
            start: ts(2021, 1, 1),
            end: Some(ts(2020, 1, 1)),
        });
        assert!(matches!(
            validate_record(&record),
            Err(ValidationError::InvertedWindow { .. })
        ));
    }

    #[test]
    fn attribute_keys_restricted() {
        assert!(validate_attribute_key("region").is_ok());
        assert!(validate_attribute_key("cost_center-2").is_ok());
        assert!(validate_attribute_key("").is_err());
        assert!(validate_attribute_key("a\".b").is_err());
        assert!(validate_attribute_key("$.x").is_err());
    }

    #[test]
    fn filter_values_must_be_scalar() {
        assert!(validate_filter_value("k", &serde_json::json!("x")).is_ok());
        assert!(validate_filter_value("k", &serde_json::json!(null)).is_ok());
        assert!(validate_filter_value("k", &serde_json::json!([1])).is_err());
        assert!(validate_filter_value("k", &serde_json::json!({"a": 1})).is_err());
    }

    #[test]
    fn descriptor_requires_window_for_time_framed_types() {
        let descriptor = EntityDescriptor::new("contract")
            .app_label("legal")
            .capabilities(Capabilities::TIME_FRAMED);
        let record = RecordBuilder::new("legal.contract", "NDA").build();
        assert_eq!(
            validate_record_for(&record, &descriptor),
            Err(ValidationError::MissingWindow("legal.contract".into()))
        );

        let record = RecordBuilder::new("legal.contract", "NDA")
            .window(TimeWindow::open_ended(ts(2020, 1, 1)))
            .build();
        assert!(validate_record_for(&record, &descriptor).is_ok());
    }

    #[test]
    fn descriptor_rejects_parent_on_flat_types() {
        let descriptor = EntityDescriptor::new("contract").app_label("legal");
        let record = RecordBuilder::new("legal.contract", "NDA")
            .parent("other")
            .build();
        assert_eq!(
            validate_record_for(&record, &descriptor),
            Err(ValidationError::UnsupportedParent("legal.contract".into()))
        );
    }

    #[test]
    fn descriptor_owner_type_must_match() {
        let descriptor = EntityDescriptor::new("contract").app_label("legal");
        let record = RecordBuilder::new(OwnerType::from("legal.invoice"), "X").build();
        assert!(matches!(
            validate_record_for(&record, &descriptor),
            Err(ValidationError::DescriptorMismatch { .. })
        ));
    }
}
