//! Custom attribute schemas attached to product types.
//!
//! A product type declares a list of [`AttributeField`]s; the attributes of
//! every product of that type are checked against it on create and update.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use utoipa::ToSchema;

use crate::errors::ServiceError;

static FIELD_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,49}$").expect("valid attribute name pattern"));

const MAX_TEXT_LEN: usize = 255;
const MAX_LONG_TEXT_LEN: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    LongText,
    Number,
    Date,
    Boolean,
    Select,
}

/// Definition of one custom attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AttributeField {
    /// Key under which the value is stored, `snake_case`
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    /// Allowed values for `select` fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl AttributeField {
    pub fn new(name: &str, kind: FieldKind, required: bool) -> Self {
        Self {
            name: name.to_string(),
            label: None,
            kind,
            required,
            options: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|o| o.to_string()).collect();
        self
    }
}

/// Reads a stored schema column
pub fn parse_schema(value: &Value) -> Result<Vec<AttributeField>, ServiceError> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value.clone())
        .map_err(|e| ServiceError::ValidationError(format!("invalid attribute schema: {e}")))
}

/// Checks a schema before it is stored on a product type
pub fn validate_schema(fields: &[AttributeField]) -> Result<(), ServiceError> {
    let mut seen = HashSet::new();

    for field in fields {
        if !FIELD_NAME.is_match(&field.name) {
            return Err(ServiceError::ValidationError(format!(
                "attribute name '{}' must be snake_case and start with a letter",
                field.name
            )));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(ServiceError::ValidationError(format!(
                "attribute '{}' is declared twice",
                field.name
            )));
        }
        match field.kind {
            FieldKind::Select if field.options.is_empty() => {
                return Err(ServiceError::ValidationError(format!(
                    "select attribute '{}' needs at least one option",
                    field.name
                )));
            }
            FieldKind::Select => {}
            _ if !field.options.is_empty() => {
                return Err(ServiceError::ValidationError(format!(
                    "only select attributes take options ('{}')",
                    field.name
                )));
            }
            _ => {}
        }
    }

    Ok(())
}

/// Validates and normalizes product attributes against `schema`.
///
/// Null values are dropped. Numbers given as strings are converted. With an
/// empty schema any scalar value is accepted.
pub fn validate_attributes(
    schema: &[AttributeField],
    attributes: &Value,
) -> Result<Value, ServiceError> {
    let input = match attributes {
        Value::Null => Map::new(),
        Value::Object(map) => map.clone(),
        _ => {
            return Err(ServiceError::ValidationError(
                "attributes must be a JSON object".into(),
            ))
        }
    };

    if schema.is_empty() {
        let mut out = Map::new();
        for (key, value) in input {
            match value {
                Value::Null => {}
                Value::Array(_) | Value::Object(_) => {
                    return Err(ServiceError::ValidationError(format!(
                        "attribute '{key}' must be a scalar value"
                    )))
                }
                scalar => {
                    out.insert(key, scalar);
                }
            }
        }
        return Ok(Value::Object(out));
    }

    if let Some(unknown) = input
        .keys()
        .find(|key| !schema.iter().any(|field| &field.name == *key))
    {
        return Err(ServiceError::ValidationError(format!(
            "attribute '{unknown}' is not defined for this product type"
        )));
    }

    let mut out = Map::new();
    for field in schema {
        let value = input.get(&field.name).filter(|v| !is_blank(v));
        match value {
            None if field.required => {
                return Err(ServiceError::ValidationError(format!(
                    "attribute '{}' is required",
                    field.name
                )))
            }
            None => {}
            Some(value) => {
                out.insert(field.name.clone(), coerce(field, value)?);
            }
        }
    }

    Ok(Value::Object(out))
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn coerce(field: &AttributeField, value: &Value) -> Result<Value, ServiceError> {
    let invalid = |expected: &str| {
        ServiceError::ValidationError(format!(
            "attribute '{}' must be {expected}",
            field.name
        ))
    };

    match field.kind {
        FieldKind::Text | FieldKind::LongText => {
            let text = value.as_str().ok_or_else(|| invalid("a string"))?.trim();
            let max = if field.kind == FieldKind::Text {
                MAX_TEXT_LEN
            } else {
                MAX_LONG_TEXT_LEN
            };
            if text.chars().count() > max {
                return Err(invalid(&format!("at most {max} characters")));
            }
            Ok(Value::String(text.to_string()))
        }
        FieldKind::Number => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => s
                .trim()
                .replace(',', ".")
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| invalid("a number")),
            _ => Err(invalid("a number")),
        },
        FieldKind::Date => {
            let text = value.as_str().ok_or_else(|| invalid("a date (YYYY-MM-DD)"))?;
            NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
                .map_err(|_| invalid("a date (YYYY-MM-DD)"))
        }
        FieldKind::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "0" => Ok(Value::Bool(false)),
                _ => Err(invalid("a boolean")),
            },
            _ => Err(invalid("a boolean")),
        },
        FieldKind::Select => {
            let text = value.as_str().ok_or_else(|| invalid("a string"))?.trim();
            if field.options.iter().any(|o| o == text) {
                Ok(Value::String(text.to_string()))
            } else {
                Err(invalid(&format!("one of: {}", field.options.join(", "))))
            }
        }
    }
}

/// Suggests attribute fields from a category name
pub fn suggest_attribute_fields(category_name: &str) -> (&'static str, Vec<AttributeField>) {
    let name = category_name.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| name.contains(n));

    if has(&["audio", "sound"]) {
        (
            "audio",
            vec![
                AttributeField::new("power_watts", FieldKind::Number, true),
                AttributeField::new("impedance", FieldKind::Text, false),
                AttributeField::new("frequency_response", FieldKind::Text, false),
                AttributeField::new("connectors", FieldKind::Text, false),
            ],
        )
    } else if has(&["video", "image", "monitor", "display"]) {
        (
            "video",
            vec![
                AttributeField::new("resolution", FieldKind::Text, true),
                AttributeField::new("screen_size", FieldKind::Number, false),
                AttributeField::new("panel_type", FieldKind::Text, false),
                AttributeField::new("ports", FieldKind::Text, false),
            ],
        )
    } else if has(&["computing", "computer", "laptop", "desktop"]) {
        (
            "computing",
            vec![
                AttributeField::new("processor", FieldKind::Text, true),
                AttributeField::new("memory", FieldKind::Text, true),
                AttributeField::new("storage", FieldKind::Text, false),
                AttributeField::new("operating_system", FieldKind::Text, false),
            ],
        )
    } else if has(&["printer", "printing"]) {
        (
            "printing",
            vec![
                AttributeField::new("print_technology", FieldKind::Text, true),
                AttributeField::new("pages_per_minute", FieldKind::Number, false),
                AttributeField::new("resolution_dpi", FieldKind::Number, false),
                AttributeField::new("connectivity", FieldKind::Text, false),
            ],
        )
    } else if has(&["projector"]) {
        (
            "projector",
            vec![
                AttributeField::new("lumens", FieldKind::Number, true),
                AttributeField::new("native_resolution", FieldKind::Text, true),
                AttributeField::new("lamp_type", FieldKind::Text, false),
                AttributeField::new("lamp_life_hours", FieldKind::Number, false),
            ],
        )
    } else {
        (
            "generic",
            vec![
                AttributeField::new("specifications", FieldKind::LongText, false),
                AttributeField::new("accessories", FieldKind::Text, false),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use serde_json::json;

    fn laptop_schema() -> Vec<AttributeField> {
        vec![
            AttributeField::new("processor", FieldKind::Text, true),
            AttributeField::new("memory", FieldKind::Select, true)
                .with_options(&["8GB", "16GB", "32GB"]),
            AttributeField::new("screen_size", FieldKind::Number, false),
            AttributeField::new("purchased", FieldKind::Date, false),
            AttributeField::new("touchscreen", FieldKind::Boolean, false),
        ]
    }

    #[test]
    fn valid_attributes_are_normalized() {
        let out = validate_attributes(
            &laptop_schema(),
            &json!({
                "processor": "  i7-1260P ",
                "memory": "16GB",
                "screen_size": "14,5",
                "touchscreen": "yes",
                "purchased": null
            }),
        )
        .unwrap();

        assert_eq!(
            out,
            json!({
                "processor": "i7-1260P",
                "memory": "16GB",
                "screen_size": 14.5,
                "touchscreen": true
            })
        );
    }

    #[rstest]
    #[case(json!({"memory": "16GB"}), "processor")]
    #[case(json!({"processor": "i5", "memory": "12GB"}), "memory")]
    #[case(json!({"processor": "i5", "memory": "8GB", "screen_size": "big"}), "screen_size")]
    #[case(json!({"processor": "i5", "memory": "8GB", "purchased": "31/12/2023"}), "purchased")]
    #[case(json!({"processor": "i5", "memory": "8GB", "colour": "grey"}), "colour")]
    fn invalid_attributes_are_rejected(#[case] input: Value, #[case] field: &str) {
        let err = validate_attributes(&laptop_schema(), &input).unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(msg) if msg.contains(field));
    }

    #[test]
    fn empty_schema_accepts_scalars_only() {
        let out = validate_attributes(&[], &json!({"colour": "red", "weight": 1.2})).unwrap();
        assert_eq!(out["colour"], "red");

        assert!(validate_attributes(&[], &json!({"tags": ["a"]})).is_err());
        assert!(validate_attributes(&[], &json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn schema_rules_are_enforced() {
        assert!(validate_schema(&laptop_schema()).is_ok());

        let duplicated = vec![
            AttributeField::new("imei", FieldKind::Text, true),
            AttributeField::new("imei", FieldKind::Text, false),
        ];
        assert!(validate_schema(&duplicated).is_err());

        let bad_name = vec![AttributeField::new("Screen Size", FieldKind::Number, false)];
        assert!(validate_schema(&bad_name).is_err());

        let select_without_options = vec![AttributeField::new("carrier", FieldKind::Select, false)];
        assert!(validate_schema(&select_without_options).is_err());
    }

    #[test]
    fn stored_schema_round_trips_through_json() {
        let stored = serde_json::to_value(laptop_schema()).unwrap();
        assert_eq!(parse_schema(&stored).unwrap(), laptop_schema());
        assert!(parse_schema(&Value::Null).unwrap().is_empty());
        assert!(parse_schema(&json!({"kind": "text"})).is_err());
    }

    #[rstest]
    #[case("Audio equipment", "audio")]
    #[case("Monitors", "video")]
    #[case("Computing", "computing")]
    #[case("Printers & scanners", "printing")]
    #[case("Projectors", "projector")]
    #[case("Furniture", "generic")]
    fn suggestions_follow_category_name(#[case] category: &str, #[case] family: &str) {
        let (detected, fields) = suggest_attribute_fields(category);
        assert_eq!(detected, family);
        assert!(!fields.is_empty());
        assert!(validate_schema(&fields).is_ok());
    }
}
