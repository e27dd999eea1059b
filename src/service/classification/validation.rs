//! Validation of decoded classification payloads
//!
//! Every field is checked so a retry prompt can name all of them at once.

use serde_json::{Map, Value};

use crate::model::{CategorySet, Classification, Sentiment, Urgency};
use crate::service::classification::error::{FieldViolation, SchemaError};

/// Fields a payload must carry, in reporting order
pub const REQUIRED_FIELDS: [&str; 4] = ["category", "urgency", "sentiment", "confidence"];

/// Validate a decoded payload against the allowed value sets
///
/// Unknown categories are rejected rather than mapped to a near match. Keys outside
/// [`REQUIRED_FIELDS`] are ignored.
pub fn validate_payload(
    payload: &Map<String, Value>,
    categories: &CategorySet,
    model_version: &str,
) -> Result<Classification, SchemaError> {
    let mut violations = Vec::new();

    let category = match string_field(payload, "category", &mut violations) {
        Some(name) => {
            let resolved = categories.resolve(name);
            if resolved.is_none() {
                violations.push(FieldViolation {
                    field: "category",
                    message: format!(
                        "'{}' is not one of: {}",
                        name,
                        categories.names().join(", ")
                    ),
                });
            }
            resolved
        }
        None => None,
    };

    let urgency = string_field(payload, "urgency", &mut violations).and_then(|value| {
        let parsed = Urgency::parse(value);
        if parsed.is_none() {
            violations.push(FieldViolation {
                field: "urgency",
                message: format!("'{}' is not one of: Low, Medium, High, Critical", value),
            });
        }
        parsed
    });

    let sentiment = string_field(payload, "sentiment", &mut violations).and_then(|value| {
        let parsed = Sentiment::parse(value);
        if parsed.is_none() {
            violations.push(FieldViolation {
                field: "sentiment",
                message: format!("'{}' is not one of: Positive, Neutral, Negative", value),
            });
        }
        parsed
    });

    let confidence = confidence_field(payload, &mut violations);

    match (category, urgency, sentiment, confidence) {
        (Some(category), Some(urgency), Some(sentiment), Some(confidence))
            if violations.is_empty() =>
        {
            Ok(Classification {
                category,
                urgency,
                sentiment,
                confidence,
                model_version: model_version.to_string(),
                overrides_applied: Vec::new(),
            })
        }
        _ => Err(SchemaError { violations }),
    }
}

fn string_field<'a>(
    payload: &'a Map<String, Value>,
    field: &'static str,
    violations: &mut Vec<FieldViolation>,
) -> Option<&'a str> {
    match payload.get(field) {
        None | Some(Value::Null) => {
            violations.push(FieldViolation {
                field,
                message: "missing".to_string(),
            });
            None
        }
        Some(Value::String(value)) => Some(value.as_str()),
        Some(_) => {
            violations.push(FieldViolation {
                field,
                message: "must be a string".to_string(),
            });
            None
        }
    }
}

fn confidence_field(
    payload: &Map<String, Value>,
    violations: &mut Vec<FieldViolation>,
) -> Option<f64> {
    let value = match payload.get("confidence") {
        None | Some(Value::Null) => {
            violations.push(FieldViolation {
                field: "confidence",
                message: "missing".to_string(),
            });
            return None;
        }
        Some(Value::Number(number)) => number.as_f64(),
        Some(_) => None,
    };

    match value {
        Some(v) if v.is_finite() && (0.0..=1.0).contains(&v) => Some((v * 1000.0).round() / 1000.0),
        Some(v) => {
            violations.push(FieldViolation {
                field: "confidence",
                message: format!("{} is outside [0, 1]", v),
            });
            None
        }
        None => {
            violations.push(FieldViolation {
                field: "confidence",
                message: "must be a number".to_string(),
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MODEL_VERSION: &str = "test/model/v1";

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test payload must be an object"),
        }
    }

    fn valid() -> Value {
        json!({
            "category": "Technical Issue",
            "urgency": "High",
            "sentiment": "Negative",
            "confidence": 0.92
        })
    }

    #[test]
    fn test_accepts_valid_payload() {
        let classification =
            validate_payload(&payload(valid()), &CategorySet::default(), MODEL_VERSION).unwrap();

        assert_eq!(classification.category.as_str(), "Technical Issue");
        assert_eq!(classification.urgency, Urgency::High);
        assert_eq!(classification.sentiment, Sentiment::Negative);
        assert_eq!(classification.confidence, 0.92);
        assert_eq!(classification.model_version, MODEL_VERSION);
        assert!(classification.overrides_applied.is_empty());
    }

    #[test]
    fn test_accepts_every_enumerated_combination() {
        let categories = CategorySet::default();
        for category in categories.names() {
            for urgency in Urgency::ALL {
                for sentiment in Sentiment::ALL {
                    for confidence in [0.0, 0.5, 1.0] {
                        let value = json!({
                            "category": category,
                            "urgency": urgency.as_str(),
                            "sentiment": sentiment.as_str(),
                            "confidence": confidence,
                        });
                        let result = validate_payload(&payload(value), &categories, MODEL_VERSION);
                        assert!(result.is_ok(), "{} {} {} {}", category, urgency, sentiment, confidence);
                    }
                }
            }
        }
    }

    #[test]
    fn test_single_out_of_bounds_field_is_named() {
        let cases = [
            ("category", json!("Payments")),
            ("urgency", json!("Severe")),
            ("sentiment", json!("Furious")),
            ("confidence", json!(1.2)),
            ("confidence", json!(-0.1)),
            ("confidence", json!("0.9")),
        ];

        for (field, bad_value) in cases {
            let mut value = valid();
            value[field] = bad_value;
            let err =
                validate_payload(&payload(value), &CategorySet::default(), MODEL_VERSION).unwrap_err();
            assert_eq!(err.fields(), vec![field], "field {}", field);
        }
    }

    #[test]
    fn test_single_missing_field_is_named() {
        for field in REQUIRED_FIELDS {
            let mut map = payload(valid());
            map.remove(field);
            let err = validate_payload(&map, &CategorySet::default(), MODEL_VERSION).unwrap_err();
            assert_eq!(err.fields(), vec![field]);
            assert_eq!(err.violations[0].message, "missing");
        }
    }

    #[test]
    fn test_reports_every_violation() {
        let value = json!({
            "category": "technical issue",
            "urgency": 3,
            "confidence": 7
        });
        let err =
            validate_payload(&payload(value), &CategorySet::default(), MODEL_VERSION).unwrap_err();
        assert_eq!(
            err.fields(),
            vec!["category", "urgency", "sentiment", "confidence"]
        );
    }

    #[test]
    fn test_category_is_never_corrected() {
        let mut value = valid();
        value["category"] = json!("Technical issue");
        let err =
            validate_payload(&payload(value), &CategorySet::default(), MODEL_VERSION).unwrap_err();
        assert!(err.violations[0].message.contains("is not one of"));
    }

    #[test]
    fn test_extra_keys_are_ignored_and_confidence_rounded() {
        let mut value = valid();
        value["reasoning"] = json!("server is down");
        value["confidence"] = json!(0.87654);
        let classification =
            validate_payload(&payload(value), &CategorySet::default(), MODEL_VERSION).unwrap();
        assert_eq!(classification.confidence, 0.877);
    }

    #[test]
    fn test_integer_confidence_is_numeric() {
        let mut value = valid();
        value["confidence"] = json!(1);
        let classification =
            validate_payload(&payload(value), &CategorySet::default(), MODEL_VERSION).unwrap();
        assert_eq!(classification.confidence, 1.0);
    }
}
