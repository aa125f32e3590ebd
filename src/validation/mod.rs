//! Dynamic validation of answer maps against a runtime form schema.
//!
//! The schema is not known until the request names a form version, so every
//! check is data-driven. Fields are checked in schema order; answer keys with
//! no matching field are ignored.

use serde_json::Value;

use crate::form_store::{AnswerMap, FieldType, FormSchema};

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field_key: String,
    pub message: String,
}

/// Validate answers against a schema. An empty result means valid.
pub fn validate_answers(schema: &FormSchema, answers: &AnswerMap) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for field in &schema.fields {
        let answer = answers.get(&field.key);

        let missing = match answer {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        };
        if field.required && missing {
            errors.push(ValidationError {
                field_key: field.key.clone(),
                message: format!("Field '{}' is required", field.label),
            });
        }

        // Type checks only apply to present, non-null answers. Only `number`
        // is enforced; other declared types accept any present value.
        if let Some(value) = answer {
            if !value.is_null() && field.field_type == FieldType::Number && !value.is_number() {
                errors.push(ValidationError {
                    field_key: field.key.clone(),
                    message: format!("Field '{}' must be a number", field.label),
                });
            }
        }
    }

    errors
}

/// Join field-level errors into the single message reported to the caller.
pub fn combined_message(errors: &[ValidationError]) -> String {
    let joined = errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!("Validation Failed: {}", joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form_store::FieldDef;

    fn field(key: &str, label: &str, field_type: FieldType, required: bool) -> FieldDef {
        FieldDef {
            key: key.to_string(),
            label: label.to_string(),
            field_type,
            required,
            options: None,
        }
    }

    fn schema(fields: Vec<FieldDef>) -> FormSchema {
        FormSchema { fields }
    }

    fn answers(pairs: &[(&str, serde_json::Value)]) -> AnswerMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn empty_answers_against_required_number_field() {
        let schema = schema(vec![field("age", "Age", FieldType::Number, true)]);

        let errors = validate_answers(&schema, &AnswerMap::new());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Age"));
        assert!(errors[0].message.contains("required"));
    }

    #[test]
    fn non_numeric_answer_fails_type_check_only() {
        let schema = schema(vec![field("age", "Age", FieldType::Number, true)]);

        let errors = validate_answers(&schema, &answers(&[("age", serde_json::json!("twenty"))]));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("must be a number"));
        assert!(!errors[0].message.contains("required"));
    }

    #[test]
    fn null_and_empty_string_count_as_missing() {
        let schema = schema(vec![field("name", "Name", FieldType::Text, true)]);

        for value in [serde_json::Value::Null, serde_json::json!("")] {
            let errors = validate_answers(&schema, &answers(&[("name", value)]));
            assert_eq!(errors.len(), 1, "expected one error");
            assert!(errors[0].message.contains("required"));
        }
    }

    #[test]
    fn false_and_zero_are_present() {
        let schema = schema(vec![
            field("subscribed", "Subscribed", FieldType::Checkbox, true),
            field("count", "Count", FieldType::Number, true),
        ]);

        let errors = validate_answers(
            &schema,
            &answers(&[
                ("subscribed", serde_json::json!(false)),
                ("count", serde_json::json!(0)),
            ]),
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn only_number_fields_are_type_checked() {
        let schema = schema(vec![
            field("email", "Email", FieldType::Email, false),
            field("choice", "Choice", FieldType::Select, false),
            field("agreed", "Agreed", FieldType::Checkbox, false),
        ]);

        // Values that do not match the declared types are still accepted.
        let errors = validate_answers(
            &schema,
            &answers(&[
                ("email", serde_json::json!(42)),
                ("choice", serde_json::json!(true)),
                ("agreed", serde_json::json!("maybe")),
            ]),
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn unknown_answer_keys_are_ignored() {
        let schema = schema(vec![field("name", "Name", FieldType::Text, true)]);

        let errors = validate_answers(
            &schema,
            &answers(&[
                ("name", serde_json::json!("Dex")),
                ("extraneous", serde_json::json!("whatever")),
            ]),
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn errors_accumulate_in_schema_order() {
        let schema = schema(vec![
            field("name", "Name", FieldType::Text, true),
            field("age", "Age", FieldType::Number, true),
        ]);

        let errors = validate_answers(&schema, &answers(&[("age", serde_json::json!("old"))]));
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field_key, "name");
        assert_eq!(errors[1].field_key, "age");
    }

    #[test]
    fn combined_message_joins_with_commas() {
        let schema = schema(vec![
            field("name", "Name", FieldType::Text, true),
            field("age", "Age", FieldType::Number, true),
        ]);
        let errors = validate_answers(&schema, &AnswerMap::new());

        let message = combined_message(&errors);
        assert_eq!(
            message,
            "Validation Failed: Field 'Name' is required, Field 'Age' is required"
        );
    }

    #[test]
    fn satisfied_schema_yields_no_errors() {
        let schema = schema(vec![
            field("name", "Name", FieldType::Text, true),
            field("age", "Age", FieldType::Number, true),
        ]);

        let errors = validate_answers(
            &schema,
            &answers(&[
                ("name", serde_json::json!("Dex")),
                ("age", serde_json::json!(34)),
            ]),
        );
        assert!(errors.is_empty());
    }
}
