use validator::{Validate, ValidationErrors};

use crate::error::AppError;

fn flatten_errors(errors: &ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .iter()
        .map(|(field, field_errors)| {
            let messages: Vec<String> = field_errors
                .iter()
                .map(|error| {
                    error
                        .message
                        .clone()
                        .unwrap_or_else(|| "Invalid value".into())
                        .to_string()
                })
                .collect();
            format!("{}: {}", field, messages.join(", "))
        })
        .collect();

    parts.sort();
    parts.join("; ")
}

/// Runs derive-based validation on an inbound payload and folds the field
/// errors into a single [`AppError::Validation`].
pub fn validate_payload<T: Validate>(payload: &T) -> Result<(), AppError> {
    payload
        .validate()
        .map_err(|errors| AppError::Validation(flatten_errors(&errors)))
}

/// Same folding for types that hand-roll their validation (enums delegating
/// to variant payloads).
pub fn map_validation_errors(errors: ValidationErrors) -> AppError {
    AppError::Validation(flatten_errors(&errors))
}
