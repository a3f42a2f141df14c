use validator::Validate;

use crate::api::errors::ApiError;

pub(crate) fn validate_payload<T: Validate>(payload: &T) -> Result<(), ApiError> {
    payload.validate().map_err(|errors| ApiError::BadRequest(format_errors(&errors)))
}

fn format_errors(errors: &validator::ValidationErrors) -> String {
    let mut parts: Vec<String> = Vec::new();
    for (field, issues) in errors.field_errors() {
        for issue in issues {
            match &issue.message {
                Some(message) => parts.push(format!("{field}: {message}")),
                None => parts.push(format!("{field}: invalid value")),
            }
        }
    }
    parts.sort();
    parts.join("; ")
}
