//! Required-label validation rules.
//!
//! Labels are persisted as a comma-separated list, hence the comma ban.

use accounts_sdk::PolicyError;

pub fn validate_required_labels(labels: &[String]) -> Result<(), PolicyError> {
    for label in labels {
        if label.is_empty() {
            return Err(PolicyError::new("required labels must not be empty"));
        }
        if label.contains(',') {
            return Err(PolicyError::new(format!(
                "required label {label:?} must not contain a comma",
            )));
        }
    }
    Ok(())
}
