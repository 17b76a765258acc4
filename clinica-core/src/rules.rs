//! Association and field rules.
//!
//! Pure functions with no store access; callers fetch state first and pass in
//! the counts and field values to check.

use crate::error::{ClinicError, Result};

/// Cap on the patient->doctor side of the relation.
pub const MAX_DOCTORS_PER_PATIENT: usize = 5;
/// Cap on the doctor->patient side of the relation.
pub const MAX_PATIENTS_PER_DOCTOR: usize = 5;
/// Minimum length of a patient name, in characters.
pub const MIN_NAME_LEN: usize = 3;
/// Maximum length of a diagnosis description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 200;

/// True iff one more edge fits under the cap.
pub fn can_add_association(current_count: usize, max: usize) -> bool {
    current_count < max
}

pub fn validate_name_min_length(text: &str, min: usize) -> Result<()> {
    if text.chars().count() < min {
        return Err(ClinicError::precondition_failed(format!(
            "The name must be at least {min} characters long"
        )));
    }
    Ok(())
}

pub fn validate_description_length(text: &str, max: usize) -> Result<()> {
    if text.chars().count() > max {
        return Err(ClinicError::precondition_failed(format!(
            "The description cannot exceed {max} characters"
        )));
    }
    Ok(())
}

/// Non-empty check for required fields. `message` is the failure message.
pub fn validate_required(text: &str, message: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(ClinicError::precondition_failed(message));
    }
    Ok(())
}

/// Syntactic phone number check: optional leading '+', then digits with
/// common separators, 7 to 15 digits in total.
pub fn validate_phone(text: &str) -> Result<()> {
    let rest = text.strip_prefix('+').unwrap_or(text);
    let digits = rest.chars().filter(char::is_ascii_digit).count();
    let well_formed = !rest.is_empty()
        && rest
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')' | '.'));

    if !well_formed || !(7..=15).contains(&digits) {
        return Err(ClinicError::precondition_failed(
            "The phone number is not a valid phone number",
        ));
    }
    Ok(())
}
