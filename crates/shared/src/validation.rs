//! Common validation utilities.
//!
//! All text checks operate on the trimmed value and count characters, not
//! bytes, so accented names are measured the way a person reads them.

use validator::ValidationError;

lazy_static::lazy_static! {
    static ref EVENT_NAME_REGEX: regex::Regex = regex::Regex::new(r"^[\p{L} ]+$").unwrap();
    static ref LOCATION_REGEX: regex::Regex = regex::Regex::new(r"^[\p{L}0-9\s,.\-]+$").unwrap();
}

const EVENT_NAME_MIN: usize = 5;
const EVENT_NAME_MAX: usize = 100;
const LOCATION_MIN: usize = 5;
const LOCATION_MAX: usize = 200;
const PARTICIPANT_NAME_MIN: usize = 3;
const PARTICIPANT_NAME_MAX: usize = 100;
const AFFILIATION_MIN: usize = 2;
const AFFILIATION_MAX: usize = 150;

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

fn char_len_between(value: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&value.chars().count())
}

/// Validates an event name: 5-100 characters, letters and spaces only.
pub fn validate_event_name(name: &str) -> Result<(), ValidationError> {
    let name = name.trim();
    if !char_len_between(name, EVENT_NAME_MIN, EVENT_NAME_MAX) {
        return Err(error(
            "event_name_length",
            "Event name must be 5-100 characters",
        ));
    }
    if !EVENT_NAME_REGEX.is_match(name) {
        return Err(error(
            "event_name_charset",
            "Event name may only contain letters and spaces",
        ));
    }
    Ok(())
}

/// Validates an event location.
///
/// The value must be 5-200 characters of letters, digits, whitespace and
/// `,.-`, and must name at least a city and a country separated by `,` or `.`.
pub fn validate_location(location: &str) -> Result<(), ValidationError> {
    let location = location.trim();
    if !char_len_between(location, LOCATION_MIN, LOCATION_MAX) {
        return Err(error(
            "location_length",
            "Location must be 5-200 characters",
        ));
    }
    if !LOCATION_REGEX.is_match(location) {
        return Err(error(
            "location_charset",
            "Location contains invalid characters",
        ));
    }

    let parts = location
        .split([',', '.'])
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .count();
    if parts < 2 {
        return Err(error(
            "location_format",
            "Location must include a city and a country separated by ',' or '.'",
        ));
    }
    Ok(())
}

/// Validates a participant's display name (3-100 characters).
pub fn validate_participant_name(name: &str) -> Result<(), ValidationError> {
    if char_len_between(name.trim(), PARTICIPANT_NAME_MIN, PARTICIPANT_NAME_MAX) {
        Ok(())
    } else {
        Err(error(
            "participant_name_length",
            "Participant name must be 3-100 characters",
        ))
    }
}

/// Validates a participant's affiliation (2-150 characters).
pub fn validate_affiliation(affiliation: &str) -> Result<(), ValidationError> {
    if char_len_between(affiliation.trim(), AFFILIATION_MIN, AFFILIATION_MAX) {
        Ok(())
    } else {
        Err(error(
            "affiliation_length",
            "Affiliation must be 2-150 characters",
        ))
    }
}

/// Validates that a free-text field is not blank.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(error("blank", "Value must not be blank"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_event_name() {
        assert!(validate_event_name("Congreso de Software").is_ok());
        assert!(validate_event_name("  Jornadas Académicas  ").is_ok());
        assert!(validate_event_name("Ñandú Conf").is_ok());
    }

    #[test]
    fn test_validate_event_name_length() {
        assert!(validate_event_name("Conf").is_err());
        assert!(validate_event_name("   Conf   ").is_err());
        assert!(validate_event_name(&"a".repeat(101)).is_err());
        assert!(validate_event_name(&"a".repeat(100)).is_ok());
    }

    #[test]
    fn test_validate_event_name_charset() {
        let err = validate_event_name("RustConf 2026").unwrap_err();
        assert_eq!(err.code, "event_name_charset");
        assert!(validate_event_name("Rust-Conf").is_err());
    }

    #[test]
    fn test_validate_location() {
        assert!(validate_location("Lima, Perú").is_ok());
        assert!(validate_location("Av. Universitaria 1801, Lima").is_ok());
        assert!(validate_location("Santiago. Chile").is_ok());
    }

    #[test]
    fn test_validate_location_requires_separator() {
        let err = validate_location("Arequipa").unwrap_err();
        assert_eq!(err.code, "location_format");
        assert!(validate_location("Arequipa,").is_err());
        assert!(validate_location(", , Lima").is_err());
    }

    #[test]
    fn test_validate_location_rejects_symbols() {
        let err = validate_location("Lima; Perú").unwrap_err();
        assert_eq!(err.code, "location_charset");
        assert!(validate_location("Lima#1, Perú").is_err());
    }

    #[test]
    fn test_validate_location_length() {
        assert!(validate_location("A,B").is_err());
        let long = format!("{}, Perú", "x".repeat(200));
        assert!(validate_location(&long).is_err());
    }

    #[test]
    fn test_validate_participant_name() {
        assert!(validate_participant_name("Ana").is_ok());
        assert!(validate_participant_name(" Al ").is_err());
        assert!(validate_participant_name(&"n".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_affiliation() {
        assert!(validate_affiliation("UN").is_ok());
        assert!(validate_affiliation("U").is_err());
        assert!(validate_affiliation(&"u".repeat(151)).is_err());
    }

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("inmediata").is_ok());
        assert!(validate_not_blank("   ").is_err());
    }
}
