use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a valid registration code. Expected two groups of five letters or digits, e.g. ABCDE-12345")]
pub struct RegistrationCodeError(pub String);

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9]{5}-[A-Z0-9]{5}$").expect("registration code regex is valid"))
}

/// Upper-cases the code and checks that it has the `XXXXX-XXXXX` shape printed on reader screens.
pub fn normalize_registration_code(code: &str) -> Result<String, RegistrationCodeError> {
    let normalized = code.trim().to_ascii_uppercase();
    if code_pattern().is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(RegistrationCodeError(code.to_string()))
    }
}
