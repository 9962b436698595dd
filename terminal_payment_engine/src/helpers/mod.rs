mod registration_code;
mod webhook_signature;

pub use registration_code::{normalize_registration_code, RegistrationCodeError};
pub use webhook_signature::{sign_payload, verify_signature, SignatureError, DEFAULT_SIGNATURE_TOLERANCE};
