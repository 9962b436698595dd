use actix_web::{web, HttpRequest};
use log::*;

use crate::errors::ServerError;

pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Path segments that fail validation (e.g. a malformed shop id) are reported as 400s with a JSON body, rather than
/// actix's default 404.
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, req| {
        debug!("💻️ Invalid path in {}. {err}", req.path());
        ServerError::InvalidRequestPath(err.to_string()).into()
    })
}

pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, req| {
        debug!("💻️ Invalid request body for {}. {err}", req.path());
        ServerError::InvalidRequestBody(err.to_string()).into()
    })
}

/// The value of the webhook signature header. A missing or non-ASCII header is returned as an empty string, which
/// fails verification.
pub fn signature_header(req: &HttpRequest) -> &str {
    req.headers().get(STRIPE_SIGNATURE_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default()
}
