use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StripeApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("The Stripe secret key has not been configured")]
    NotConfigured,
    #[error("Could not reach Stripe: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The requested resource does not exist: {0}")]
    NotFound(String),
}

impl StripeApiError {
    /// True for failures where the request may never have reached Stripe.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NotConfigured | Self::RestRequestError(_) | Self::Initialization(_))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub message: Option<String>,
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
}

impl ErrorBody {
    pub fn describe(&self) -> String {
        let message = self.message.as_deref().unwrap_or("no message");
        match (&self.error_type, &self.code) {
            (Some(t), Some(c)) => format!("{message} ({t}/{c})"),
            (Some(t), None) => format!("{message} ({t})"),
            (None, Some(c)) => format!("{message} ({c})"),
            (None, None) => message.to_string(),
        }
    }
}
