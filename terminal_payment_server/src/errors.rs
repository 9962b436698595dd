use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use serde_json::json;
use terminal_payment_engine::{DispatchError, ShopAccountError, TerminalError, WebhookError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("{0}")]
    Terminal(#[from] TerminalError),
    #[error("{0}")]
    ShopAccount(#[from] ShopAccountError),
    #[error("{0}")]
    Dispatch(#[from] DispatchError),
    #[error("{0}")]
    Webhook(#[from] WebhookError),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Terminal(e) => match e {
                TerminalError::InvalidRegistrationCode(_) => StatusCode::BAD_REQUEST,
                TerminalError::ShopNotFound(_) => StatusCode::NOT_FOUND,
                TerminalError::AlreadyRegistered { .. } => StatusCode::CONFLICT,
                TerminalError::NoAvailableDevice(_) => StatusCode::CONFLICT,
                TerminalError::LocationCreationFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                TerminalError::ProcessorUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                TerminalError::ProcessorError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                TerminalError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::ShopAccount(e) => match e {
                ShopAccountError::ShopNotFound(_) => StatusCode::NOT_FOUND,
                ShopAccountError::NotConnected(_) => StatusCode::BAD_REQUEST,
                ShopAccountError::ValidationError { .. } => StatusCode::BAD_REQUEST,
                ShopAccountError::ProcessorUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                ShopAccountError::ProcessorError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                ShopAccountError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Dispatch(e) => match e {
                DispatchError::InvoiceNotFound { .. } => StatusCode::NOT_FOUND,
                DispatchError::InvalidAmount { .. } => StatusCode::BAD_REQUEST,
                DispatchError::NoTerminal(_) => StatusCode::NOT_FOUND,
                DispatchError::PaymentInProgress(_) => StatusCode::CONFLICT,
                DispatchError::InvoiceNotPayable { .. } => StatusCode::CONFLICT,
                DispatchError::ProcessorUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                DispatchError::ProcessorError { .. } => StatusCode::BAD_GATEWAY,
                DispatchError::TerminalProcessingFailed { .. } => StatusCode::BAD_GATEWAY,
                DispatchError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Webhook(e) => match e {
                WebhookError::SignatureInvalid(_) => StatusCode::BAD_REQUEST,
                WebhookError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            Self::Terminal(TerminalError::AlreadyRegistered { terminal_id, .. }) => {
                json!({ "error": self.to_string(), "existing_terminal_id": terminal_id })
            },
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(body.to_string())
    }
}
