use rocket::http::Status;
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::Request;
use thiserror::Error;

use crate::types::ErrorResponse;

/// Errors surfaced by the HTTP layer. Only the `Display` text reaches the
/// client; server-side causes are logged.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No ingredients provided. Please provide at least one ingredient.")]
    NoIngredients,

    #[error("No valid ingredients found after cleaning.")]
    NoValidIngredients,

    #[error("Recipe generation failed. Please try again later.")]
    Generation(anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::NoIngredients | ApiError::NoValidIngredients => Status::BadRequest,
            ApiError::Generation(_) => Status::InternalServerError,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Generation(err)
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        match &self {
            ApiError::Generation(cause) => {
                tracing::error!(uri = %req.uri(), error = ?cause, "unexpected error while generating recipes")
            }
            other => tracing::warn!(uri = %req.uri(), "rejected request: {other}"),
        }

        let status = self.status();
        let body = Json(ErrorResponse {
            detail: self.to_string(),
        });
        (status, body).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_errors_hide_their_cause() {
        let err = ApiError::from(anyhow::anyhow!("tensor shape mismatch"));

        assert_eq!(err.status(), Status::InternalServerError);
        assert!(!err.to_string().contains("tensor"));
    }

    #[test]
    fn client_errors_are_bad_requests() {
        assert_eq!(ApiError::NoIngredients.status(), Status::BadRequest);
        assert_eq!(ApiError::NoValidIngredients.status(), Status::BadRequest);
    }
}
