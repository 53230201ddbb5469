use std::io::Cursor;

use rocket::http::{ContentType, Status};
use serde_json::json;

use crate::cache::CacheError;
use crate::images::{DownloadError, ImageFetchError};
use crate::search::ValidationError;

#[derive(Debug)]
pub enum ApiError {
    ValidationError(ValidationError),
    DownloadError(DownloadError),
    CacheError(CacheError),
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        ApiError::ValidationError(error)
    }
}

impl From<DownloadError> for ApiError {
    fn from(error: DownloadError) -> Self {
        ApiError::DownloadError(error)
    }
}

impl From<CacheError> for ApiError {
    fn from(error: CacheError) -> Self {
        ApiError::CacheError(error)
    }
}

impl ApiError {
    fn status(&self) -> Status {
        match self {
            ApiError::ValidationError(_) => Status::BadRequest,
            ApiError::DownloadError(DownloadError::EmptyReference) => Status::BadRequest,
            ApiError::DownloadError(DownloadError::NotFound(_)) => Status::NotFound,
            ApiError::DownloadError(DownloadError::Fetch(ImageFetchError::NetworkError(e))) if e.is_timeout() => {
                Status::GatewayTimeout
            }
            ApiError::DownloadError(DownloadError::Fetch(_)) => Status::BadGateway,
            ApiError::DownloadError(DownloadError::Io(_)) => Status::InternalServerError,
            ApiError::CacheError(_) => Status::InternalServerError,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::ValidationError(e) => e.to_string(),
            ApiError::DownloadError(DownloadError::EmptyReference) => "URL vazia".to_string(),
            ApiError::DownloadError(DownloadError::NotFound(path)) => {
                format!("Arquivo não encontrado: {}", path)
            }
            ApiError::DownloadError(e) => format!("Erro download: {}", e),
            ApiError::CacheError(e) => format!("Erro ao ler cache: {}", e),
        }
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        let status = self.status();
        if status.code >= 500 {
            log::error!("Request failed: {}", self.message());
        }

        let body = json!({ "erro": self.message() }).to_string();

        rocket::Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}
