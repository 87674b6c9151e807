use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::{AppError, AuthError};
use crate::AppState;

pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Extractor guarding the auth routes: the request must carry the configured
/// shared key in `X-Api-Key`.
#[derive(Debug, Clone, Copy)]
pub struct ApiKey;

impl FromRequest for ApiKey {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(check_api_key(req))
    }
}

fn check_api_key(req: &HttpRequest) -> Result<ApiKey, AppError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| AppError::InternalError("application state not configured".into()))?;

    let presented = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    let expected = state.config.auth.api_key.as_bytes();
    let matches: bool = presented.as_bytes().ct_eq(expected).into();

    if presented.is_empty() || !matches {
        warn!("Rejected request to {} with missing or invalid API key", req.path());
        return Err(AuthError::MissingApiKey.into());
    }

    Ok(ApiKey)
}
