use actix_web::{web, HttpRequest, HttpResponse};
use tracing::info;

use crate::auth::api_key::ApiKey;
use crate::auth::service::{Credentials, RefreshTokenBody, RegisterRequest, VerifyRequest};
use crate::error::AppError;
use crate::AppState;

/// Route table for the four auth operations. Each route only accepts POST;
/// other methods get 405.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| AppError::ValidationError(err.to_string()).into()),
    )
    .service(web::resource("/api/auth/users").route(web::post().to(create_user)))
    .service(web::resource("/api/auth/verify").route(web::post().to(verify_user)))
    .service(web::resource("/api/auth/refresh-token").route(web::post().to(refresh_auth_token)))
    .service(web::resource("/api/auth/validate-refresh").route(web::post().to(validate_refresh_token)));
}

pub async fn create_user(
    _: ApiKey,
    state: web::Data<AppState>,
    req: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    info!("Received registration request for email: {}", req.email);
    let tokens = state.auth_service.register(req.into_inner()).await?;
    Ok(HttpResponse::Created().json(tokens))
}

/// Token path when a well-formed `Authorization: Bearer <token>` header is
/// present, credential body otherwise.
pub async fn verify_user(
    _: ApiKey,
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let verify = match bearer_token(&req) {
        Some(token) => VerifyRequest::BearerToken(token.to_string()),
        None => {
            let credentials: Credentials = serde_json::from_slice(&body)
                .map_err(|e| AppError::ValidationError(e.to_string()))?;
            VerifyRequest::Credentials(credentials)
        }
    };

    let verified = state.auth_service.verify_user(verify).await?;
    Ok(HttpResponse::Ok().json(verified))
}

pub async fn refresh_auth_token(
    _: ApiKey,
    state: web::Data<AppState>,
    req: web::Json<RefreshTokenBody>,
) -> Result<HttpResponse, AppError> {
    let token = state.auth_service.refresh_auth_token(&req.refresh_token).await?;
    Ok(HttpResponse::Created().json(token))
}

pub async fn validate_refresh_token(
    _: ApiKey,
    state: web::Data<AppState>,
    req: web::Json<RefreshTokenBody>,
) -> Result<HttpResponse, AppError> {
    let refresh_token = state
        .auth_service
        .validate_refresh_token(req.into_inner().refresh_token)?;
    Ok(HttpResponse::Ok().json(RefreshTokenBody { refresh_token }))
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    let header = req.headers().get("Authorization")?.to_str().ok()?;
    match header.split(' ').collect::<Vec<_>>().as_slice() {
        ["Bearer", token] if !token.is_empty() => Some(*token),
        _ => None,
    }
}
