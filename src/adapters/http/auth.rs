use axum::http::HeaderMap;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::jwt,
    application::use_cases::access::Principal,
};

/// Extract the bearer principal, failing with `Unauthorized` when the header
/// is absent or the token does not verify.
pub fn current_principal(headers: &HeaderMap, app_state: &AppState) -> AppResult<Principal> {
    optional_principal(headers, app_state)?.ok_or(AppError::Unauthorized)
}

/// Extract the bearer principal if an Authorization header is present.
/// A present-but-invalid token is still an error; only absence is `None`.
pub fn optional_principal(
    headers: &HeaderMap,
    app_state: &AppState,
) -> AppResult<Option<Principal>> {
    let Some(value) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| AppError::Unauthorized)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?;

    let claims = jwt::verify(token, &app_state.config.jwt_secret)?;
    Ok(Some(Principal {
        account_id: claims.account_id()?,
        is_admin: claims.is_admin,
    }))
}
