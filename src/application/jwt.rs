use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::domain::entities::payment::UserType;

/// Claims for an authenticated checkout principal. Token issuance belongs to
/// the auth subsystem; the engine only verifies.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub user_type: UserType,
    pub is_admin: bool,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn account_id(&self) -> AppResult<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Unauthorized)
    }
}

pub fn verify(token: &str, secret: &secrecy::SecretString) -> AppResult<Claims> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized)
}

/// Issue a token. Used by tests; production tokens come from the auth
/// subsystem sharing the same secret.
pub fn issue(
    account_id: Uuid,
    user_type: UserType,
    is_admin: bool,
    secret: &secrecy::SecretString,
    ttl: Duration,
) -> AppResult<String> {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let claims = Claims {
        sub: account_id.to_string(),
        user_type,
        is_admin,
        iat: now,
        exp: now + ttl.whole_seconds(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn roundtrip() {
        let secret = SecretString::new("test_jwt_secret".into());
        let account_id = Uuid::new_v4();
        let token = issue(
            account_id,
            UserType::Company,
            false,
            &secret,
            Duration::hours(1),
        )
        .unwrap();

        let claims = verify(&token, &secret).unwrap();
        assert_eq!(claims.account_id().unwrap(), account_id);
        assert_eq!(claims.user_type, UserType::Company);
        assert!(!claims.is_admin);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let secret = SecretString::new("test_jwt_secret".into());
        let other = SecretString::new("another_secret".into());
        let token = issue(
            Uuid::new_v4(),
            UserType::Candidate,
            false,
            &secret,
            Duration::hours(1),
        )
        .unwrap();
        assert!(matches!(
            verify(&token, &other),
            Err(AppError::Unauthorized)
        ));
    }
}
