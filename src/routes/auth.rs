use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::Role;
use crate::services::Actor;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid, // user_id
    pub role: Role,
    pub exp: i64, // expiration timestamp
}

/// Verifies bearer tokens minted by the account service.
pub struct AuthService {
    jwt_secret: String,
}

impl AuthService {
    pub fn new(jwt_secret: String) -> Self {
        Self { jwt_secret }
    }

    pub fn verify_token(&self, token: &str) -> Result<Actor, jsonwebtoken::errors::Error> {
        let mut validation = jsonwebtoken::Validation::default();

        validation.leeway = 10;
        validation.validate_exp = true;
        validation.algorithms = vec![jsonwebtoken::Algorithm::HS256];

        let token_data = jsonwebtoken::decode::<Claims>(
            token,
            &jsonwebtoken::DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|err| {
            tracing::error!("Error decoding token: {:?}", err);
            err
        })?;

        Ok(Actor {
            user_id: token_data.claims.sub,
            role: token_data.claims.role,
        })
    }
}
