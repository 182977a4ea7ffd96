//! Member identity as supplied by the authentication layer

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "member_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum MemberRole {
    Admin,
    Librarian,
    Member,
}

impl MemberRole {
    /// Staff may see every loan and manage the catalog
    pub fn is_staff(&self) -> bool {
        matches!(self, MemberRole::Admin | MemberRole::Librarian)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Member {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: MemberRole,
}

/// Member fields shown alongside a loan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MemberShort {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<&Member> for MemberShort {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id,
            name: member.name.clone(),
            email: member.email.clone(),
        }
    }
}

/// JWT claims carried by an authenticated request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberClaims {
    pub sub: Uuid,
    pub role: MemberRole,
    pub exp: i64,
    pub iat: i64,
}

impl MemberClaims {
    pub fn new(member_id: Uuid, role: MemberRole, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: member_id,
            role,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }

    pub fn member_id(&self) -> Uuid {
        self.sub
    }

    /// Sign the claims. Issuing tokens belongs to the identity layer; this is
    /// kept for tooling and tests.
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Requires ADMIN or LIBRARIAN role".to_string(),
            ))
        }
    }
}
