//! Bearer token claims and the user directory
//!
//! Tokens are issued by the external auth provider; this server only verifies
//! them and reads the subject and role. Profiles are keyed by the token
//! subject. The directory role is what the auth provider reads when it issues
//! tokens; requests here are authorized by the role claim alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::enums::Role;
use crate::error::AppError;

/// User directory entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserProfile {
    /// Same id as the token subject
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
pub struct ProfileRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for UserProfile {
    type Error = AppError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            role: row.role.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Own profile, created on first save. The role cannot be set here.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateProfile {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Administrator edit of any existing profile
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct AdminUpdateProfile {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub role: Option<Role>,
}

/// User directory query
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ProfileQuery {
    /// `admin` or `user`
    pub role: Option<String>,
    /// Case-insensitive substring of name or email
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileFilter {
    pub role: Option<Role>,
    pub search: Option<String>,
}

impl TryFrom<ProfileQuery> for ProfileFilter {
    type Error = AppError;

    fn try_from(query: ProfileQuery) -> Result<Self, Self::Error> {
        Ok(Self {
            role: query.role.as_deref().map(str::parse).transpose()?,
            search: query
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        })
    }
}

impl ProfileFilter {
    pub fn matches(&self, profile: &UserProfile) -> bool {
        self.role.map_or(true, |r| profile.role == r)
            && self.search.as_ref().map_or(true, |needle| {
                let needle = needle.to_lowercase();
                profile.name.to_lowercase().contains(&needle)
                    || profile.email.to_lowercase().contains(&needle)
            })
    }
}

/// JWT claims for authentication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// User id assigned by the auth provider
    pub sub: Uuid,
    #[serde(default)]
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
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

    pub fn user_id(&self) -> Uuid {
        self.sub
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator role required".to_string()))
        }
    }

    /// Allow access to a user's own data, or to anyone's for administrators
    pub fn require_self_or_admin(&self, user_id: Uuid) -> Result<(), AppError> {
        if self.sub == user_id || self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Cannot access another user's records".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn claims(role: Role) -> UserClaims {
        let now = Utc::now().timestamp();
        UserClaims {
            sub: Uuid::new_v4(),
            role,
            exp: now + 3600,
            iat: now,
        }
    }

    #[test]
    fn test_token_round_trip() {
        let original = claims(Role::Admin);
        let token = original.create_token("secret").unwrap();
        let parsed = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(parsed.sub, original.sub);
        assert_eq!(parsed.role, Role::Admin);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = claims(Role::User).create_token("secret").unwrap();
        assert!(UserClaims::from_token(&token, "other").is_err());
    }

    #[test]
    fn test_missing_role_defaults_to_user() {
        let now = Utc::now().timestamp();
        let json = format!(
            r#"{{"sub":"{}","exp":{},"iat":{}}}"#,
            Uuid::new_v4(),
            now + 60,
            now
        );
        let parsed: UserClaims = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.role, Role::User);
    }

    #[test]
    fn test_profile_filter() {
        let now = Utc::now();
        let profile = UserProfile {
            id: Uuid::new_v4(),
            name: "Ana Torres".into(),
            email: "ana@school.edu".into(),
            role: Role::Admin,
            created_at: now,
            updated_at: now,
        };
        let filter = ProfileFilter::try_from(ProfileQuery {
            role: Some("admin".into()),
            search: Some(" SCHOOL ".into()),
        })
        .unwrap();
        assert!(filter.matches(&profile));

        let users_only = ProfileFilter {
            role: Some(Role::User),
            search: None,
        };
        assert!(!users_only.matches(&profile));

        assert!(ProfileFilter::try_from(ProfileQuery {
            role: Some("tecnico".into()),
            search: None,
        })
        .is_err());
    }

    #[test]
    fn test_profile_email_validated() {
        let update = UpdateProfile {
            name: "Ana".into(),
            email: "not-an-email".into(),
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_self_or_admin() {
        let user = claims(Role::User);
        assert!(user.require_self_or_admin(user.sub).is_ok());
        assert!(user.require_self_or_admin(Uuid::new_v4()).is_err());
        assert!(claims(Role::Admin).require_self_or_admin(Uuid::new_v4()).is_ok());
        assert!(user.require_admin().is_err());
    }
}
