//! Auth service
//!
//! Sign-in, sign-out and user provisioning against the local credential
//! store. Tokens are opaque; only their digest is persisted.

use crate::config;
use crate::crypto;
use crate::database::{Repository, Role, User};
use crate::error::{AppError, AuthError, Result};
use crate::services::validation::{require_min_len, require_non_empty, validate_login};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// A successful sign-in. `token` is only ever handed out here.
#[derive(Debug, Clone, Serialize)]
pub struct SignIn {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Service for authentication
#[derive(Clone)]
pub struct AuthService {
    repo: Repository,
    token_ttl: Duration,
}

impl AuthService {
    pub fn new(repo: Repository, token_ttl_hours: i64) -> Self {
        Self {
            repo,
            token_ttl: Duration::hours(token_ttl_hours),
        }
    }

    /// Verify a credential pair and issue a token
    pub async fn sign_in(&self, login: &str, password: &str) -> Result<SignIn> {
        let login = login.trim();
        validate_login(login)?;

        let user = self
            .repo
            .find_user_by_login(login)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !crypto::verify_password(password, &user.password_hash).await {
            tracing::warn!("Rejected sign-in for {}: wrong password", login);
            return Err(AuthError::WrongCredential.into());
        }

        let token = crypto::generate_token();
        let expires_at = Utc::now() + self.token_ttl;
        self.repo
            .insert_token(&crypto::token_digest(&token), &user.id, expires_at.timestamp())
            .await?;

        tracing::info!("User signed in: {} ({})", user.login, user.role);

        Ok(SignIn {
            token,
            expires_at,
            user,
        })
    }

    /// Sign in on behalf of a role-specific dashboard.
    ///
    /// When the identity holds a different role the freshly issued token is
    /// revoked before the rejection is returned.
    pub async fn sign_in_as(&self, login: &str, password: &str, role: Role) -> Result<SignIn> {
        let signed_in = self.sign_in(login, password).await?;

        if signed_in.user.role != role {
            tracing::warn!(
                "Rejected sign-in for {}: holds {} role, requested {}",
                signed_in.user.login,
                signed_in.user.role,
                role
            );
            self.sign_out(&signed_in.token).await?;
            return Err(AuthError::RoleMismatch(role.to_string()).into());
        }

        Ok(signed_in)
    }

    /// Revoke a token. Unknown tokens are ignored.
    pub async fn sign_out(&self, token: &str) -> Result<()> {
        self.repo.delete_token(&crypto::token_digest(token)).await?;
        tracing::debug!("Token revoked");
        Ok(())
    }

    /// Resolve a bearer token to its user
    pub async fn authenticate(&self, token: &str) -> Result<User> {
        let user = self
            .repo
            .find_user_by_token(&crypto::token_digest(token), Utc::now().timestamp())
            .await?
            .ok_or(AuthError::InvalidToken)?;

        Ok(user)
    }

    /// Provision a login with a credential pair
    pub async fn create_user(
        &self,
        login: &str,
        password: &str,
        role: Role,
        name: &str,
    ) -> Result<User> {
        let login = login.trim();
        validate_login(login)?;
        require_min_len("Password", password, config::MIN_PASSWORD_LENGTH)?;
        require_non_empty("Name", name)?;

        let hash = crypto::hash_password(password).await?;
        let user = self.repo.create_user(login, &hash, role, name.trim()).await?;

        tracing::info!("Created {} login: {}", role, user.login);
        Ok(user)
    }

    /// Create the bootstrap admin account if no user holds `login` yet
    pub async fn ensure_admin_user(&self, login: &str, password: &str) -> Result<User> {
        if let Some(existing) = self.repo.find_user_by_login(login.trim()).await? {
            if existing.role != Role::Admin {
                return Err(AppError::Generic(format!(
                    "Bootstrap admin login {} belongs to a {} account",
                    existing.login, existing.role
                )));
            }
            return Ok(existing);
        }

        tracing::info!("Creating bootstrap admin: {}", login);
        self.create_user(login, password, Role::Admin, "Admin").await
    }

    pub async fn prune_expired_tokens(&self) -> Result<u64> {
        let removed = self
            .repo
            .delete_expired_tokens(Utc::now().timestamp())
            .await?;

        if removed > 0 {
            tracing::info!("Pruned {} expired tokens", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::create_memory_pool;

    async fn create_test_service() -> AuthService {
        let repo = Repository::new(create_memory_pool().await.unwrap());
        AuthService::new(repo, 1)
    }

    #[tokio::test]
    async fn test_sign_in_and_authenticate() {
        let auth = create_test_service().await;
        auth.create_user("admin@college.edu", "admin123", Role::Admin, "Admin")
            .await
            .unwrap();

        let signed_in = auth.sign_in("admin@college.edu", "admin123").await.unwrap();
        let user = auth.authenticate(&signed_in.token).await.unwrap();

        assert_eq!(user.login, "admin@college.edu");
        assert_eq!(user.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_sign_in_errors() {
        let auth = create_test_service().await;
        auth.create_user("admin@college.edu", "admin123", Role::Admin, "Admin")
            .await
            .unwrap();

        let unknown = auth.sign_in("nobody@college.edu", "admin123").await;
        assert!(matches!(unknown, Err(AppError::Auth(AuthError::UserNotFound))));

        let wrong = auth.sign_in("admin@college.edu", "nope-nope").await;
        assert!(matches!(wrong, Err(AppError::Auth(AuthError::WrongCredential))));

        let malformed = auth.sign_in("admin", "admin123").await;
        assert!(matches!(
            malformed,
            Err(AppError::Auth(AuthError::MalformedIdentifier(_)))
        ));
    }

    #[tokio::test]
    async fn test_role_mismatch_revokes_token() {
        let auth = create_test_service().await;
        auth.create_user("admin@college.edu", "admin123", Role::Admin, "Admin")
            .await
            .unwrap();

        let result = auth
            .sign_in_as("admin@college.edu", "admin123", Role::Student)
            .await;
        assert!(matches!(result, Err(AppError::Auth(AuthError::RoleMismatch(_)))));

        let leftover: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM auth_tokens")
            .fetch_one(auth.repo.pool_for_tests())
            .await
            .unwrap();
        assert_eq!(leftover, 0);
    }

    #[tokio::test]
    async fn test_sign_out_invalidates_token() {
        let auth = create_test_service().await;
        auth.create_user("admin@college.edu", "admin123", Role::Admin, "Admin")
            .await
            .unwrap();

        let signed_in = auth.sign_in("admin@college.edu", "admin123").await.unwrap();
        auth.sign_out(&signed_in.token).await.unwrap();

        let result = auth.authenticate(&signed_in.token).await;
        assert!(matches!(result, Err(AppError::Auth(AuthError::InvalidToken))));
    }

    #[tokio::test]
    async fn test_ensure_admin_is_idempotent() {
        let auth = create_test_service().await;

        let first = auth
            .ensure_admin_user("admin@college.edu", "admin123")
            .await
            .unwrap();
        let second = auth
            .ensure_admin_user("admin@college.edu", "different")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert!(auth.sign_in("admin@college.edu", "admin123").await.is_ok());
    }

    #[tokio::test]
    async fn test_create_user_validation() {
        let auth = create_test_service().await;

        let short = auth
            .create_user("asha@college.edu", "123", Role::Student, "Asha")
            .await;
        assert!(matches!(short, Err(AppError::Validation(_))));

        let bad_login = auth
            .create_user("asha", "secret1", Role::Student, "Asha")
            .await;
        assert!(matches!(
            bad_login,
            Err(AppError::Auth(AuthError::MalformedIdentifier(_)))
        ));
    }
}
