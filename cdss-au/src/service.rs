//! Credential/token authority operations
//!
//! Each public operation emits exactly one audit event once its outcome is
//! known: `<op>_success` or `<op>_failed` / `token_rejected`.

use crate::db::{AccountStore, InsertOutcome};
use crate::password;
use crate::token::{IssuedToken, TokenError, TokenSigner};
use cdss_common::api::{AccountView, ApiError, ApiResult, LoginRequest, RegisterRequest};
use cdss_common::audit::{AuditEvent, AuditSubject};
use tracing::{debug, info};

const SERVICE: &str = "authentication";

/// Successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: IssuedToken,
    pub account: AccountView,
}

pub struct AuthService {
    accounts: AccountStore,
    signer: TokenSigner,
    audit: AuditSubject,
}

impl AuthService {
    pub fn new(accounts: AccountStore, signer: TokenSigner, audit: AuditSubject) -> Self {
        Self {
            accounts,
            signer,
            audit,
        }
    }

    pub fn audit(&self) -> &AuditSubject {
        &self.audit
    }

    /// Create an account, returning its id
    pub async fn register(&self, request: RegisterRequest) -> ApiResult<i64> {
        let result = self.try_register(request).await;

        let event = match &result {
            Ok(id) => AuditEvent::new(SERVICE, "register_success", format!("Account {} registered", id))
                .with_account(*id),
            Err(e) => AuditEvent::new(SERVICE, "register_failed", e.public_message()),
        };
        self.audit.notify(event).await;

        result
    }

    async fn try_register(&self, request: RegisterRequest) -> ApiResult<i64> {
        let request = request.normalized()?;

        if self.accounts.find_by_email(&request.email).await?.is_some() {
            return Err(ApiError::DuplicateAccount(request.email));
        }

        let digest = password::hash_blocking(&request.password)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        match self
            .accounts
            .insert(&request.name, &request.surname, &request.email, &digest)
            .await?
        {
            InsertOutcome::Created(id) => {
                info!("Registered account {}", id);
                Ok(id)
            }
            InsertOutcome::DuplicateEmail => Err(ApiError::DuplicateAccount(request.email)),
        }
    }

    /// Verify credentials and issue a token
    ///
    /// Unknown email and wrong password fail identically.
    pub async fn authenticate(&self, request: LoginRequest) -> ApiResult<LoginOutcome> {
        let (result, known_account) = self.try_authenticate(request).await;

        let event = match &result {
            Ok(outcome) => AuditEvent::new(SERVICE, "login_success", "Login succeeded")
                .with_account(outcome.account.id),
            Err(e) => {
                let event = AuditEvent::new(SERVICE, "login_failed", e.public_message());
                match known_account {
                    Some(id) => event.with_account(id),
                    None => event,
                }
            }
        };
        self.audit.notify(event).await;

        result
    }

    /// Returns the outcome plus the account id if the email resolved
    async fn try_authenticate(&self, request: LoginRequest) -> (ApiResult<LoginOutcome>, Option<i64>) {
        let request = match request.normalized() {
            Ok(r) => r,
            Err(e) => return (Err(e), None),
        };

        let account = match self.accounts.find_by_email(&request.email).await {
            Ok(account) => account,
            Err(e) => return (Err(e.into()), None),
        };

        // Unknown emails still pay for one Argon2 verify
        let known_id = account.as_ref().map(|a| a.id);
        let digest = account.as_ref().map(|a| a.password_hash.as_str());
        let verified = match password::verify_blocking(&request.password, digest).await {
            Ok(verified) => verified,
            Err(e) => return (Err(ApiError::Internal(e.to_string())), known_id),
        };

        let account = match account {
            Some(account) if verified => account,
            Some(_) => return (Err(ApiError::InvalidCredentials), known_id),
            None => {
                debug!("Login for unknown email");
                return (Err(ApiError::InvalidCredentials), None);
            }
        };

        let token = match self.signer.sign(account.id) {
            Ok(token) => token,
            Err(e) => return (Err(ApiError::Internal(e.to_string())), Some(account.id)),
        };

        let outcome = LoginOutcome {
            token,
            account: AccountView {
                id: account.id,
                name: account.name,
                surname: account.surname,
                email: account.email,
            },
        };
        (Ok(outcome), Some(account.id))
    }

    /// Resolve a token to its account id
    pub async fn validate(&self, token: &str) -> ApiResult<i64> {
        let result = self.try_validate(token.trim()).await;

        let event = match &result {
            Ok(id) => AuditEvent::new(SERVICE, "token_validated", "Token validated").with_account(*id),
            Err(e) => AuditEvent::new(SERVICE, "token_rejected", e.public_message()),
        };
        self.audit.notify(event).await;

        result
    }

    async fn try_validate(&self, token: &str) -> ApiResult<i64> {
        if token.is_empty() {
            return Err(ApiError::InvalidToken("token is required".to_string()));
        }

        let account_id = self.signer.verify(token).map_err(|e| match e {
            TokenError::Expired => ApiError::InvalidToken("token expired".to_string()),
            other => ApiError::InvalidToken(other.to_string()),
        })?;

        match self.accounts.find_by_id(account_id).await? {
            Some(_) => Ok(account_id),
            None => Err(ApiError::InvalidToken("account no longer exists".to_string())),
        }
    }
}
