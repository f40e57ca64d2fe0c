//! Request/response types exchanged between CDSS services
//!
//! The gateway and the upstream services share these definitions so the
//! gateway can forward bodies without re-shaping them.

use super::error::ApiError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 100;

// ========================================
// Health
// ========================================

/// Health check response (GET /health on every service)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

// ========================================
// Authentication
// ========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    /// Trim all fields and check them
    pub fn normalized(self) -> Result<Self, ApiError> {
        let req = Self {
            name: self.name.trim().to_string(),
            surname: self.surname.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.trim().to_string(),
        };

        if req.name.is_empty() {
            return Err(ApiError::Validation("name is required".to_string()));
        }
        if req.surname.is_empty() {
            return Err(ApiError::Validation("surname is required".to_string()));
        }
        validate_email(&req.email)?;

        let len = req.password.chars().count();
        if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
            return Err(ApiError::Validation(format!(
                "password must be {}-{} characters",
                PASSWORD_MIN_LEN, PASSWORD_MAX_LEN
            )));
        }

        Ok(req)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub account_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn normalized(self) -> Result<Self, ApiError> {
        let req = Self {
            email: self.email.trim().to_string(),
            password: self.password.trim().to_string(),
        };
        validate_email(&req.email)?;
        if req.password.is_empty() {
            return Err(ApiError::Validation("password is required".to_string()));
        }
        Ok(req)
    }
}

/// Display fields of an account, fetched fresh at login
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountView {
    pub id: i64,
    pub name: String,
    pub surname: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub account: AccountView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub message: String,
    pub account_id: i64,
}

/// Minimal syntactic check: `local@domain.tld`, no whitespace
pub fn validate_email(email: &str) -> Result<(), ApiError> {
    let invalid = || ApiError::Validation(format!("invalid email address: '{}'", email));

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    let (host, tld) = domain.rsplit_once('.').ok_or_else(invalid)?;
    if host.is_empty() || host.starts_with('.') || tld.len() < 2 {
        return Err(invalid());
    }
    if !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid());
    }
    Ok(())
}

// ========================================
// Data processing
// ========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub strategy: String,
    pub raw_data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub message: String,
    pub artifact_id: i64,
}

/// Stored output of the preprocessing pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactView {
    pub id: i64,
    pub tag: String,
    pub payload: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveResponse {
    pub message: String,
    pub artifact: ArtifactView,
}

// ========================================
// Analysis and reports
// ========================================

/// Analysis request as received by the analysis service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub account_id: i64,
    pub patient_hashed_id: String,
    pub strategy: String,
    pub artifact_id: i64,
}

/// Analysis request as received by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayAnalyseRequest {
    pub patient_hashed_id: String,
    pub strategy: String,
    pub raw_data: String,
}

impl GatewayAnalyseRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_patient_hash(&self.patient_hashed_id)?;
        if self.strategy.trim().is_empty() {
            return Err(ApiError::Validation("strategy is required".to_string()));
        }
        Ok(())
    }
}

/// Patient identifiers arrive already hashed; only emptiness is checked here
pub fn validate_patient_hash(patient_hashed_id: &str) -> Result<(), ApiError> {
    if patient_hashed_id.trim().is_empty() {
        return Err(ApiError::Validation("patient_hashed_id is required".to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportView {
    pub id: i64,
    pub account_id: i64,
    pub patient_hashed_id: String,
    pub artifact_id: i64,
    pub strategy: String,
    pub diagnosis: String,
    pub confidence: f64,
    pub explanation: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportResponse {
    pub message: String,
    pub report: ReportView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsResponse {
    pub message: String,
    pub reports: Vec<ReportView>,
}

/// Optional patient filter for report listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportsQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_hashed_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(name: &str, surname: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.into(),
            surname: surname.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn test_register_trims_fields() {
        let req = register("  Alice ", " Liddell", " alice@example.org ", "  wonderland  ")
            .normalized()
            .unwrap();
        assert_eq!(req.name, "Alice");
        assert_eq!(req.surname, "Liddell");
        assert_eq!(req.email, "alice@example.org");
        assert_eq!(req.password, "wonderland");
    }

    #[test]
    fn test_register_field_lengths() {
        assert!(register("   ", "Liddell", "a@b.co", "password1").normalized().is_err());
        assert!(register("Al", "  ", "a@b.co", "password1").normalized().is_err());
        assert!(register("alice", "x", "alice@x.com", "pw123456").normalized().is_ok());
        assert!(register("Al", "Li", "a@b.co", "  short  ").normalized().is_err());
        assert!(register("Al", "Li", "a@b.co", &"x".repeat(101)).normalized().is_err());
        assert!(register("Al", "Li", "a@b.co", &"x".repeat(100)).normalized().is_ok());
    }

    #[test]
    fn test_email_syntax() {
        for ok in ["a@b.co", "first.last@clinic.example.org", "x+tag@host.io"] {
            assert!(validate_email(ok).is_ok(), "{} should be valid", ok);
        }
        for bad in ["", "plain", "@b.co", "a@", "a@b", "a@.co", "a@b.c", "a b@c.org", "a@b@c.org"] {
            assert!(validate_email(bad).is_err(), "{} should be invalid", bad);
        }
    }

    #[test]
    fn test_login_requires_password() {
        let req = LoginRequest {
            email: "a@b.co".into(),
            password: "   ".into(),
        };
        assert!(matches!(req.normalized(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn test_reports_query_omits_absent_filter() {
        let json = serde_json::to_string(&ReportsQuery::default()).unwrap();
        assert_eq!(json, "{}");
    }
}
