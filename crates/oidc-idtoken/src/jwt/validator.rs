//! Claim validation for ID tokens
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. `iss` equals the expected issuer
//! 2. `aud` contains the expected audience
//! 3. `exp` is not further in the past than the leeway
//! 4. `nbf` is not further in the future than the leeway
//! 5. `nonce` equals the expected nonce (only when one was supplied)
//!
//! Leeway is symmetric and absorbs clock drift between this host and the
//! identity provider.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::IdTokenClaims;
use crate::error::ClaimError;

/// Default clock leeway
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(30);

/// How to treat tokens without `exp` or `nbf`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeClaimPolicy {
    /// Skip the check when the claim is absent
    #[default]
    Optional,
    /// Reject tokens that omit the claim
    Required,
}

/// Inputs for one validation attempt
///
/// The current time is captured once, when the context is built, so every
/// time check in an attempt sees the same instant.
///
/// # Example
///
/// ```rust
/// use oidc_idtoken::jwt::{IdTokenClaims, ValidationContext};
/// use std::time::Duration;
///
/// let context = ValidationContext::new("https://idp.example.com", "client-1")
///     .at(1_700_000_000)
///     .with_leeway(Duration::from_secs(60));
///
/// let claims: IdTokenClaims = serde_json::from_value(serde_json::json!({
///     "iss": "https://idp.example.com",
///     "aud": "client-1",
///     "exp": 1_699_999_950
/// }))?;
///
/// assert!(context.validate(&claims).is_ok());
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationContext {
    current_time: i64,
    leeway: Duration,
    expected_issuer: String,
    expected_audience: String,
    time_claims: TimeClaimPolicy,
    expected_nonce: Option<String>,
}

impl ValidationContext {
    /// Context for `issuer` and `audience`, evaluated at the current time
    pub fn new(expected_issuer: impl Into<String>, expected_audience: impl Into<String>) -> Self {
        Self {
            current_time: unix_now(),
            leeway: DEFAULT_LEEWAY,
            expected_issuer: expected_issuer.into(),
            expected_audience: expected_audience.into(),
            time_claims: TimeClaimPolicy::default(),
            expected_nonce: None,
        }
    }

    /// Evaluate at a fixed unix timestamp instead of now
    pub fn at(mut self, current_time: i64) -> Self {
        self.current_time = current_time;
        self
    }

    /// Set the clock leeway
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Set the policy for absent `exp` / `nbf`
    pub fn with_time_claim_policy(mut self, policy: TimeClaimPolicy) -> Self {
        self.time_claims = policy;
        self
    }

    /// Require the `nonce` claim to equal `nonce`
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.expected_nonce = Some(nonce.into());
        self
    }

    /// Validation instant (unix seconds)
    pub fn current_time(&self) -> i64 {
        self.current_time
    }

    /// Clock leeway
    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    /// Expected `iss`
    pub fn expected_issuer(&self) -> &str {
        &self.expected_issuer
    }

    /// Expected member of `aud`
    pub fn expected_audience(&self) -> &str {
        &self.expected_audience
    }

    /// Policy for absent time claims
    pub fn time_claim_policy(&self) -> TimeClaimPolicy {
        self.time_claims
    }

    /// Expected `nonce`, if any
    pub fn expected_nonce(&self) -> Option<&str> {
        self.expected_nonce.as_deref()
    }

    /// Check `claims` against this context
    ///
    /// # Errors
    ///
    /// Returns the first failing check as a [`ClaimError`].
    pub fn validate(&self, claims: &IdTokenClaims) -> Result<(), ClaimError> {
        if claims.iss.as_deref() != Some(self.expected_issuer.as_str()) {
            return Err(ClaimError::IssuerMismatch {
                expected: self.expected_issuer.clone(),
                actual: claims.iss.clone(),
            });
        }

        let audience_matches = claims
            .aud
            .as_ref()
            .is_some_and(|aud| aud.contains(&self.expected_audience));
        if !audience_matches {
            return Err(ClaimError::AudienceMismatch {
                expected: self.expected_audience.clone(),
            });
        }

        let leeway_secs = self.leeway.as_secs();
        let leeway = i64::try_from(leeway_secs).unwrap_or(i64::MAX);

        match claims.exp {
            Some(exp) if exp < self.current_time.saturating_sub(leeway) => {
                return Err(ClaimError::Expired {
                    exp,
                    now: self.current_time,
                    leeway: leeway_secs,
                });
            }
            None if self.time_claims == TimeClaimPolicy::Required => {
                return Err(ClaimError::MissingClaim("exp"));
            }
            _ => {}
        }

        match claims.nbf {
            Some(nbf) if nbf > self.current_time.saturating_add(leeway) => {
                return Err(ClaimError::NotYetValid {
                    nbf,
                    now: self.current_time,
                    leeway: leeway_secs,
                });
            }
            None if self.time_claims == TimeClaimPolicy::Required => {
                return Err(ClaimError::MissingClaim("nbf"));
            }
            _ => {}
        }

        if let Some(expected) = &self.expected_nonce
            && claims.nonce.as_ref() != Some(expected)
        {
            return Err(ClaimError::NonceMismatch);
        }

        Ok(())
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::Audience;
    use pretty_assertions::assert_eq;

    const NOW: i64 = 1_700_000_000;
    const ISSUER: &str = "https://idp.example.com";
    const CLIENT: &str = "client-1";

    fn context() -> ValidationContext {
        ValidationContext::new(ISSUER, CLIENT).at(NOW)
    }

    fn claims() -> IdTokenClaims {
        IdTokenClaims {
            iss: Some(ISSUER.to_string()),
            sub: Some("user".to_string()),
            aud: Some(Audience::Single(CLIENT.to_string())),
            exp: Some(NOW + 300),
            nbf: Some(NOW - 10),
            iat: Some(NOW - 10),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_claims_pass() {
        assert_eq!(context().validate(&claims()), Ok(()));
    }

    #[test]
    fn test_defaults() {
        let ctx = ValidationContext::new(ISSUER, CLIENT);
        assert_eq!(ctx.leeway(), Duration::from_secs(30));
        assert_eq!(ctx.time_claim_policy(), TimeClaimPolicy::Optional);
        assert_eq!(ctx.expected_nonce(), None);
        assert!(ctx.current_time() > NOW);
    }

    #[test]
    fn test_exp_boundary() {
        let mut c = claims();
        c.exp = Some(NOW - 30);
        assert_eq!(context().validate(&c), Ok(()));

        c.exp = Some(NOW - 31);
        assert_eq!(
            context().validate(&c),
            Err(ClaimError::Expired {
                exp: NOW - 31,
                now: NOW,
                leeway: 30
            })
        );
    }

    #[test]
    fn test_nbf_boundary() {
        let mut c = claims();
        c.nbf = Some(NOW + 30);
        assert_eq!(context().validate(&c), Ok(()));

        c.nbf = Some(NOW + 31);
        assert!(matches!(
            context().validate(&c),
            Err(ClaimError::NotYetValid { nbf, .. }) if nbf == NOW + 31
        ));
    }

    #[test]
    fn test_zero_leeway_is_exact() {
        let ctx = context().with_leeway(Duration::ZERO);
        let mut c = claims();
        c.exp = Some(NOW);
        assert_eq!(ctx.validate(&c), Ok(()));
        c.exp = Some(NOW - 1);
        assert!(matches!(ctx.validate(&c), Err(ClaimError::Expired { .. })));
    }

    #[test]
    fn test_issuer_checked_first() {
        let mut c = claims();
        c.iss = Some("https://evil.example.com".to_string());
        c.aud = None;
        c.exp = Some(0);
        assert!(matches!(
            context().validate(&c),
            Err(ClaimError::IssuerMismatch { .. })
        ));
    }

    #[test]
    fn test_issuer_is_case_sensitive_and_required() {
        let mut c = claims();
        c.iss = Some(ISSUER.to_uppercase());
        assert!(matches!(
            context().validate(&c),
            Err(ClaimError::IssuerMismatch { .. })
        ));

        c.iss = None;
        assert_eq!(
            context().validate(&c),
            Err(ClaimError::IssuerMismatch {
                expected: ISSUER.to_string(),
                actual: None
            })
        );
    }

    #[test]
    fn test_audience_before_expiry() {
        let mut c = claims();
        c.aud = Some(Audience::Multiple(vec!["someone-else".to_string()]));
        c.exp = Some(0);
        assert_eq!(
            context().validate(&c),
            Err(ClaimError::AudienceMismatch {
                expected: CLIENT.to_string()
            })
        );

        c.aud = None;
        assert!(matches!(
            context().validate(&c),
            Err(ClaimError::AudienceMismatch { .. })
        ));
    }

    #[test]
    fn test_audience_array_membership() {
        let mut c = claims();
        c.aud = Some(Audience::Multiple(vec!["other".into(), CLIENT.into()]));
        assert_eq!(context().validate(&c), Ok(()));
    }

    #[test]
    fn test_absent_time_claims_follow_policy() {
        let mut c = claims();
        c.exp = None;
        c.nbf = None;
        assert_eq!(context().validate(&c), Ok(()));

        let strict = context().with_time_claim_policy(TimeClaimPolicy::Required);
        assert_eq!(strict.validate(&c), Err(ClaimError::MissingClaim("exp")));

        c.exp = Some(NOW + 60);
        assert_eq!(strict.validate(&c), Err(ClaimError::MissingClaim("nbf")));
    }

    #[test]
    fn test_nonce_only_checked_when_expected() {
        let mut c = claims();
        assert_eq!(context().validate(&c), Ok(()));

        let ctx = context().with_nonce("n-1");
        assert_eq!(ctx.validate(&c), Err(ClaimError::NonceMismatch));

        c.nonce = Some("n-2".to_string());
        assert_eq!(ctx.validate(&c), Err(ClaimError::NonceMismatch));

        c.nonce = Some("n-1".to_string());
        assert_eq!(ctx.validate(&c), Ok(()));
    }

    #[test]
    fn test_nonce_checked_after_time_claims() {
        let mut c = claims();
        c.exp = Some(NOW - 3600);
        let ctx = context().with_nonce("n-1");
        assert!(matches!(ctx.validate(&c), Err(ClaimError::Expired { .. })));
    }

    #[test]
    fn test_extreme_values_do_not_overflow() {
        let ctx = ValidationContext::new(ISSUER, CLIENT)
            .at(i64::MIN)
            .with_leeway(Duration::from_secs(u64::MAX));
        let mut c = claims();
        c.exp = Some(i64::MIN);
        c.nbf = Some(i64::MAX);
        assert!(matches!(ctx.validate(&c), Err(ClaimError::NotYetValid { .. })));
    }
}
