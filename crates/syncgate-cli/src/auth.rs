//! Authentication: bearer credentials to `UserContext`
//!
//! Strategies are tried in order and the first one that accepts the token
//! wins. A shared secret grants self-hosted (full bucket) access; signed
//! claims grant a cloud tenant prefix.

use crate::config::GatewayConfig;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;
use subtle::ConstantTimeEq;
use syncgate_core::UserContext;
use thiserror::Error;

/// Asymmetric algorithms accepted for signed claims
pub const ALLOWED_ALGORITHMS: &[Algorithm] = &[
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::EdDSA,
];

/// Why a request could not be authenticated
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing or malformed authorization header")]
    MissingHeader,

    #[error("invalid credential")]
    InvalidCredential,

    #[error("no credential mechanism configured")]
    ServerMisconfigured,
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time
    pub exp: i64,
    /// Issued at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Tenant root override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Shared team root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_prefix: Option<String>,
    /// Profile quota hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_limit: Option<u32>,
}

/// Shared-secret verification
pub struct SharedSecret {
    digest: [u8; 32],
}

impl SharedSecret {
    pub fn new(secret: &str) -> Self {
        Self {
            digest: Sha256::digest(secret.as_bytes()).into(),
        }
    }

    fn verify(&self, token: &str) -> Option<UserContext> {
        // Comparing digests keeps the secret's length out of the timing
        let candidate = Sha256::digest(token.as_bytes());
        if bool::from(candidate.as_slice().ct_eq(&self.digest)) {
            Some(UserContext::self_hosted())
        } else {
            None
        }
    }
}

/// Signed-claim verification against a public key
pub struct SignedClaims {
    key: DecodingKey,
    validation: Validation,
}

impl SignedClaims {
    /// Build a verifier from a PEM public key
    pub fn from_pem(
        pem: &[u8],
        algorithm: Algorithm,
        issuer: Option<&str>,
        audience: Option<&str>,
    ) -> anyhow::Result<Self> {
        if !ALLOWED_ALGORITHMS.contains(&algorithm) {
            anyhow::bail!("algorithm {:?} is not allowed for signed claims", algorithm);
        }

        let key = match algorithm {
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem)?,
            Algorithm::EdDSA => DecodingKey::from_ed_pem(pem)?,
            _ => DecodingKey::from_rsa_pem(pem)?,
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);
        match issuer {
            Some(iss) => validation.set_issuer(&[iss]),
            None => validation.iss = None,
        }
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        Ok(Self { key, validation })
    }

    fn verify(&self, token: &str) -> Option<UserContext> {
        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| tracing::debug!("Token validation failed: {}", e))
            .ok()?;
        claims_to_context(claims)
    }
}

/// One way of turning a token into a context
pub enum CredentialStrategy {
    SharedSecret(SharedSecret),
    SignedClaims(SignedClaims),
}

impl CredentialStrategy {
    /// Context for the token, `None` if this strategy does not accept it
    pub fn verify(&self, token: &str) -> Option<UserContext> {
        match self {
            Self::SharedSecret(s) => s.verify(token),
            Self::SignedClaims(s) => s.verify(token),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::SharedSecret(_) => "shared-secret",
            Self::SignedClaims(_) => "signed-claims",
        }
    }
}

/// Ordered set of credential strategies
#[derive(Default)]
pub struct CredentialResolver {
    strategies: Vec<CredentialStrategy>,
}

impl CredentialResolver {
    /// Create a resolver trying `strategies` in order
    pub fn new(strategies: Vec<CredentialStrategy>) -> Self {
        Self { strategies }
    }

    /// Build the strategies the configuration enables
    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let mut strategies = Vec::new();

        if let Some(secret) = config.shared_secret.as_deref().filter(|s| !s.is_empty()) {
            strategies.push(CredentialStrategy::SharedSecret(SharedSecret::new(secret)));
        }

        let pem = match (&config.jwt_public_key, &config.jwt_public_key_file) {
            (Some(_), Some(_)) => {
                anyhow::bail!("configure either a JWT public key or a key file, not both")
            }
            (Some(text), None) => Some(text.clone().into_bytes()),
            (None, Some(path)) => Some(std::fs::read(path).map_err(|e| {
                anyhow::anyhow!("failed to read JWT public key {}: {}", path.display(), e)
            })?),
            (None, None) => None,
        };
        if let Some(pem) = pem {
            let algorithm = parse_algorithm(&config.jwt_algorithm)?;
            strategies.push(CredentialStrategy::SignedClaims(SignedClaims::from_pem(
                &pem,
                algorithm,
                config.jwt_issuer.as_deref(),
                config.jwt_audience.as_deref(),
            )?));
        }

        Ok(Self::new(strategies))
    }

    /// Whether any strategy is configured
    pub fn is_configured(&self) -> bool {
        !self.strategies.is_empty()
    }

    /// Names of the configured strategies, in order
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(CredentialStrategy::name).collect()
    }

    /// Resolve an `Authorization` header value
    pub fn resolve(&self, authorization: Option<&str>) -> Result<UserContext, AuthError> {
        if self.strategies.is_empty() {
            return Err(AuthError::ServerMisconfigured);
        }

        let token = authorization
            .and_then(extract_bearer_token)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingHeader)?;

        self.strategies
            .iter()
            .find_map(|strategy| strategy.verify(token))
            .ok_or(AuthError::InvalidCredential)
    }
}

/// Parse a configured algorithm name against the allow-list
pub fn parse_algorithm(name: &str) -> anyhow::Result<Algorithm> {
    let algorithm = Algorithm::from_str(&name.trim().to_uppercase())
        .or_else(|_| Algorithm::from_str(name.trim()))
        .map_err(|_| anyhow::anyhow!("unknown JWT algorithm {}", name))?;
    if !ALLOWED_ALGORITHMS.contains(&algorithm) {
        anyhow::bail!("JWT algorithm {} is not allowed", name);
    }
    Ok(algorithm)
}

/// Convert verified claims to a cloud context
pub fn claims_to_context(claims: Claims) -> Option<UserContext> {
    let sub = claims.sub.trim();
    if sub.is_empty() || sub == "." || sub == ".." || sub.contains(['/', '\\']) {
        tracing::debug!("Rejected token with unusable subject");
        return None;
    }

    let prefix = claims
        .prefix
        .as_deref()
        .and_then(as_root)
        .unwrap_or_else(|| format!("users/{}/", sub));
    let team_prefix = claims.team_prefix.as_deref().and_then(as_root);

    Some(UserContext::cloud(
        prefix,
        team_prefix,
        claims.profile_limit.unwrap_or(0),
    ))
}

/// Claim value as a directory root; empty means absent
fn as_root(value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    if value.ends_with('/') {
        Some(value.to_string())
    } else {
        Some(format!("{}/", value))
    }
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    let (scheme, token) = auth_header.trim().split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim())
    } else {
        None
    }
}
