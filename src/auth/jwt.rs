use jsonwebtoken::{
    decode, encode, errors::ErrorKind as JwtErrorKind, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use super::claims::{Audience, Claims};
use crate::config::TokenConfig;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Why a structurally valid token was refused by [`AccessTokenCodec::parse_and_validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationCause {
    #[error("token is expired")]
    Expired,
    #[error("token is not valid yet")]
    NotYetValid,
    #[error("audience mismatch")]
    AudienceMismatch,
    #[error("issuer mismatch")]
    IssuerMismatch,
    #[error("missing required claim `{0}`")]
    MissingClaim(String),
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signing error: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token has invalid claims: {0}")]
    Validation(#[from] ValidationCause),
}

/// Typed form of the claims of a signed access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTokenObject {
    pub expires_at: OffsetDateTime,
    pub not_before: OffsetDateTime,
    pub issued_at: OffsetDateTime,
    pub audience: Vec<String>,
    pub issuer: String,
    pub user_id: i64,
}

/// Translates between [`AccessTokenObject`] and its HS256-signed string form.
#[derive(Clone)]
pub struct AccessTokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
    leeway: Duration,
}

impl AccessTokenCodec {
    pub fn new(cfg: &TokenConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::minutes(cfg.ttl_minutes),
            leeway: Duration::minutes(cfg.leeway_minutes),
        }
    }

    pub fn new_object(&self, user_id: i64) -> AccessTokenObject {
        let now = now_secs();
        AccessTokenObject {
            expires_at: now + self.ttl,
            not_before: now,
            issued_at: now,
            audience: vec![self.audience.clone()],
            issuer: self.issuer.clone(),
            user_id,
        }
    }

    /// Restarts the validity window of `object` from the current instant.
    pub fn refresh(&self, object: &mut AccessTokenObject) {
        let now = now_secs();
        object.expires_at = now + self.ttl;
        object.not_before = now;
        object.issued_at = now;
    }

    pub fn sign(&self, object: &AccessTokenObject) -> Result<String, TokenError> {
        let claims = Claims {
            exp: Some(object.expires_at.unix_timestamp()),
            nbf: Some(object.not_before.unix_timestamp()),
            iat: Some(object.issued_at.unix_timestamp()),
            aud: Some(Audience::Many(object.audience.clone())),
            iss: Some(object.issuer.clone()),
            sub: Some(object.user_id.to_string()),
        };
        let token = encode(&Header::new(ALGORITHM), &claims, &self.encoding)
            .map_err(TokenError::Signing)?;
        debug!(user_id = object.user_id, "access token signed");
        Ok(token)
    }

    /// Verifies the signature only; temporal, audience and issuer claims are
    /// not enforced, so an expired token still parses.
    pub fn parse(&self, token: &str) -> Result<AccessTokenObject, TokenError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;

        let claims = self.decode(token, &validation)?;
        to_object(claims)
    }

    /// Verifies the signature and enforces expiration (with leeway),
    /// not-before, issued-at presence, audience and issuer. Absent claims
    /// are reported as `MissingClaim`.
    pub fn parse_and_validate(&self, token: &str) -> Result<AccessTokenObject, TokenError> {
        let mut validation = Validation::new(ALGORITHM);
        validation.set_required_spec_claims(&["exp", "nbf", "aud", "iss"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = self.leeway.whole_seconds().max(0) as u64;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));

        let claims = self.decode(token, &validation)?;
        if claims.iat.is_none() {
            return Err(ValidationCause::MissingClaim("iat".into()).into());
        }
        let object = to_object(claims)?;
        debug!(user_id = object.user_id, "access token validated");
        Ok(object)
    }

    fn decode(&self, token: &str, validation: &Validation) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, validation)
            .map(|data| data.claims)
            .map_err(classify)
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> TokenError {
    let cause = match err.kind() {
        JwtErrorKind::ExpiredSignature => ValidationCause::Expired,
        JwtErrorKind::ImmatureSignature => ValidationCause::NotYetValid,
        JwtErrorKind::InvalidAudience => ValidationCause::AudienceMismatch,
        JwtErrorKind::InvalidIssuer => ValidationCause::IssuerMismatch,
        JwtErrorKind::MissingRequiredClaim(claim) => ValidationCause::MissingClaim(claim.clone()),
        _ => return TokenError::Malformed(err.to_string()),
    };
    TokenError::Validation(cause)
}

fn to_object(claims: Claims) -> Result<AccessTokenObject, TokenError> {
    fn instant(name: &str, value: Option<i64>) -> Result<OffsetDateTime, TokenError> {
        let ts = value.ok_or_else(|| TokenError::Malformed(format!("missing `{name}` claim")))?;
        OffsetDateTime::from_unix_timestamp(ts)
            .map_err(|e| TokenError::Malformed(format!("bad `{name}` claim: {e}")))
    }

    let sub = claims
        .sub
        .ok_or_else(|| TokenError::Malformed("missing `sub` claim".into()))?;
    let user_id = sub
        .parse::<i64>()
        .map_err(|e| TokenError::Malformed(format!("parse sub as int: {e}")))?;
    let audience = claims
        .aud
        .ok_or_else(|| TokenError::Malformed("missing `aud` claim".into()))?
        .into_vec();
    let issuer = claims
        .iss
        .ok_or_else(|| TokenError::Malformed("missing `iss` claim".into()))?;

    Ok(AccessTokenObject {
        expires_at: instant("exp", claims.exp)?,
        not_before: instant("nbf", claims.nbf)?,
        issued_at: instant("iat", claims.iat)?,
        audience,
        issuer,
        user_id,
    })
}

// Tokens carry whole seconds; truncating here keeps objects equal across a sign/parse trip.
fn now_secs() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(0).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_AUDIENCE, DEFAULT_ISSUER};

    fn codec() -> AccessTokenCodec {
        AccessTokenCodec::new(&TokenConfig::for_tests())
    }

    fn sign_raw(claims: &Claims, secret: &str) -> String {
        encode(
            &Header::new(ALGORITHM),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("encode raw claims")
    }

    #[test]
    fn new_object_has_fixed_window_and_constants() {
        let object = codec().new_object(1);
        assert_eq!(object.not_before, object.issued_at);
        assert_eq!(object.expires_at - object.issued_at, Duration::hours(12));
        assert_eq!(object.audience, vec![DEFAULT_AUDIENCE.to_string()]);
        assert_eq!(object.issuer, DEFAULT_ISSUER);
        assert_eq!(object.user_id, 1);
    }

    #[test]
    fn sign_then_parse_reproduces_object() {
        let codec = codec();
        let mut object = codec.new_object(42);
        codec.refresh(&mut object);

        let token = codec.sign(&object).expect("sign");
        assert!(!token.is_empty());

        assert_eq!(codec.parse(&token).expect("parse"), object);
        assert_eq!(codec.parse_and_validate(&token).expect("validate"), object);
    }

    #[test]
    fn parse_accepts_long_expired_token() {
        let codec = codec();
        let mut object = codec.new_object(7);
        object.expires_at = now_secs() - Duration::days(30);
        let token = codec.sign(&object).expect("sign");

        let parsed = codec.parse(&token).expect("parse ignores expiration");
        assert_eq!(parsed.user_id, 7);
    }

    #[test]
    fn validate_tolerates_expiry_within_leeway() {
        let codec = codec();
        let mut object = codec.new_object(1);
        object.expires_at = now_secs() - Duration::hours(1);
        let token = codec.sign(&object).expect("sign");

        assert!(codec.parse_and_validate(&token).is_ok());
    }

    #[test]
    fn validate_rejects_expiry_beyond_leeway() {
        let codec = codec();
        let mut object = codec.new_object(1);
        object.expires_at = now_secs() - Duration::hours(3);
        let token = codec.sign(&object).expect("sign");

        let err = codec.parse_and_validate(&token).unwrap_err();
        assert!(matches!(
            err,
            TokenError::Validation(ValidationCause::Expired)
        ));
        assert_eq!(err.to_string(), "token has invalid claims: token is expired");
    }

    #[test]
    fn validate_rejects_foreign_audience_and_issuer() {
        let codec = codec();

        let mut object = codec.new_object(1);
        object.audience = vec!["billing".into()];
        let token = codec.sign(&object).expect("sign");
        assert!(matches!(
            codec.parse_and_validate(&token),
            Err(TokenError::Validation(ValidationCause::AudienceMismatch))
        ));

        let mut object = codec.new_object(1);
        object.issuer = "someone-else".into();
        let token = codec.sign(&object).expect("sign");
        assert!(matches!(
            codec.parse_and_validate(&token),
            Err(TokenError::Validation(ValidationCause::IssuerMismatch))
        ));
    }

    #[test]
    fn validate_requires_issued_at() {
        let codec = codec();
        let now = now_secs().unix_timestamp();
        let claims = Claims {
            exp: Some(now + 60),
            nbf: Some(now),
            iat: None,
            aud: Some(Audience::One(DEFAULT_AUDIENCE.into())),
            iss: Some(DEFAULT_ISSUER.into()),
            sub: Some("1".into()),
        };
        let token = sign_raw(&claims, "test-secret");

        assert!(matches!(
            codec.parse_and_validate(&token),
            Err(TokenError::Validation(ValidationCause::MissingClaim(c))) if c == "iat"
        ));
    }

    #[test]
    fn validate_reports_missing_not_before_as_missing_claim() {
        let codec = codec();
        let now = now_secs().unix_timestamp();
        let claims = Claims {
            exp: Some(now + 60),
            nbf: None,
            iat: Some(now),
            aud: Some(Audience::One(DEFAULT_AUDIENCE.into())),
            iss: Some(DEFAULT_ISSUER.into()),
            sub: Some("1".into()),
        };
        let token = sign_raw(&claims, "test-secret");

        assert!(matches!(
            codec.parse_and_validate(&token),
            Err(TokenError::Validation(ValidationCause::MissingClaim(c))) if c == "nbf"
        ));
        assert!(matches!(codec.parse(&token), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn missing_issuer_is_never_read_as_empty() {
        let codec = codec();
        let now = now_secs().unix_timestamp();
        let claims = Claims {
            exp: Some(now + 60),
            nbf: Some(now),
            iat: Some(now),
            aud: Some(Audience::One(DEFAULT_AUDIENCE.into())),
            iss: None,
            sub: Some("1".into()),
        };
        let token = sign_raw(&claims, "test-secret");

        let err = codec.parse(&token).unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
        assert!(err.to_string().contains("missing `iss` claim"));
        assert!(matches!(
            codec.parse_and_validate(&token),
            Err(TokenError::Validation(ValidationCause::MissingClaim(c))) if c == "iss"
        ));
    }

    #[test]
    fn parse_rejects_wrong_secret() {
        let object = codec().new_object(1);
        let mut other = TokenConfig::for_tests();
        other.secret = "another-secret".into();
        let token = AccessTokenCodec::new(&other).sign(&object).expect("sign");

        assert!(matches!(codec().parse(&token), Err(TokenError::Malformed(_))));
        assert!(matches!(
            codec().parse_and_validate(&token),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn parse_rejects_non_numeric_subject() {
        let now = now_secs().unix_timestamp();
        let claims = Claims {
            exp: Some(now + 60),
            nbf: Some(now),
            iat: Some(now),
            aud: Some(Audience::One(DEFAULT_AUDIENCE.into())),
            iss: Some(DEFAULT_ISSUER.into()),
            sub: Some("not-a-number".into()),
        };
        let token = sign_raw(&claims, "test-secret");

        let err = codec().parse(&token).unwrap_err();
        assert!(err.to_string().contains("parse sub as int"));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            codec().parse("definitely.not.a-jwt"),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn refresh_moves_window_forward() {
        let codec = codec();
        let mut object = codec.new_object(3);
        object.issued_at -= Duration::days(2);
        object.not_before = object.issued_at;
        object.expires_at = object.issued_at + Duration::hours(12);
        let before = object.expires_at;

        codec.refresh(&mut object);

        assert!(object.expires_at > before);
        assert_eq!(object.not_before, object.issued_at);
        assert_eq!(object.expires_at - object.issued_at, Duration::hours(12));
        assert_eq!(object.user_id, 3);
    }
}
