//! Temporary-credential signing and verification
//!
//! A certificate is HMAC-SHA256 signed by the issuer's access token over a
//! canonical line-separated payload; the client then signs its requests
//! with an access token derived from the certificate seed. Signature
//! comparison is constant-time.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::payload::Certificate;
use crate::error::{AuthzError, Result};
use crate::scope::validate_scope;
use crate::types::Client;

type HmacSha256 = Hmac<Sha256>;

/// Longest validity window of a certificate, 31 days in milliseconds
pub(crate) const MAX_CERTIFICATE_VALIDITY_MS: i64 = 31 * 24 * 60 * 60 * 1000;

pub(crate) fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// The canonical payload a certificate signature covers. The `name` and
/// `issuer` lines appear iff the fields are present; scopes follow the
/// `scopes:` line one per line.
fn signing_payload(
    name: Option<&str>,
    issuer: Option<&str>,
    seed: &str,
    start: i64,
    expiry: i64,
    scopes: &[String],
) -> String {
    let mut lines: Vec<String> = vec!["version:1".to_string()];
    if let Some(name) = name {
        lines.push(format!("name:{name}"));
    }
    if let Some(issuer) = issuer {
        lines.push(format!("issuer:{issuer}"));
    }
    lines.push(format!("seed:{seed}"));
    lines.push(format!("start:{start}"));
    lines.push(format!("expiry:{expiry}"));
    lines.push("scopes:".to_string());
    lines.extend(scopes.iter().cloned());
    lines.join("\n")
}

/// Computes a certificate signature: base64 HMAC-SHA256 of the canonical
/// payload, keyed by the issuer's access token.
pub fn certificate_signature(
    access_token: &str,
    name: Option<&str>,
    issuer: Option<&str>,
    seed: &str,
    start: i64,
    expiry: i64,
    scopes: &[String],
) -> String {
    let payload = signing_payload(name, issuer, seed, start, expiry, scopes);
    STANDARD.encode(hmac_sha256(access_token.as_bytes(), payload.as_bytes()))
}

/// Recomputes and compares a certificate's signature, constant-time
pub(crate) fn verify_certificate_signature(certificate: &Certificate, access_token: &str) -> bool {
    let payload = signing_payload(
        certificate.name.as_deref(),
        certificate.issuer.as_deref(),
        &certificate.seed,
        certificate.start,
        certificate.expiry,
        &certificate.scopes,
    );
    let expected = hmac_sha256(access_token.as_bytes(), payload.as_bytes());
    match STANDARD.decode(&certificate.signature) {
        Ok(given) => given.ct_eq(&expected).into(),
        Err(_) => false,
    }
}

/// Derives the access token a certificate holder signs requests with:
/// HMAC-SHA256 of the seed keyed by the issuer's access token, URL-safe
/// base64 without padding.
pub fn derived_access_token(access_token: &str, seed: &str) -> String {
    URL_SAFE_NO_PAD.encode(hmac_sha256(access_token.as_bytes(), seed.as_bytes()))
}

/// Credentials minted from a certificate: the delegated client id, the
/// derived access token, and the certificate to attach to requests.
#[derive(Debug, Clone)]
pub struct TemporaryCredentials {
    pub client_id: String,
    pub access_token: String,
    pub certificate: Certificate,
}

/// Mints temporary credentials delegating a scope subset from `issuer`.
///
/// With `name` set the certificate is a named delegation: it claims the
/// given client id and records the issuer; the issuer must hold
/// `auth:create-client:<name>` for the result to validate.
pub fn create_temporary_credentials(
    issuer: &Client,
    name: Option<&str>,
    start: i64,
    expiry: i64,
    scopes: &[String],
) -> Result<TemporaryCredentials> {
    for scope in scopes {
        validate_scope(scope)?;
    }
    if expiry - start > MAX_CERTIFICATE_VALIDITY_MS {
        return Err(AuthzError::InvalidTemporaryCredentials(
            "cannot last longer than 31 days".to_string(),
        ));
    }
    if let Some(name) = name {
        if name == issuer.client_id {
            return Err(AuthzError::InvalidTemporaryCredentials(
                "name must differ from the issuing clientId".to_string(),
            ));
        }
    }

    let mut seed_bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut seed_bytes);
    let seed = STANDARD.encode(seed_bytes);

    let cert_issuer = name.map(|_| issuer.client_id.as_str());
    let signature = certificate_signature(
        &issuer.access_token,
        name,
        cert_issuer,
        &seed,
        start,
        expiry,
        scopes,
    );

    let access_token = derived_access_token(&issuer.access_token, &seed);
    Ok(TemporaryCredentials {
        client_id: name.unwrap_or(&issuer.client_id).to_string(),
        access_token,
        certificate: Certificate {
            version: 1,
            name: name.map(str::to_string),
            issuer: cert_issuer.map(str::to_string),
            seed,
            start,
            expiry,
            scopes: scopes.to_vec(),
            signature,
        },
    })
}

/// Mints temporary credentials valid from now for the given duration
pub fn create_temporary_credentials_from_now(
    issuer: &Client,
    name: Option<&str>,
    validity_ms: i64,
    scopes: &[String],
) -> Result<TemporaryCredentials> {
    let now = Utc::now().timestamp_millis();
    // Clock skew between services is real; backdate the window slightly.
    create_temporary_credentials(issuer, name, now - 15 * 60 * 1000, now + validity_ms, scopes)
}
