//! Authorization `ext` payload parsing and field validation
//!
//! The `ext` attribute of a signed request is base64 of a JSON object.
//! Fields are validated explicitly over the parsed value so every mistype
//! yields its stable, field-specific message; unknown fields are ignored
//! for forward compatibility.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scope::is_valid_scope;

/// Required length of a certificate seed
pub(crate) const SEED_LENGTH: usize = 44;

/// A temporary-credential certificate: a signed, time-bounded delegation
/// of a scope subset from an issuer to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Certificate format version; always 1
    pub version: u64,

    /// Delegated client name; requires `issuer`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Issuing client; requires `name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Random seed the derived access token is computed from
    pub seed: String,

    /// Validity start, milliseconds since epoch
    pub start: i64,

    /// Expiry, milliseconds since epoch
    pub expiry: i64,

    /// Scopes delegated by this certificate
    pub scopes: Vec<String>,

    /// Base64 HMAC-SHA256 over the canonical payload, keyed by the
    /// issuer's access token
    pub signature: String,
}

/// Recognized contents of the `ext` object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtPayload {
    pub certificate: Option<Certificate>,
    pub authorized_scopes: Option<Vec<String>>,
}

/// Parses and field-validates a base64 `ext` attribute.
///
/// The error string is the authentication-failure message; these are part
/// of the external contract and must not change.
pub(crate) fn parse_ext(raw: &str) -> Result<ExtPayload, String> {
    let decoded = STANDARD
        .decode(raw)
        .map_err(|_| "Failed to parse ext".to_string())?;
    let value: Value =
        serde_json::from_slice(&decoded).map_err(|_| "Failed to parse ext".to_string())?;
    let object = value
        .as_object()
        .ok_or_else(|| "Failed to parse ext".to_string())?;

    let certificate = match object.get("certificate") {
        None => None,
        Some(v) => Some(parse_certificate(v)?),
    };

    let authorized_scopes = match object.get("authorizedScopes") {
        None => None,
        Some(v) => {
            let entries = v
                .as_array()
                .ok_or_else(|| "ext.authorizedScopes must be an array of valid scopes".to_string())?;
            let mut scopes = Vec::with_capacity(entries.len());
            for entry in entries {
                let scope = entry
                    .as_str()
                    .filter(|s| is_valid_scope(s))
                    .ok_or_else(|| {
                        "ext.authorizedScopes must be an array of valid scopes".to_string()
                    })?;
                scopes.push(scope.to_string());
            }
            Some(scopes)
        }
    };

    Ok(ExtPayload {
        certificate,
        authorized_scopes,
    })
}

fn parse_certificate(value: &Value) -> Result<Certificate, String> {
    let object = value
        .as_object()
        .ok_or_else(|| "ext.certificate must be a JSON object".to_string())?;

    let version = object
        .get("version")
        .and_then(Value::as_u64)
        .ok_or_else(|| "ext.certificate.version must be 1".to_string())?;

    let seed = object
        .get("seed")
        .and_then(Value::as_str)
        .ok_or_else(|| "ext.certificate.seed must be a string".to_string())?;
    if seed.len() != SEED_LENGTH {
        return Err("ext.certificate.seed must be 44 characters".to_string());
    }

    let start = object
        .get("start")
        .and_then(Value::as_i64)
        .ok_or_else(|| "ext.certificate.start must be a number".to_string())?;

    let expiry = object
        .get("expiry")
        .and_then(Value::as_i64)
        .ok_or_else(|| "ext.certificate.expiry must be a number".to_string())?;

    let entries = object
        .get("scopes")
        .and_then(Value::as_array)
        .ok_or_else(|| "ext.certificate.scopes must be an array".to_string())?;
    let mut scopes = Vec::with_capacity(entries.len());
    for entry in entries {
        let scope = entry
            .as_str()
            .filter(|s| is_valid_scope(s))
            .ok_or_else(|| "ext.certificate.scopes must be an array of valid scopes".to_string())?;
        scopes.push(scope.to_string());
    }

    let signature = object
        .get("signature")
        .and_then(Value::as_str)
        .ok_or_else(|| "ext.certificate.signature must be a string".to_string())?;

    let name = match object.get("name") {
        None => None,
        Some(v) => Some(
            v.as_str()
                .ok_or_else(|| "ext.certificate.name must be a string".to_string())?
                .to_string(),
        ),
    };

    let issuer = match object.get("issuer") {
        None => None,
        Some(v) => Some(
            v.as_str()
                .ok_or_else(|| "ext.certificate.issuer must be a string".to_string())?
                .to_string(),
        ),
    };

    Ok(Certificate {
        version,
        name,
        issuer,
        seed: seed.to_string(),
        start,
        expiry,
        scopes,
        signature: signature.to_string(),
    })
}

/// Encodes an [`ExtPayload`] back into its base64 wire form
pub fn encode_ext(payload: &ExtPayload) -> String {
    let mut object = serde_json::Map::new();
    if let Some(certificate) = &payload.certificate {
        object.insert(
            "certificate".to_string(),
            serde_json::to_value(certificate).unwrap_or(Value::Null),
        );
    }
    if let Some(scopes) = &payload.authorized_scopes {
        object.insert(
            "authorizedScopes".to_string(),
            Value::Array(scopes.iter().map(|s| Value::String(s.clone())).collect()),
        );
    }
    STANDARD.encode(serde_json::to_string(&Value::Object(object)).unwrap_or_default())
}
