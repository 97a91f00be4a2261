//! Request signature validation
//!
//! Takes an authenticated request (MAC header or URL bewit), recovers the
//! issuer, verifies any temporary-certificate delegation chain, and
//! produces the authorized scope set via the resolver. Every failure is a
//! flat [`Authentication::Failed`] value whose message is part of the
//! external contract; `Err` is reserved for internal faults.

mod credentials;
mod mac;
mod payload;

pub use credentials::{
    certificate_signature, create_temporary_credentials, create_temporary_credentials_from_now,
    derived_access_token, TemporaryCredentials,
};
pub use mac::{build_authorization_header, build_bewit};
pub use payload::{encode_ext, Certificate, ExtPayload};

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AuthzError, Result};
use crate::resolver::ScopeResolver;
use crate::scope::{normalize_scope_set, satisfies};
use crate::types::ClientLoader;

use credentials::{verify_certificate_signature, MAX_CERTIFICATE_VALIDITY_MS};

/// An incoming request to authenticate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    /// HTTP method
    pub method: String,

    /// Path and query string the MAC covers
    pub resource: String,

    /// Host header, lowercased by the MAC
    pub host: String,

    /// Port the request arrived on
    pub port: u16,

    /// `Authorization` header value, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization: Option<String>,

    /// Bewit token extracted from the query string, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bewit: Option<String>,
}

/// Outcome of authenticating a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum Authentication {
    /// The request is authentic; `scopes` is the authorized scope set
    #[serde(rename = "auth-success")]
    Success {
        #[serde(rename = "clientId")]
        client_id: String,
        scopes: Vec<String>,
        scheme: String,
    },

    /// The request failed authentication; `message` is stable and safe to
    /// branch on
    #[serde(rename = "auth-failed")]
    Failed { message: String },
}

impl Authentication {
    fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        debug!(%message, "authentication failed");
        Self::Failed { message }
    }
}

enum Wire {
    Header(mac::HeaderAuthorization),
    Bewit(mac::Bewit),
}

/// Validates request signatures and produces authorized scope sets.
///
/// Holds the external client loader and the shared resolver; safe to share
/// across concurrent requests.
pub struct SignatureValidator {
    loader: Arc<dyn ClientLoader>,
    resolver: Arc<ScopeResolver>,
}

impl SignatureValidator {
    pub fn new(loader: Arc<dyn ClientLoader>, resolver: Arc<ScopeResolver>) -> Self {
        Self { loader, resolver }
    }

    /// Authenticates a request.
    ///
    /// Returns `Ok(Authentication::Failed { .. })` for every authentication
    /// failure; `Err` only for internal faults, which callers surface as a
    /// generic error without leaking detail.
    pub async fn authenticate(&self, request: &AuthRequest) -> Result<Authentication> {
        let wire = if let Some(header) = &request.authorization {
            match mac::parse_authorization(header) {
                Ok(h) => Wire::Header(h),
                Err(message) => return Ok(Authentication::failed(message)),
            }
        } else if let Some(token) = &request.bewit {
            match mac::parse_bewit(token) {
                Ok(b) => Wire::Bewit(b),
                Err(message) => return Ok(Authentication::failed(message)),
            }
        } else {
            return Ok(Authentication::failed("no authorization provided"));
        };

        let (outer_client_id, ext_raw) = match &wire {
            Wire::Header(h) => (h.id.clone(), h.ext.clone()),
            Wire::Bewit(b) => (b.id.clone(), b.ext.clone()),
        };

        let ext = match &ext_raw {
            Some(raw) => match payload::parse_ext(raw) {
                Ok(ext) => ext,
                Err(message) => return Ok(Authentication::failed(message)),
            },
            None => ExtPayload::default(),
        };

        let now = Utc::now().timestamp_millis();

        if let Some(cert) = &ext.certificate {
            if cert.version != 1 {
                return Ok(Authentication::failed("ext.certificate.version must be 1"));
            }
            if cert.start > now {
                return Ok(Authentication::failed("ext.certificate.start > now"));
            }
            if cert.expiry < now {
                return Ok(Authentication::failed("ext.certificate.expiry < now"));
            }
            if cert.expiry - cert.start > MAX_CERTIFICATE_VALIDITY_MS {
                return Ok(Authentication::failed(
                    "ext.certificate cannot last longer than 31 days!",
                ));
            }

            match (&cert.name, &cert.issuer) {
                (Some(_), None) => {
                    return Ok(Authentication::failed("name must only be used with issuer"))
                }
                (None, Some(_)) => {
                    return Ok(Authentication::failed("issuer must only be used with name"))
                }
                (Some(name), Some(issuer)) => {
                    if name == issuer {
                        return Ok(Authentication::failed("name must differ from issuer"));
                    }
                    if name != &outer_client_id {
                        return Ok(Authentication::failed(
                            "name must match the supplied clientId",
                        ));
                    }
                }
                (None, None) => {}
            }
        }

        // The unnamed certificate case and the plain case both resolve the
        // outer credentials' client.
        let issuer_id = ext
            .certificate
            .as_ref()
            .and_then(|c| c.issuer.as_deref())
            .unwrap_or(&outer_client_id);

        let issuer = match self.loader.load_client(issuer_id).await {
            Ok(client) => client,
            Err(AuthzError::NoSuchClient) => {
                return Ok(Authentication::failed("no such clientId"))
            }
            Err(err) => return Err(err),
        };

        let mac_key = match &ext.certificate {
            Some(cert) => {
                if !verify_certificate_signature(cert, &issuer.access_token) {
                    return Ok(Authentication::failed(
                        "ext.certificate.signature is not valid",
                    ));
                }
                derived_access_token(&issuer.access_token, &cert.seed)
            }
            None => issuer.access_token.clone(),
        };

        let mac_ok = match &wire {
            Wire::Header(h) => mac::verify_mac(
                &h.mac,
                &mac_key,
                "header",
                h.ts,
                &h.nonce,
                &request.method,
                &request.resource,
                &request.host,
                request.port,
                h.ext.as_deref().unwrap_or(""),
            ),
            Wire::Bewit(b) => {
                if b.expiry < Utc::now().timestamp() {
                    return Ok(Authentication::failed("Access expired"));
                }
                mac::verify_mac(
                    &b.mac,
                    &mac_key,
                    "bewit",
                    b.expiry,
                    "",
                    "GET",
                    &request.resource,
                    &request.host,
                    request.port,
                    b.ext.as_deref().unwrap_or(""),
                )
            }
        };
        if !mac_ok {
            return Ok(Authentication::failed("Bad mac"));
        }

        let expanded = self.resolver.expand_client(&issuer)?;
        let mut effective = expanded;

        if let Some(cert) = &ext.certificate {
            if let Some(name) = &cert.name {
                let required = format!("auth:create-client:{name}");
                if !satisfies(&effective, std::slice::from_ref(&required)) {
                    return Ok(Authentication::failed(format!(
                        "issuer `{}` doesn't have scope `{required}`",
                        issuer.client_id
                    )));
                }
            }
            if !satisfies(&effective, &cert.scopes) {
                return Ok(Authentication::failed(format!(
                    "ext.certificate issuer `{}` doesn't have sufficient scopes",
                    issuer.client_id
                )));
            }
            effective = normalize_scope_set(&cert.scopes);
        }

        if let Some(authorized) = &ext.authorized_scopes {
            if !satisfies(&effective, authorized) {
                return Ok(Authentication::failed(
                    "ext.authorizedScopes oversteps your scopes",
                ));
            }
            effective = normalize_scope_set(authorized);
        }

        let client_id = ext
            .certificate
            .as_ref()
            .and_then(|c| c.name.clone())
            .unwrap_or(outer_client_id);

        debug!(client_id = %client_id, scopes = effective.len(), "authenticated request");
        Ok(Authentication::Success {
            client_id,
            scopes: effective,
            scheme: "mac".to_string(),
        })
    }
}
