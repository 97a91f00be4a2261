//! Minimal HMAC request-signing primitive (header and bewit forms)
//!
//! Hawk-compatible shape: an `Authorization: Hawk ...` header carrying
//! `id`, `ts`, `nonce`, optional `ext`, and `mac`, or a single URL-embedded
//! bewit token for GET resources. The MAC covers a canonical
//! newline-separated request string; comparison is constant-time.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;
use rand::RngCore;
use subtle::ConstantTimeEq;

use super::credentials::hmac_sha256;

/// Parsed `Authorization` header attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HeaderAuthorization {
    pub id: String,
    pub ts: i64,
    pub nonce: String,
    pub ext: Option<String>,
    pub mac: String,
}

/// Parsed bewit token
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Bewit {
    pub id: String,
    pub expiry: i64,
    pub mac: String,
    pub ext: Option<String>,
}

const BAD_HEADER: &str = "Bad Request: Invalid authorization header";
const BAD_BEWIT: &str = "Bad Request: Invalid bewit structure";

/// Parses a `Hawk id="...", ts="...", nonce="...", ext="...", mac="..."`
/// header. Attribute order is not significant; values contain no quotes.
pub(crate) fn parse_authorization(header: &str) -> Result<HeaderAuthorization, String> {
    let rest = header
        .strip_prefix("Hawk ")
        .ok_or_else(|| BAD_HEADER.to_string())?;

    let mut id = None;
    let mut ts = None;
    let mut nonce = None;
    let mut ext = None;
    let mut mac = None;

    let mut remaining = rest.trim();
    while !remaining.is_empty() {
        let eq = remaining.find('=').ok_or_else(|| BAD_HEADER.to_string())?;
        let key = remaining[..eq].trim();
        let after = &remaining[eq + 1..];
        let value_body = after
            .strip_prefix('"')
            .ok_or_else(|| BAD_HEADER.to_string())?;
        let close = value_body
            .find('"')
            .ok_or_else(|| BAD_HEADER.to_string())?;
        let value = &value_body[..close];

        match key {
            "id" => id = Some(value.to_string()),
            "ts" => {
                ts = Some(
                    value
                        .parse::<i64>()
                        .map_err(|_| BAD_HEADER.to_string())?,
                )
            }
            "nonce" => nonce = Some(value.to_string()),
            "ext" => ext = Some(value.to_string()),
            "mac" => mac = Some(value.to_string()),
            // hash, app, dlg and future attributes
            _ => {}
        }

        remaining = value_body[close + 1..]
            .trim_start()
            .trim_start_matches(',')
            .trim_start();
    }

    Ok(HeaderAuthorization {
        id: id.ok_or_else(|| BAD_HEADER.to_string())?,
        ts: ts.ok_or_else(|| BAD_HEADER.to_string())?,
        nonce: nonce.ok_or_else(|| BAD_HEADER.to_string())?,
        ext,
        mac: mac.ok_or_else(|| BAD_HEADER.to_string())?,
    })
}

/// Decodes a bewit token: URL-safe base64 of `id\expiry\mac\ext`
pub(crate) fn parse_bewit(token: &str) -> Result<Bewit, String> {
    let decoded = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| BAD_BEWIT.to_string())?;
    let decoded = String::from_utf8(decoded).map_err(|_| BAD_BEWIT.to_string())?;

    let parts: Vec<&str> = decoded.split('\\').collect();
    if parts.len() != 4 || parts[0].is_empty() {
        return Err(BAD_BEWIT.to_string());
    }
    let expiry = parts[1].parse::<i64>().map_err(|_| BAD_BEWIT.to_string())?;

    Ok(Bewit {
        id: parts[0].to_string(),
        expiry,
        mac: parts[2].to_string(),
        ext: if parts[3].is_empty() {
            None
        } else {
            Some(parts[3].to_string())
        },
    })
}

#[allow(clippy::too_many_arguments)]
fn normalized_request_string(
    kind: &str,
    ts: i64,
    nonce: &str,
    method: &str,
    resource: &str,
    host: &str,
    port: u16,
    ext: &str,
) -> String {
    format!(
        "hawk.1.{kind}\n{ts}\n{nonce}\n{method}\n{resource}\n{host}\n{port}\n\n{ext}\n",
        method = method.to_uppercase(),
        host = host.to_lowercase(),
    )
}

#[allow(clippy::too_many_arguments)]
fn request_mac(
    key: &str,
    kind: &str,
    ts: i64,
    nonce: &str,
    method: &str,
    resource: &str,
    host: &str,
    port: u16,
    ext: &str,
) -> String {
    let normalized = normalized_request_string(kind, ts, nonce, method, resource, host, port, ext);
    STANDARD.encode(hmac_sha256(key.as_bytes(), normalized.as_bytes()))
}

/// Verifies a presented MAC against the recomputed one, constant-time
#[allow(clippy::too_many_arguments)]
pub(crate) fn verify_mac(
    given_mac: &str,
    key: &str,
    kind: &str,
    ts: i64,
    nonce: &str,
    method: &str,
    resource: &str,
    host: &str,
    port: u16,
    ext: &str,
) -> bool {
    let normalized = normalized_request_string(kind, ts, nonce, method, resource, host, port, ext);
    let expected = hmac_sha256(key.as_bytes(), normalized.as_bytes());
    match STANDARD.decode(given_mac) {
        Ok(given) => given.ct_eq(&expected).into(),
        Err(_) => false,
    }
}

/// Signs a request and renders the `Authorization` header value
pub fn build_authorization_header(
    client_id: &str,
    access_token: &str,
    method: &str,
    resource: &str,
    host: &str,
    port: u16,
    ext: Option<&str>,
) -> String {
    let ts = Utc::now().timestamp();
    let mut nonce_bytes = [0u8; 6];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = URL_SAFE_NO_PAD.encode(nonce_bytes);

    let mac = request_mac(
        access_token,
        "header",
        ts,
        &nonce,
        method,
        resource,
        host,
        port,
        ext.unwrap_or(""),
    );

    let ext_part = ext
        .map(|e| format!(", ext=\"{e}\""))
        .unwrap_or_default();
    format!("Hawk id=\"{client_id}\", ts=\"{ts}\", nonce=\"{nonce}\"{ext_part}, mac=\"{mac}\"")
}

/// Signs a GET resource and renders the bewit token to append as
/// `?bewit=<token>`
pub fn build_bewit(
    client_id: &str,
    access_token: &str,
    resource: &str,
    host: &str,
    port: u16,
    expiry_ts: i64,
    ext: Option<&str>,
) -> String {
    let mac = request_mac(
        access_token,
        "bewit",
        expiry_ts,
        "",
        "GET",
        resource,
        host,
        port,
        ext.unwrap_or(""),
    );
    URL_SAFE_NO_PAD.encode(format!(
        "{client_id}\\{expiry_ts}\\{mac}\\{ext}",
        ext = ext.unwrap_or("")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let header = build_authorization_header(
            "worker",
            "token",
            "get",
            "/v1/task/abc",
            "Queue.Example.COM",
            443,
            Some("ZXh0"),
        );
        let parsed = parse_authorization(&header).unwrap();
        assert_eq!(parsed.id, "worker");
        assert_eq!(parsed.ext.as_deref(), Some("ZXh0"));

        assert!(verify_mac(
            &parsed.mac,
            "token",
            "header",
            parsed.ts,
            &parsed.nonce,
            "GET",
            "/v1/task/abc",
            "queue.example.com",
            443,
            "ZXh0",
        ));
        assert!(!verify_mac(
            &parsed.mac,
            "other-token",
            "header",
            parsed.ts,
            &parsed.nonce,
            "GET",
            "/v1/task/abc",
            "queue.example.com",
            443,
            "ZXh0",
        ));
    }

    #[test]
    fn test_header_parse_errors() {
        assert!(parse_authorization("Bearer xyz").is_err());
        assert!(parse_authorization("Hawk id=\"a\"").is_err());
        assert!(parse_authorization("Hawk id=unquoted, ts=\"1\"").is_err());
    }

    #[test]
    fn test_mac_is_sensitive_to_every_field() {
        let mac = request_mac("k", "header", 10, "n", "GET", "/r", "h", 80, "e");
        assert_ne!(mac, request_mac("k", "bewit", 10, "n", "GET", "/r", "h", 80, "e"));
        assert_ne!(mac, request_mac("k", "header", 11, "n", "GET", "/r", "h", 80, "e"));
        assert_ne!(mac, request_mac("k", "header", 10, "m", "GET", "/r", "h", 80, "e"));
        assert_ne!(mac, request_mac("k", "header", 10, "n", "PUT", "/r", "h", 80, "e"));
        assert_ne!(mac, request_mac("k", "header", 10, "n", "GET", "/r2", "h", 80, "e"));
        assert_ne!(mac, request_mac("k", "header", 10, "n", "GET", "/r", "h2", 80, "e"));
        assert_ne!(mac, request_mac("k", "header", 10, "n", "GET", "/r", "h", 81, "e"));
        assert_ne!(mac, request_mac("k", "header", 10, "n", "GET", "/r", "h", 80, "e2"));
    }

    #[test]
    fn test_bewit_round_trip() {
        let token = build_bewit("worker", "token", "/v1/artifact", "host", 443, 1_900_000_000, None);
        let bewit = parse_bewit(&token).unwrap();
        assert_eq!(bewit.id, "worker");
        assert_eq!(bewit.expiry, 1_900_000_000);
        assert!(bewit.ext.is_none());

        assert!(verify_mac(
            &bewit.mac,
            "token",
            "bewit",
            bewit.expiry,
            "",
            "GET",
            "/v1/artifact",
            "host",
            443,
            "",
        ));
    }

    #[test]
    fn test_bewit_parse_errors() {
        assert_eq!(
            parse_bewit("!!!"),
            Err("Bad Request: Invalid bewit structure".to_string())
        );
        let missing_parts = URL_SAFE_NO_PAD.encode("id\\123\\mac");
        assert_eq!(
            parse_bewit(&missing_parts),
            Err("Bad Request: Invalid bewit structure".to_string())
        );
        let bad_expiry = URL_SAFE_NO_PAD.encode("id\\soon\\mac\\");
        assert!(parse_bewit(&bad_expiry).is_err());
    }
}
