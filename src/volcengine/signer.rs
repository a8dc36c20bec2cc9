//! Volcengine V4 request signing (HMAC-SHA256 over a canonical request).

use std::fmt;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::{Result, StalkgenError};

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HMAC-SHA256";
const SCOPE_TERMINATOR: &str = "request";
const SIGNED_HEADERS: &str = "content-type;host;x-content-sha256;x-date";

#[derive(Clone)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl Credentials {
    /// Fails with `MissingCredentials` when either key is absent or empty.
    pub fn new(access_key: Option<&str>, secret_key: Option<&str>) -> Result<Self> {
        let access_key = access_key.filter(|k| !k.is_empty()).ok_or_else(|| {
            StalkgenError::MissingCredentials("Volcengine access key is not configured".into())
        })?;
        let secret_key = secret_key.filter(|k| !k.is_empty()).ok_or_else(|| {
            StalkgenError::MissingCredentials("Volcengine secret key is not configured".into())
        })?;
        Ok(Self {
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_present", &!self.access_key.is_empty())
            .field("secret_key_present", &!self.secret_key.is_empty())
            .finish()
    }
}

/// The parts of an outbound request that feed the signature.
#[derive(Debug, Clone)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub host: &'a str,
    pub path: &'a str,
    pub query: &'a [(String, String)],
    pub content_type: &'a str,
    pub body: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub authorization: String,
    pub x_date: String,
    pub x_content_sha256: String,
}

impl SignedHeaders {
    pub fn pairs(&self) -> [(&'static str, &str); 3] {
        [
            ("Authorization", self.authorization.as_str()),
            ("X-Date", self.x_date.as_str()),
            ("X-Content-Sha256", self.x_content_sha256.as_str()),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Credentials,
    region: String,
    service: String,
}

impl RequestSigner {
    pub fn new(
        credentials: Credentials,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: service.into(),
        }
    }

    pub fn sign(&self, request: &SignableRequest<'_>, now: DateTime<Utc>) -> Result<SignedHeaders> {
        let x_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let short_date = &x_date[..8];
        let body_hash = sha256_hex(request.body);

        let canonical = canonical_request(request, &x_date, &body_hash);
        let scope = format!(
            "{}/{}/{}/{}",
            short_date, self.region, self.service, SCOPE_TERMINATOR
        );
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            x_date,
            scope,
            sha256_hex(canonical.as_bytes())
        );

        let signing_key = self.signing_key(short_date)?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        Ok(SignedHeaders {
            authorization: format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                ALGORITHM,
                self.credentials.access_key(),
                scope,
                SIGNED_HEADERS,
                signature
            ),
            x_date,
            x_content_sha256: body_hash,
        })
    }

    fn signing_key(&self, short_date: &str) -> Result<Vec<u8>> {
        let k_date = hmac_sha256(self.credentials.secret_key.as_bytes(), short_date.as_bytes())?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, self.service.as_bytes())?;
        hmac_sha256(&k_service, SCOPE_TERMINATOR.as_bytes())
    }
}

pub(crate) fn canonical_request(
    request: &SignableRequest<'_>,
    x_date: &str,
    body_hash: &str,
) -> String {
    let path = if request.path.is_empty() {
        "/"
    } else {
        request.path
    };
    let canonical_headers = format!(
        "content-type:{}\nhost:{}\nx-content-sha256:{}\nx-date:{}\n",
        request.content_type.trim(),
        request.host.trim(),
        body_hash,
        x_date
    );
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method.to_ascii_uppercase(),
        path,
        canonical_query(request.query),
        canonical_headers,
        SIGNED_HEADERS,
        body_hash
    )
}

pub(crate) fn canonical_query(query: &[(String, String)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (urlencoding::encode(k).into_owned(), urlencoding::encode(v).into_owned()))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StalkgenError::RequestSetup(format!("Failed to sign request: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn query() -> Vec<(String, String)> {
        vec![
            ("Version".to_string(), "2022-08-31".to_string()),
            ("Action".to_string(), "CVSync2AsyncSubmitTask".to_string()),
        ]
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    fn signer() -> RequestSigner {
        let credentials = Credentials::new(Some("AKLTtest"), Some("c2VjcmV0")).unwrap();
        RequestSigner::new(credentials, "cn-north-1", "cv")
    }

    #[test]
    fn test_canonical_request_layout() {
        let query = query();
        let request = SignableRequest {
            method: "post",
            host: "visual.volcengineapi.com",
            path: "",
            query: &query,
            content_type: "application/json",
            body: b"",
        };

        let canonical = canonical_request(&request, "20240102T030405Z", EMPTY_SHA256);
        let expected = format!(
            "POST\n/\nAction=CVSync2AsyncSubmitTask&Version=2022-08-31\n\
             content-type:application/json\n\
             host:visual.volcengineapi.com\n\
             x-content-sha256:{hash}\n\
             x-date:20240102T030405Z\n\n\
             content-type;host;x-content-sha256;x-date\n{hash}",
            hash = EMPTY_SHA256
        );
        assert_eq!(canonical, expected);
    }

    #[test]
    fn test_canonical_query_encodes_and_sorts() {
        let query = vec![
            ("b".to_string(), "x y".to_string()),
            ("a".to_string(), "2/3".to_string()),
            ("a".to_string(), "1".to_string()),
        ];
        assert_eq!(canonical_query(&query), "a=1&a=2%2F3&b=x%20y");
    }

    #[test]
    fn test_sign_produces_authorization_header() {
        let query = query();
        let request = SignableRequest {
            method: "POST",
            host: "visual.volcengineapi.com",
            path: "/",
            query: &query,
            content_type: "application/json",
            body: b"",
        };

        let headers = signer().sign(&request, fixed_time()).unwrap();
        assert_eq!(headers.x_date, "20240102T030405Z");
        assert_eq!(headers.x_content_sha256, EMPTY_SHA256);
        assert!(headers.authorization.starts_with(
            "HMAC-SHA256 Credential=AKLTtest/20240102/cn-north-1/cv/request, \
             SignedHeaders=content-type;host;x-content-sha256;x-date, Signature="
        ));

        let signature = headers.authorization.rsplit("Signature=").next().unwrap();
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!headers.authorization.contains("c2VjcmV0"));
    }

    #[test]
    fn test_signature_matches_known_answer() {
        let query = query();
        let request = SignableRequest {
            method: "POST",
            host: "visual.volcengineapi.com",
            path: "/",
            query: &query,
            content_type: "application/json",
            body: br#"{"a":1}"#,
        };
        let signer = RequestSigner::new(
            Credentials::new(Some("AK"), Some("SK")).unwrap(),
            "cn-north-1",
            "cv",
        );

        let headers = signer.sign(&request, fixed_time()).unwrap();
        assert_eq!(
            headers.authorization,
            "HMAC-SHA256 Credential=AK/20240102/cn-north-1/cv/request, \
             SignedHeaders=content-type;host;x-content-sha256;x-date, \
             Signature=6490a301ccfd2e722c2fae8364a35a8dd45835116499775ddb15880949aa02f3"
        );
    }

    #[test]
    fn test_signature_is_deterministic_and_body_sensitive() {
        let query = query();
        let make = |body: &'static [u8]| SignableRequest {
            method: "POST",
            host: "visual.volcengineapi.com",
            path: "/",
            query: &query,
            content_type: "application/json",
            body,
        };

        let first = signer().sign(&make(b"{}"), fixed_time()).unwrap();
        let again = signer().sign(&make(b"{}"), fixed_time()).unwrap();
        let other = signer().sign(&make(b"{\"a\":1}"), fixed_time()).unwrap();

        assert_eq!(first, again);
        assert_ne!(first.authorization, other.authorization);
        assert_ne!(first.x_content_sha256, other.x_content_sha256);
    }

    #[test]
    fn test_missing_credentials() {
        assert!(matches!(
            Credentials::new(None, Some("sk")),
            Err(StalkgenError::MissingCredentials(_))
        ));
        assert!(matches!(
            Credentials::new(Some("ak"), Some("")),
            Err(StalkgenError::MissingCredentials(_))
        ));
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let credentials = Credentials::new(Some("AKLTtest"), Some("topsecret")).unwrap();
        let rendered = format!("{:?}", credentials);
        assert!(!rendered.contains("topsecret"));
        assert!(!rendered.contains("AKLTtest"));
    }
}
