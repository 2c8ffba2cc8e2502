//! S3 transport for the prefix backend.
//!
//! Path-style requests over a blocking `reqwest` client, signed with AWS
//! Signature Version 4.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::blocking::{Client, Response};
use reqwest::{Method, StatusCode, Url};
use std::fmt;
use tracing::debug;

use crate::error::{Result, StorageError};
use crate::prefix::Bucket;
use crate::signing::{hmac_sha256, sha256_hex, uri_encode};

/// Access key pair plus region used to sign requests.
#[derive(Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub region: String,
}

impl fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "<redacted>"),
            )
            .field("region", &self.region)
            .finish()
    }
}

/// One bucket on an S3-compatible endpoint.
pub struct S3Bucket {
    client: Client,
    endpoint: Url,
    bucket: String,
    credentials: S3Credentials,
}

impl S3Bucket {
    /// `endpoint` defaults to the regional AWS endpoint when `None`.
    pub fn new(
        client: Client,
        endpoint: Option<&str>,
        bucket: impl Into<String>,
        credentials: S3Credentials,
    ) -> Result<Self> {
        let endpoint = match endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://s3.{}.amazonaws.com", credentials.region),
        };
        let endpoint = Url::parse(&endpoint)
            .map_err(|err| StorageError::Config(format!("invalid S3 endpoint: {err}")))?;
        if endpoint.host_str().is_none() {
            return Err(StorageError::Config("S3 endpoint has no host".to_string()));
        }

        Ok(Self {
            client,
            endpoint,
            bucket: bucket.into(),
            credentials,
        })
    }

    fn host(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    fn canonical_uri(&self, key: Option<&str>) -> String {
        let base = self.endpoint.path().trim_end_matches('/');
        match key {
            Some(key) => format!(
                "{base}/{}/{}",
                uri_encode(&self.bucket, false),
                uri_encode(key, true)
            ),
            None => format!("{base}/{}", uri_encode(&self.bucket, false)),
        }
    }

    fn send(
        &self,
        operation: &'static str,
        method: Method,
        key: Option<&str>,
        query: &[(&str, &str)],
        body: &[u8],
    ) -> Result<Response> {
        let uri = self.canonical_uri(key);
        let query_string = canonical_query(query);
        let payload_hash = sha256_hex(body);
        let now = Utc::now();

        let signed = sign_v4(
            &self.credentials,
            method.as_str(),
            &self.host(),
            &uri,
            &query_string,
            &payload_hash,
            now,
        )?;

        let mut url = self.endpoint.clone();
        url.set_path(&uri);
        url.set_query(if query_string.is_empty() {
            None
        } else {
            Some(&query_string)
        });

        let mut request = self
            .client
            .request(method.clone(), url)
            .header("x-amz-date", signed.amz_date)
            .header("x-amz-content-sha256", payload_hash)
            .header("Authorization", signed.authorization);
        if let Some(token) = &self.credentials.session_token {
            request = request.header("x-amz-security-token", token.as_str());
        }
        if method == Method::PUT {
            request = request.body(body.to_vec());
        }

        debug!(operation, bucket = %self.bucket, key = key.unwrap_or(""), "s3 request");
        request
            .send()
            .map_err(|err| StorageError::transport(operation, &self.bucket, err.without_url()))
    }

    fn failure(&self, operation: &'static str, response: Response) -> StorageError {
        let status = response.status();
        let code = response
            .text()
            .ok()
            .and_then(|body| xml_values(&body, "Code").ok())
            .and_then(|codes| codes.into_iter().next())
            .unwrap_or_else(|| "unknown".to_string());
        StorageError::transport(operation, &self.bucket, format!("HTTP {status} ({code})"))
    }
}

/// Headers produced by signing one request.
struct SignedRequest {
    amz_date: String,
    authorization: String,
}

fn canonical_query(query: &[(&str, &str)]) -> String {
    let mut pairs: Vec<(String, String)> = query
        .iter()
        .map(|(k, v)| (uri_encode(k, false), uri_encode(v, false)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn sign_v4(
    credentials: &S3Credentials,
    method: &str,
    host: &str,
    uri: &str,
    query_string: &str,
    payload_hash: &str,
    now: DateTime<Utc>,
) -> Result<SignedRequest> {
    let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();

    let mut headers = vec![
        ("host", host.to_string()),
        ("x-amz-content-sha256", payload_hash.to_string()),
        ("x-amz-date", amz_date.clone()),
    ];
    if let Some(token) = &credentials.session_token {
        headers.push(("x-amz-security-token", token.clone()));
    }
    headers.sort();

    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{}\n", value.trim()))
        .collect();
    let signed_headers = headers
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(";");

    let canonical_request = format!(
        "{method}\n{uri}\n{query_string}\n{canonical_headers}\n{signed_headers}\n{payload_hash}"
    );
    let scope = format!("{date}/{}/s3/aws4_request", credentials.region);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{amz_date}\n{scope}\n{}",
        sha256_hex(canonical_request.as_bytes())
    );

    let k_date = hmac_sha256(
        format!("AWS4{}", credentials.secret_access_key).as_bytes(),
        date.as_bytes(),
    )?;
    let k_region = hmac_sha256(&k_date, credentials.region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, b"s3")?;
    let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
    let signature = hex::encode(hmac_sha256(&k_signing, string_to_sign.as_bytes())?);

    Ok(SignedRequest {
        amz_date,
        authorization: format!(
            "AWS4-HMAC-SHA256 Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            credentials.access_key_id
        ),
    })
}

/// Text content of every `<tag>` element in an XML document.
fn xml_values(xml: &str, tag: &str) -> std::result::Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut values = Vec::new();
    let mut inside = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == tag.as_bytes() => inside = true,
            Event::End(e) if e.name().as_ref() == tag.as_bytes() => inside = false,
            Event::Text(text) if inside => values.push(text.unescape()?.into_owned()),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(values)
}

impl Bucket for S3Bucket {
    fn bucket_name(&self) -> &str {
        &self.bucket
    }

    fn put_object(&self, key: &str, data: &[u8]) -> Result<()> {
        let response = self.send("put object", Method::PUT, Some(key), &[], data)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(self.failure("put object", response))
        }
    }

    fn get_object(&self, key: &str) -> Result<Vec<u8>> {
        let response = self.send("get object", Method::GET, Some(key), &[], b"")?;
        match response.status() {
            status if status.is_success() => response
                .bytes()
                .map(|bytes| bytes.to_vec())
                .map_err(|err| {
                    StorageError::transport("get object", &self.bucket, err.without_url())
                }),
            StatusCode::NOT_FOUND => Err(StorageError::not_found(&self.bucket, key)),
            _ => Err(self.failure("get object", response)),
        }
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut query = vec![("list-type", "2"), ("prefix", prefix)];
            if let Some(token) = continuation.as_deref() {
                query.push(("continuation-token", token));
            }
            let response = self.send("list objects", Method::GET, None, &query, b"")?;
            if !response.status().is_success() {
                return Err(self.failure("list objects", response));
            }
            let body = response.text().map_err(|err| {
                StorageError::transport("list objects", &self.bucket, err.without_url())
            })?;
            let parse_err = |err: quick_xml::Error| {
                StorageError::transport("list objects", &self.bucket, format!("bad XML: {err}"))
            };

            keys.extend(xml_values(&body, "Key").map_err(parse_err)?);
            let truncated = xml_values(&body, "IsTruncated")
                .map_err(parse_err)?
                .first()
                .map(|v| v == "true")
                .unwrap_or(false);
            continuation = xml_values(&body, "NextContinuationToken")
                .map_err(parse_err)?
                .into_iter()
                .next();

            if !truncated || continuation.is_none() {
                break;
            }
        }

        Ok(keys)
    }

    fn delete_object(&self, key: &str) -> Result<()> {
        let response = self.send("delete object", Method::DELETE, Some(key), &[], b"")?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            _ => Err(self.failure("delete object", response)),
        }
    }
}
