//! Azure Blob Storage transport for the container backend.
//!
//! Speaks the Blob REST API over a blocking `reqwest` client. Requests are
//! authorised either with a SAS token or with Shared Key signing, depending
//! on what the connection string carries.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::blocking::{Client, Response};
use reqwest::{Method, StatusCode, Url};
use std::fmt;
use tracing::debug;

use crate::container::BlobService;
use crate::error::{Result, StorageError};
use crate::signing::{hmac_sha256, uri_encode};

const API_VERSION: &str = "2021-08-06";

/// Authorisation material parsed from a connection string.
#[derive(Clone)]
enum AzureAuth {
    Sas(String),
    SharedKey { account: String, key: Vec<u8> },
}

impl fmt::Debug for AzureAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AzureAuth::Sas(_) => f.write_str("Sas(<redacted>)"),
            AzureAuth::SharedKey { account, .. } => f
                .debug_struct("SharedKey")
                .field("account", account)
                .field("key", &"<redacted>")
                .finish(),
        }
    }
}

/// Parsed `key=value;...` storage connection string.
#[derive(Clone, Debug)]
pub struct AzureConnection {
    endpoint: Url,
    auth: AzureAuth,
}

impl AzureConnection {
    /// Parse a connection string as issued by the Azure portal.
    ///
    /// Either `SharedAccessSignature` or the `AccountName` / `AccountKey`
    /// pair must be present. The blob endpoint comes from `BlobEndpoint` or
    /// is derived from the account name and endpoint suffix.
    pub fn parse(connection_string: &str) -> Result<Self> {
        let mut protocol = "https".to_string();
        let mut account = None;
        let mut account_key = None;
        let mut suffix = "core.windows.net".to_string();
        let mut blob_endpoint = None;
        let mut sas = None;

        for part in connection_string.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (name, value) = part.split_once('=').ok_or_else(|| {
                StorageError::Config("malformed connection string segment".to_string())
            })?;
            match name {
                "DefaultEndpointsProtocol" => protocol = value.to_string(),
                "AccountName" => account = Some(value.to_string()),
                "AccountKey" => account_key = Some(value.to_string()),
                "EndpointSuffix" => suffix = value.to_string(),
                "BlobEndpoint" => blob_endpoint = Some(value.to_string()),
                "SharedAccessSignature" => sas = Some(value.trim_start_matches('?').to_string()),
                _ => {}
            }
        }

        let endpoint = match (blob_endpoint, &account) {
            (Some(endpoint), _) => endpoint,
            (None, Some(account)) => format!("{protocol}://{account}.blob.{suffix}"),
            (None, None) => {
                return Err(StorageError::Config(
                    "connection string has neither BlobEndpoint nor AccountName".to_string(),
                ))
            }
        };
        let endpoint = Url::parse(endpoint.trim_end_matches('/'))
            .map_err(|err| StorageError::Config(format!("invalid blob endpoint: {err}")))?;

        let auth = match (sas, account, account_key) {
            (Some(sas), _, _) => AzureAuth::Sas(sas),
            (None, Some(account), Some(key)) => {
                let key = STANDARD.decode(key.as_bytes()).map_err(|_| {
                    StorageError::Config("AccountKey is not valid base64".to_string())
                })?;
                AzureAuth::SharedKey { account, key }
            }
            _ => {
                return Err(StorageError::Config(
                    "connection string needs SharedAccessSignature or AccountName/AccountKey"
                        .to_string(),
                ))
            }
        };

        Ok(Self { endpoint, auth })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Blob service reached over HTTPS.
pub struct AzureBlobService {
    client: Client,
    connection: AzureConnection,
}

impl AzureBlobService {
    pub fn new(client: Client, connection: AzureConnection) -> Self {
        Self { client, connection }
    }

    fn url(&self, container: &str, blob: Option<&str>, query: &[(&str, &str)]) -> Result<Url> {
        let mut path = format!(
            "{}/{}",
            self.connection.endpoint.as_str().trim_end_matches('/'),
            uri_encode(container, false)
        );
        if let Some(blob) = blob {
            path.push('/');
            path.push_str(&uri_encode(blob, true));
        }
        let mut url = Url::parse(&path)
            .map_err(|err| StorageError::transport("build url", container, err))?;

        let mut pairs: Vec<String> = query
            .iter()
            .map(|(k, v)| format!("{}={}", uri_encode(k, false), uri_encode(v, false)))
            .collect();
        if let AzureAuth::Sas(sas) = &self.connection.auth {
            pairs.push(sas.clone());
        }
        if !pairs.is_empty() {
            url.set_query(Some(&pairs.join("&")));
        }
        Ok(url)
    }

    #[allow(clippy::too_many_arguments)]
    fn send(
        &self,
        operation: &'static str,
        method: Method,
        container: &str,
        blob: Option<&str>,
        query: &[(&str, &str)],
        extra_headers: &[(&str, &str)],
        body: Option<&[u8]>,
    ) -> Result<Response> {
        let url = self.url(container, blob, query)?;
        let date = chrono::Utc::now()
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string();

        let mut ms_headers: Vec<(String, String)> = vec![
            ("x-ms-date".to_string(), date),
            ("x-ms-version".to_string(), API_VERSION.to_string()),
        ];
        for (name, value) in extra_headers {
            ms_headers.push((name.to_string(), value.to_string()));
        }

        let mut request = self.client.request(method.clone(), url.clone());
        for (name, value) in &ms_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let content_length = body.map(|b| b.len()).unwrap_or(0);
        if let AzureAuth::SharedKey { account, key } = &self.connection.auth {
            let signature = shared_key_signature(
                account,
                key,
                method.as_str(),
                content_length,
                &ms_headers,
                url.path(),
                query,
            )?;
            request = request.header("Authorization", format!("SharedKey {account}:{signature}"));
        }
        if let Some(body) = body {
            request = request.body(body.to_vec());
        } else if method == Method::PUT {
            request = request.header("Content-Length", "0");
        }

        debug!(operation, container, blob = blob.unwrap_or(""), "blob request");
        request
            .send()
            .map_err(|err| StorageError::transport(operation, container, err.without_url()))
    }
}

/// Shared Key signature (base64 HMAC-SHA256) for one request.
fn shared_key_signature(
    account: &str,
    key: &[u8],
    verb: &str,
    content_length: usize,
    ms_headers: &[(String, String)],
    path: &str,
    query: &[(&str, &str)],
) -> Result<String> {
    let length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    let mut headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(name, value)| (name.to_lowercase(), value.trim()))
        .collect();
    headers.sort();
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();

    let mut params: Vec<(String, &str)> = query
        .iter()
        .map(|(name, value)| (name.to_lowercase(), *value))
        .collect();
    params.sort();
    let mut canonical_resource = format!("/{account}{path}");
    for (name, value) in params {
        canonical_resource.push_str(&format!("\n{name}:{value}"));
    }

    // VERB, Content-Encoding, Content-Language, Content-Length, Content-MD5,
    // Content-Type, Date, If-Modified-Since, If-Match, If-None-Match,
    // If-Unmodified-Since, Range.
    let string_to_sign = format!(
        "{verb}\n\n\n{length}\n\n\n\n\n\n\n\n\n{canonical_headers}{canonical_resource}"
    );
    Ok(STANDARD.encode(hmac_sha256(key, string_to_sign.as_bytes())?))
}

/// Map a non-success response to a storage error.
fn failure(operation: &'static str, container: &str, response: &Response) -> StorageError {
    let code = response
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    StorageError::transport(
        operation,
        container,
        format!("HTTP {} ({code})", response.status()),
    )
}

fn error_code(response: &Response) -> Option<&str> {
    response
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
}

impl BlobService for AzureBlobService {
    fn create_container(&self, container: &str) -> Result<()> {
        let response = self.send(
            "create container",
            Method::PUT,
            container,
            None,
            &[("restype", "container")],
            &[],
            None,
        )?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT if error_code(&response) == Some("ContainerAlreadyExists") => {
                Err(StorageError::NamespaceExists {
                    namespace: container.to_string(),
                })
            }
            _ => Err(failure("create container", container, &response)),
        }
    }

    fn put_blob(&self, container: &str, name: &str, data: &[u8]) -> Result<()> {
        let response = self.send(
            "upload blob",
            Method::PUT,
            container,
            Some(name),
            &[],
            &[("x-ms-blob-type", "BlockBlob")],
            Some(data),
        )?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(StorageError::not_found(container, name)),
            _ => Err(failure("upload blob", container, &response)),
        }
    }

    fn get_blob(&self, container: &str, name: &str) -> Result<Vec<u8>> {
        let response = self.send(
            "download blob",
            Method::GET,
            container,
            Some(name),
            &[],
            &[],
            None,
        )?;
        match response.status() {
            status if status.is_success() => response
                .bytes()
                .map(|bytes| bytes.to_vec())
                .map_err(|err| {
                    StorageError::transport("download blob", container, err.without_url())
                }),
            StatusCode::NOT_FOUND => Err(StorageError::not_found(container, name)),
            _ => Err(failure("download blob", container, &response)),
        }
    }

    fn delete_container(&self, container: &str) -> Result<()> {
        let response = self.send(
            "delete container",
            Method::DELETE,
            container,
            None,
            &[("restype", "container")],
            &[],
            None,
        )?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(StorageError::not_found(container, "")),
            _ => Err(failure("delete container", container, &response)),
        }
    }
}
