//! Signed-location broker: trades the bearer credential plus query intent for
//! a short-lived URL to the audit-log data.
//!
//! The sharing server answers with a sequence of JSON records (protocol,
//! metadata, then one record per data file). Records are decoded one at a
//! time as body chunks arrive, and the exchange stops at the first record
//! carrying a non-empty `file.url`.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use tracing::{debug, info};

use specter_core::{CredentialRecord, LocationRequest, QueryScope, SignedLocation};

use crate::config::ClientConfig;
use crate::error::BrokerError;

/// Longest error body echoed back from a failed exchange.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Source of signed data locations.
///
/// Every call performs a fresh exchange; implementations must not cache
/// locations because their expiry is not known to the client.
#[async_trait]
pub trait LocationBroker: Send + Sync {
    /// Obtain a signed URL for the data matching `request`.
    async fn fetch_signed_url(&self, request: &LocationRequest)
        -> Result<SignedLocation, BrokerError>;
}

/// HTTP implementation of [`LocationBroker`] against a sharing server.
///
/// Reads the sharing profile on every call, so a refreshed token is picked
/// up without restarting an interactive session.
pub struct SharingBroker {
    profile_path: PathBuf,
    http: reqwest::Client,
}

impl SharingBroker {
    /// Creates a broker with an HTTP client honouring the configured
    /// connect and request timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::Transport`] if the HTTP client cannot be built
    /// (e.g., no TLS backend available).
    pub fn new(config: &ClientConfig) -> Result<Self, BrokerError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeouts.connect {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.timeouts.request {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(BrokerError::Transport)?;
        Ok(Self::with_client(config.profile_path.clone(), http))
    }

    /// Creates a broker around an existing HTTP client.
    #[must_use]
    pub fn with_client(profile_path: PathBuf, http: reqwest::Client) -> Self {
        Self { profile_path, http }
    }
}

#[async_trait]
impl LocationBroker for SharingBroker {
    async fn fetch_signed_url(
        &self,
        request: &LocationRequest,
    ) -> Result<SignedLocation, BrokerError> {
        let credentials = CredentialRecord::load(&self.profile_path)?;
        credentials.ensure_usable()?;

        let url = query_url(&credentials.endpoint, &request.scope)?;
        let body = request.body();
        info!(
            scope = %request.scope,
            predicate_hints = body.predicate_hints.as_ref().map_or(0, Vec::len),
            limit_hint = request.limit_hint,
            "requesting signed location"
        );

        let mut response = self
            .http
            .post(url)
            .header(
                AUTHORIZATION,
                format!("Bearer {}", credentials.bearer_token),
            )
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        debug!(status = status.as_u16(), "sharing server responded");
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(BrokerError::Status {
                status: status.as_u16(),
                body: text.trim().chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let mut decoder = RecordDecoder::default();
        while let Some(chunk) = response.chunk().await? {
            decoder.push(&chunk);
            if let Some(location) = next_location(&mut decoder)? {
                debug!(?location, "found signed location");
                return Ok(location);
            }
        }
        decoder.finish().map_err(BrokerError::Decode)?;
        Err(BrokerError::NoLocationFound)
    }
}

/// Builds `<endpoint>/shares/<share>/schemas/<schema>/tables/<table>/query`.
///
/// Scope names are percent-encoded as path segments.
///
/// # Errors
///
/// Returns [`BrokerError::InvalidEndpoint`] if `endpoint` is not an absolute
/// hierarchical URL.
pub fn query_url(endpoint: &str, scope: &QueryScope) -> Result<Url, BrokerError> {
    let invalid = |reason: String| BrokerError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let mut url = Url::parse(endpoint.trim_end_matches('/')).map_err(|e| invalid(e.to_string()))?;
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|()| invalid("endpoint cannot be a base URL".to_string()))?;
        segments.pop_if_empty().extend([
            "shares",
            scope.share.as_str(),
            "schemas",
            scope.schema.as_str(),
            "tables",
            scope.table.as_str(),
            "query",
        ]);
    }
    Ok(url)
}

/// One record of the exchange response. Records without a data file
/// (protocol and metadata lines) decode with `file` absent.
#[derive(Debug, Default, Deserialize)]
struct ResponseRecord {
    #[serde(default)]
    file: Option<FileRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct FileRecord {
    #[serde(default)]
    url: String,
}

impl ResponseRecord {
    fn into_url(self) -> Option<String> {
        self.file.map(|f| f.url).filter(|url| !url.is_empty())
    }
}

/// Decodes buffered records until one carries a URL. Returns `None` when the
/// buffer runs out first.
fn next_location(decoder: &mut RecordDecoder) -> Result<Option<SignedLocation>, BrokerError> {
    while let Some(record) = decoder
        .next_record::<ResponseRecord>()
        .map_err(BrokerError::Decode)?
    {
        if let Some(url) = record.into_url() {
            return Ok(Some(SignedLocation::new(url)));
        }
    }
    Ok(None)
}

/// Finds the first signed location in a complete response body.
///
/// Records after the first match are never decoded.
///
/// # Errors
///
/// Returns [`BrokerError::Decode`] for malformed records before the match and
/// [`BrokerError::NoLocationFound`] if no record carries a URL.
pub fn first_location(body: &[u8]) -> Result<SignedLocation, BrokerError> {
    let mut decoder = RecordDecoder::default();
    decoder.push(body);
    if let Some(location) = next_location(&mut decoder)? {
        return Ok(location);
    }
    decoder.finish().map_err(BrokerError::Decode)?;
    Err(BrokerError::NoLocationFound)
}

/// Incremental decoder for a body of concatenated JSON values.
///
/// Bytes are pushed as they arrive; [`next_record`](Self::next_record)
/// yields a value once it is complete and leaves the rest buffered.
#[derive(Debug, Default)]
pub struct RecordDecoder {
    buf: Vec<u8>,
    pos: usize,
}

impl RecordDecoder {
    /// Appends a chunk of body bytes.
    pub fn push(&mut self, chunk: &[u8]) {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
        self.buf.extend_from_slice(chunk);
    }

    /// Decodes the next complete value, or returns `None` if the buffer holds
    /// only whitespace or a partial value.
    ///
    /// # Errors
    ///
    /// Returns the decode error for syntactically invalid or mistyped input.
    pub fn next_record<T: DeserializeOwned>(&mut self) -> Result<Option<T>, serde_json::Error> {
        let pending = &self.buf[self.pos..];
        let mut stream = serde_json::Deserializer::from_slice(pending).into_iter::<T>();
        match stream.next() {
            None => Ok(None),
            Some(Ok(value)) => {
                let consumed = stream.byte_offset();
                self.pos += consumed;
                Ok(Some(value))
            }
            Some(Err(err)) if err.is_eof() => Ok(None),
            Some(Err(err)) => Err(err),
        }
    }

    /// Bytes not yet consumed by a decoded value.
    #[must_use]
    pub fn remaining(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    /// Checks that the input did not end inside a value.
    ///
    /// # Errors
    ///
    /// Returns the end-of-input error for a truncated trailing value.
    pub fn finish(&self) -> Result<(), serde_json::Error> {
        match serde_json::Deserializer::from_slice(self.remaining())
            .into_iter::<IgnoredAny>()
            .next()
        {
            Some(Err(err)) => Err(err),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_first_non_empty_url_and_stops() {
        let body = br#"{"file":{"url":""}}
{"file":{"url":"https://x/obj"}}
{"file":{"url":"https://y/obj2"}}"#;
        let location = first_location(body).unwrap();
        assert_eq!(location.as_str(), "https://x/obj");
    }

    #[test]
    fn records_after_the_match_are_not_decoded() {
        // The third record is malformed; decoding it would fail.
        let body = br#"{"file":{"url":""}}{"file":{"url":"https://x/obj"}}{"file": nope"#;
        let mut decoder = RecordDecoder::default();
        decoder.push(body);

        let location = next_location(&mut decoder).unwrap().unwrap();
        assert_eq!(location.as_str(), "https://x/obj");
        assert_eq!(decoder.remaining(), br#"{"file": nope"#);

        assert_eq!(first_location(body).unwrap().as_str(), "https://x/obj");
    }

    #[test]
    fn skips_protocol_and_metadata_records() {
        let body = br#"{"protocol":{"minReaderVersion":1}}
{"metaData":{"id":"t","format":{"provider":"parquet"}}}
{"file":{"url":"https://bucket/part-0.parquet?sig=1","id":"f1","size":10}}
"#;
        assert_eq!(
            first_location(body).unwrap().as_str(),
            "https://bucket/part-0.parquet?sig=1"
        );
    }

    #[test]
    fn empty_body_has_no_location() {
        assert!(matches!(
            first_location(b""),
            Err(BrokerError::NoLocationFound)
        ));
        assert!(matches!(
            first_location(b"  \n "),
            Err(BrokerError::NoLocationFound)
        ));
    }

    #[test]
    fn all_empty_urls_have_no_location() {
        let body = br#"{"file":{"url":""}}{"file":{}}{"protocol":{}}"#;
        assert!(matches!(
            first_location(body),
            Err(BrokerError::NoLocationFound)
        ));
    }

    #[test]
    fn malformed_record_is_decode_error() {
        assert!(matches!(
            first_location(b"<html>bad gateway</html>"),
            Err(BrokerError::Decode(_))
        ));
    }

    #[test]
    fn truncated_body_is_decode_error() {
        assert!(matches!(
            first_location(br#"{"file":{"url":"#),
            Err(BrokerError::Decode(_))
        ));
    }

    #[test]
    fn decoder_waits_for_split_records() {
        let mut decoder = RecordDecoder::default();
        decoder.push(br#"{"file":{"url":"htt"#);
        assert!(next_location(&mut decoder).unwrap().is_none());

        decoder.push(br#"ps://x/obj"}}"#);
        let location = next_location(&mut decoder).unwrap().unwrap();
        assert_eq!(location.as_str(), "https://x/obj");
    }

    #[test]
    fn query_url_appends_scope_segments() {
        let scope = QueryScope::default();
        let url = query_url("https://host/api/2.0/delta-sharing/", &scope).unwrap();
        assert_eq!(
            url.as_str(),
            "https://host/api/2.0/delta-sharing/shares/audit_logs/schemas/audit/tables/logging/query"
        );
    }

    #[test]
    fn query_url_encodes_segments() {
        let scope = QueryScope::new("my share", "a/b", "t");
        let url = query_url("https://host", &scope).unwrap();
        assert_eq!(
            url.as_str(),
            "https://host/shares/my%20share/schemas/a%2Fb/tables/t/query"
        );
    }

    #[test]
    fn query_url_rejects_relative_endpoint() {
        assert!(matches!(
            query_url("not a url", &QueryScope::default()),
            Err(BrokerError::InvalidEndpoint { .. })
        ));
    }
}
