//! The signature engine: produce and check signed statements.

use ciborium::value::Value;

use crate::canonical::{self, int, text};
use crate::cose::{headers, sig_structure};
use crate::error::{CoreError, Result};
use crate::identity::Identity;
use crate::statement::SignedStatement;

pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Protected header options for [`sign_with`].
#[derive(Clone, Debug)]
pub struct SignOptions {
    pub content_type: String,
    pub issuer: Option<String>,
    pub feed: Option<String>,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            issuer: None,
            feed: None,
        }
    }
}

impl SignOptions {
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_feed(mut self, feed: impl Into<String>) -> Self {
        self.feed = Some(feed.into());
        self
    }
}

/// Sign `payload` with default header options.
pub fn sign(identity: &Identity, payload: &[u8]) -> Result<SignedStatement> {
    sign_with(identity, payload, &SignOptions::default())
}

/// Sign `payload`, embedding the identity's certificate chain.
///
/// Fails with [`CoreError::InvalidKey`] when the identity's key does not fit
/// its declared algorithm or its certificate names a different key.
pub fn sign_with(identity: &Identity, payload: &[u8], options: &SignOptions) -> Result<SignedStatement> {
    let certificate_key = identity.certificate().info().public_key.as_slice();
    if identity.key().public_key().to_bytes()? != certificate_key {
        return Err(CoreError::InvalidKey(
            "signer certificate does not match the signing key".into(),
        ));
    }

    let mut header = vec![
        (int(headers::ALG), int(identity.algorithm().cose_id())),
        (int(headers::CONTENT_TYPE), text(&options.content_type)),
        (
            int(headers::X5CHAIN),
            Value::Array(
                identity
                    .chain()
                    .iter()
                    .map(|cert| Value::Bytes(cert.as_bytes().to_vec()))
                    .collect(),
            ),
        ),
    ];
    if let Some(issuer) = &options.issuer {
        header.push((int(headers::ISSUER), text(issuer)));
    }
    if let Some(feed) = &options.feed {
        header.push((int(headers::FEED), text(feed)));
    }

    let protected = canonical::to_canonical_bytes(&Value::Map(header))?;
    let signature = identity.sign_bytes(&sig_structure(&protected, payload)?)?;
    SignedStatement::from_parts(protected, payload.to_vec(), signature)
}

/// Verify an encoded signed statement.
///
/// Garbage, truncated input and wrong signature lengths are
/// [`CoreError::MalformedInput`]; a well-formed statement whose signature
/// does not check out is `Ok(false)`.
pub fn verify(statement: &[u8]) -> Result<bool> {
    SignedStatement::from_bytes(statement)?.verify_signature()
}
