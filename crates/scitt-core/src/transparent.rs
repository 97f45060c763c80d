//! Transparent statements: a signed statement with its receipts embedded in
//! the unprotected header (`394: [receipt, ..]`).

use ciborium::value::Value;

use crate::canonical::{self, int};
use crate::cose::{headers, CoseSign1};
use crate::error::{CoreError, Result};
use crate::receipt::Receipt;
use crate::statement::SignedStatement;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransparentStatement {
    statement: SignedStatement,
    receipts: Vec<Receipt>,
}

impl TransparentStatement {
    pub fn new(statement: SignedStatement, receipts: Vec<Receipt>) -> Result<Self> {
        if receipts.is_empty() {
            return Err(CoreError::malformed("transparent statement needs a receipt"));
        }
        Ok(Self {
            statement,
            receipts,
        })
    }

    /// Parse and split into the embedded statement and its receipts.
    ///
    /// Removing the receipts header reproduces the original statement:
    /// its protected header, payload and signature are carried unchanged.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope = CoseSign1::from_bytes(bytes)?;

        let mut receipts = Vec::new();
        for (label, value) in &envelope.unprotected {
            if *label != int(headers::RECEIPTS) {
                return Err(CoreError::malformed(
                    "unexpected unprotected header in transparent statement",
                ));
            }
            for item in canonical::as_array(value, "receipts header")? {
                receipts.push(Receipt::from_bytes(canonical::as_bytes(item, "receipt")?)?);
            }
        }

        let statement =
            SignedStatement::from_parts(envelope.protected, envelope.payload, envelope.signature)?;
        Self::new(statement, receipts)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let receipts = self
            .receipts
            .iter()
            .map(|r| Value::Bytes(r.as_bytes().to_vec()))
            .collect();
        self.statement
            .envelope(vec![(int(headers::RECEIPTS), Value::Array(receipts))])
            .to_bytes()
    }

    pub fn statement(&self) -> &SignedStatement {
        &self.statement
    }

    pub fn receipts(&self) -> &[Receipt] {
        &self.receipts
    }

    pub fn into_parts(self) -> (SignedStatement, Vec<Receipt>) {
        (self.statement, self.receipts)
    }
}
