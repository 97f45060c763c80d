//! Service parameters and file-based trust configuration.
//!
//! A trust directory holds `*.json` files, searched recursively. Each file is
//! either a single service parameters object or `{"parameters": [...]}`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use scitt_core::{Algorithm, Certificate};

use crate::error::{Result, TrustError};

/// Tree algorithm name the service publishes.
pub const TREE_ALGORITHM_CCF: &str = "CCF";

/// What a service publishes about one of its identities.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceParameters {
    /// Hex SHA-256 of the service certificate.
    pub service_id: String,
    pub tree_algorithm: String,
    pub signature_algorithm: String,
    /// Base64 of the certificate encoding.
    pub service_certificate: String,
}

impl ServiceParameters {
    pub fn from_certificate(certificate: &Certificate, algorithm: Algorithm) -> Self {
        Self {
            service_id: certificate.fingerprint().to_hex(),
            tree_algorithm: TREE_ALGORITHM_CCF.to_string(),
            signature_algorithm: algorithm.name().to_string(),
            service_certificate: STANDARD.encode(certificate.as_bytes()),
        }
    }

    /// Decode the certificate and check it against the service id.
    pub fn certificate(&self) -> Result<Certificate> {
        let bytes = STANDARD.decode(&self.service_certificate).map_err(|e| {
            TrustError::InvalidCertificate(scitt_core::CoreError::MalformedInput(format!(
                "service certificate is not base64: {}",
                e
            )))
        })?;
        let certificate = Certificate::from_bytes(&bytes)?;
        let fingerprint = certificate.fingerprint().to_hex();
        if !fingerprint.eq_ignore_ascii_case(&self.service_id) {
            return Err(TrustError::ServiceIdMismatch {
                service_id: self.service_id.clone(),
                fingerprint,
            });
        }
        Ok(certificate)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TrustFile {
    Many { parameters: Vec<ServiceParameters> },
    One(ServiceParameters),
}

/// Read every service parameters entry under `dir`.
///
/// Service ids must be non-empty and unique across the directory.
pub fn load_dir(dir: &Path) -> Result<Vec<ServiceParameters>> {
    let mut files = Vec::new();
    collect_json_files(dir, &mut files)?;
    files.sort();

    let mut seen = HashSet::new();
    let mut all = Vec::new();
    for path in files {
        let text = fs::read_to_string(&path).map_err(|source| TrustError::Io {
            path: path.clone(),
            source,
        })?;
        let entries = match serde_json::from_str::<TrustFile>(&text) {
            Ok(TrustFile::Many { parameters }) => parameters,
            Ok(TrustFile::One(params)) => vec![params],
            Err(e) => {
                return Err(TrustError::InvalidTrustFile {
                    path,
                    reason: e.to_string(),
                })
            }
        };

        for params in entries {
            if params.service_id.is_empty() {
                return Err(TrustError::InvalidTrustFile {
                    path,
                    reason: "serviceId must be a non-empty string".into(),
                });
            }
            if !seen.insert(params.service_id.to_ascii_lowercase()) {
                return Err(TrustError::DuplicateServiceId(params.service_id));
            }
            tracing::debug!("Loaded service {} from {}", params.service_id, path.display());
            all.push(params);
        }
    }
    Ok(all)
}

fn collect_json_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let io_err = |source| TrustError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            collect_json_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "json") {
            out.push(path);
        }
    }
    Ok(())
}
