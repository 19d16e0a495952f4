//! Reads X.509 certificates from a configured trust store and prepares
//! one expiration gauge per certificate, tagged by subject distinguished
//! name, for registration into a Prometheus registry.
//!
//! The crate is built around a single-method capability, [`CertificateSource`],
//! with a file-backed implementation ([`TrustStoreCertificates`]) and a
//! concatenating composite ([`SourceComposite`]). [`metrics::ExpirationMetrics`]
//! consumes any source, captures each certificate's "not valid after"
//! instant as Unix epoch seconds at construction time, and registers the
//! prepared gauges on demand.
//!
//! Everything is synchronous: sources are read once, at construction, and
//! never refreshed.

use log::{debug, trace};
use openssl::asn1::Asn1Time;
use openssl::pkcs12::Pkcs12;
use openssl::x509::{X509, X509Ref};
use std::fs;

pub mod config;
pub mod error;
pub mod metrics;

pub use config::TrustStoreConfig;
pub use error::Error;

/// A provider of X.509 certificates.
///
/// Implementations are invoked once, synchronously. A failed read is
/// surfaced as [`Error::StoreRead`]; "nothing configured" is an empty
/// collection, not an error.
pub trait CertificateSource {
    fn read_all_certificates(&self) -> Result<Vec<X509>, Error>;
}

/// File-backed certificate source reading a password-protected trust store.
///
/// Supported container formats are PKCS#12 (`"pkcs12"`, alias `"p12"`,
/// the default) and concatenated PEM bundles (`"pem"`). When the
/// configured path or password is absent or blank the store counts as
/// not configured and the read yields an empty collection.
pub struct TrustStoreCertificates {
    config: TrustStoreConfig,
}

impl TrustStoreCertificates {
    pub fn new(config: TrustStoreConfig) -> Self {
        TrustStoreCertificates { config }
    }

    fn read_store(&self, path: &str, password: &str, format: &str) -> Result<Vec<X509>, Error> {
        let bytes = fs::read(path).map_err(|e| Error::store_read(path, e))?;

        let certificates = match format {
            "pkcs12" | "p12" => {
                let store = Pkcs12::from_der(&bytes).map_err(|e| Error::store_read(path, e))?;
                let parsed = store
                    .parse2(password)
                    .map_err(|e| Error::store_read(path, e))?;

                // Private key entries are not certificates and are skipped.
                let mut certificates = Vec::new();
                if let Some(certificate) = parsed.cert {
                    certificates.push(certificate);
                }
                if let Some(chain) = parsed.ca {
                    certificates.extend(chain);
                }
                certificates
            }
            "pem" => X509::stack_from_pem(&bytes).map_err(|e| Error::store_read(path, e))?,
            other => {
                return Err(Error::store_read(
                    path,
                    format!("unsupported trust store format '{}'", other),
                ))
            }
        };

        for certificate in &certificates {
            trace!(
                "Add certificate '{}' from trust store '{}'",
                subject_dn(certificate),
                path
            );
        }

        Ok(certificates)
    }
}

impl CertificateSource for TrustStoreCertificates {
    fn read_all_certificates(&self) -> Result<Vec<X509>, Error> {
        let format = self.config.format();
        debug!(
            "Try to load X509 certificates from trust store path: {:?}, password: {}, format: '{}'",
            self.config.path(),
            if self.config.password().is_some() {
                "<yes>"
            } else {
                "<no>"
            },
            format
        );

        let path = match self.config.path() {
            Some(path) => path,
            None => return Ok(Vec::new()),
        };
        let password = match self.config.password() {
            Some(password) => password,
            None => return Ok(Vec::new()),
        };

        self.read_store(path, password, format)
    }
}

/// Aggregates several certificate sources into one.
///
/// Sources are read exactly once each, in the order supplied, and their
/// outputs concatenated. The first failing source aborts the read and its
/// error reaches the caller; remaining sources are not invoked.
pub struct SourceComposite {
    sources: Vec<Box<dyn CertificateSource>>,
}

impl SourceComposite {
    /// Composes the given sources. Zero sources is valid and yields a
    /// source that always returns an empty collection.
    pub fn of(sources: Vec<Box<dyn CertificateSource>>) -> Self {
        SourceComposite { sources }
    }
}

impl CertificateSource for SourceComposite {
    fn read_all_certificates(&self) -> Result<Vec<X509>, Error> {
        let mut certificates = Vec::new();
        for source in &self.sources {
            certificates.extend(source.read_all_certificates()?);
        }
        Ok(certificates)
    }
}

/// The certificate's "not valid after" instant as seconds since the Unix epoch.
pub fn not_after_epoch(certificate: &X509Ref) -> Result<i64, Error> {
    let epoch = Asn1Time::from_unix(0)?;
    let diff = epoch.diff(certificate.not_after())?;
    Ok(i64::from(diff.days) * 86_400 + i64::from(diff.secs))
}

/// The subject distinguished name rendered most-specific-first,
/// e.g. `CN=Amazon Root CA 4, O=Amazon, C=US`.
///
/// Entries whose type or value cannot be rendered are skipped.
pub fn subject_dn(certificate: &X509Ref) -> String {
    let mut parts: Vec<String> = Vec::new();
    for entry in certificate.subject_name().entries() {
        if let (Ok(key), Ok(value)) = (entry.object().nid().short_name(), entry.data().as_utf8()) {
            parts.push(format!("{}={}", key, value));
        }
    }
    parts.reverse();
    parts.join(", ")
}
