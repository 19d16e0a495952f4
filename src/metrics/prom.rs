//! Prometheus gauge preparation and binding for certificate expiration.

use std::collections::HashMap;

use log::debug;
use openssl::x509::X509Ref;
use prometheus::{Gauge, Opts, Registry};

use crate::error::Error;
use crate::{not_after_epoch, subject_dn, CertificateSource};

/// Logical metric name.
pub const METRIC_NAME: &str = "security.cert.x509.expiration";
/// Metric help text.
pub const METRIC_DESCRIPTION: &str =
    "Time since the Unix epoch in seconds when the certificate is no longer valid.";
/// Metric base unit.
pub const METRIC_UNIT: &str = "seconds";

// Prometheus metric names cannot contain dots; the exposition name is the
// flattened logical name with the base unit appended:
// security_cert_x509_expiration_seconds
fn exposition_name() -> String {
    format!("{}_{}", METRIC_NAME.replace('.', "_"), METRIC_UNIT)
}

/// An immutable key/value pair attached to a gauge registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    key: String,
    value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Tag {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Derives descriptive tags from a certificate.
///
/// Pluggable: alternate implementations may derive different or
/// additional tags (issuer, serial number, ...) without touching any
/// other component.
pub trait TagFactory {
    fn build_tags_from(&self, certificate: &X509Ref) -> Vec<Tag>;
}

/// Default tag factory producing exactly one tag: key `subjectDN`,
/// value = the certificate's subject distinguished name.
#[derive(Debug, Default)]
pub struct SubjectDnTagFactory;

impl TagFactory for SubjectDnTagFactory {
    fn build_tags_from(&self, certificate: &X509Ref) -> Vec<Tag> {
        vec![Tag::new("subjectDN", subject_dn(certificate))]
    }
}

/// A prepared, not-yet-registered gauge: the certificate's expiration
/// instant as epoch seconds, captured eagerly, plus its tags. The metric
/// name, description and unit are the fixed module constants.
#[derive(Debug, Clone)]
pub struct GaugeSpec {
    tags: Vec<Tag>,
    expiration_epoch_seconds: i64,
}

impl GaugeSpec {
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn value(&self) -> i64 {
        self.expiration_epoch_seconds
    }
}

/// Prepares one expiration gauge per certificate at construction time and
/// registers them into externally supplied registries on [`bind_to`].
///
/// Certificates are read from the source exactly once, in the
/// constructor; the value exposed by each gauge is the epoch-seconds
/// captured there, not recomputed on scrape. `bind_to` may be called
/// repeatedly against different registries and re-applies the same
/// prepared values each time.
///
/// [`bind_to`]: ExpirationMetrics::bind_to
pub struct ExpirationMetrics {
    gauges: Vec<GaugeSpec>,
}

impl ExpirationMetrics {
    /// Reads all certificates from `source` and builds one [`GaugeSpec`]
    /// per certificate, in source order.
    ///
    /// Fails fast: a source read failure or an unparseable "not valid
    /// after" field aborts construction and no gauges survive.
    pub fn new(
        tag_factory: &dyn TagFactory,
        source: &dyn CertificateSource,
    ) -> Result<Self, Error> {
        let certificates = source.read_all_certificates()?;

        let mut gauges = Vec::with_capacity(certificates.len());
        for certificate in &certificates {
            gauges.push(GaugeSpec {
                expiration_epoch_seconds: not_after_epoch(certificate)?,
                tags: tag_factory.build_tags_from(certificate),
            });
        }

        debug!("Prepared {} certificate expiration gauges", gauges.len());
        Ok(ExpirationMetrics { gauges })
    }

    /// The prepared gauges, in the order they were built.
    pub fn gauges(&self) -> &[GaugeSpec] {
        &self.gauges
    }

    /// Registers every prepared gauge into `registry`, in build order.
    ///
    /// Gauge identity (name plus tag set) is the registry's concern: a
    /// duplicate registration is collapsed into the already-registered
    /// series and is not an error. Any other rejection surfaces as
    /// [`Error::Registration`].
    pub fn bind_to(&self, registry: &Registry) -> Result<(), Error> {
        for spec in &self.gauges {
            let labels: HashMap<String, String> = spec
                .tags
                .iter()
                .map(|tag| (tag.key().to_string(), tag.value().to_string()))
                .collect();

            let opts = Opts::new(exposition_name(), METRIC_DESCRIPTION).const_labels(labels);
            let gauge = Gauge::with_opts(opts)?;
            gauge.set(spec.expiration_epoch_seconds as f64);

            match registry.register(Box::new(gauge)) {
                Ok(()) => {}
                Err(prometheus::Error::AlreadyReg) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use openssl::asn1::Asn1Time;
    use openssl::hash::MessageDigest;
    use openssl::pkey::{PKey, Private};
    use openssl::rsa::Rsa;
    use openssl::x509::{X509, X509NameBuilder};
    use std::cell::Cell;

    fn certificate(cn: &str, not_after: i64) -> X509 {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        certificate_with_key(cn, not_after, &key)
    }

    fn certificate_with_key(cn: &str, not_after: i64, key: &PKey<Private>) -> X509 {
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", cn).unwrap();
        let name = name.build();

        let serial = openssl::bn::BigNum::from_u32(1)
            .unwrap()
            .to_asn1_integer()
            .unwrap();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder
            .set_not_before(&Asn1Time::from_unix(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::from_unix(not_after).unwrap())
            .unwrap();
        builder.set_pubkey(key).unwrap();
        builder.sign(key, MessageDigest::sha256()).unwrap();
        builder.build()
    }

    struct FixedSource(Vec<X509>);

    impl CertificateSource for FixedSource {
        fn read_all_certificates(&self) -> Result<Vec<X509>, Error> {
            Ok(self.0.clone())
        }
    }

    struct IndexTagFactory {
        next: Cell<u32>,
    }

    impl TagFactory for IndexTagFactory {
        fn build_tags_from(&self, _certificate: &X509Ref) -> Vec<Tag> {
            let index = self.next.get();
            self.next.set(index + 1);
            vec![Tag::new("index", index.to_string())]
        }
    }

    struct ConstantTagFactory;

    impl TagFactory for ConstantTagFactory {
        fn build_tags_from(&self, _certificate: &X509Ref) -> Vec<Tag> {
            vec![Tag::new("key", "value")]
        }
    }

    fn expiration_family(registry: &Registry) -> Option<prometheus::proto::MetricFamily> {
        registry
            .gather()
            .into_iter()
            .find(|family| family.get_name() == exposition_name())
    }

    #[test]
    fn test_exposition_name() {
        assert_eq!(exposition_name(), "security_cert_x509_expiration_seconds");
    }

    #[test]
    fn test_default_tag_factory_builds_subject_dn_tag() {
        let cert = certificate("gauge.example", 2_000_000_000);
        let tags = SubjectDnTagFactory.build_tags_from(&cert);

        assert_eq!(tags, vec![Tag::new("subjectDN", "CN=gauge.example")]);
    }

    #[test]
    fn test_empty_source_prepares_no_gauges() {
        let metrics = ExpirationMetrics::new(&SubjectDnTagFactory, &FixedSource(Vec::new())).unwrap();
        assert!(metrics.gauges().is_empty());

        let registry = Registry::new();
        metrics.bind_to(&registry).unwrap();
        assert!(expiration_family(&registry).is_none());
    }

    #[test]
    fn test_gauge_value_is_not_after_epoch_seconds() {
        let cert = certificate("gauge.example", 2_049_321_600);
        let metrics =
            ExpirationMetrics::new(&ConstantTagFactory, &FixedSource(vec![cert])).unwrap();

        let registry = Registry::new();
        metrics.bind_to(&registry).unwrap();

        let family = expiration_family(&registry).unwrap();
        assert_eq!(family.get_help(), METRIC_DESCRIPTION);
        assert_eq!(family.get_metric().len(), 1);

        let metric = &family.get_metric()[0];
        assert_eq!(metric.get_gauge().value(), 2_049_321_600.0);
        assert_eq!(metric.get_label().len(), 1);
        assert_eq!(metric.get_label()[0].get_name(), "key");
        assert_eq!(metric.get_label()[0].get_value(), "value");
    }

    #[test]
    fn test_one_gauge_per_certificate() {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let certificates = vec![
            certificate_with_key("first", 2_000_000_000, &key),
            certificate_with_key("second", 2_100_000_000, &key),
            certificate_with_key("third", 2_200_000_000, &key),
        ];

        let factory = IndexTagFactory { next: Cell::new(0) };
        let metrics = ExpirationMetrics::new(&factory, &FixedSource(certificates)).unwrap();
        assert_eq!(metrics.gauges().len(), 3);

        let registry = Registry::new();
        metrics.bind_to(&registry).unwrap();

        let family = expiration_family(&registry).unwrap();
        assert_eq!(family.get_metric().len(), 3);
    }

    #[test]
    fn test_identical_tags_collapse_to_one_series() {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let certificates = vec![
            certificate_with_key("first", 2_000_000_000, &key),
            certificate_with_key("second", 2_100_000_000, &key),
        ];

        let metrics =
            ExpirationMetrics::new(&ConstantTagFactory, &FixedSource(certificates)).unwrap();

        let registry = Registry::new();
        metrics.bind_to(&registry).unwrap();

        let family = expiration_family(&registry).unwrap();
        assert_eq!(family.get_metric().len(), 1);
    }

    #[test]
    fn test_bind_to_is_repeatable_across_registries() {
        let cert = certificate("gauge.example", 2_221_603_200);
        let metrics = ExpirationMetrics::new(&SubjectDnTagFactory, &FixedSource(vec![cert])).unwrap();

        let first = Registry::new();
        let second = Registry::new();
        metrics.bind_to(&first).unwrap();
        metrics.bind_to(&second).unwrap();

        for registry in [&first, &second] {
            let family = expiration_family(registry).unwrap();
            assert_eq!(family.get_metric().len(), 1);
            assert_eq!(
                family.get_metric()[0].get_gauge().value(),
                2_221_603_200.0
            );
        }
    }

    #[test]
    fn test_construction_propagates_source_failure() {
        struct FailingSource;

        impl CertificateSource for FailingSource {
            fn read_all_certificates(&self) -> Result<Vec<X509>, Error> {
                Err(Error::store_read("/broken/store.p12", "boom"))
            }
        }

        match ExpirationMetrics::new(&SubjectDnTagFactory, &FailingSource) {
            Err(Error::StoreRead { path, .. }) => assert_eq!(path, "/broken/store.p12"),
            _ => panic!("Expected StoreRead"),
        }
    }
}
