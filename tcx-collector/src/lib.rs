//! Collectors turning Linux traffic control state into metric samples.
//!
//! A [`Scraper`] fans out over namespaces, devices and [`SubCollector`]s, fetching objects with a
//! [`tcx_netlink::ObjectFetcher`] and running the kind-specific decoders on them. The samples
//! can be rendered in the Prometheus text format with a [`MetricRegistry`].
#![doc(issue_tracker_base_url = "https://github.com/chainbound/tcx/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

/// Declares the descriptors of a decoder as statics, plus a table listing them in emission
/// order.
macro_rules! descriptors {
    ($table:ident: $scheme:ident {
        $($id:ident: $kind:ident($name:literal, $help:literal),)+
    }) => {
        $(
            pub(crate) static $id: $crate::sample::MetricDescriptor =
                $crate::sample::MetricDescriptor::$kind(
                    $name,
                    $help,
                    $crate::sample::LabelScheme::$scheme,
                );
        )+

        pub(crate) static $table: &[&$crate::sample::MetricDescriptor] = &[$(&$id),+];
    };
}

pub mod curve;
pub mod decoder;
pub mod error;
pub mod registry;
pub mod sample;
pub mod scrape;

pub use curve::ServiceCurveAggregator;
pub use decoder::{ClassDecoder, FilterDecoder, QdiscDecoder};
pub use error::{ExpositionError, UnitError, UnknownCollector};
pub use registry::MetricRegistry;
pub use sample::{DeviceContext, LabelScheme, MetricDescriptor, Sample, ValueKind};
pub use scrape::{NamespaceTarget, Scraper, SubCollector};
