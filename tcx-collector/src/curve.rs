//! HFSC service curves.
//!
//! An HFSC class carries up to three service curves. Each present curve is exported as three
//! samples, burst, delay and rate, told apart by a `curve` label.

use parking_lot::Mutex;
use tcx_netlink::{xstats::ServiceCurves, ClassObject};

use crate::{
    decoder::class_labels,
    sample::{DeviceContext, MetricDescriptor, Sample},
};

descriptors! {
    CURVES: Curve {
        CURVE_BURST: gauge("hfsc_curve_burst", "Slope of the first curve segment in bits per second."),
        CURVE_DELAY: gauge("hfsc_curve_delay", "Length of the first curve segment in microseconds."),
        CURVE_RATE: gauge("hfsc_curve_rate", "Slope of the second curve segment in bits per second."),
    }
}

/// Expands the service curves of HFSC classes into samples.
///
/// The curves of the class being expanded are held in a cache behind a single lock, so offers
/// from concurrent scrape units are serialized. The lock is only taken for classes that carry
/// curves.
#[derive(Debug, Default)]
pub struct ServiceCurveAggregator {
    cache: Mutex<ServiceCurves>,
}

impl ServiceCurveAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn descriptors() -> &'static [&'static MetricDescriptor] {
        CURVES
    }

    /// Offer a class. HFSC classes with at least one curve yield three samples per curve,
    /// anything else yields nothing.
    pub fn offer(&self, class: &ClassObject, ctx: &DeviceContext) -> Vec<Sample> {
        let Some(curves) = class.curves.filter(|_| class.kind == "hfsc") else {
            return Vec::new();
        };

        let base = class_labels(class, ctx);

        let mut cache = self.cache.lock();
        *cache = curves;

        let mut samples = Vec::with_capacity(CURVES.len() * 3);
        for (name, curve) in cache.iter() {
            let mut labels = base.clone();
            labels.push(name.to_string());

            samples.push(Sample::new(&CURVE_BURST, labels.clone(), curve.m1 as f64));
            samples.push(Sample::new(&CURVE_DELAY, labels.clone(), curve.d as f64));
            samples.push(Sample::new(&CURVE_RATE, labels, curve.m2 as f64));
        }

        samples
    }

    /// Whether no offer is currently being expanded.
    pub fn is_idle(&self) -> bool {
        !self.cache.is_locked()
    }
}
