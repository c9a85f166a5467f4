//! Metric metadata and Prometheus text exposition.

use std::collections::HashMap;

use prometheus::{CounterVec, Encoder as _, GaugeVec, Opts, Registry, TextEncoder};

use crate::{
    error::ExpositionError,
    sample::{MetricDescriptor, Sample, ValueKind},
};

/// The metric families a set of collectors can produce.
///
/// Samples are rendered through a fresh [`Registry`] per call, so families never outlive the
/// scrape that produced them.
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    descriptors: Vec<&'static MetricDescriptor>,
}

impl MetricRegistry {
    /// Create a registry from descriptors. Repeated families are kept once.
    pub fn new(descriptors: impl IntoIterator<Item = &'static MetricDescriptor>) -> Self {
        let mut registry = Self::default();
        for descriptor in descriptors {
            if !registry.descriptors.iter().any(|d| d.name == descriptor.name) {
                registry.descriptors.push(descriptor);
            }
        }

        registry
    }

    /// Static metadata of every family, in registration order.
    pub fn describe(&self) -> &[&'static MetricDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, name: &str) -> Option<&'static MetricDescriptor> {
        self.descriptors.iter().copied().find(|d| d.name == name)
    }

    /// Render samples in the Prometheus text format.
    ///
    /// Counter samples sharing a label set are summed, for gauges the last sample wins.
    ///
    /// Values are `f64`, so kernel counters above 2^53 are rounded to the nearest representable
    /// value and lose their low bits.
    pub fn encode_text(&self, samples: &[Sample]) -> Result<String, ExpositionError> {
        let registry = Registry::new();

        let mut families: HashMap<&'static str, Vec<&Sample>> = HashMap::new();
        for sample in samples {
            families.entry(sample.name()).or_default().push(sample);
        }

        for samples in families.into_values() {
            let descriptor = samples[0].descriptor;
            let opts = Opts::new(descriptor.name, descriptor.help);

            match descriptor.kind {
                ValueKind::Counter => {
                    let vec = CounterVec::new(opts, descriptor.label_names())?;
                    for sample in samples {
                        let labels: Vec<&str> = sample.labels.iter().map(String::as_str).collect();
                        vec.get_metric_with_label_values(&labels)?.inc_by(sample.value.max(0.0));
                    }
                    registry.register(Box::new(vec))?;
                }
                ValueKind::Gauge => {
                    let vec = GaugeVec::new(opts, descriptor.label_names())?;
                    for sample in samples {
                        let labels: Vec<&str> = sample.labels.iter().map(String::as_str).collect();
                        vec.get_metric_with_label_values(&labels)?.set(sample.value);
                    }
                    registry.register(Box::new(vec))?;
                }
            }
        }

        let mut buf = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::LabelScheme;

    static PACKETS: MetricDescriptor =
        MetricDescriptor::counter("test_packets", "Packets sent.", LabelScheme::Host);
    static FLOWS: MetricDescriptor =
        MetricDescriptor::gauge("test_flows", "Flows tracked.", LabelScheme::Host);

    #[test]
    fn repeated_families_are_described_once() {
        let registry = MetricRegistry::new([&PACKETS, &FLOWS, &PACKETS]);
        let names: Vec<_> = registry.describe().iter().map(|d| d.name).collect();

        assert_eq!(names, ["test_packets", "test_flows"]);
        assert_eq!(registry.get("test_flows"), Some(&FLOWS));
        assert_eq!(registry.get("nope"), None);
    }

    #[test]
    fn text_exposition() {
        let registry = MetricRegistry::new([&PACKETS, &FLOWS]);
        let samples = vec![
            Sample::new(&PACKETS, vec!["edge-1".to_string()], 3.0),
            Sample::new(&PACKETS, vec!["edge-1".to_string()], 4.0),
            Sample::new(&FLOWS, vec!["edge-1".to_string()], 12.0),
            Sample::new(&FLOWS, vec!["edge-2".to_string()], 1.0),
        ];

        let text = registry.encode_text(&samples).unwrap();

        assert!(text.contains("# TYPE test_packets counter"));
        assert!(text.contains("# HELP test_flows Flows tracked."));
        assert!(text.contains("test_packets{host=\"edge-1\"} 7"));
        assert!(text.contains("test_flows{host=\"edge-1\"} 12"));
        assert!(text.contains("test_flows{host=\"edge-2\"} 1"));
    }

    #[test]
    fn counters_above_f64_precision_are_rounded() {
        let registry = MetricRegistry::new([&PACKETS]);
        let exact = (1u64 << 53) + 1;
        let samples = vec![Sample::new(&PACKETS, vec!["edge-1".to_string()], exact as f64)];

        let text = registry.encode_text(&samples).unwrap();

        assert!(text.contains("test_packets{host=\"edge-1\"} 9007199254740992\n"));
        assert!(!text.contains(&exact.to_string()));
    }

    #[test]
    fn empty_scrape_renders_nothing() {
        let registry = MetricRegistry::new([&PACKETS]);
        assert_eq!(registry.encode_text(&[]).unwrap(), "");
    }
}
