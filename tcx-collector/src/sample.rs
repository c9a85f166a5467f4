//! Samples and the static descriptors of the metric families they belong to.

use tcx_netlink::Device;

/// Labels carried by every qdisc sample.
pub const BASE_LABELS: &[&str] =
    &["host", "namespace", "linkindex", "link", "kind", "handle", "parent"];

/// Labels of class samples: the base labels and the leaf qdisc handle.
pub const CLASS_LABELS: &[&str] =
    &["host", "namespace", "linkindex", "link", "kind", "handle", "parent", "leaf"];

/// Labels of service curve samples: the class labels and the curve name.
pub const CURVE_LABELS: &[&str] =
    &["host", "namespace", "linkindex", "link", "kind", "handle", "parent", "leaf", "curve"];

/// Labels of filter samples: the base labels, priority and protocol.
pub const FILTER_LABELS: &[&str] =
    &["host", "namespace", "linkindex", "link", "kind", "handle", "parent", "prio", "protocol"];

/// Labels of process-level samples.
pub const HOST_LABELS: &[&str] = &["host"];

/// Whether a metric is a monotonic counter or a gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Counter,
    Gauge,
}

impl ValueKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
        }
    }
}

/// The label set a metric family is exported with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelScheme {
    Base,
    Class,
    Curve,
    Filter,
    Host,
}

impl LabelScheme {
    pub const fn names(self) -> &'static [&'static str] {
        match self {
            Self::Base => BASE_LABELS,
            Self::Class => CLASS_LABELS,
            Self::Curve => CURVE_LABELS,
            Self::Filter => FILTER_LABELS,
            Self::Host => HOST_LABELS,
        }
    }
}

/// Static metadata of a metric family.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: ValueKind,
    pub labels: LabelScheme,
}

impl MetricDescriptor {
    pub const fn counter(name: &'static str, help: &'static str, labels: LabelScheme) -> Self {
        Self { name, help, kind: ValueKind::Counter, labels }
    }

    pub const fn gauge(name: &'static str, help: &'static str, labels: LabelScheme) -> Self {
        Self { name, help, kind: ValueKind::Gauge, labels }
    }

    pub const fn label_names(&self) -> &'static [&'static str] {
        self.labels.names()
    }
}

/// A single measurement: a metric family, the label values in the order of the family's label
/// names, and the value.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub descriptor: &'static MetricDescriptor,
    pub labels: Vec<String>,
    pub value: f64,
}

impl Sample {
    pub fn new(descriptor: &'static MetricDescriptor, labels: Vec<String>, value: f64) -> Self {
        debug_assert_eq!(descriptor.label_names().len(), labels.len(), "{}", descriptor.name);
        Self { descriptor, labels, value }
    }

    pub fn name(&self) -> &'static str {
        self.descriptor.name
    }

    /// The value of the label with the given name, if the family has it.
    pub fn label(&self, name: &str) -> Option<&str> {
        let position = self.descriptor.label_names().iter().position(|label| *label == name)?;
        self.labels.get(position).map(String::as_str)
    }
}

/// The device a scrape unit works on, and where it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceContext {
    pub host: String,
    pub namespace: String,
    pub device: Device,
}

impl DeviceContext {
    pub fn new(host: impl Into<String>, namespace: impl Into<String>, device: Device) -> Self {
        Self { host: host.into(), namespace: namespace.into(), device }
    }

    /// The [`BASE_LABELS`] values for an object of this device.
    pub fn base_labels(&self, kind: &str, handle: String, parent: String) -> Vec<String> {
        let mut labels = Vec::with_capacity(CURVE_LABELS.len());
        labels.extend([
            self.host.clone(),
            self.namespace.clone(),
            self.device.index.to_string(),
            self.device.name.clone(),
            kind.to_string(),
            handle,
            parent,
        ]);
        labels
    }
}
