//! Kind-specific decoders.
//!
//! Every decoder turns one object into a flat list of samples, one per scalar statistic. A
//! decoder only produces samples for objects of its own kind: handing it anything else is not an
//! error, it simply yields nothing. Counters are exported as the kernel reports them, converted
//! to `f64`, which is exact up to 2^53.

use tcx_netlink::{
    xstats::{ClassXstats, QdiscXstats},
    ClassObject, FilterObject, QdiscObject,
};

use crate::sample::{DeviceContext, MetricDescriptor, Sample};

mod base;
mod classful;
mod filter;
mod fq;
mod red;

/// Accumulates the samples of one object, which all share a label set.
#[derive(Debug)]
pub(crate) struct SampleSet {
    labels: Vec<String>,
    samples: Vec<Sample>,
}

impl SampleSet {
    pub(crate) fn new(labels: Vec<String>) -> Self {
        Self { labels, samples: Vec::new() }
    }

    pub(crate) fn push(&mut self, descriptor: &'static MetricDescriptor, value: f64) {
        self.samples.push(Sample::new(descriptor, self.labels.clone(), value));
    }

    /// Push a field that older kernels don't report. Absent fields produce no sample.
    pub(crate) fn push_opt(&mut self, descriptor: &'static MetricDescriptor, value: Option<f64>) {
        if let Some(value) = value {
            self.push(descriptor, value);
        }
    }

    pub(crate) fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

/// Decoders for queueing disciplines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QdiscDecoder {
    /// Base statistics of every qdisc, regardless of kind.
    Generic,
    Fq,
    FqCodel,
    Codel,
    Pie,
    Red,
    Choke,
    Sfb,
    Cbq,
    Hfsc,
}

impl QdiscDecoder {
    pub const ALL: [Self; 10] = [
        Self::Generic,
        Self::Fq,
        Self::FqCodel,
        Self::Codel,
        Self::Pie,
        Self::Red,
        Self::Choke,
        Self::Sfb,
        Self::Cbq,
        Self::Hfsc,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Generic => "qdisc",
            Self::Fq => "fq",
            Self::FqCodel => "fq_codel",
            Self::Codel => "codel",
            Self::Pie => "pie",
            Self::Red => "red",
            Self::Choke => "choke",
            Self::Sfb => "sfb",
            Self::Cbq => "cbq",
            Self::Hfsc => "hfsc",
        }
    }

    /// Every metric family this decoder can produce.
    pub fn descriptors(self) -> &'static [&'static MetricDescriptor] {
        match self {
            Self::Generic => base::QDISC,
            Self::Fq => fq::FQ,
            Self::FqCodel => fq::FQ_CODEL,
            Self::Codel => fq::CODEL,
            Self::Pie => fq::PIE,
            Self::Red => red::RED,
            Self::Choke => red::CHOKE,
            Self::Sfb => red::SFB,
            Self::Cbq => classful::CBQ,
            Self::Hfsc => classful::HFSC,
        }
    }

    pub fn decode(self, qdisc: &QdiscObject, ctx: &DeviceContext) -> Vec<Sample> {
        let labels = || ctx.base_labels(&qdisc.kind, qdisc.handle_str(), qdisc.parent_str());

        match (self, &qdisc.xstats) {
            (Self::Generic, _) => match &qdisc.stats {
                Some(stats) => base::qdisc(stats, labels()),
                None => Vec::new(),
            },
            (Self::Fq, Some(QdiscXstats::Fq(stats))) => fq::fq(stats, labels()),
            (Self::FqCodel, Some(QdiscXstats::FqCodel(stats))) => fq::fq_codel(stats, labels()),
            (Self::Codel, Some(QdiscXstats::Codel(stats))) => fq::codel(stats, labels()),
            (Self::Pie, Some(QdiscXstats::Pie(stats))) => fq::pie(stats, labels()),
            (Self::Red, Some(QdiscXstats::Red(stats))) => red::red(stats, labels()),
            (Self::Choke, Some(QdiscXstats::Choke(stats))) => red::choke(stats, labels()),
            (Self::Sfb, Some(QdiscXstats::Sfb(stats))) => red::sfb(stats, labels()),
            (Self::Cbq, Some(QdiscXstats::Cbq(stats))) => classful::cbq(stats, labels()),
            (Self::Hfsc, Some(QdiscXstats::Hfsc(stats))) => classful::hfsc(stats, labels()),
            _ => Vec::new(),
        }
    }
}

/// Decoders for traffic classes. Class samples carry the leaf qdisc handle as an extra label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassDecoder {
    /// Base statistics of every class, regardless of kind.
    Generic,
    Htb,
    Sfq,
    Cbq,
    Hfsc,
}

impl ClassDecoder {
    pub const ALL: [Self; 5] = [Self::Generic, Self::Htb, Self::Sfq, Self::Cbq, Self::Hfsc];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Generic => "class",
            Self::Htb => "htb",
            Self::Sfq => "sfq",
            Self::Cbq => "cbq",
            Self::Hfsc => "hfsc",
        }
    }

    pub fn descriptors(self) -> &'static [&'static MetricDescriptor] {
        match self {
            Self::Generic => base::CLASS,
            Self::Htb => classful::HTB,
            Self::Sfq => classful::SFQ,
            Self::Cbq => classful::CBQ_CLASS,
            Self::Hfsc => classful::HFSC_CLASS,
        }
    }

    pub fn decode(self, class: &ClassObject, ctx: &DeviceContext) -> Vec<Sample> {
        let labels = || class_labels(class, ctx);

        match (self, &class.xstats) {
            (Self::Generic, _) => match &class.stats {
                Some(stats) => base::class(stats, labels()),
                None => Vec::new(),
            },
            (Self::Htb, Some(ClassXstats::Htb(stats))) => classful::htb(stats, labels()),
            (Self::Sfq, Some(ClassXstats::Sfq(stats))) => classful::sfq(stats, labels()),
            (Self::Cbq, Some(ClassXstats::Cbq(stats))) => classful::cbq_class(stats, labels()),
            (Self::Hfsc, Some(ClassXstats::Hfsc(stats))) => classful::hfsc_class(stats, labels()),
            _ => Vec::new(),
        }
    }
}

/// The [`CLASS_LABELS`](crate::sample::CLASS_LABELS) values of a class.
pub(crate) fn class_labels(class: &ClassObject, ctx: &DeviceContext) -> Vec<String> {
    let mut labels = ctx.base_labels(&class.kind, class.handle_str(), class.parent_str());
    labels.push(class.leaf_str());
    labels
}

/// Decoders for filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterDecoder {
    /// One info sample per filter, whatever its kind.
    Generic,
}

impl FilterDecoder {
    pub const ALL: [Self; 1] = [Self::Generic];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Generic => "filter",
        }
    }

    pub fn descriptors(self) -> &'static [&'static MetricDescriptor] {
        match self {
            Self::Generic => filter::FILTER,
        }
    }

    pub fn decode(self, object: &FilterObject, ctx: &DeviceContext) -> Vec<Sample> {
        match self {
            Self::Generic => filter::filter(object, ctx),
        }
    }
}
