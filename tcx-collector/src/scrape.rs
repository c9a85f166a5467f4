//! The scrape orchestrator.
//!
//! A scrape fans out one unit per (namespace, device, sub-collector), waits for all of them and
//! returns the union of their samples plus a single `scrape_duration_seconds` sample. A failing
//! unit is logged and contributes nothing, its siblings are unaffected.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::{Mutex, RwLock};
use tcx_common::JoinMap;
use tcx_netlink::{Device, NetworkNamespace, ObjectFetcher, TcBackend};
use tracing::Instrument as _;

use crate::{
    curve::ServiceCurveAggregator,
    decoder::{ClassDecoder, FilterDecoder, QdiscDecoder},
    error::{UnitError, UnknownCollector},
    registry::MetricRegistry,
    sample::{DeviceContext, MetricDescriptor, Sample},
};

descriptors! {
    DURATION: Host {
        SCRAPE_DURATION: gauge("scrape_duration_seconds", "Duration of the last scrape in seconds."),
    }
}

/// A group of decoders that run together on one device, sharing one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubCollector {
    /// Every qdisc decoder.
    Qdisc,
    /// Every class decoder.
    Class,
    /// Every filter decoder.
    Filter,
    /// HFSC service curves of the classes.
    ServiceCurve,
}

impl SubCollector {
    pub const ALL: [Self; 4] = [Self::Qdisc, Self::Class, Self::Filter, Self::ServiceCurve];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Qdisc => "qdisc",
            Self::Class => "class",
            Self::Filter => "filter",
            Self::ServiceCurve => "service_curve",
        }
    }

    /// Every metric family this sub-collector can produce.
    pub fn descriptors(self) -> Vec<&'static MetricDescriptor> {
        match self {
            Self::Qdisc => QdiscDecoder::ALL.map(QdiscDecoder::descriptors).concat(),
            Self::Class => ClassDecoder::ALL.map(ClassDecoder::descriptors).concat(),
            Self::Filter => FilterDecoder::ALL.map(FilterDecoder::descriptors).concat(),
            Self::ServiceCurve => ServiceCurveAggregator::descriptors().to_vec(),
        }
    }
}

impl fmt::Display for SubCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubCollector {
    type Err = UnknownCollector;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|collector| collector.as_str() == s)
            .ok_or_else(|| UnknownCollector(s.to_string()))
    }
}

/// A namespace and the names of the devices to scrape in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceTarget {
    pub namespace: NetworkNamespace,
    /// Device names. Empty means every device of the namespace.
    pub devices: Vec<String>,
}

/// Identifies a scrape unit in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct UnitKey {
    namespace: String,
    link: String,
    collector: SubCollector,
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.link, self.collector)
    }
}

/// Collects samples from every configured namespace and device.
#[derive(Debug)]
pub struct Scraper<B> {
    host: String,
    fetcher: ObjectFetcher<B>,
    targets: Vec<NamespaceTarget>,
    collectors: Vec<SubCollector>,
    unit_timeout: Option<Duration>,
    registry: MetricRegistry,
    curves: Arc<ServiceCurveAggregator>,
    /// Device snapshot per namespace name.
    devices: RwLock<HashMap<String, Vec<Device>>>,
    /// Namespaces whose devices must be listed again before the next scrape.
    stale: Mutex<HashSet<String>>,
}

impl<B: TcBackend> Scraper<B> {
    /// Create a scraper with every sub-collector and no namespaces.
    pub fn new(backend: B, host: impl Into<String>) -> Self {
        let collectors = SubCollector::ALL.to_vec();

        Self {
            host: host.into(),
            fetcher: ObjectFetcher::new(backend),
            targets: Vec::new(),
            registry: registry_for(&collectors),
            collectors,
            unit_timeout: None,
            curves: Arc::new(ServiceCurveAggregator::new()),
            devices: RwLock::new(HashMap::new()),
            stale: Mutex::new(HashSet::new()),
        }
    }

    /// Scrape the given devices of a namespace. Namespaces are keyed by name, adding one twice
    /// replaces its device list.
    pub fn with_namespace(mut self, namespace: NetworkNamespace, devices: Vec<String>) -> Self {
        self.targets.retain(|target| target.namespace.name() != namespace.name());
        self.stale.get_mut().insert(namespace.name().to_string());
        self.targets.push(NamespaceTarget { namespace, devices });
        self
    }

    pub fn with_collectors(mut self, collectors: impl IntoIterator<Item = SubCollector>) -> Self {
        self.collectors.clear();
        for collector in collectors {
            if !self.collectors.contains(&collector) {
                self.collectors.push(collector);
            }
        }
        self.registry = registry_for(&self.collectors);
        self
    }

    /// Give up waiting for a unit after `timeout`. The scrape still returns the samples of
    /// every other unit.
    pub fn with_unit_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.unit_timeout = timeout;
        self
    }

    pub fn backend(&self) -> &B {
        self.fetcher.backend()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn targets(&self) -> &[NamespaceTarget] {
        &self.targets
    }

    pub fn collectors(&self) -> &[SubCollector] {
        &self.collectors
    }

    /// Static metadata of every family the configured sub-collectors can produce, plus the
    /// scrape duration.
    pub fn describe(&self) -> &[&'static MetricDescriptor] {
        self.registry.describe()
    }

    /// The registry of the configured sub-collectors, used to render scraped samples.
    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    /// The current device snapshot of a namespace.
    pub fn devices(&self, namespace: &str) -> Vec<Device> {
        self.devices.read().get(namespace).cloned().unwrap_or_default()
    }

    /// List the devices of every namespace again.
    pub async fn refresh_devices(&self) {
        futures::future::join_all(self.targets.iter().map(|target| self.refresh(target))).await;
    }

    async fn refresh(&self, target: &NamespaceTarget) {
        let name = target.namespace.name();

        match self.fetcher.list_devices(&target.namespace, &target.devices).await {
            Ok(devices) => {
                for link in &target.devices {
                    if !devices.iter().any(|dev| &dev.name == link) {
                        tracing::warn!(namespace = name, link, "configured device not found");
                    }
                }

                self.stale.lock().remove(name);
                self.devices.write().insert(name.to_string(), devices);
            }
            Err(err) => {
                tracing::warn!(namespace = name, ?err, "failed to list devices");

                self.stale.lock().insert(name.to_string());
                self.devices.write().remove(name);
            }
        }
    }

    /// Run one scrape.
    pub async fn collect(&self) -> Vec<Sample> {
        let start = Instant::now();

        let stale = self.stale.lock().clone();
        if !stale.is_empty() {
            let targets = self.targets.iter().filter(|t| stale.contains(t.namespace.name()));
            futures::future::join_all(targets.map(|target| self.refresh(target))).await;
        }

        let snapshot = self.devices.read().clone();

        let mut units = JoinMap::new();
        for target in &self.targets {
            let name = target.namespace.name();
            let Some(devices) = snapshot.get(name) else { continue };

            for device in devices {
                for &collector in &self.collectors {
                    let key = UnitKey {
                        namespace: name.to_string(),
                        link: device.name.clone(),
                        collector,
                    };
                    let span = tracing::debug_span!(
                        "unit",
                        namespace = name,
                        link = %device.name,
                        collector = collector.as_str()
                    );

                    let unit = Unit {
                        fetcher: self.fetcher.clone(),
                        namespace: target.namespace.clone(),
                        ctx: DeviceContext::new(self.host.clone(), name, device.clone()),
                        collector,
                        curves: Arc::clone(&self.curves),
                    };

                    units.spawn(key, unit.run(self.unit_timeout).instrument(span));
                }
            }
        }

        let total = units.len();
        let mut failed = 0;
        let mut samples = Vec::new();

        while let Some((key, outcome)) = units.join_next().await {
            match outcome {
                Ok(Ok(unit_samples)) => samples.extend(unit_samples),
                Ok(Err(err)) => {
                    failed += 1;
                    tracing::warn!(unit = %key, %err, "scrape unit failed");

                    if err.is_namespace_error() {
                        self.stale.lock().insert(key.namespace);
                    }
                }
                Err(err) => {
                    failed += 1;
                    tracing::error!(unit = %key, ?err, "scrape unit panicked");
                }
            }
        }

        let elapsed = start.elapsed();
        tracing::debug!(units = total, failed, samples = samples.len(), ?elapsed, "scrape done");

        let host = vec![self.host.clone()];
        samples.push(Sample::new(&SCRAPE_DURATION, host, elapsed.as_secs_f64()));
        samples
    }
}

fn registry_for(collectors: &[SubCollector]) -> MetricRegistry {
    let descriptors = collectors.iter().flat_map(|collector| collector.descriptors());
    MetricRegistry::new(descriptors.chain(DURATION.iter().copied()))
}

/// The work of a single (namespace, device, sub-collector) triple.
struct Unit<B> {
    fetcher: ObjectFetcher<B>,
    namespace: NetworkNamespace,
    ctx: DeviceContext,
    collector: SubCollector,
    curves: Arc<ServiceCurveAggregator>,
}

impl<B: TcBackend> Unit<B> {
    async fn run(self, timeout: Option<Duration>) -> Result<Vec<Sample>, UnitError> {
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.collect())
                .await
                .map_err(|_| UnitError::Timeout(timeout))?,
            None => self.collect().await,
        }
    }

    async fn collect(self) -> Result<Vec<Sample>, UnitError> {
        let Self { fetcher, namespace, ctx, collector, curves } = self;
        let index = ctx.device.index;

        let mut samples = Vec::new();
        match collector {
            SubCollector::Qdisc => {
                for qdisc in fetcher.fetch_qdiscs(&namespace, index).await? {
                    for decoder in QdiscDecoder::ALL {
                        samples.extend(decoder.decode(&qdisc, &ctx));
                    }
                }
            }
            SubCollector::Class => {
                for class in fetcher.fetch_classes(&namespace, index).await? {
                    for decoder in ClassDecoder::ALL {
                        samples.extend(decoder.decode(&class, &ctx));
                    }
                }
            }
            SubCollector::Filter => {
                for filter in fetcher.fetch_filters(&namespace, index).await? {
                    for decoder in FilterDecoder::ALL {
                        samples.extend(decoder.decode(&filter, &ctx));
                    }
                }
            }
            SubCollector::ServiceCurve => {
                for class in fetcher.fetch_classes(&namespace, index).await? {
                    samples.extend(curves.offer(&class, &ctx));
                }
            }
        }

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_names_round_trip() {
        for collector in SubCollector::ALL {
            assert_eq!(collector.as_str().parse::<SubCollector>(), Ok(collector));
        }
        assert_eq!("qdiscs".parse::<SubCollector>(), Err(UnknownCollector("qdiscs".to_string())));
    }

    #[test]
    fn every_collector_describes_something() {
        for collector in SubCollector::ALL {
            assert!(!collector.descriptors().is_empty(), "{collector}");
        }

        let curves = SubCollector::ServiceCurve.descriptors();
        let names: Vec<_> = curves.iter().map(|d| d.name).collect();
        assert_eq!(names, ["hfsc_curve_burst", "hfsc_curve_delay", "hfsc_curve_rate"]);
    }
}
