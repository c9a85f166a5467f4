use std::{
    collections::HashMap,
    io,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use tcx_collector::{Sample, Scraper, SubCollector};
use tcx_common::handle::ROOT;
use tcx_netlink::{
    object::Nla,
    xstats::{ServiceCurve, TCA_HFSC_FSC, TCA_HFSC_RSC},
    BaseStats, Category, Device, Error, NetworkNamespace, Result, TcBackend, TcObject,
};

mod scrape;

/// The contents of one namespace of the [`FakeBackend`].
#[derive(Debug, Default)]
struct FakeNamespace {
    devices: Vec<Device>,
    objects: Vec<(Category, TcObject)>,
    /// Dumps for these device indexes fail.
    failing: Vec<u32>,
    /// Dumps sleep this long before answering.
    delay: Option<Duration>,
    /// Number of link listings that fail before listings succeed.
    link_failures: AtomicUsize,
    /// Dumps fail as if the namespace had been deleted.
    vanished: bool,
}

impl FakeNamespace {
    fn with_device(mut self, index: u32, name: &str) -> Self {
        self.devices.push(Device::new(index, name));
        self
    }

    fn with_object(mut self, category: Category, object: TcObject) -> Self {
        self.objects.push((category, object));
        self
    }

    fn failing(mut self, index: u32) -> Self {
        self.failing.push(index);
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn with_link_failures(self, count: usize) -> Self {
        self.link_failures.store(count, Ordering::SeqCst);
        self
    }

    fn vanished(mut self) -> Self {
        self.vanished = true;
        self
    }
}

/// An in-memory backend keyed by namespace name.
#[derive(Debug, Default)]
struct FakeBackend {
    namespaces: HashMap<String, FakeNamespace>,
    link_calls: AtomicUsize,
}

impl FakeBackend {
    fn with_namespace(mut self, name: &str, ns: FakeNamespace) -> Self {
        self.namespaces.insert(name.to_string(), ns);
        self
    }

    fn namespace(&self, ns: &NetworkNamespace) -> Result<&FakeNamespace> {
        self.namespaces.get(ns.name()).ok_or_else(|| not_found(ns))
    }
}

#[async_trait]
impl TcBackend for FakeBackend {
    async fn links(&self, ns: &NetworkNamespace) -> Result<Vec<Device>> {
        self.link_calls.fetch_add(1, Ordering::SeqCst);
        let fake = self.namespace(ns)?;

        let failures = fake.link_failures.load(Ordering::SeqCst);
        if failures > 0 {
            fake.link_failures.store(failures - 1, Ordering::SeqCst);
            return Err(Error::Thread(ns.name().to_string()));
        }

        Ok(fake.devices.clone())
    }

    async fn dump(
        &self,
        ns: &NetworkNamespace,
        category: Category,
        index: u32,
        parent: u32,
    ) -> Result<Vec<TcObject>> {
        let fake = self.namespace(ns)?;
        if fake.vanished {
            return Err(not_found(ns));
        }

        if let Some(delay) = fake.delay {
            tokio::time::sleep(delay).await;
        }

        if fake.failing.contains(&index) {
            return Err(Error::Io(io::Error::other("dump failed")));
        }

        // Like a qdisc dump, report the objects of every device. Filter dumps only cover the
        // block of `parent`, where 0 is the root qdisc.
        let parent = match parent {
            0 => fake
                .objects
                .iter()
                .find(|(c, o)| *c == Category::Qdisc && o.index == index && o.parent == ROOT)
                .map_or(0, |(_, root)| root.handle),
            parent => parent,
        };
        Ok(fake
            .objects
            .iter()
            .filter(|(c, _)| *c == category)
            .filter(|(c, o)| *c != Category::Filter || o.parent == parent)
            .map(|(_, object)| object.clone())
            .collect())
    }
}

fn not_found(ns: &NetworkNamespace) -> Error {
    Error::Namespace {
        name: ns.name().to_string(),
        path: NetworkNamespace::path(ns.name()),
        source: io::Error::from(io::ErrorKind::NotFound),
    }
}

/// A `tc_fq_qd_stats` payload as an old kernel reports it.
fn fq_payload(gc_flows: u64, flows: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&gc_flows.to_ne_bytes());
    for _ in 0..6 {
        buf.extend_from_slice(&0u64.to_ne_bytes());
    }
    buf.extend_from_slice(&0i64.to_ne_bytes());
    buf.extend_from_slice(&flows.to_ne_bytes());
    for _ in 0..3 {
        buf.extend_from_slice(&0u32.to_ne_bytes());
    }
    buf
}

fn fq_qdisc(index: u32, gc_flows: u64, flows: u32) -> TcObject {
    TcObject::new(index, "fq", 0x0001_0000, 0xFFFF_FFFF).with_xstats(fq_payload(gc_flows, flows))
}

fn hfsc_class(index: u32, minor: u16) -> TcObject {
    let rsc = ServiceCurve { m1: 1_000_000, d: 10_000, m2: 500_000 };
    let fsc = ServiceCurve { m1: 0, d: 0, m2: 1_000_000 };

    TcObject::new(index, "hfsc", 0x0001_0000 | u32::from(minor), 0x0001_0001)
        .with_stats(BaseStats { bytes: 100, packets: 1, ..Default::default() })
        .with_option(Nla::new(TCA_HFSC_RSC, rsc.to_bytes()))
        .with_option(Nla::new(TCA_HFSC_FSC, fsc.to_bytes()))
}

fn named<'a>(samples: &'a [Sample], name: &str) -> Vec<&'a Sample> {
    samples.iter().filter(|s| s.name() == name).collect()
}

/// A scraper over every device of the given namespaces.
fn scraper(backend: FakeBackend, namespaces: &[&str]) -> Scraper<FakeBackend> {
    namespaces.iter().fold(Scraper::new(backend, "test-host"), |scraper, name| {
        scraper.with_namespace(NetworkNamespace::from_name(*name), Vec::new())
    })
}

fn only(collector: SubCollector) -> [SubCollector; 1] {
    [collector]
}
