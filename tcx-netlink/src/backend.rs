//! Sources of traffic control objects.
//!
//! [`TcBackend`] is the seam between the collectors and the kernel. [`RtnetlinkBackend`] talks
//! to the kernel through a fresh rtnetlink socket per call, bound to the requested namespace.

use async_trait::async_trait;
use futures::{StreamExt as _, TryStreamExt as _};
use rtnetlink::packet_core::{
    DefaultNla, Emitable, NetlinkMessage, NetlinkPayload, Nla as _, NlasIterator, NLM_F_DUMP,
    NLM_F_REQUEST,
};
use rtnetlink::packet_route::{
    link::{LinkAttribute, LinkMessage},
    tc::{TcAttribute, TcHandle, TcMessage, TcOption, TcStats, TcStats2},
    RouteNetlinkMessage,
};
use tcx_common::handle;

use crate::{
    error::{Error, Result},
    namespace::NetworkNamespace,
    object::{BaseStats, Category, Device, Nla, TcObject},
};

/// A source of devices and traffic control objects, per network namespace.
#[async_trait]
pub trait TcBackend: Send + Sync + 'static {
    /// List every link in the namespace.
    async fn links(&self, ns: &NetworkNamespace) -> Result<Vec<Device>>;

    /// Dump every object of `category` the kernel reports for the device with the given index.
    ///
    /// Filter dumps only cover the block of `parent`, a qdisc or class handle. A `parent` of 0
    /// selects the root qdisc. Qdisc and class dumps ignore `parent`.
    ///
    /// The result is not guaranteed to be scoped to `index`, callers must filter it.
    async fn dump(
        &self,
        ns: &NetworkNamespace,
        category: Category,
        index: u32,
        parent: u32,
    ) -> Result<Vec<TcObject>>;
}

/// A [`TcBackend`] backed by rtnetlink dump requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct RtnetlinkBackend;

impl RtnetlinkBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TcBackend for RtnetlinkBackend {
    async fn links(&self, ns: &NetworkNamespace) -> Result<Vec<Device>> {
        ns.with_socket(|socket| {
            Box::pin(async move {
                let links: Vec<LinkMessage> =
                    socket.handle().link().get().execute().try_collect().await?;

                Ok::<_, Error>(links.into_iter().map(Device::from).collect())
            })
        })
        .await
    }

    async fn dump(
        &self,
        ns: &NetworkNamespace,
        category: Category,
        index: u32,
        parent: u32,
    ) -> Result<Vec<TcObject>> {
        ns.with_socket(move |socket| {
            Box::pin(async move {
                let request = dump_request(category, index, parent);

                let mut objects = Vec::new();
                let mut res = socket.handle_mut().request(request)?;
                while let Some(msg) = res.next().await {
                    match msg.payload {
                        NetlinkPayload::InnerMessage(
                            RouteNetlinkMessage::NewQueueDiscipline(tc)
                            | RouteNetlinkMessage::NewTrafficClass(tc)
                            | RouteNetlinkMessage::NewTrafficFilter(tc),
                        ) => objects.push(TcObject::from(tc)),
                        NetlinkPayload::Error(e) => {
                            let category = category.as_str();
                            tracing::debug!(?e, category, index, parent, "dump failed");
                            return Err(Error::from(rtnetlink::Error::NetlinkError(e)));
                        }
                        _ => {}
                    }
                }

                Ok::<_, Error>(objects)
            })
        })
        .await
    }
}

/// Build a `RTM_GET*` dump request for the given category, scoped to a device. Filter requests
/// are also scoped to the block of `parent`.
fn dump_request(
    category: Category,
    index: u32,
    parent: u32,
) -> NetlinkMessage<RouteNetlinkMessage> {
    let mut tc = TcMessage::with_index(index as i32);

    let inner = match category {
        Category::Qdisc => RouteNetlinkMessage::GetQueueDiscipline(tc),
        Category::Class => RouteNetlinkMessage::GetTrafficClass(tc),
        Category::Filter => {
            tc.header.parent = TcHandle::from(parent);
            RouteNetlinkMessage::GetTrafficFilter(tc)
        }
    };

    let mut req = NetlinkMessage::from(inner);
    req.header.flags = NLM_F_REQUEST | NLM_F_DUMP;
    req
}

fn packed(h: TcHandle) -> u32 {
    handle::encode(h.major, h.minor)
}

impl From<TcMessage> for TcObject {
    fn from(msg: TcMessage) -> Self {
        let mut object = TcObject::new(
            msg.header.index as u32,
            String::new(),
            packed(msg.header.handle),
            packed(msg.header.parent),
        )
        .with_info(msg.header.info);

        let mut legacy: Option<TcStats> = None;
        let mut stats2: Option<BaseStats> = None;
        let mut app: Option<Vec<u8>> = None;

        for attr in msg.attributes {
            match attr {
                TcAttribute::Kind(kind) => object.kind = kind,
                TcAttribute::Stats(stats) => legacy = Some(stats),
                TcAttribute::Stats2(nested) => {
                    let base = stats2.get_or_insert_with(BaseStats::default);
                    for stat in nested {
                        match stat {
                            TcStats2::Basic(basic) => {
                                base.bytes = basic.bytes;
                                base.packets = basic.packets as u64;
                            }
                            TcStats2::Queue(queue) => {
                                base.qlen = queue.qlen as u64;
                                base.backlog = queue.backlog as u64;
                                base.drops = queue.drops as u64;
                                base.requeues = queue.requeues as u64;
                                base.overlimits = queue.overlimits as u64;
                            }
                            TcStats2::App(xstats) => {
                                let mut buf = vec![0u8; xstats.buffer_len()];
                                xstats.emit(&mut buf);
                                app = Some(buf);
                            }
                            _ => {}
                        }
                    }
                }
                TcAttribute::Xstats(xstats) => {
                    let mut buf = vec![0u8; xstats.buffer_len()];
                    xstats.emit(&mut buf);
                    object.xstats = Some(buf);
                }
                TcAttribute::Options(options) => {
                    let raw: Vec<Nla> = options
                        .iter()
                        .filter_map(|opt| match opt {
                            TcOption::Other(nla) => Some(raw_nla(nla)),
                            _ => None,
                        })
                        .collect();
                    object.options.extend(unnest_options(raw, options.len()));
                }
                _ => {}
            }
        }

        // TCA_STATS2/TCA_STATS_APP carries the same payload as TCA_XSTATS.
        if object.xstats.is_none() {
            object.xstats = app;
        }

        object.stats = match (stats2, legacy) {
            (Some(mut base), legacy) => {
                if let Some(legacy) = legacy {
                    base.bps = legacy.bps as u64;
                    base.pps = legacy.pps as u64;
                }
                Some(base)
            }
            (None, Some(legacy)) => Some(BaseStats {
                bytes: legacy.bytes,
                packets: legacy.packets as u64,
                drops: legacy.drops as u64,
                overlimits: legacy.overlimits as u64,
                requeues: 0,
                qlen: legacy.qlen as u64,
                backlog: legacy.backlog as u64,
                bps: legacy.bps as u64,
                pps: legacy.pps as u64,
            }),
            (None, None) => None,
        };

        object
    }
}

fn raw_nla(nla: &DefaultNla) -> Nla {
    let mut value = vec![0u8; nla.value_len()];
    nla.emit_value(&mut value);
    Nla::new(nla.kind(), value)
}

/// `TCA_OPTIONS`, the attribute nesting the kind-specific options.
const TCA_OPTIONS: u16 = 2;

/// For kinds `netlink-packet-route` has no option parser for (e.g. `hfsc`), the whole
/// `TCA_OPTIONS` nest arrives as the only option, of kind [`TCA_OPTIONS`]. Split it into its
/// inner attributes. Anything else, or a value that does not parse as a nest, is kept as is.
fn unnest_options(raw: Vec<Nla>, total: usize) -> Vec<Nla> {
    let [nla] = raw.as_slice() else {
        return raw;
    };
    if total != 1 || nla.kind != TCA_OPTIONS {
        return raw;
    }

    let inner: std::result::Result<Vec<Nla>, _> = NlasIterator::new(nla.value.as_slice())
        .map(|buf| buf.map(|buf| Nla::new(buf.kind(), buf.value().to_vec())))
        .collect();

    inner.unwrap_or(raw)
}

impl From<LinkMessage> for Device {
    fn from(msg: LinkMessage) -> Self {
        let mut device = Device::new(msg.header.index, String::new());

        for attr in msg.attributes {
            match attr {
                LinkAttribute::IfName(name) => device.name = name,
                LinkAttribute::Address(addr) => device = device.with_hwaddr(&addr),
                _ => {}
            }
        }

        device
    }
}
