//! Traffic control objects as seen by the collectors.
//!
//! The backend delivers [`TcObject`]s, a flat rendition of a kernel `tcmsg` with its statistics
//! attributes. The fetcher turns them into typed [`QdiscObject`]s, [`ClassObject`]s and
//! [`FilterObject`]s, decoding the kind-specific extended statistics along the way.

use tcx_common::{format_hwaddr, handle};

use crate::xstats::{ClassXstats, QdiscXstats, ServiceCurves};

/// The category of a traffic control object, selecting the dump request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Queueing disciplines (`RTM_GETQDISC`).
    Qdisc,
    /// Traffic classes (`RTM_GETTCLASS`).
    Class,
    /// Filters (`RTM_GETTFILTER`).
    Filter,
}

impl Category {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Qdisc => "qdisc",
            Self::Class => "class",
            Self::Filter => "filter",
        }
    }
}

/// A network device in a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// The interface index.
    pub index: u32,
    /// The interface name, e.g. `eth0`.
    pub name: String,
    /// The hardware address, if the device has one.
    pub hwaddr: Option<String>,
}

impl Device {
    pub fn new(index: u32, name: impl Into<String>) -> Self {
        Self { index, name: name.into(), hwaddr: None }
    }

    /// Set the hardware address from its raw bytes.
    pub fn with_hwaddr(mut self, bytes: &[u8]) -> Self {
        self.hwaddr = (!bytes.is_empty()).then(|| format_hwaddr(bytes));
        self
    }
}

/// Generic statistics every qdisc and class reports.
///
/// Sourced from `TCA_STATS2` (`gnet_stats_basic`, `gnet_stats_queue`) when present, with the
/// legacy `TCA_STATS` (`tc_stats`) filling in the rate estimates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BaseStats {
    pub bytes: u64,
    pub packets: u64,
    pub drops: u64,
    pub overlimits: u64,
    pub requeues: u64,
    pub qlen: u64,
    pub backlog: u64,
    /// Rate estimate in bytes per second.
    pub bps: u64,
    /// Rate estimate in packets per second.
    pub pps: u64,
}

/// A raw netlink attribute, kept for kind-specific decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nla {
    pub kind: u16,
    pub value: Vec<u8>,
}

impl Nla {
    pub fn new(kind: u16, value: impl Into<Vec<u8>>) -> Self {
        Self { kind, value: value.into() }
    }
}

/// A traffic control object as delivered by a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TcObject {
    /// Index of the device the object is attached to.
    pub index: u32,
    /// The kind, e.g. `fq`, `htb`, `u32`.
    pub kind: String,
    pub handle: u32,
    pub parent: u32,
    /// The `tcm_info` word: leaf qdisc handle for classes, `prio << 16 | protocol` for filters.
    pub info: u32,
    pub stats: Option<BaseStats>,
    /// Raw `TCA_XSTATS` payload.
    pub xstats: Option<Vec<u8>>,
    /// Raw attributes nested in `TCA_OPTIONS`.
    pub options: Vec<Nla>,
}

impl TcObject {
    pub fn new(index: u32, kind: impl Into<String>, handle: u32, parent: u32) -> Self {
        Self { index, kind: kind.into(), handle, parent, ..Default::default() }
    }

    pub fn with_info(mut self, info: u32) -> Self {
        self.info = info;
        self
    }

    pub fn with_stats(mut self, stats: BaseStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn with_xstats(mut self, xstats: impl Into<Vec<u8>>) -> Self {
        self.xstats = Some(xstats.into());
        self
    }

    pub fn with_option(mut self, nla: Nla) -> Self {
        self.options.push(nla);
        self
    }
}

/// A queueing discipline attached to a device.
#[derive(Debug, Clone, PartialEq)]
pub struct QdiscObject {
    pub kind: String,
    pub handle: u32,
    pub parent: u32,
    pub stats: Option<BaseStats>,
    /// Decoded extended statistics, the variant matching `kind`.
    pub xstats: Option<QdiscXstats>,
}

impl QdiscObject {
    /// The canonical `major:minor` form of the handle.
    pub fn handle_str(&self) -> String {
        handle::format(self.handle)
    }

    pub fn parent_str(&self) -> String {
        handle::format(self.parent)
    }
}

impl From<TcObject> for QdiscObject {
    fn from(object: TcObject) -> Self {
        let xstats =
            object.xstats.as_deref().and_then(|payload| QdiscXstats::parse(&object.kind, payload));

        Self {
            kind: object.kind,
            handle: object.handle,
            parent: object.parent,
            stats: object.stats,
            xstats,
        }
    }
}

/// A traffic class of a classful qdisc.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassObject {
    pub kind: String,
    pub handle: u32,
    pub parent: u32,
    /// Handle of the qdisc attached below this class, absent for inner classes.
    pub leaf: Option<u32>,
    pub stats: Option<BaseStats>,
    pub xstats: Option<ClassXstats>,
    /// Service curves, only populated for `hfsc` classes.
    pub curves: Option<ServiceCurves>,
}

impl ClassObject {
    pub fn handle_str(&self) -> String {
        handle::format(self.handle)
    }

    pub fn parent_str(&self) -> String {
        handle::format(self.parent)
    }

    /// The leaf handle in canonical form, or an empty string for inner classes.
    pub fn leaf_str(&self) -> String {
        self.leaf.map(handle::format).unwrap_or_default()
    }
}

impl From<TcObject> for ClassObject {
    fn from(object: TcObject) -> Self {
        let xstats =
            object.xstats.as_deref().and_then(|payload| ClassXstats::parse(&object.kind, payload));
        let curves = ServiceCurves::from_options(&object.kind, &object.options);

        Self {
            kind: object.kind,
            handle: object.handle,
            parent: object.parent,
            leaf: (object.info != 0).then_some(object.info),
            stats: object.stats,
            xstats,
            curves,
        }
    }
}

/// A filter attached to a qdisc or class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterObject {
    pub kind: String,
    pub handle: u32,
    pub parent: u32,
    pub priority: u16,
    /// The ethertype matched by the filter, in host byte order.
    pub protocol: u16,
}

impl FilterObject {
    pub fn handle_str(&self) -> String {
        handle::format(self.handle)
    }

    pub fn parent_str(&self) -> String {
        handle::format(self.parent)
    }

    /// The protocol as `tc` names it, falling back to hex for anything uncommon.
    pub fn protocol_str(&self) -> String {
        match self.protocol {
            0x0003 => "all".to_string(),
            0x0800 => "ip".to_string(),
            0x0806 => "arp".to_string(),
            0x86dd => "ipv6".to_string(),
            0x8100 => "802.1q".to_string(),
            0x88a8 => "802.1ad".to_string(),
            other => format!("0x{other:04x}"),
        }
    }
}

impl From<TcObject> for FilterObject {
    fn from(object: TcObject) -> Self {
        // tcm_info = TC_H_MAKE(prio << 16, htons(protocol))
        let (priority, protocol) = handle::decode(object.info);

        Self {
            kind: object.kind,
            handle: object.handle,
            parent: object.parent,
            priority,
            protocol: u16::from_be(protocol),
        }
    }
}
