//! Kind-specific extended statistics (`TCA_XSTATS`).
//!
//! The kernel reports extended statistics as the raw bytes of a per-kind C structure from
//! `<linux/pkt_sched.h>`, in native byte order. Structures grow over time by appending fields,
//! so trailing fields added by newer kernels are optional: a payload that stops before them
//! simply yields `None` for those fields. A payload shorter than the oldest layout is rejected
//! as a whole.
//!
//! Which structure a payload holds is selected by the object's kind, see [`QdiscXstats::parse`]
//! and [`ClassXstats::parse`].

use crate::object::Nla;

/// Sequential native-endian reader over a struct payload.
#[derive(Debug)]
struct NeReader<'a> {
    buf: &'a [u8],
}

impl<'a> NeReader<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let (head, rest) = self.buf.split_first_chunk::<N>()?;
        self.buf = rest;
        Some(*head)
    }

    fn u32(&mut self) -> Option<u32> {
        self.take().map(u32::from_ne_bytes)
    }

    fn i32(&mut self) -> Option<i32> {
        self.take().map(i32::from_ne_bytes)
    }

    fn u64(&mut self) -> Option<u64> {
        self.take().map(u64::from_ne_bytes)
    }

    fn i64(&mut self) -> Option<i64> {
        self.take().map(i64::from_ne_bytes)
    }
}

/// Extended statistics of a queueing discipline, one variant per supported kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QdiscXstats {
    Fq(FqStats),
    FqCodel(FqCodelStats),
    Codel(CodelStats),
    Pie(PieStats),
    Red(RedStats),
    Choke(ChokeStats),
    Sfb(SfbStats),
    Cbq(CbqStats),
    Hfsc(HfscStats),
}

impl QdiscXstats {
    /// Decode the payload of a qdisc of the given kind. Returns `None` for kinds without
    /// extended statistics and for truncated payloads.
    pub fn parse(kind: &str, payload: &[u8]) -> Option<Self> {
        let mut r = NeReader::new(payload);

        match kind {
            "fq" => FqStats::read(&mut r).map(Self::Fq),
            "fq_codel" => FqCodelStats::read(&mut r).map(Self::FqCodel),
            "codel" => CodelStats::read(&mut r).map(Self::Codel),
            "pie" => PieStats::read(&mut r).map(Self::Pie),
            "red" => RedStats::read(&mut r).map(Self::Red),
            "choke" => ChokeStats::read(&mut r).map(Self::Choke),
            "sfb" => SfbStats::read(&mut r).map(Self::Sfb),
            "cbq" => CbqStats::read(&mut r).map(Self::Cbq),
            "hfsc" => HfscStats::read(&mut r).map(Self::Hfsc),
            _ => None,
        }
    }
}

/// Extended statistics of a traffic class, one variant per supported kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassXstats {
    Htb(HtbStats),
    Sfq(SfqStats),
    Cbq(CbqStats),
    Hfsc(HfscStats),
}

impl ClassXstats {
    pub fn parse(kind: &str, payload: &[u8]) -> Option<Self> {
        let mut r = NeReader::new(payload);

        match kind {
            "htb" => HtbStats::read(&mut r).map(Self::Htb),
            "sfq" => SfqStats::read(&mut r).map(Self::Sfq),
            "cbq" => CbqStats::read(&mut r).map(Self::Cbq),
            "hfsc" => HfscStats::read(&mut r).map(Self::Hfsc),
            _ => None,
        }
    }
}

/// The kernel's `tc_fq_qd_stats`.
///
/// ```c
/// struct tc_fq_qd_stats {
///     __u64 gc_flows;
///     __u64 highprio_packets;
///     __u64 tcp_retrans;
///     __u64 throttled;
///     __u64 flows_plimit;
///     __u64 pkts_too_long;
///     __u64 allocation_errors;
///     __s64 time_next_delayed_flow;
///     __u32 flows;
///     __u32 inactive_flows;
///     __u32 throttled_flows;
///     __u32 unthrottle_latency_ns;
///     __u64 ce_mark;          /* since 5.1 */
///     __u64 horizon_drops;    /* since 5.7 */
///     __u64 horizon_caps;
///     __u64 fastpath_packets; /* since 6.7 */
///     ...
/// };
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FqStats {
    pub gc_flows: u64,
    pub highprio_packets: u64,
    pub tcp_retrans: u64,
    pub throttled: u64,
    pub flows_plimit: u64,
    pub pkts_too_long: u64,
    pub allocation_errors: u64,
    /// Nanoseconds until the next throttled flow may send.
    pub time_next_delayed_flow: i64,
    pub flows: u32,
    pub inactive_flows: u32,
    pub throttled_flows: u32,
    pub unthrottle_latency_ns: u32,
    pub ce_mark: Option<u64>,
    pub horizon_drops: Option<u64>,
    pub horizon_caps: Option<u64>,
    pub fastpath_packets: Option<u64>,
}

impl FqStats {
    fn read(r: &mut NeReader<'_>) -> Option<Self> {
        Some(Self {
            gc_flows: r.u64()?,
            highprio_packets: r.u64()?,
            tcp_retrans: r.u64()?,
            throttled: r.u64()?,
            flows_plimit: r.u64()?,
            pkts_too_long: r.u64()?,
            allocation_errors: r.u64()?,
            time_next_delayed_flow: r.i64()?,
            flows: r.u32()?,
            inactive_flows: r.u32()?,
            throttled_flows: r.u32()?,
            unthrottle_latency_ns: r.u32()?,
            ce_mark: r.u64(),
            horizon_drops: r.u64(),
            horizon_caps: r.u64(),
            fastpath_packets: r.u64(),
        })
    }
}

/// The qdisc half of the kernel's `tc_fq_codel_xstats`.
///
/// ```c
/// struct tc_fq_codel_xstats {
///     __u32 type;  /* TCA_FQ_CODEL_XSTATS_QDISC = 0, TCA_FQ_CODEL_XSTATS_CLASS = 1 */
///     union {
///         struct tc_fq_codel_qd_stats qdisc_stats;
///         struct tc_fq_codel_cl_stats class_stats;
///     };
/// };
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FqCodelStats {
    pub maxpacket: u32,
    pub drop_overlimit: u32,
    pub ecn_mark: u32,
    pub new_flow_count: u32,
    pub new_flows_len: u32,
    pub old_flows_len: u32,
    pub ce_mark: Option<u32>,
    pub memory_usage: Option<u32>,
    pub drop_overmemory: Option<u32>,
}

impl FqCodelStats {
    const TYPE_QDISC: u32 = 0;

    fn read(r: &mut NeReader<'_>) -> Option<Self> {
        if r.u32()? != Self::TYPE_QDISC {
            return None;
        }

        Some(Self {
            maxpacket: r.u32()?,
            drop_overlimit: r.u32()?,
            ecn_mark: r.u32()?,
            new_flow_count: r.u32()?,
            new_flows_len: r.u32()?,
            old_flows_len: r.u32()?,
            ce_mark: r.u32(),
            memory_usage: r.u32(),
            drop_overmemory: r.u32(),
        })
    }
}

/// The kernel's `tc_codel_xstats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodelStats {
    pub maxpacket: u32,
    pub count: u32,
    pub lastcount: u32,
    /// Sojourn time of the last dequeued packet, in microseconds.
    pub ldelay: u32,
    pub drop_next: i32,
    pub drop_overlimit: u32,
    pub ecn_mark: u32,
    pub dropping: u32,
    pub ce_mark: Option<u32>,
}

impl CodelStats {
    fn read(r: &mut NeReader<'_>) -> Option<Self> {
        Some(Self {
            maxpacket: r.u32()?,
            count: r.u32()?,
            lastcount: r.u32()?,
            ldelay: r.u32()?,
            drop_next: r.i32()?,
            drop_overlimit: r.u32()?,
            ecn_mark: r.u32()?,
            dropping: r.u32()?,
            ce_mark: r.u32(),
        })
    }
}

/// The kernel's `tc_pie_xstats`.
///
/// ```c
/// struct tc_pie_xstats {
///     __u64 prob;
///     __u32 delay;
///     __u32 avg_dq_rate;
///     __u32 dq_rate_estimating;
///     __u32 packets_in;
///     __u32 dropped;
///     __u32 overlimit;
///     __u32 maxq;
///     __u32 ecn_mark;
/// };
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PieStats {
    pub prob: u64,
    pub delay: u32,
    pub avg_dq_rate: u32,
    pub dq_rate_estimating: u32,
    pub packets_in: u32,
    pub dropped: u32,
    pub overlimit: u32,
    pub maxq: u32,
    pub ecn_mark: u32,
}

impl PieStats {
    fn read(r: &mut NeReader<'_>) -> Option<Self> {
        Some(Self {
            prob: r.u64()?,
            delay: r.u32()?,
            avg_dq_rate: r.u32()?,
            dq_rate_estimating: r.u32()?,
            packets_in: r.u32()?,
            dropped: r.u32()?,
            overlimit: r.u32()?,
            maxq: r.u32()?,
            ecn_mark: r.u32()?,
        })
    }
}

/// The kernel's `tc_red_xstats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RedStats {
    /// Early drops.
    pub early: u32,
    /// Drops due to queue limits.
    pub pdrop: u32,
    /// Drops due to drop() calls.
    pub other: u32,
    /// Marked packets.
    pub marked: u32,
}

impl RedStats {
    fn read(r: &mut NeReader<'_>) -> Option<Self> {
        Some(Self { early: r.u32()?, pdrop: r.u32()?, other: r.u32()?, marked: r.u32()? })
    }
}

/// The kernel's `tc_choke_xstats`, a RED derivative that also counts matched flows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChokeStats {
    pub early: u32,
    pub pdrop: u32,
    pub other: u32,
    pub marked: u32,
    /// Drops due to flow match.
    pub matched: u32,
}

impl ChokeStats {
    fn read(r: &mut NeReader<'_>) -> Option<Self> {
        Some(Self {
            early: r.u32()?,
            pdrop: r.u32()?,
            other: r.u32()?,
            marked: r.u32()?,
            matched: r.u32()?,
        })
    }
}

/// The kernel's `tc_sfb_xstats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SfbStats {
    pub earlydrop: u32,
    pub penaltydrop: u32,
    pub bucketdrop: u32,
    pub queuedrop: u32,
    pub childdrop: u32,
    pub marked: u32,
    pub maxqlen: u32,
    /// Probabilities are fixed point, `SFB_MAX_PROB` (0xffff) is 100%.
    pub maxprob: u32,
    pub avgprob: u32,
}

impl SfbStats {
    fn read(r: &mut NeReader<'_>) -> Option<Self> {
        Some(Self {
            earlydrop: r.u32()?,
            penaltydrop: r.u32()?,
            bucketdrop: r.u32()?,
            queuedrop: r.u32()?,
            childdrop: r.u32()?,
            marked: r.u32()?,
            maxqlen: r.u32()?,
            maxprob: r.u32()?,
            avgprob: r.u32()?,
        })
    }
}

/// The kernel's `tc_cbq_xstats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CbqStats {
    pub borrows: u32,
    pub overactions: u32,
    pub avgidle: i32,
    pub undertime: i32,
}

impl CbqStats {
    fn read(r: &mut NeReader<'_>) -> Option<Self> {
        Some(Self {
            borrows: r.u32()?,
            overactions: r.u32()?,
            avgidle: r.i32()?,
            undertime: r.i32()?,
        })
    }
}

/// The kernel's `tc_hfsc_stats`.
///
/// ```c
/// struct tc_hfsc_stats {
///     __u64 work;    /* total work done */
///     __u64 rtwork;  /* work done by real-time criteria */
///     __u32 period;  /* current period */
///     __u32 level;   /* class level in hierarchy */
/// };
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HfscStats {
    pub work: u64,
    pub rtwork: u64,
    pub period: u32,
    pub level: u32,
}

impl HfscStats {
    fn read(r: &mut NeReader<'_>) -> Option<Self> {
        Some(Self { work: r.u64()?, rtwork: r.u64()?, period: r.u32()?, level: r.u32()? })
    }
}

/// The kernel's `tc_htb_xstats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HtbStats {
    pub lends: u32,
    pub borrows: u32,
    /// Packets larger than the class MTU.
    pub giants: u32,
    pub tokens: i32,
    pub ctokens: i32,
}

impl HtbStats {
    fn read(r: &mut NeReader<'_>) -> Option<Self> {
        Some(Self {
            lends: r.u32()?,
            borrows: r.u32()?,
            giants: r.u32()?,
            tokens: r.i32()?,
            ctokens: r.i32()?,
        })
    }
}

/// The kernel's `tc_sfq_xstats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SfqStats {
    pub allot: i32,
}

impl SfqStats {
    fn read(r: &mut NeReader<'_>) -> Option<Self> {
        Some(Self { allot: r.i32()? })
    }
}

// HFSC class TCA_OPTIONS sub-attributes (from linux/pkt_sched.h)
/// Real-time service curve.
pub const TCA_HFSC_RSC: u16 = 1;
/// Link-sharing (fair) service curve.
pub const TCA_HFSC_FSC: u16 = 2;
/// Upper-limit service curve.
pub const TCA_HFSC_USC: u16 = 3;

/// The kernel's `tc_service_curve`.
///
/// ```c
/// struct tc_service_curve {
///     __u32 m1;  /* slope of the first segment in bps */
///     __u32 d;   /* x-projection of the first segment in us */
///     __u32 m2;  /* slope of the second segment in bps */
/// };
/// ```
///
/// Exported as burst (`m1`), delay (`d`) and rate (`m2`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceCurve {
    pub m1: u32,
    pub d: u32,
    pub m2: u32,
}

impl ServiceCurve {
    /// Parse a curve from a `TCA_HFSC_*SC` attribute value.
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let mut r = NeReader::new(payload);
        Some(Self { m1: r.u32()?, d: r.u32()?, m2: r.u32()? })
    }

    pub fn to_bytes(self) -> Vec<u8> {
        let mut vec = Vec::with_capacity(12);
        vec.extend_from_slice(&self.m1.to_ne_bytes());
        vec.extend_from_slice(&self.d.to_ne_bytes());
        vec.extend_from_slice(&self.m2.to_ne_bytes());
        vec
    }
}

/// The three service curves of an HFSC class. Each is optional, the kernel only reports curves
/// that were configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceCurves {
    /// Real-time curve.
    pub rsc: Option<ServiceCurve>,
    /// Link-share curve.
    pub fsc: Option<ServiceCurve>,
    /// Upper-limit curve.
    pub usc: Option<ServiceCurve>,
}

impl ServiceCurves {
    /// Extract the curves from the `TCA_OPTIONS` attributes of an `hfsc` class. Returns `None`
    /// for other kinds, or when no curve is present.
    pub fn from_options(kind: &str, options: &[Nla]) -> Option<Self> {
        if kind != "hfsc" {
            return None;
        }

        let mut curves = Self::default();
        for nla in options {
            let slot = match nla.kind {
                TCA_HFSC_RSC => &mut curves.rsc,
                TCA_HFSC_FSC => &mut curves.fsc,
                TCA_HFSC_USC => &mut curves.usc,
                _ => continue,
            };
            *slot = ServiceCurve::parse(&nla.value);
        }

        curves.iter().next().is_some().then_some(curves)
    }

    /// Iterate over the present curves with their `tc` names.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, ServiceCurve)> {
        [("rsc", self.rsc), ("fsc", self.fsc), ("usc", self.usc)]
            .into_iter()
            .filter_map(|(name, curve)| curve.map(|c| (name, c)))
    }
}
