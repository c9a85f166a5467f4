//! The fair queueing and AQM families: fq, fq_codel, codel and pie.

use tcx_netlink::xstats::{CodelStats, FqCodelStats, FqStats, PieStats};

use super::SampleSet;
use crate::sample::Sample;

descriptors! {
    FQ: Base {
        FQ_GC_FLOWS: counter("fq_gc_flows", "Flows garbage collected."),
        FQ_HIGHPRIO_PACKETS: counter("fq_highprio_packets", "Packets sent through the high priority band."),
        FQ_TCP_RETRANS: counter("fq_tcp_retrans", "TCP retransmissions seen."),
        FQ_THROTTLED: counter("fq_throttled", "Times a flow was throttled."),
        FQ_FLOWS_PLIMIT: counter("fq_flows_plimit", "Packets dropped by the per flow limit."),
        FQ_PKTS_TOO_LONG: counter("fq_pkts_too_long", "Packets dropped for exceeding the maximum size."),
        FQ_ALLOCATION_ERRORS: counter("fq_allocation_errors", "Flow allocation failures."),
        FQ_TIME_NEXT_DELAYED_FLOW: gauge("fq_time_next_delayed_flow", "Nanoseconds until the next throttled flow may send."),
        FQ_FLOWS: gauge("fq_flows", "Flows currently tracked."),
        FQ_INACTIVE_FLOWS: gauge("fq_inactive_flows", "Flows currently inactive."),
        FQ_THROTTLED_FLOWS: gauge("fq_throttled_flows", "Flows currently throttled."),
        FQ_UNTHROTTLE_LATENCY_NS: gauge("fq_unthrottle_latency_ns", "Average latency of unthrottling a flow in nanoseconds."),
        FQ_CE_MARK: counter("fq_ce_mark", "Packets marked with CE above the ce_threshold."),
        FQ_HORIZON_DROPS: counter("fq_horizon_drops", "Packets dropped for a timestamp beyond the horizon."),
        FQ_HORIZON_CAPS: counter("fq_horizon_caps", "Packets with a timestamp capped to the horizon."),
        FQ_FASTPATH_PACKETS: counter("fq_fastpath_packets", "Packets sent through the fast path."),
    }
}

descriptors! {
    FQ_CODEL: Base {
        FQ_CODEL_MAXPACKET: gauge("fq_codel_maxpacket", "Largest packet seen in bytes."),
        FQ_CODEL_DROP_OVERLIMIT: counter("fq_codel_drop_overlimit", "Packets dropped because the qdisc was over its limit."),
        FQ_CODEL_ECN_MARK: counter("fq_codel_ecn_mark", "Packets marked with ECN instead of being dropped."),
        FQ_CODEL_NEW_FLOW_COUNT: counter("fq_codel_new_flow_count", "Flows created."),
        FQ_CODEL_NEW_FLOWS_LEN: gauge("fq_codel_new_flows_len", "Flows currently in the new list."),
        FQ_CODEL_OLD_FLOWS_LEN: gauge("fq_codel_old_flows_len", "Flows currently in the old list."),
        FQ_CODEL_CE_MARK: counter("fq_codel_ce_mark", "Packets marked with CE above the ce_threshold."),
        FQ_CODEL_MEMORY_USAGE: gauge("fq_codel_memory_usage", "Memory used by queued packets in bytes."),
        FQ_CODEL_DROP_OVERMEMORY: counter("fq_codel_drop_overmemory", "Packets dropped because of the memory limit."),
    }
}

descriptors! {
    CODEL: Base {
        CODEL_MAXPACKET: gauge("codel_maxpacket", "Largest packet seen in bytes."),
        CODEL_COUNT: gauge("codel_count", "Drops in the current dropping state."),
        CODEL_LASTCOUNT: gauge("codel_lastcount", "Drops in the previous dropping state."),
        CODEL_LDELAY: gauge("codel_ldelay", "Sojourn time of the last dequeued packet in microseconds."),
        CODEL_DROP_NEXT: gauge("codel_drop_next", "Microseconds until the next drop."),
        CODEL_DROP_OVERLIMIT: counter("codel_drop_overlimit", "Packets dropped because the qdisc was over its limit."),
        CODEL_ECN_MARK: counter("codel_ecn_mark", "Packets marked with ECN instead of being dropped."),
        CODEL_DROPPING: gauge("codel_dropping", "Whether the qdisc is in the dropping state."),
        CODEL_CE_MARK: counter("codel_ce_mark", "Packets marked with CE above the ce_threshold."),
    }
}

descriptors! {
    PIE: Base {
        PIE_PROB: gauge("pie_prob", "Current drop probability."),
        PIE_DELAY: gauge("pie_delay", "Current queueing delay in microseconds."),
        PIE_AVG_DQ_RATE: gauge("pie_avg_dq_rate", "Average dequeue rate in bytes per second."),
        PIE_DQ_RATE_ESTIMATING: gauge("pie_dq_rate_estimating", "Whether the dequeue rate is estimated."),
        PIE_PACKETS_IN: counter("pie_packets_in", "Packets enqueued."),
        PIE_DROPPED: counter("pie_dropped", "Packets dropped by the drop probability."),
        PIE_OVERLIMIT: counter("pie_overlimit", "Packets dropped because the qdisc was over its limit."),
        PIE_MAXQ: gauge("pie_maxq", "Maximum queue length seen."),
        PIE_ECN_MARK: counter("pie_ecn_mark", "Packets marked with ECN instead of being dropped."),
    }
}

pub(super) fn fq(stats: &FqStats, labels: Vec<String>) -> Vec<Sample> {
    let mut set = SampleSet::new(labels);
    set.push(&FQ_GC_FLOWS, stats.gc_flows as f64);
    set.push(&FQ_HIGHPRIO_PACKETS, stats.highprio_packets as f64);
    set.push(&FQ_TCP_RETRANS, stats.tcp_retrans as f64);
    set.push(&FQ_THROTTLED, stats.throttled as f64);
    set.push(&FQ_FLOWS_PLIMIT, stats.flows_plimit as f64);
    set.push(&FQ_PKTS_TOO_LONG, stats.pkts_too_long as f64);
    set.push(&FQ_ALLOCATION_ERRORS, stats.allocation_errors as f64);
    set.push(&FQ_TIME_NEXT_DELAYED_FLOW, stats.time_next_delayed_flow as f64);
    set.push(&FQ_FLOWS, stats.flows as f64);
    set.push(&FQ_INACTIVE_FLOWS, stats.inactive_flows as f64);
    set.push(&FQ_THROTTLED_FLOWS, stats.throttled_flows as f64);
    set.push(&FQ_UNTHROTTLE_LATENCY_NS, stats.unthrottle_latency_ns as f64);
    set.push_opt(&FQ_CE_MARK, stats.ce_mark.map(|v| v as f64));
    set.push_opt(&FQ_HORIZON_DROPS, stats.horizon_drops.map(|v| v as f64));
    set.push_opt(&FQ_HORIZON_CAPS, stats.horizon_caps.map(|v| v as f64));
    set.push_opt(&FQ_FASTPATH_PACKETS, stats.fastpath_packets.map(|v| v as f64));
    set.into_samples()
}

pub(super) fn fq_codel(stats: &FqCodelStats, labels: Vec<String>) -> Vec<Sample> {
    let mut set = SampleSet::new(labels);
    set.push(&FQ_CODEL_MAXPACKET, stats.maxpacket as f64);
    set.push(&FQ_CODEL_DROP_OVERLIMIT, stats.drop_overlimit as f64);
    set.push(&FQ_CODEL_ECN_MARK, stats.ecn_mark as f64);
    set.push(&FQ_CODEL_NEW_FLOW_COUNT, stats.new_flow_count as f64);
    set.push(&FQ_CODEL_NEW_FLOWS_LEN, stats.new_flows_len as f64);
    set.push(&FQ_CODEL_OLD_FLOWS_LEN, stats.old_flows_len as f64);
    set.push_opt(&FQ_CODEL_CE_MARK, stats.ce_mark.map(f64::from));
    set.push_opt(&FQ_CODEL_MEMORY_USAGE, stats.memory_usage.map(f64::from));
    set.push_opt(&FQ_CODEL_DROP_OVERMEMORY, stats.drop_overmemory.map(f64::from));
    set.into_samples()
}

pub(super) fn codel(stats: &CodelStats, labels: Vec<String>) -> Vec<Sample> {
    let mut set = SampleSet::new(labels);
    set.push(&CODEL_MAXPACKET, stats.maxpacket as f64);
    set.push(&CODEL_COUNT, stats.count as f64);
    set.push(&CODEL_LASTCOUNT, stats.lastcount as f64);
    set.push(&CODEL_LDELAY, stats.ldelay as f64);
    set.push(&CODEL_DROP_NEXT, stats.drop_next as f64);
    set.push(&CODEL_DROP_OVERLIMIT, stats.drop_overlimit as f64);
    set.push(&CODEL_ECN_MARK, stats.ecn_mark as f64);
    set.push(&CODEL_DROPPING, stats.dropping as f64);
    set.push_opt(&CODEL_CE_MARK, stats.ce_mark.map(f64::from));
    set.into_samples()
}

pub(super) fn pie(stats: &PieStats, labels: Vec<String>) -> Vec<Sample> {
    let mut set = SampleSet::new(labels);
    set.push(&PIE_PROB, stats.prob as f64);
    set.push(&PIE_DELAY, stats.delay as f64);
    set.push(&PIE_AVG_DQ_RATE, stats.avg_dq_rate as f64);
    set.push(&PIE_DQ_RATE_ESTIMATING, stats.dq_rate_estimating as f64);
    set.push(&PIE_PACKETS_IN, stats.packets_in as f64);
    set.push(&PIE_DROPPED, stats.dropped as f64);
    set.push(&PIE_OVERLIMIT, stats.overlimit as f64);
    set.push(&PIE_MAXQ, stats.maxq as f64);
    set.push(&PIE_ECN_MARK, stats.ecn_mark as f64);
    set.into_samples()
}
