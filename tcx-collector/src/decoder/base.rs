//! Base statistics every qdisc and class reports.

use tcx_netlink::BaseStats;

use super::SampleSet;
use crate::sample::Sample;

descriptors! {
    QDISC: Base {
        QDISC_BYTES: counter("qdisc_bytes", "Bytes sent by the qdisc."),
        QDISC_PACKETS: counter("qdisc_packets", "Packets sent by the qdisc."),
        QDISC_DROPS: counter("qdisc_drops", "Packets dropped by the qdisc."),
        QDISC_OVERLIMITS: counter("qdisc_overlimits", "Times the qdisc went over its limit."),
        QDISC_REQUEUES: counter("qdisc_requeues", "Packets requeued by the qdisc."),
        QDISC_QLEN: gauge("qdisc_qlen", "Packets currently queued in the qdisc."),
        QDISC_BACKLOG: gauge("qdisc_backlog", "Bytes currently queued in the qdisc."),
        QDISC_BPS: gauge("qdisc_bps", "Estimated rate of the qdisc in bytes per second."),
        QDISC_PPS: gauge("qdisc_pps", "Estimated rate of the qdisc in packets per second."),
    }
}

descriptors! {
    CLASS: Class {
        CLASS_BYTES: counter("class_bytes", "Bytes sent by the class."),
        CLASS_PACKETS: counter("class_packets", "Packets sent by the class."),
        CLASS_DROPS: counter("class_drops", "Packets dropped by the class."),
        CLASS_OVERLIMITS: counter("class_overlimits", "Times the class went over its limit."),
        CLASS_REQUEUES: counter("class_requeues", "Packets requeued by the class."),
        CLASS_QLEN: gauge("class_qlen", "Packets currently queued in the class."),
        CLASS_BACKLOG: gauge("class_backlog", "Bytes currently queued in the class."),
        CLASS_BPS: gauge("class_bps", "Estimated rate of the class in bytes per second."),
        CLASS_PPS: gauge("class_pps", "Estimated rate of the class in packets per second."),
    }
}

pub(super) fn qdisc(stats: &BaseStats, labels: Vec<String>) -> Vec<Sample> {
    let mut set = SampleSet::new(labels);
    set.push(&QDISC_BYTES, stats.bytes as f64);
    set.push(&QDISC_PACKETS, stats.packets as f64);
    set.push(&QDISC_DROPS, stats.drops as f64);
    set.push(&QDISC_OVERLIMITS, stats.overlimits as f64);
    set.push(&QDISC_REQUEUES, stats.requeues as f64);
    set.push(&QDISC_QLEN, stats.qlen as f64);
    set.push(&QDISC_BACKLOG, stats.backlog as f64);
    set.push(&QDISC_BPS, stats.bps as f64);
    set.push(&QDISC_PPS, stats.pps as f64);
    set.into_samples()
}

pub(super) fn class(stats: &BaseStats, labels: Vec<String>) -> Vec<Sample> {
    let mut set = SampleSet::new(labels);
    set.push(&CLASS_BYTES, stats.bytes as f64);
    set.push(&CLASS_PACKETS, stats.packets as f64);
    set.push(&CLASS_DROPS, stats.drops as f64);
    set.push(&CLASS_OVERLIMITS, stats.overlimits as f64);
    set.push(&CLASS_REQUEUES, stats.requeues as f64);
    set.push(&CLASS_QLEN, stats.qlen as f64);
    set.push(&CLASS_BACKLOG, stats.backlog as f64);
    set.push(&CLASS_BPS, stats.bps as f64);
    set.push(&CLASS_PPS, stats.pps as f64);
    set.into_samples()
}
