//! RED and its derivatives: red, choke and sfb.

use tcx_netlink::xstats::{ChokeStats, RedStats, SfbStats};

use super::SampleSet;
use crate::sample::Sample;

descriptors! {
    RED: Base {
        RED_EARLY: counter("red_early", "Packets dropped early."),
        RED_PDROP: counter("red_pdrop", "Packets dropped because of the hard limit."),
        RED_OTHER: counter("red_other", "Packets dropped for other reasons."),
        RED_MARKED: counter("red_marked", "Packets marked with ECN instead of being dropped."),
    }
}

descriptors! {
    CHOKE: Base {
        CHOKE_EARLY: counter("choke_early", "Packets dropped early."),
        CHOKE_PDROP: counter("choke_pdrop", "Packets dropped because of the hard limit."),
        CHOKE_OTHER: counter("choke_other", "Packets dropped for other reasons."),
        CHOKE_MARKED: counter("choke_marked", "Packets marked with ECN instead of being dropped."),
        CHOKE_MATCHED: counter("choke_matched", "Packets dropped because they matched a queued flow."),
    }
}

descriptors! {
    SFB: Base {
        SFB_EARLYDROP: counter("sfb_earlydrop", "Packets dropped early."),
        SFB_PENALTYDROP: counter("sfb_penaltydrop", "Packets of penalized flows dropped."),
        SFB_BUCKETDROP: counter("sfb_bucketdrop", "Packets dropped because a bucket was full."),
        SFB_QUEUEDROP: counter("sfb_queuedrop", "Packets dropped because the queue was full."),
        SFB_CHILDDROP: counter("sfb_childdrop", "Packets dropped by the child qdisc."),
        SFB_MARKED: counter("sfb_marked", "Packets marked with ECN instead of being dropped."),
        SFB_MAXQLEN: gauge("sfb_maxqlen", "Largest bucket length."),
        SFB_MAXPROB: gauge("sfb_maxprob", "Largest marking probability, 0xffff is 100%."),
        SFB_AVGPROB: gauge("sfb_avgprob", "Average marking probability, 0xffff is 100%."),
    }
}

pub(super) fn red(stats: &RedStats, labels: Vec<String>) -> Vec<Sample> {
    let mut set = SampleSet::new(labels);
    set.push(&RED_EARLY, stats.early as f64);
    set.push(&RED_PDROP, stats.pdrop as f64);
    set.push(&RED_OTHER, stats.other as f64);
    set.push(&RED_MARKED, stats.marked as f64);
    set.into_samples()
}

pub(super) fn choke(stats: &ChokeStats, labels: Vec<String>) -> Vec<Sample> {
    let mut set = SampleSet::new(labels);
    set.push(&CHOKE_EARLY, stats.early as f64);
    set.push(&CHOKE_PDROP, stats.pdrop as f64);
    set.push(&CHOKE_OTHER, stats.other as f64);
    set.push(&CHOKE_MARKED, stats.marked as f64);
    set.push(&CHOKE_MATCHED, stats.matched as f64);
    set.into_samples()
}

pub(super) fn sfb(stats: &SfbStats, labels: Vec<String>) -> Vec<Sample> {
    let mut set = SampleSet::new(labels);
    set.push(&SFB_EARLYDROP, stats.earlydrop as f64);
    set.push(&SFB_PENALTYDROP, stats.penaltydrop as f64);
    set.push(&SFB_BUCKETDROP, stats.bucketdrop as f64);
    set.push(&SFB_QUEUEDROP, stats.queuedrop as f64);
    set.push(&SFB_CHILDDROP, stats.childdrop as f64);
    set.push(&SFB_MARKED, stats.marked as f64);
    set.push(&SFB_MAXQLEN, stats.maxqlen as f64);
    set.push(&SFB_MAXPROB, stats.maxprob as f64);
    set.push(&SFB_AVGPROB, stats.avgprob as f64);
    set.into_samples()
}
