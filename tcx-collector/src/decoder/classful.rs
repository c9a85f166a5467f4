//! Classful schedulers: cbq and hfsc report both qdisc and class statistics, htb and sfq report
//! class statistics only.
//!
//! Class families are prefixed with `class_` where the kind also has qdisc families, since the
//! two carry different label sets.

use tcx_netlink::xstats::{CbqStats, HfscStats, HtbStats, SfqStats};

use super::SampleSet;
use crate::sample::Sample;

descriptors! {
    CBQ: Base {
        CBQ_BORROWS: counter("cbq_borrows", "Times the qdisc borrowed bandwidth."),
        CBQ_OVERACTIONS: counter("cbq_overactions", "Times the overlimit action ran."),
        CBQ_AVGIDLE: gauge("cbq_avgidle", "Average idle time."),
        CBQ_UNDERTIME: gauge("cbq_undertime", "Time until the qdisc may send again."),
    }
}

descriptors! {
    HFSC: Base {
        HFSC_LEVEL: gauge("hfsc_level", "Level in the class hierarchy."),
        HFSC_PERIOD: counter("hfsc_period", "Current period."),
        HFSC_RTWORK: counter("hfsc_rtwork", "Work done under the real-time criterion in bytes."),
        HFSC_WORK: counter("hfsc_work", "Total work done in bytes."),
    }
}

descriptors! {
    CBQ_CLASS: Class {
        CBQ_CLASS_BORROWS: counter("class_cbq_borrows", "Times the class borrowed bandwidth."),
        CBQ_CLASS_OVERACTIONS: counter("class_cbq_overactions", "Times the overlimit action ran."),
        CBQ_CLASS_AVGIDLE: gauge("class_cbq_avgidle", "Average idle time."),
        CBQ_CLASS_UNDERTIME: gauge("class_cbq_undertime", "Time until the class may send again."),
    }
}

descriptors! {
    HFSC_CLASS: Class {
        HFSC_CLASS_LEVEL: gauge("class_hfsc_level", "Level of the class in the hierarchy."),
        HFSC_CLASS_PERIOD: counter("class_hfsc_period", "Current period of the class."),
        HFSC_CLASS_RTWORK: counter("class_hfsc_rtwork", "Work done under the real-time criterion in bytes."),
        HFSC_CLASS_WORK: counter("class_hfsc_work", "Total work done by the class in bytes."),
    }
}

descriptors! {
    HTB: Class {
        HTB_LENDS: counter("htb_lends", "Times the class lent bandwidth."),
        HTB_BORROWS: counter("htb_borrows", "Times the class borrowed bandwidth."),
        HTB_GIANTS: counter("htb_giants", "Packets larger than the class MTU."),
        HTB_TOKENS: gauge("htb_tokens", "Tokens available for the rate."),
        HTB_CTOKENS: gauge("htb_ctokens", "Tokens available for the ceil rate."),
    }
}

descriptors! {
    SFQ: Class {
        SFQ_ALLOT: gauge("sfq_allot", "Bytes the flow may still send in the current round."),
    }
}

pub(super) fn cbq(stats: &CbqStats, labels: Vec<String>) -> Vec<Sample> {
    let mut set = SampleSet::new(labels);
    set.push(&CBQ_BORROWS, stats.borrows as f64);
    set.push(&CBQ_OVERACTIONS, stats.overactions as f64);
    set.push(&CBQ_AVGIDLE, stats.avgidle as f64);
    set.push(&CBQ_UNDERTIME, stats.undertime as f64);
    set.into_samples()
}

pub(super) fn hfsc(stats: &HfscStats, labels: Vec<String>) -> Vec<Sample> {
    let mut set = SampleSet::new(labels);
    set.push(&HFSC_LEVEL, stats.level as f64);
    set.push(&HFSC_PERIOD, stats.period as f64);
    set.push(&HFSC_RTWORK, stats.rtwork as f64);
    set.push(&HFSC_WORK, stats.work as f64);
    set.into_samples()
}

pub(super) fn cbq_class(stats: &CbqStats, labels: Vec<String>) -> Vec<Sample> {
    let mut set = SampleSet::new(labels);
    set.push(&CBQ_CLASS_BORROWS, stats.borrows as f64);
    set.push(&CBQ_CLASS_OVERACTIONS, stats.overactions as f64);
    set.push(&CBQ_CLASS_AVGIDLE, stats.avgidle as f64);
    set.push(&CBQ_CLASS_UNDERTIME, stats.undertime as f64);
    set.into_samples()
}

pub(super) fn hfsc_class(stats: &HfscStats, labels: Vec<String>) -> Vec<Sample> {
    let mut set = SampleSet::new(labels);
    set.push(&HFSC_CLASS_LEVEL, stats.level as f64);
    set.push(&HFSC_CLASS_PERIOD, stats.period as f64);
    set.push(&HFSC_CLASS_RTWORK, stats.rtwork as f64);
    set.push(&HFSC_CLASS_WORK, stats.work as f64);
    set.into_samples()
}

pub(super) fn htb(stats: &HtbStats, labels: Vec<String>) -> Vec<Sample> {
    let mut set = SampleSet::new(labels);
    set.push(&HTB_LENDS, stats.lends as f64);
    set.push(&HTB_BORROWS, stats.borrows as f64);
    set.push(&HTB_GIANTS, stats.giants as f64);
    set.push(&HTB_TOKENS, stats.tokens as f64);
    set.push(&HTB_CTOKENS, stats.ctokens as f64);
    set.into_samples()
}

pub(super) fn sfq(stats: &SfqStats, labels: Vec<String>) -> Vec<Sample> {
    let mut set = SampleSet::new(labels);
    set.push(&SFQ_ALLOT, stats.allot as f64);
    set.into_samples()
}
