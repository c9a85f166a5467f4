use tcx_netlink::FilterObject;

use super::SampleSet;
use crate::sample::{DeviceContext, Sample};

descriptors! {
    FILTER: Filter {
        FILTER_INFO: gauge("filter_info", "Filters attached to a qdisc or class, always 1."),
    }
}

pub(super) fn filter(filter: &FilterObject, ctx: &DeviceContext) -> Vec<Sample> {
    let mut labels = ctx.base_labels(&filter.kind, filter.handle_str(), filter.parent_str());
    labels.push(filter.priority.to_string());
    labels.push(filter.protocol_str());

    let mut set = SampleSet::new(labels);
    set.push(&FILTER_INFO, 1.0);
    set.into_samples()
}
