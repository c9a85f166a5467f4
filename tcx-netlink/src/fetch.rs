use std::{collections::HashSet, sync::Arc};

use tcx_common::handle;

use crate::{
    backend::TcBackend,
    error::Result,
    namespace::NetworkNamespace,
    object::{Category, ClassObject, Device, FilterObject, QdiscObject, TcObject},
};

/// Kind of the per-flow classes an `fq_codel` qdisc exposes below a classful parent.
///
/// Their handles are assigned per flow, so exporting them grows the label space with traffic.
/// They are dropped from every class listing.
pub const FQ_CODEL: &str = "fq_codel";

/// Fetches typed traffic control objects for one device at a time.
///
/// Every call goes through the backend with a socket of its own, which is closed before the call
/// returns. The fetcher is cheap to clone and shared by the scrape units.
#[derive(Debug)]
pub struct ObjectFetcher<B> {
    backend: Arc<B>,
}

impl<B> Clone for ObjectFetcher<B> {
    fn clone(&self) -> Self {
        Self { backend: Arc::clone(&self.backend) }
    }
}

impl<B: TcBackend> ObjectFetcher<B> {
    pub fn new(backend: B) -> Self {
        Self { backend: Arc::new(backend) }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// List the devices of a namespace, keeping only those named in `names`. An empty `names`
    /// keeps every device.
    pub async fn list_devices(
        &self,
        ns: &NetworkNamespace,
        names: &[String],
    ) -> Result<Vec<Device>> {
        let mut devices = self.backend.links(ns).await?;
        if !names.is_empty() {
            devices.retain(|dev| names.contains(&dev.name));
        }

        tracing::debug!(namespace = %ns, count = devices.len(), "listed devices");
        Ok(devices)
    }

    /// The queueing disciplines attached to the device with the given index.
    pub async fn fetch_qdiscs(
        &self,
        ns: &NetworkNamespace,
        index: u32,
    ) -> Result<Vec<QdiscObject>> {
        let objects = self.dump(ns, Category::Qdisc, index).await?;
        Ok(objects.into_iter().map(QdiscObject::from).collect())
    }

    /// The traffic classes of the device with the given index, without `fq_codel` classes.
    pub async fn fetch_classes(
        &self,
        ns: &NetworkNamespace,
        index: u32,
    ) -> Result<Vec<ClassObject>> {
        let objects = self.dump(ns, Category::Class, index).await?;

        let total = objects.len();
        let classes: Vec<_> = objects
            .into_iter()
            .filter(|object| object.kind != FQ_CODEL)
            .map(ClassObject::from)
            .collect();

        if classes.len() != total {
            let dropped = total - classes.len();
            tracing::trace!(namespace = %ns, index, dropped, "dropped fq_codel classes");
        }

        Ok(classes)
    }

    /// The filters attached to the device with the given index.
    ///
    /// A filter dump only covers one block, so every block of the device is dumped in turn: the
    /// root qdisc, each qdisc and class handle, and the ingress and egress blocks of `ingress`
    /// and `clsact` qdiscs. A filter reachable through more than one parent is reported once.
    pub async fn fetch_filters(
        &self,
        ns: &NetworkNamespace,
        index: u32,
    ) -> Result<Vec<FilterObject>> {
        let parents = self.filter_parents(ns, index).await?;

        let mut seen = HashSet::new();
        let mut filters = Vec::new();
        for parent in parents {
            for object in self.dump_filters(ns, index, parent).await? {
                let key = (object.kind.clone(), object.handle, object.parent, object.info);
                if seen.insert(key) {
                    filters.push(FilterObject::from(object));
                }
            }
        }

        tracing::trace!(namespace = %ns, index, count = filters.len(), "fetched filters");
        Ok(filters)
    }

    /// Every parent that may carry a filter block on the device, in dump order, without
    /// duplicates. Starts with 0, the root qdisc.
    async fn filter_parents(&self, ns: &NetworkNamespace, index: u32) -> Result<Vec<u32>> {
        let qdiscs = self.dump(ns, Category::Qdisc, index).await?;
        let classes = self.dump(ns, Category::Class, index).await?;

        let mut parents = vec![0];
        for qdisc in &qdiscs {
            // The filters of ingress and clsact sit on their blocks, not on the qdisc handle.
            match qdisc.kind.as_str() {
                "clsact" => parents.extend([handle::INGRESS_BLOCK, handle::EGRESS_BLOCK]),
                "ingress" => parents.push(handle::INGRESS_BLOCK),
                _ if qdisc.handle != 0 => parents.push(qdisc.handle),
                _ => {}
            }
        }
        parents.extend(
            classes.iter().filter(|class| class.kind != FQ_CODEL).map(|class| class.handle),
        );

        let mut seen = HashSet::new();
        parents.retain(|parent| seen.insert(*parent));
        Ok(parents)
    }

    /// Dump a category and keep only the objects of the requested device. Qdisc dumps ignore the
    /// index in the request and report every device of the namespace.
    async fn dump(
        &self,
        ns: &NetworkNamespace,
        category: Category,
        index: u32,
    ) -> Result<Vec<TcObject>> {
        let mut objects = self.backend.dump(ns, category, index, 0).await?;
        objects.retain(|object| object.index == index);
        Ok(objects)
    }

    async fn dump_filters(
        &self,
        ns: &NetworkNamespace,
        index: u32,
        parent: u32,
    ) -> Result<Vec<TcObject>> {
        let mut objects = self.backend.dump(ns, Category::Filter, index, parent).await?;
        objects.retain(|object| object.index == index);
        Ok(objects)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::error::Error;

    #[derive(Default)]
    struct StaticBackend {
        links: Vec<Device>,
        objects: HashMap<Category, Vec<TcObject>>,
    }

    #[async_trait]
    impl TcBackend for StaticBackend {
        async fn links(&self, _ns: &NetworkNamespace) -> Result<Vec<Device>> {
            Ok(self.links.clone())
        }

        /// Filter dumps only return the filters of the requested parent, like the kernel.
        async fn dump(
            &self,
            _ns: &NetworkNamespace,
            category: Category,
            _index: u32,
            parent: u32,
        ) -> Result<Vec<TcObject>> {
            let Some(objects) = self.objects.get(&category) else {
                return Err(Error::Thread("unreachable namespace".to_string()));
            };
            if category != Category::Filter {
                return Ok(objects.clone());
            }

            let parent = match parent {
                0 => self.objects[&Category::Qdisc]
                    .iter()
                    .find(|qdisc| qdisc.parent == handle::ROOT)
                    .map_or(0, |root| root.handle),
                parent => parent,
            };
            Ok(objects.iter().filter(|filter| filter.parent == parent).cloned().collect())
        }
    }

    #[tokio::test]
    async fn fq_codel_classes_are_always_dropped() {
        let mut classes: Vec<_> = (1..=50u16)
            .map(|minor| {
                TcObject::new(3, "fq_codel", 0x0001_0000 | u32::from(minor), 0x0001_0001)
            })
            .collect();
        classes.push(TcObject::new(3, "hfsc", 0x0001_0001, 0x0001_0000));
        classes.push(TcObject::new(3, "htb", 0x0002_0001, 0x0002_0000));

        let backend = StaticBackend {
            objects: HashMap::from([(Category::Class, classes)]),
            ..Default::default()
        };
        let fetcher = ObjectFetcher::new(backend);

        let classes = fetcher.fetch_classes(&NetworkNamespace::current(), 3).await.unwrap();
        assert_eq!(classes.len(), 2);
        assert!(classes.iter().all(|class| class.kind != FQ_CODEL));
    }

    #[tokio::test]
    async fn objects_of_other_devices_are_filtered_out() {
        let qdiscs = vec![
            TcObject::new(1, "noqueue", 0, u32::MAX),
            TcObject::new(3, "fq", 0x0001_0000, u32::MAX),
            TcObject::new(4, "fq", 0x0001_0000, u32::MAX),
        ];
        let backend = StaticBackend {
            objects: HashMap::from([(Category::Qdisc, qdiscs)]),
            ..Default::default()
        };
        let fetcher = ObjectFetcher::new(backend);

        let qdiscs = fetcher.fetch_qdiscs(&NetworkNamespace::current(), 3).await.unwrap();
        assert_eq!(qdiscs.len(), 1);
        assert_eq!(qdiscs[0].handle_str(), "1:0");

        assert!(fetcher.fetch_filters(&NetworkNamespace::current(), 3).await.is_err());
    }

    #[tokio::test]
    async fn filters_of_every_block_are_fetched_once() {
        let qdiscs = vec![
            TcObject::new(3, "htb", 0x0001_0000, handle::ROOT),
            TcObject::new(3, "fq_codel", 0x0010_0000, 0x0001_0001),
            TcObject::new(3, "clsact", 0xFFFF_0000, handle::INGRESS),
        ];
        let classes = vec![
            TcObject::new(3, "htb", 0x0001_0001, 0x0001_0000),
            TcObject::new(3, "fq_codel", 0x0010_0001, 0x0010_0000),
        ];
        let filters = vec![
            TcObject::new(3, "u32", 0x8000_0800, 0x0001_0000).with_info(0x0001_0800),
            TcObject::new(3, "fw", 0x0000_0001, 0x0001_0001).with_info(0x0002_0800),
            TcObject::new(3, "bpf", 0x0000_0001, handle::INGRESS_BLOCK).with_info(0x0001_0003),
            TcObject::new(3, "matchall", 0x0000_0001, handle::EGRESS_BLOCK).with_info(0x0001_0003),
            TcObject::new(4, "u32", 0x8000_0800, 0x0001_0000).with_info(0x0001_0800),
        ];
        let backend = StaticBackend {
            objects: HashMap::from([
                (Category::Qdisc, qdiscs),
                (Category::Class, classes),
                (Category::Filter, filters),
            ]),
            ..Default::default()
        };
        let fetcher = ObjectFetcher::new(backend);

        let filters = fetcher.fetch_filters(&NetworkNamespace::current(), 3).await.unwrap();
        let mut found: Vec<_> = filters.iter().map(|f| (f.kind.as_str(), f.parent)).collect();
        found.sort();

        assert_eq!(
            found,
            [
                ("bpf", handle::INGRESS_BLOCK),
                ("fw", 0x0001_0001),
                ("matchall", handle::EGRESS_BLOCK),
                ("u32", 0x0001_0000),
            ]
        );
    }

    #[tokio::test]
    async fn devices_are_selected_by_name() {
        let backend = StaticBackend {
            links: vec![Device::new(1, "lo"), Device::new(3, "eth0"), Device::new(4, "eth1")],
            ..Default::default()
        };
        let fetcher = ObjectFetcher::new(backend);
        let ns = NetworkNamespace::current();

        let devices = fetcher.list_devices(&ns, &["eth1".to_string()]).await.unwrap();
        assert_eq!(devices, vec![Device::new(4, "eth1")]);

        let devices = fetcher.list_devices(&ns, &[]).await.unwrap();
        assert_eq!(devices.len(), 3);
    }
}
