use std::time::{Duration, Instant};

use tcx_collector::{Sample, SubCollector};
use tcx_netlink::{BaseStats, Category, NetworkNamespace, TcObject};

use super::*;

const SCRAPE_DURATION: &str = "scrape_duration_seconds";

fn value(samples: &[Sample], name: &str) -> f64 {
    let found = named(samples, name);
    assert_eq!(found.len(), 1, "{name}: {found:?}");
    found[0].value
}

#[tokio::test(flavor = "multi_thread")]
async fn fq_qdisc_end_to_end() {
    let _ = tracing_subscriber::fmt::try_init();

    let backend = FakeBackend::default().with_namespace(
        "default",
        FakeNamespace::default()
            .with_device(7, "eth0")
            .with_object(Category::Qdisc, fq_qdisc(7, 3, 12)),
    );
    let scraper = scraper(backend, &["default"]).with_collectors(only(SubCollector::Qdisc));

    let samples = scraper.collect().await;

    assert_eq!(value(&samples, "fq_gc_flows"), 3.0);
    assert_eq!(value(&samples, "fq_flows"), 12.0);

    let gc = named(&samples, "fq_gc_flows")[0];
    assert_eq!(gc.label("host"), Some("test-host"));
    assert_eq!(gc.label("namespace"), Some("default"));
    assert_eq!(gc.label("linkindex"), Some("7"));
    assert_eq!(gc.label("link"), Some("eth0"));
    assert_eq!(gc.label("kind"), Some("fq"));
    assert_eq!(gc.label("handle"), Some("1:0"));
    assert_eq!(gc.label("parent"), Some("ffff:ffff"));

    // Fields added by newer kernels are absent from the payload.
    assert!(named(&samples, "fq_ce_mark").is_empty());
    // No base statistics were reported.
    assert!(named(&samples, "qdisc_bytes").is_empty());

    let duration = named(&samples, SCRAPE_DURATION);
    assert_eq!(duration.len(), 1);
    assert_eq!(duration[0].label("host"), Some("test-host"));

    let text = scraper.registry().encode_text(&samples).unwrap();
    assert!(text.contains("# TYPE fq_gc_flows counter"));
    assert!(text.contains("fq_flows{"));
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_units_do_not_affect_siblings() {
    let _ = tracing_subscriber::fmt::try_init();

    let backend = FakeBackend::default()
        .with_namespace(
            "edge",
            FakeNamespace::default()
                .with_device(2, "eth0")
                .with_device(3, "eth1")
                .with_object(Category::Qdisc, fq_qdisc(2, 1, 1))
                .with_object(Category::Qdisc, fq_qdisc(3, 2, 2))
                .failing(3),
        )
        .with_namespace(
            "core",
            FakeNamespace::default()
                .with_device(4, "bond0")
                .with_object(Category::Qdisc, fq_qdisc(4, 5, 5)),
        );
    let scraper = scraper(backend, &["edge", "core", "missing"])
        .with_collectors(only(SubCollector::Qdisc));

    let samples = scraper.collect().await;

    let mut links: Vec<_> =
        named(&samples, "fq_gc_flows").iter().filter_map(|s| s.label("link")).collect();
    links.sort_unstable();
    assert_eq!(links, ["bond0", "eth0"]);

    assert!(scraper.devices("missing").is_empty());
    assert_eq!(named(&samples, SCRAPE_DURATION).len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn duration_is_reported_when_everything_fails() {
    let backend = FakeBackend::default();
    let scraper = scraper(backend, &["gone", "also-gone"]);

    let samples = scraper.collect().await;

    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].name(), SCRAPE_DURATION);
    assert!(samples[0].value >= 0.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn fq_codel_classes_are_not_exported() {
    let stats = BaseStats { bytes: 1_000, packets: 10, ..Default::default() };

    let mut ns = FakeNamespace::default().with_device(2, "eth0");
    for minor in 1..=40u32 {
        let class = TcObject::new(2, "fq_codel", 0x0002_0000 | minor, 0x0002_0000)
            .with_stats(stats);
        ns = ns.with_object(Category::Class, class);
    }
    for minor in [0x10u32, 0x20, 0x30] {
        let class = TcObject::new(2, "htb", 0x0001_0000 | minor, 0x0001_0001)
            .with_stats(stats);
        ns = ns.with_object(Category::Class, class);
    }

    let backend = FakeBackend::default().with_namespace("default", ns);
    let scraper = scraper(backend, &["default"]).with_collectors(only(SubCollector::Class));

    let samples = scraper.collect().await;
    let bytes = named(&samples, "class_bytes");

    assert_eq!(bytes.len(), 3);
    assert!(bytes.iter().all(|s| s.label("kind") == Some("htb")));
    assert!(samples.iter().all(|s| s.label("kind") != Some("fq_codel")));
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_curve_expansion_matches_serial() {
    let _ = tracing_subscriber::fmt::try_init();

    let names = ["ns-a", "ns-b", "ns-c", "ns-d"];
    let backend = || {
        names.iter().fold(FakeBackend::default(), |backend, name| {
            let ns = FakeNamespace::default()
                .with_device(2, "eth0")
                .with_device(3, "eth1")
                .with_object(Category::Class, hfsc_class(2, 0x10))
                .with_object(Category::Class, hfsc_class(3, 0x20));
            backend.with_namespace(name, ns)
        })
    };

    let concurrent = scraper(backend(), &names)
        .with_collectors(only(SubCollector::ServiceCurve))
        .collect()
        .await;

    let mut serial = Vec::new();
    for name in names {
        let samples = scraper(backend(), &[name])
            .with_collectors(only(SubCollector::ServiceCurve))
            .collect()
            .await;
        serial.extend(samples.into_iter().filter(|s| s.name() != SCRAPE_DURATION));
    }

    let concurrent: Vec<_> =
        concurrent.into_iter().filter(|s| s.name() != SCRAPE_DURATION).collect();

    // Two curves per class, three samples per curve.
    assert_eq!(serial.len(), names.len() * 2 * 6);
    assert_eq!(concurrent.len(), serial.len());

    let key = |s: &Sample| (s.name(), s.labels.clone());
    let mut left: Vec<_> = concurrent.iter().map(key).collect();
    let mut right: Vec<_> = serial.iter().map(key).collect();
    left.sort();
    right.sort();
    assert_eq!(left, right);

    for sample in named(&concurrent, "hfsc_curve_rate") {
        let expected = match sample.label("curve") {
            Some("rsc") => 500_000.0,
            Some("fsc") => 1_000_000.0,
            other => panic!("unexpected curve {other:?}"),
        };
        assert_eq!(sample.value, expected);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_units_time_out() {
    let _ = tracing_subscriber::fmt::try_init();

    let backend = FakeBackend::default()
        .with_namespace(
            "slow",
            FakeNamespace::default()
                .with_device(2, "eth0")
                .with_object(Category::Qdisc, fq_qdisc(2, 1, 1))
                .with_delay(Duration::from_secs(10)),
        )
        .with_namespace(
            "fast",
            FakeNamespace::default()
                .with_device(2, "eth0")
                .with_object(Category::Qdisc, fq_qdisc(2, 9, 9)),
        );
    let scraper = scraper(backend, &["slow", "fast"])
        .with_collectors(only(SubCollector::Qdisc))
        .with_unit_timeout(Some(Duration::from_millis(100)));

    let start = Instant::now();
    let samples = scraper.collect().await;

    assert!(start.elapsed() < Duration::from_secs(5));
    let gc = named(&samples, "fq_gc_flows");
    assert_eq!(gc.len(), 1);
    assert_eq!(gc[0].label("namespace"), Some("fast"));
    assert_eq!(named(&samples, SCRAPE_DURATION).len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn devices_are_listed_again_after_a_failure() {
    let backend = FakeBackend::default().with_namespace(
        "flaky",
        FakeNamespace::default()
            .with_device(2, "eth0")
            .with_object(Category::Qdisc, fq_qdisc(2, 4, 4))
            .with_link_failures(1),
    );
    let scraper = scraper(backend, &["flaky"]).with_collectors(only(SubCollector::Qdisc));

    let first = scraper.collect().await;
    assert!(named(&first, "fq_gc_flows").is_empty());
    assert!(scraper.devices("flaky").is_empty());

    let second = scraper.collect().await;
    assert_eq!(value(&second, "fq_gc_flows"), 4.0);
    assert_eq!(scraper.devices("flaky").len(), 1);

    // The snapshot is reused once listing succeeded.
    let _ = scraper.collect().await;
    assert_eq!(scraper.backend().link_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn namespace_errors_mark_the_snapshot_stale() {
    let backend = FakeBackend::default().with_namespace(
        "deleted",
        FakeNamespace::default().with_device(2, "eth0").vanished(),
    );
    let scraper = scraper(backend, &["deleted"]).with_collectors(only(SubCollector::Qdisc));

    let samples = scraper.collect().await;
    assert_eq!(samples.len(), 1);
    assert_eq!(scraper.backend().link_calls.load(Ordering::SeqCst), 1);

    let _ = scraper.collect().await;
    assert_eq!(scraper.backend().link_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn configured_devices_limit_the_scrape() {
    let backend = FakeBackend::default().with_namespace(
        "default",
        FakeNamespace::default()
            .with_device(2, "eth0")
            .with_device(3, "eth1")
            .with_object(Category::Qdisc, fq_qdisc(2, 1, 1))
            .with_object(Category::Qdisc, fq_qdisc(3, 1, 1)),
    );
    let scraper = Scraper::new(backend, "test-host")
        .with_namespace(
            NetworkNamespace::from_name("default"),
            vec!["eth1".to_string(), "wlan0".to_string()],
        )
        .with_collectors(only(SubCollector::Qdisc));

    let samples = scraper.collect().await;

    let gc = named(&samples, "fq_gc_flows");
    assert_eq!(gc.len(), 1);
    assert_eq!(gc[0].label("link"), Some("eth1"));
}

#[test]
fn describe_lists_every_family_once() {
    let scraper = scraper(FakeBackend::default(), &["default"]);
    let described = scraper.describe();

    let names: Vec<_> = described.iter().map(|d| d.name).collect();
    let mut unique = names.clone();
    unique.sort_unstable();
    unique.dedup();

    assert_eq!(names.len(), unique.len());
    assert!(names.contains(&"fq_gc_flows"));
    assert!(names.contains(&"class_hfsc_work"));
    assert!(names.contains(&"filter_info"));
    assert!(names.contains(&"hfsc_curve_rate"));
    assert_eq!(names.last(), Some(&SCRAPE_DURATION));

    let qdisc_only =
        Scraper::new(FakeBackend::default(), "h").with_collectors(only(SubCollector::Qdisc));
    assert!(qdisc_only.describe().iter().all(|d| !d.name.starts_with("class_")));
}

#[tokio::test(flavor = "multi_thread")]
async fn filters_of_every_block_are_exported() {
    let _ = tracing_subscriber::fmt::try_init();

    let backend = FakeBackend::default().with_namespace(
        "default",
        FakeNamespace::default()
            .with_device(2, "eth0")
            .with_object(Category::Qdisc, TcObject::new(2, "htb", 0x0001_0000, ROOT))
            .with_object(Category::Qdisc, TcObject::new(2, "clsact", 0xFFFF_0000, 0xFFFF_FFF1))
            .with_object(Category::Class, TcObject::new(2, "htb", 0x0001_0010, 0x0001_0000))
            .with_object(
                Category::Filter,
                TcObject::new(2, "u32", 0x8000_0800, 0x0001_0000).with_info(0x0001_0008),
            )
            .with_object(
                Category::Filter,
                TcObject::new(2, "fw", 0x0000_0001, 0x0001_0010).with_info(0x0002_0008),
            )
            .with_object(
                Category::Filter,
                TcObject::new(2, "bpf", 0x0000_0001, 0xFFFF_FFF2).with_info(0x0003_0003),
            ),
    );
    let scraper = scraper(backend, &["default"]).with_collectors(only(SubCollector::Filter));

    let samples = scraper.collect().await;

    let mut parents: Vec<_> =
        named(&samples, "filter_info").iter().filter_map(|s| s.label("parent")).collect();
    parents.sort_unstable();
    assert_eq!(parents, ["1:0", "1:10", "ffff:fff2"]);
}
