//! In-process metrics for authorization traffic.
//!
//! Counters and a latency histogram keyed by label sets in a `DashMap`.
//! Label sets are sorted so the same labels in any order hit one series.
//! Histogram buckets are fixed in microseconds; authorization is expected to
//! stay well under a millisecond.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn render_labels(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| format!("{k}=\"{}\"", escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Current value for an exact label set (0 if never incremented).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} counter");
        for r in self.map.iter() {
            let _ = writeln!(
                out,
                "{name}{{{}}} {}",
                render_labels(r.key()),
                r.value().load(Ordering::Relaxed)
            );
        }
    }
}

// 10us, 50us, 100us, 250us, 500us, 1ms, 5ms, 25ms
const BUCKETS_MICROS: [u64; 8] = [10, 50, 100, 250, 500, 1_000, 5_000, 25_000];

#[derive(Default)]
struct Histogram {
    count: AtomicU64,
    sum: AtomicU64,
    buckets: [AtomicU64; 8],
}

#[derive(Default)]
pub struct HistogramVec {
    map: DashMap<LabelKey, Histogram>,
}

impl HistogramVec {
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let hist = self.map.entry(label_key(labels)).or_default();
        let micros = duration.as_micros() as u64;

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum.fetch_add(micros, Ordering::Relaxed);
        // Cumulative: every bucket at or above the value.
        for (i, &le) in BUCKETS_MICROS.iter().enumerate() {
            if micros <= le {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} histogram");
        for r in self.map.iter() {
            let labels = render_labels(r.key());
            let prefix = if labels.is_empty() { String::new() } else { format!("{labels},") };
            let hist = r.value();

            for (i, le) in BUCKETS_MICROS.iter().enumerate() {
                let n = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(out, "{name}_bucket{{{prefix}le=\"{le}\"}} {n}");
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{name}_bucket{{{prefix}le=\"+Inf\"}} {count}");
            let _ = writeln!(out, "{name}_sum{{{labels}}} {}", hist.sum.load(Ordering::Relaxed));
            let _ = writeln!(out, "{name}_count{{{labels}}} {count}");
        }
    }
}

#[derive(Default)]
pub struct ApiGateMetrics {
    /// labels: router, action, outcome
    pub decisions: CounterVec,
    /// labels: result (ok / rejected)
    pub reloads: CounterVec,
    /// labels: code
    pub bad_requests: CounterVec,
    pub authorize_duration: HistogramVec,
    draining: std::sync::atomic::AtomicBool,
}

impl ApiGateMetrics {
    pub fn set_draining(&self) {
        self.draining.store(true, Ordering::Relaxed);
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Relaxed)
    }

    /// Render all series plus caller-provided gauges.
    pub fn render(&self, gauges: &[(&str, u64)]) -> String {
        let mut out = String::new();
        self.decisions.render("apigate_decisions_total", &mut out);
        self.reloads.render("apigate_reloads_total", &mut out);
        self.bad_requests.render("apigate_bad_requests_total", &mut out);
        self.authorize_duration
            .render("apigate_authorize_duration_micros", &mut out);

        let _ = writeln!(
            out,
            "# TYPE apigate_draining gauge\napigate_draining {}",
            u8::from(self.is_draining())
        );
        for (k, v) in gauges {
            let _ = writeln!(out, "# TYPE {k} gauge\n{k} {v}");
        }
        out
    }
}
