//! Prometheus text exposition of a registry snapshot.
//!
//! Emits `# HELP` / `# TYPE` headers and one sample line per metric;
//! histograms expand to cumulative `_bucket{le="..."}` lines plus `_sum` and
//! `_count`. Gauges that were never set are absent from the snapshot and
//! so are omitted.

use std::fmt::Write;

use crate::registry::{MetricValue, RegistrySnapshot};

/// Content type expected by Prometheus scrapers.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

/// Render `snapshot` in the Prometheus text format.
pub fn render(snapshot: &RegistrySnapshot) -> String {
    let mut output = String::new();

    for sample in &snapshot.metrics {
        let name = &sample.name;
        if !sample.help.is_empty() {
            let _ = writeln!(output, "# HELP {name} {}", escape_help(&sample.help));
        }
        let _ = writeln!(output, "# TYPE {name} {}", sample.value.kind());

        match &sample.value {
            MetricValue::Gauge { value } => {
                let _ = writeln!(output, "{name} {}", format_float(*value));
            }
            MetricValue::Counter { value } => {
                let _ = writeln!(output, "{name} {value}");
            }
            MetricValue::Histogram {
                buckets,
                counts,
                sum,
                count,
            } => {
                for (bound, cumulative) in buckets.iter().zip(counts) {
                    let _ = writeln!(
                        output,
                        "{name}_bucket{{le=\"{}\"}} {cumulative}",
                        format_float(*bound)
                    );
                }
                let _ = writeln!(output, "{name}_bucket{{le=\"+Inf\"}} {count}");
                let _ = writeln!(output, "{name}_sum {}", format_float(*sum));
                let _ = writeln!(output, "{name}_count {count}");
            }
        }
    }

    output
}
