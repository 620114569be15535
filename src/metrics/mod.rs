//! Check gauges: the exporter's only shared mutable state.
//!
//! Wraps a `prometheus::GaugeVec` registered in an explicit registry.
//! Refreshers mutate it concurrently across check ids; the scrape handler
//! reads it through `snapshot()` / `encode()`.

use prometheus::proto::MetricFamily;
use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::collections::HashMap;

use crate::advisor::{Check, CheckStatus};

pub const METRIC_NAME: &str = "aws_trusted_advisor_check";
const METRIC_HELP: &str = "AWS Trusted Advisor check result";
const LABELS: [&str; 4] = ["checkid", "name", "category", "status"];

// ── Label Tuple ─────────────────────────────────────────────────────

/// Coordinates of one exported series.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckLabels {
    pub check_id: String,
    pub name: String,
    pub category: String,
    pub status: CheckStatus,
}

impl CheckLabels {
    pub fn for_check(check: &Check, status: CheckStatus) -> Self {
        Self {
            check_id: check.id.clone(),
            name: check.name.clone(),
            category: check.category.clone(),
            status,
        }
    }

    /// Label values in the order the gauge was declared with.
    fn values(&self) -> [&str; 4] {
        [
            self.check_id.as_str(),
            self.name.as_str(),
            self.category.as_str(),
            self.status.as_str(),
        ]
    }
}

// ── Sink ────────────────────────────────────────────────────────────

/// Handle to the check gauge. Cloning shares the underlying series.
#[derive(Clone)]
pub struct CheckGauges {
    registry: Registry,
    gauge: GaugeVec,
}

impl CheckGauges {
    /// Create the gauge and register it in `registry`.
    pub fn register(registry: &Registry) -> prometheus::Result<Self> {
        let gauge = GaugeVec::new(Opts::new(METRIC_NAME, METRIC_HELP), &LABELS)?;
        registry.register(Box::new(gauge.clone()))?;
        Ok(Self {
            registry: registry.clone(),
            gauge,
        })
    }

    /// Upsert a sample, creating the series if absent.
    pub fn set(&self, labels: &CheckLabels, value: f64) {
        self.gauge.with_label_values(&labels.values()).set(value);
    }

    /// Remove the series for `labels`. Returns false if it did not exist.
    pub fn clear(&self, labels: &CheckLabels) -> bool {
        self.gauge.remove_label_values(&labels.values()).is_ok()
    }

    /// Everything the registry currently exposes.
    pub fn snapshot(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Text exposition of `snapshot()`.
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.snapshot(), &mut buffer)?;
        // The text encoder only ever writes UTF-8.
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Decoded samples of the check gauge.
    pub fn samples(&self) -> Vec<(CheckLabels, f64)> {
        let mut out = Vec::new();
        for family in self.snapshot() {
            if family.get_name() != METRIC_NAME {
                continue;
            }
            for metric in family.get_metric() {
                let label = |name: &str| {
                    metric
                        .get_label()
                        .iter()
                        .find(|pair| pair.get_name() == name)
                        .map(|pair| pair.get_value().to_string())
                        .unwrap_or_default()
                };
                let Ok(status) = label("status").parse::<CheckStatus>() else {
                    continue;
                };
                let labels = CheckLabels {
                    check_id: label("checkid"),
                    name: label("name"),
                    category: label("category"),
                    status,
                };
                out.push((labels, metric.get_gauge().get_value()));
            }
        }
        out
    }

    /// Samples belonging to one check id.
    #[cfg(test)]
    pub fn samples_for(&self, check_id: &str) -> Vec<(CheckLabels, f64)> {
        self.samples()
            .into_iter()
            .filter(|(labels, _)| labels.check_id == check_id)
            .collect()
    }

    /// Drop every series that no longer matches `listed`: its check id is
    /// gone, or its name or category differs from the listed one.
    pub fn retain_checks(&self, listed: &[Check]) -> usize {
        let current: HashMap<&str, &Check> = listed.iter().map(|c| (c.id.as_str(), c)).collect();
        self.samples()
            .into_iter()
            .filter(|(labels, _)| match current.get(labels.check_id.as_str()) {
                Some(check) => labels.name != check.name || labels.category != check.category,
                None => true,
            })
            .filter(|(labels, _)| self.clear(labels))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gauges() -> CheckGauges {
        CheckGauges::register(&Registry::new()).unwrap()
    }

    fn labels(id: &str, status: CheckStatus) -> CheckLabels {
        CheckLabels::for_check(&Check::new(id, format!("Check {}", id), "security"), status)
    }

    #[test]
    fn test_set_creates_and_overwrites() {
        let g = gauges();
        g.set(&labels("A", CheckStatus::Warning), 3.0);
        g.set(&labels("A", CheckStatus::Warning), 5.0);

        let samples = g.samples();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0], (labels("A", CheckStatus::Warning), 5.0));
    }

    #[test]
    fn test_clear_removes_only_that_tuple() {
        let g = gauges();
        g.set(&labels("A", CheckStatus::Warning), 3.0);
        g.set(&labels("B", CheckStatus::Warning), 1.0);

        assert!(g.clear(&labels("A", CheckStatus::Warning)));
        assert!(g.samples_for("A").is_empty());
        assert_eq!(g.samples_for("B").len(), 1);
    }

    #[test]
    fn test_clear_missing_is_noop() {
        let g = gauges();
        assert!(!g.clear(&labels("A", CheckStatus::Ok)));
        g.set(&labels("A", CheckStatus::Ok), 0.0);
        assert!(!g.clear(&labels("A", CheckStatus::Error)));
        assert_eq!(g.samples().len(), 1);
    }

    #[test]
    fn test_encode_text_format() {
        let g = gauges();
        let check = Check::new("A", "Check A", "cost_optimizing");
        g.set(&CheckLabels::for_check(&check, CheckStatus::Error), 3.0);

        let text = g.encode().unwrap();
        assert!(text.contains("# TYPE aws_trusted_advisor_check gauge"));
        assert!(text.contains(
            "aws_trusted_advisor_check{category=\"cost_optimizing\",checkid=\"A\",name=\"Check A\",status=\"error\"} 3"
        ));
    }

    #[test]
    fn test_retain_checks_prunes_unknown_ids() {
        let g = gauges();
        g.set(&labels("A", CheckStatus::Ok), 0.0);
        g.set(&labels("B", CheckStatus::Error), 2.0);
        g.set(&labels("C", CheckStatus::Warning), 4.0);

        let listed = vec![
            Check::new("A", "Check A", "security"),
            Check::new("C", "Check C", "security"),
        ];
        assert_eq!(g.retain_checks(&listed), 1);
        assert!(g.samples_for("B").is_empty());
        assert_eq!(g.samples().len(), 2);
    }

    #[test]
    fn test_retain_checks_prunes_renamed_and_recategorised() {
        let g = gauges();
        g.set(&labels("A", CheckStatus::Warning), 8.0);
        g.set(&labels("B", CheckStatus::Ok), 0.0);
        g.set(&labels("C", CheckStatus::Error), 1.0);

        let listed = vec![
            Check::new("A", "Renamed A", "security"),
            Check::new("B", "Check B", "fault_tolerance"),
            Check::new("C", "Check C", "security"),
        ];
        assert_eq!(g.retain_checks(&listed), 2);
        assert!(g.samples_for("A").is_empty());
        assert!(g.samples_for("B").is_empty());
        assert_eq!(g.samples_for("C").len(), 1);
    }

    #[test]
    fn test_register_twice_in_same_registry_fails() {
        let registry = Registry::new();
        CheckGauges::register(&registry).unwrap();
        assert!(CheckGauges::register(&registry).is_err());
    }
}
