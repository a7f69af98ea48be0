use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Cadence, Metric, Unit};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricValue {
    Bool { value: bool },
    Number { value: f64, unit: Option<Unit> },
    Text { value: String },
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetricValue::Bool { value } => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetricValue::Text { value } => Some(value),
            _ => None,
        }
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Bool { value } => write!(f, "{value}"),
            MetricValue::Number {
                value,
                unit: Some(unit),
            } => write!(f, "{value} {}", unit.symbol()),
            MetricValue::Number { value, unit: None } => write!(f, "{value}"),
            MetricValue::Text { value } => f.write_str(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Fast,
    Slow,
    Derived,
}

impl From<Cadence> for Provenance {
    fn from(cadence: Cadence) -> Self {
        match cadence {
            Cadence::Fast => Provenance::Fast,
            Cadence::Slow => Provenance::Slow,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReading {
    pub value: MetricValue,
    pub updated_at: DateTime<Utc>,
    pub provenance: Provenance,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedState {
    pub metrics: BTreeMap<Metric, MetricReading>,
    pub generated_at: Option<DateTime<Utc>>,
}

impl NormalizedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, metric: Metric) -> Option<&MetricReading> {
        self.metrics.get(&metric)
    }

    pub fn value(&self, metric: Metric) -> Option<&MetricValue> {
        self.get(metric).map(|reading| &reading.value)
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Stores the values read by one cadence poll and recomputes the derived
    /// metrics. Values whose metric belongs to the other cadence are ignored.
    pub fn merge(
        &mut self,
        cadence: Cadence,
        values: impl IntoIterator<Item = (Metric, MetricValue)>,
        now: DateTime<Utc>,
    ) {
        for (metric, value) in values {
            if metric.cadence() != Some(cadence) {
                continue;
            }
            self.metrics.insert(
                metric,
                MetricReading {
                    value,
                    updated_at: now,
                    provenance: cadence.into(),
                },
            );
        }
        self.refresh_derived();
        self.generated_at = Some(now);
    }

    fn refresh_derived(&mut self) {
        let Some(source) = self.get(Metric::OutputSource).cloned() else {
            return;
        };
        let Some(text) = source.value.as_text() else {
            return;
        };

        let ac_power = matches!(text, "normal" | "bypass" | "booster" | "reducer");
        let derived = [
            (Metric::AcPower, ac_power),
            (Metric::OnBattery, text == "battery"),
            (Metric::OnBypass, text == "bypass"),
        ];

        for (metric, value) in derived {
            self.metrics.insert(
                metric,
                MetricReading {
                    value: MetricValue::Bool { value },
                    updated_at: source.updated_at,
                    provenance: Provenance::Derived,
                },
            );
        }
    }
}
