use tracing::debug;

use crate::catalog::{Metric, Mib, OidSpec, Transform};
use crate::state::MetricValue;
use crate::transport::{OidResult, RawValue};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Coerced {
    Number(f64),
    Text(String),
}

pub fn normalize(mib: Mib, results: &[OidResult]) -> Vec<(Metric, MetricValue)> {
    let mut values = Vec::new();

    for result in results {
        let Some(raw) = result.raw() else {
            debug!(oid = %result.oid, error = ?result.error, "oid absent");
            continue;
        };
        let Some(spec) = mib.entry_for_oid(&result.oid) else {
            continue;
        };
        let coerced = match (spec.transform, raw) {
            (Transform::Text, RawValue::Text(text)) => {
                trimmed(text).map(|t| Coerced::Text(t.to_string()))
            }
            _ => coerce(raw),
        };
        let Some(coerced) = coerced else {
            continue;
        };
        match apply(spec, coerced) {
            Some(value) => values.push((spec.metric, value)),
            None => debug!(metric = %spec.metric, %mib, ?raw, "value rejected by transform"),
        }
    }

    values
}

pub(crate) fn coerce(raw: &RawValue) -> Option<Coerced> {
    match raw {
        RawValue::Integer(v) => Some(Coerced::Number(*v as f64)),
        RawValue::Unsigned(v) => Some(Coerced::Number(*v as f64)),
        RawValue::Timeticks(v) => Some(Coerced::Number(f64::from(*v))),
        RawValue::ObjectId(id) => Some(Coerced::Text(id.clone())),
        RawValue::IpAddress([a, b, c, d]) => Some(Coerced::Text(format!("{a}.{b}.{c}.{d}"))),
        RawValue::Text(text) => coerce_text(text),
    }
}

fn trimmed(text: &str) -> Option<&str> {
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    (!text.is_empty()).then_some(text)
}

fn coerce_text(text: &str) -> Option<Coerced> {
    let text = trimmed(text)?;

    // Agents that render enums as "onLine(2)".
    if let Some(code) = text
        .strip_suffix(')')
        .and_then(|head| head.rsplit_once('('))
        .and_then(|(_, digits)| digits.parse::<i64>().ok())
    {
        return Some(Coerced::Number(code as f64));
    }

    if let Ok(v) = text.parse::<i64>() {
        return Some(Coerced::Number(v as f64));
    }
    if is_decimal(text) {
        if let Ok(v) = text.parse::<f64>() {
            return Some(Coerced::Number(v));
        }
    }

    Some(Coerced::Text(text.to_string()))
}

fn is_decimal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let Some((whole, frac)) = digits.split_once('.') else {
        return false;
    };
    !whole.is_empty()
        && !frac.is_empty()
        && whole.chars().all(|c| c.is_ascii_digit())
        && frac.chars().all(|c| c.is_ascii_digit())
}

fn apply(spec: &OidSpec, coerced: Coerced) -> Option<MetricValue> {
    let unit = spec.metric.unit();
    match (spec.transform, coerced) {
        (Transform::Text, Coerced::Text(value)) => Some(MetricValue::Text { value }),
        (Transform::Text, Coerced::Number(n)) => Some(MetricValue::Text {
            value: format_number(n),
        }),
        (Transform::Number, Coerced::Number(value)) => Some(MetricValue::Number { value, unit }),
        (Transform::Scale(factor), Coerced::Number(n)) => Some(MetricValue::Number {
            value: round_to(n * factor, 2),
            unit,
        }),
        (Transform::TimeticksToMinutes, Coerced::Number(ticks)) => Some(MetricValue::Number {
            value: round_to(ticks / 6000.0, 1),
            unit,
        }),
        (Transform::Enum(table), Coerced::Number(n)) => {
            let code = n as i64;
            let label = table
                .iter()
                .find(|(k, _)| *k == code)
                .map(|(_, label)| *label)
                .unwrap_or("unknown");
            Some(MetricValue::Text {
                value: label.to_string(),
            })
        }
        (_, Coerced::Text(_)) => None,
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
