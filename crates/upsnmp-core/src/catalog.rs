use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mib {
    UpsMib,
    Apc,
}

impl Mib {
    pub fn as_str(self) -> &'static str {
        match self {
            Mib::UpsMib => "ups_mib",
            Mib::Apc => "apc",
        }
    }

    pub fn entries(self) -> &'static [OidSpec] {
        match self {
            Mib::UpsMib => UPS_MIB_OIDS,
            Mib::Apc => APC_OIDS,
        }
    }

    pub fn probe_oid(self) -> &'static str {
        match self {
            Mib::UpsMib => UPS_MIB_PROBE_OID,
            Mib::Apc => APC_PROBE_OID,
        }
    }

    pub fn entry(self, metric: Metric) -> Option<&'static OidSpec> {
        self.entries().iter().find(|spec| spec.metric == metric)
    }

    pub fn entry_for_oid(self, oid: &str) -> Option<&'static OidSpec> {
        self.entries().iter().find(|spec| spec.oid == oid)
    }

    pub fn cadence_subset(self, cadence: Cadence) -> Vec<&'static OidSpec> {
        self.entries()
            .iter()
            .filter(|spec| spec.metric.cadence() == Some(cadence))
            .collect()
    }
}

impl std::fmt::Display for Mib {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cadence {
    Fast,
    Slow,
}

impl Cadence {
    pub fn as_str(self) -> &'static str {
        match self {
            Cadence::Fast => "fast",
            Cadence::Slow => "slow",
        }
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Manufacturer,
    Model,
    Firmware,
    IdentName,
    SerialNumber,
    BatteryStatus,
    SecondsOnBattery,
    RuntimeRemaining,
    BatteryCharge,
    BatteryVoltage,
    BatteryTemperature,
    InputLineCount,
    InputFrequency,
    InputVoltage,
    InputCurrent,
    InputPower,
    OutputSource,
    OutputVoltage,
    OutputFrequency,
    OutputLoad,
    OutputLineCount,
    BypassFrequency,
    BypassLineCount,
    AlarmsPresent,
    AcPower,
    OnBattery,
    OnBypass,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Manufacturer => "manufacturer",
            Metric::Model => "model",
            Metric::Firmware => "firmware",
            Metric::IdentName => "ident_name",
            Metric::SerialNumber => "serial_number",
            Metric::BatteryStatus => "battery_status",
            Metric::SecondsOnBattery => "seconds_on_battery",
            Metric::RuntimeRemaining => "runtime_remaining",
            Metric::BatteryCharge => "battery_charge",
            Metric::BatteryVoltage => "battery_voltage",
            Metric::BatteryTemperature => "battery_temperature",
            Metric::InputLineCount => "input_line_count",
            Metric::InputFrequency => "input_frequency",
            Metric::InputVoltage => "input_voltage",
            Metric::InputCurrent => "input_current",
            Metric::InputPower => "input_power",
            Metric::OutputSource => "output_source",
            Metric::OutputVoltage => "output_voltage",
            Metric::OutputFrequency => "output_frequency",
            Metric::OutputLoad => "output_load",
            Metric::OutputLineCount => "output_line_count",
            Metric::BypassFrequency => "bypass_frequency",
            Metric::BypassLineCount => "bypass_line_count",
            Metric::AlarmsPresent => "alarms_present",
            Metric::AcPower => "ac_power",
            Metric::OnBattery => "on_battery",
            Metric::OnBypass => "on_bypass",
        }
    }

    pub fn cadence(self) -> Option<Cadence> {
        match self {
            Metric::OutputSource
            | Metric::RuntimeRemaining
            | Metric::SecondsOnBattery
            | Metric::BatteryCharge
            | Metric::InputVoltage => Some(Cadence::Fast),
            Metric::AcPower | Metric::OnBattery | Metric::OnBypass => None,
            _ => Some(Cadence::Slow),
        }
    }

    pub fn is_derived(self) -> bool {
        self.cadence().is_none()
    }

    pub fn unit(self) -> Option<Unit> {
        match self {
            Metric::BatteryVoltage | Metric::InputVoltage | Metric::OutputVoltage => {
                Some(Unit::Volts)
            }
            Metric::InputFrequency | Metric::OutputFrequency | Metric::BypassFrequency => {
                Some(Unit::Hertz)
            }
            Metric::InputCurrent => Some(Unit::Amperes),
            Metric::InputPower => Some(Unit::Watts),
            Metric::BatteryCharge | Metric::OutputLoad => Some(Unit::Percent),
            Metric::BatteryTemperature => Some(Unit::Celsius),
            Metric::RuntimeRemaining => Some(Unit::Minutes),
            Metric::SecondsOnBattery => Some(Unit::Seconds),
            _ => None,
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "V")]
    Volts,
    #[serde(rename = "Hz")]
    Hertz,
    #[serde(rename = "A")]
    Amperes,
    #[serde(rename = "W")]
    Watts,
    #[serde(rename = "%")]
    Percent,
    #[serde(rename = "°C")]
    Celsius,
    #[serde(rename = "min")]
    Minutes,
    #[serde(rename = "s")]
    Seconds,
}

impl Unit {
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Volts => "V",
            Unit::Hertz => "Hz",
            Unit::Amperes => "A",
            Unit::Watts => "W",
            Unit::Percent => "%",
            Unit::Celsius => "°C",
            Unit::Minutes => "min",
            Unit::Seconds => "s",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    Text,
    Number,
    Scale(f64),
    TimeticksToMinutes,
    Enum(&'static [(i64, &'static str)]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OidSpec {
    pub metric: Metric,
    pub oid: &'static str,
    pub transform: Transform,
}

const fn spec(metric: Metric, oid: &'static str, transform: Transform) -> OidSpec {
    OidSpec {
        metric,
        oid,
        transform,
    }
}

pub const UPS_OUTPUT_SOURCE: &[(i64, &str)] = &[
    (1, "other"),
    (2, "none"),
    (3, "normal"),
    (4, "bypass"),
    (5, "battery"),
    (6, "booster"),
    (7, "reducer"),
];

// upsBasicOutputStatus
pub const APC_OUTPUT_SOURCE: &[(i64, &str)] = &[
    (1, "unknown"),
    (2, "normal"),
    (3, "battery"),
    (4, "booster"),
    (5, "sleeping"),
    (6, "bypass"),
    (7, "none"),
    (8, "rebooting"),
    (9, "bypass"),
    (10, "bypass"),
    (11, "sleeping"),
    (12, "reducer"),
];

pub const UPS_BATTERY_STATUS: &[(i64, &str)] =
    &[(1, "unknown"), (2, "normal"), (3, "low"), (4, "depleted")];

pub const APC_BATTERY_STATUS: &[(i64, &str)] =
    &[(1, "unknown"), (2, "normal"), (3, "low"), (4, "fault")];

const UPS_MIB_PROBE_OID: &str = "1.3.6.1.2.1.33.1.4.1.0";
const APC_PROBE_OID: &str = "1.3.6.1.4.1.318.1.1.1.1.1.1.0";

const UPS_MIB_OIDS: &[OidSpec] = &[
    spec(Metric::Manufacturer, "1.3.6.1.2.1.33.1.1.1.0", Transform::Text),
    spec(Metric::Model, "1.3.6.1.2.1.33.1.1.2.0", Transform::Text),
    spec(Metric::Firmware, "1.3.6.1.2.1.33.1.1.3.0", Transform::Text),
    spec(Metric::IdentName, "1.3.6.1.2.1.33.1.1.5.0", Transform::Text),
    spec(
        Metric::BatteryStatus,
        "1.3.6.1.2.1.33.1.2.1.0",
        Transform::Enum(UPS_BATTERY_STATUS),
    ),
    spec(Metric::SecondsOnBattery, "1.3.6.1.2.1.33.1.2.2.0", Transform::Number),
    spec(Metric::RuntimeRemaining, "1.3.6.1.2.1.33.1.2.3.0", Transform::Number),
    spec(Metric::BatteryCharge, "1.3.6.1.2.1.33.1.2.4.0", Transform::Number),
    spec(Metric::BatteryVoltage, "1.3.6.1.2.1.33.1.2.5.0", Transform::Scale(0.1)),
    spec(Metric::BatteryTemperature, "1.3.6.1.2.1.33.1.2.7.0", Transform::Number),
    spec(Metric::InputLineCount, "1.3.6.1.2.1.33.1.3.2.0", Transform::Number),
    spec(Metric::InputFrequency, "1.3.6.1.2.1.33.1.3.3.1.2.1", Transform::Scale(0.1)),
    spec(Metric::InputVoltage, "1.3.6.1.2.1.33.1.3.3.1.3.1", Transform::Number),
    spec(Metric::InputCurrent, "1.3.6.1.2.1.33.1.3.3.1.4.1", Transform::Scale(0.1)),
    spec(Metric::InputPower, "1.3.6.1.2.1.33.1.3.3.1.5.1", Transform::Number),
    spec(
        Metric::OutputSource,
        UPS_MIB_PROBE_OID,
        Transform::Enum(UPS_OUTPUT_SOURCE),
    ),
    spec(Metric::OutputFrequency, "1.3.6.1.2.1.33.1.4.2.0", Transform::Scale(0.1)),
    spec(Metric::OutputLineCount, "1.3.6.1.2.1.33.1.4.3.0", Transform::Number),
    spec(Metric::BypassFrequency, "1.3.6.1.2.1.33.1.5.1.0", Transform::Scale(0.1)),
    spec(Metric::BypassLineCount, "1.3.6.1.2.1.33.1.5.2.0", Transform::Number),
    spec(Metric::AlarmsPresent, "1.3.6.1.2.1.33.1.6.1.0", Transform::Number),
];

const APC_OIDS: &[OidSpec] = &[
    spec(Metric::Model, APC_PROBE_OID, Transform::Text),
    spec(Metric::IdentName, "1.3.6.1.4.1.318.1.1.1.1.1.2.0", Transform::Text),
    spec(Metric::Firmware, "1.3.6.1.4.1.318.1.1.1.1.2.1.0", Transform::Text),
    spec(Metric::SerialNumber, "1.3.6.1.4.1.318.1.1.1.1.2.3.0", Transform::Text),
    spec(
        Metric::BatteryStatus,
        "1.3.6.1.4.1.318.1.1.1.2.1.1.0",
        Transform::Enum(APC_BATTERY_STATUS),
    ),
    spec(Metric::BatteryCharge, "1.3.6.1.4.1.318.1.1.1.2.2.1.0", Transform::Number),
    spec(Metric::BatteryTemperature, "1.3.6.1.4.1.318.1.1.1.2.2.2.0", Transform::Number),
    spec(
        Metric::RuntimeRemaining,
        "1.3.6.1.4.1.318.1.1.1.2.2.3.0",
        Transform::TimeticksToMinutes,
    ),
    spec(
        Metric::OutputSource,
        "1.3.6.1.4.1.318.1.1.1.4.1.1.0",
        Transform::Enum(APC_OUTPUT_SOURCE),
    ),
    spec(Metric::OutputVoltage, "1.3.6.1.4.1.318.1.1.1.4.2.1.0", Transform::Number),
    spec(Metric::OutputFrequency, "1.3.6.1.4.1.318.1.1.1.4.2.2.0", Transform::Number),
    spec(Metric::OutputLoad, "1.3.6.1.4.1.318.1.1.1.4.2.3.0", Transform::Number),
    spec(Metric::InputVoltage, "1.3.6.1.4.1.318.1.1.1.3.2.1.0", Transform::Number),
    spec(Metric::InputFrequency, "1.3.6.1.4.1.318.1.1.1.3.2.4.0", Transform::Number),
];
