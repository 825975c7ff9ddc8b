//! Value and unit types carried alongside recorded samples.
//!
//! Units are labels only. Nothing in this crate converts between them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Time unit attached to a timer sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

/// Unit attached to a gauge reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Time(TimeUnit),
    Bit,
    Byte,
    Kilobyte,
    Megabyte,
    Gigabyte,
    Percent,
}

/// A gauge reading, either floating point or integral
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GaugeValue {
    Integer(i64),
    Float(f64),
}

impl TimeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeUnit::Nanoseconds => "ns",
            TimeUnit::Microseconds => "us",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "h",
            TimeUnit::Days => "d",
        }
    }
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Time(unit) => unit.as_str(),
            Unit::Bit => "bit",
            Unit::Byte => "B",
            Unit::Kilobyte => "KB",
            Unit::Megabyte => "MB",
            Unit::Gigabyte => "GB",
            Unit::Percent => "%",
        }
    }
}

impl From<TimeUnit> for Unit {
    fn from(unit: TimeUnit) -> Self {
        Unit::Time(unit)
    }
}

impl GaugeValue {
    /// Reading as a float, integers converted lossily above 2^53
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> f64 {
        match *self {
            GaugeValue::Integer(value) => value as f64,
            GaugeValue::Float(value) => value,
        }
    }
}

impl From<f64> for GaugeValue {
    fn from(value: f64) -> Self {
        GaugeValue::Float(value)
    }
}

impl From<i64> for GaugeValue {
    fn from(value: i64) -> Self {
        GaugeValue::Integer(value)
    }
}

impl From<u32> for GaugeValue {
    fn from(value: u32) -> Self {
        GaugeValue::Integer(i64::from(value))
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for GaugeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GaugeValue::Integer(value) => write!(f, "{}", value),
            GaugeValue::Float(value) => write!(f, "{}", value),
        }
    }
}
