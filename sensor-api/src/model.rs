use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Retention window applied when a sensor is created without `n`.
pub const DEFAULT_WINDOW: i64 = 10;

/// Registered sensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Sensor {
    pub id: i64,
    pub name: String,
    pub n: i64,
}

/// Body of `POST /create/`
#[derive(Debug, Clone, Deserialize)]
pub struct NewSensor {
    pub name: String,
    #[serde(default)]
    pub n: Option<i64>,
}

impl NewSensor {
    pub fn window(&self) -> i64 {
        self.n.unwrap_or(DEFAULT_WINDOW)
    }
}

/// Body of `PUT /sensor/{id}`; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SensorPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub n: Option<i64>,
}

impl SensorPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.n.is_none()
    }

    pub fn apply(self, sensor: &mut Sensor) {
        if let Some(name) = self.name {
            sensor.name = name;
        }
        if let Some(n) = self.n {
            sensor.n = n;
        }
    }
}

/// Single data point recorded for a sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reading {
    pub id: i64,
    pub sensor_id: i64,
    #[sqlx(try_from = "i64")]
    pub value: Value,
}

/// Body of `POST /add/`
#[derive(Debug, Clone, Deserialize)]
pub struct NewReading {
    pub sensor_id: i64,
    pub value: Value,
}

/// Plain confirmation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub message: String,
}

impl Status {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Limit/offset page wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Raw `?limit=&offset=` query, checked by `validate::page_request`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("value {0:?} is not a decimal number")]
    Malformed(String),

    #[error("value must have no more than {} decimal places", Value::DECIMAL_PLACES)]
    TooManyDecimals,

    #[error("value must have no more than {} digits in total", Value::MAX_DIGITS)]
    TooManyDigits,
}

/// Fixed-point decimal with 8 digits, 2 of them after the point.
/// Held as an integer count of hundredths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Value(i64);

impl Value {
    pub const MAX_DIGITS: u32 = 8;
    pub const DECIMAL_PLACES: u32 = 2;
    const SCALE: i64 = 100;
    const BOUND: i64 = 10_i64.pow(Self::MAX_DIGITS);

    pub fn from_hundredths(hundredths: i64) -> Result<Self, ValueError> {
        if hundredths.checked_abs().map_or(true, |abs| abs >= Self::BOUND) {
            return Err(ValueError::TooManyDigits);
        }
        Ok(Self(hundredths))
    }

    pub fn hundredths(self) -> i64 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }
}

impl TryFrom<i64> for Value {
    type Error = ValueError;

    fn try_from(hundredths: i64) -> Result<Self, Self::Error> {
        Self::from_hundredths(hundredths)
    }
}

impl TryFrom<f64> for Value {
    type Error = ValueError;

    /// Goes through the shortest decimal form of the float, so a JSON number
    /// with extra decimals is rejected exactly like the same text would be.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(ValueError::Malformed(value.to_string()));
        }
        value.to_string().parse()
    }
}

impl FromStr for Value {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ValueError::Malformed(s.to_string());
        let trimmed = s.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(malformed());
        }
        if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }

        let fraction = fraction.trim_end_matches('0');
        if fraction.len() > Self::DECIMAL_PLACES as usize {
            return Err(ValueError::TooManyDecimals);
        }
        let whole = whole.trim_start_matches('0');
        if whole.len() + Self::DECIMAL_PLACES as usize > Self::MAX_DIGITS as usize {
            return Err(ValueError::TooManyDigits);
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| malformed())?
        };
        let cents: i64 = format!("{:0<2}", fraction).parse().map_err(|_| malformed())?;
        let hundredths = whole * Self::SCALE + cents;
        Self::from_hundredths(if negative { -hundredths } else { hundredths })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Text(String),
        }

        let parsed = match Raw::deserialize(deserializer)? {
            Raw::Int(whole) => whole
                .checked_mul(Self::SCALE)
                .ok_or(ValueError::TooManyDigits)
                .and_then(Self::from_hundredths),
            Raw::Float(value) => Self::try_from(value),
            Raw::Text(text) => text.parse(),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_strings() {
        assert_eq!("12.34".parse::<Value>().unwrap().hundredths(), 1234);
        assert_eq!("-0.5".parse::<Value>().unwrap().hundredths(), -50);
        assert_eq!("7".parse::<Value>().unwrap().hundredths(), 700);
        assert_eq!(".25".parse::<Value>().unwrap().hundredths(), 25);
        assert_eq!("1.500".parse::<Value>().unwrap().hundredths(), 150);
        assert_eq!("999999.99".parse::<Value>().unwrap().hundredths(), 99_999_999);
    }

    #[test]
    fn test_reject_out_of_range_decimals() {
        assert_eq!("1.234".parse::<Value>(), Err(ValueError::TooManyDecimals));
        assert_eq!("1000000".parse::<Value>(), Err(ValueError::TooManyDigits));
        assert!(matches!("abc".parse::<Value>(), Err(ValueError::Malformed(_))));
        assert!(matches!("".parse::<Value>(), Err(ValueError::Malformed(_))));
        assert!(matches!("1.2.3".parse::<Value>(), Err(ValueError::Malformed(_))));
    }

    #[test]
    fn test_value_from_json_number_or_string() {
        let from_float: Value = serde_json::from_str("21.5").unwrap();
        let from_int: Value = serde_json::from_str("21").unwrap();
        let from_text: Value = serde_json::from_str("\"21.50\"").unwrap();

        assert_eq!(from_float.hundredths(), 2150);
        assert_eq!(from_int.hundredths(), 2100);
        assert_eq!(from_text, from_float);
        assert!(serde_json::from_str::<Value>("0.001").is_err());
    }

    #[test]
    fn test_float_with_hidden_decimals_is_rejected() {
        assert_eq!(Value::try_from(1.000000001), Err(ValueError::TooManyDecimals));
        assert_eq!(Value::try_from(1.005), Err(ValueError::TooManyDecimals));
        assert_eq!(Value::try_from(1_000_000.0), Err(ValueError::TooManyDigits));
        assert_eq!(Value::try_from(-3.1).unwrap().hundredths(), -310);
        assert!(serde_json::from_str::<Value>("1.000000001").is_err());
    }

    #[test]
    fn test_value_serializes_as_number() {
        let value = Value::from_hundredths(-1205).unwrap();
        assert_eq!(serde_json::to_string(&value).unwrap(), "-12.05");
        assert_eq!(value.to_string(), "-12.05");
    }

    #[test]
    fn test_new_sensor_default_window() {
        let sensor: NewSensor = serde_json::from_str(r#"{"name": "probe"}"#).unwrap();
        assert_eq!(sensor.window(), DEFAULT_WINDOW);

        let sensor: NewSensor = serde_json::from_str(r#"{"name": "probe", "n": 3}"#).unwrap();
        assert_eq!(sensor.window(), 3);
    }

    #[test]
    fn test_patch_only_overwrites_supplied_fields() {
        let mut sensor = Sensor {
            id: 1,
            name: "before".to_string(),
            n: 4,
        };
        let patch: SensorPatch = serde_json::from_str(r#"{"n": 7}"#).unwrap();
        patch.apply(&mut sensor);

        assert_eq!(sensor.name, "before");
        assert_eq!(sensor.n, 7);
    }
}
