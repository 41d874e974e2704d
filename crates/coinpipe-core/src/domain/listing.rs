use serde_json::{Map, Value};

use crate::{DecodeError, UtcDateTime};

/// One untyped element of the listings `data` array.
pub type RawListing = Value;

/// Quote currency read from each listing's `quote` object.
pub const QUOTE_CURRENCY: &str = "USD";

/// Typed view of a raw listing with required and optional fields made explicit.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRecord {
    pub id: i64,
    pub name: String,
    pub symbol: String,
    pub slug: String,
    pub cmc_rank: i64,
    pub num_market_pairs: i64,
    pub circulating_supply: f64,
    pub total_supply: f64,
    pub max_supply: Option<f64>,
    pub quote: UsdQuote,
    pub last_updated: UtcDateTime,
}

/// Market values from the `quote.USD` sub-object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsdQuote {
    pub price: f64,
    pub volume_24h: f64,
    pub percent_change_1h: f64,
    pub percent_change_24h: f64,
    pub percent_change_7d: f64,
    pub market_cap: f64,
}

impl ListingRecord {
    pub fn decode(raw: &RawListing) -> Result<Self, DecodeError> {
        let fields = Fields::root(raw)?;
        let quote = fields.object("quote")?.object(QUOTE_CURRENCY)?;

        Ok(Self {
            id: fields.integer("id")?,
            name: fields.text("name")?,
            symbol: fields.text("symbol")?,
            slug: fields.text("slug")?,
            cmc_rank: fields.integer("cmc_rank")?,
            num_market_pairs: fields.integer("num_market_pairs")?,
            circulating_supply: fields.float("circulating_supply")?,
            total_supply: fields.float("total_supply")?,
            max_supply: fields.optional_float("max_supply")?,
            quote: UsdQuote {
                price: quote.float("price")?,
                volume_24h: quote.float("volume_24h")?,
                percent_change_1h: quote.float("percent_change_1h")?,
                percent_change_24h: quote.float("percent_change_24h")?,
                percent_change_7d: quote.float("percent_change_7d")?,
                market_cap: quote.float("market_cap")?,
            },
            last_updated: fields.timestamp("last_updated")?,
        })
    }

    /// Best-effort `id` lookup used to label decode failures.
    pub fn peek_id(raw: &RawListing) -> Option<i64> {
        raw.get("id").and_then(|value| coerce_integer(value).ok())
    }
}

/// Field accessor over one JSON object, tracking the dotted path for errors.
struct Fields<'a> {
    prefix: String,
    map: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    fn root(value: &'a Value) -> Result<Self, DecodeError> {
        match value {
            Value::Object(map) => Ok(Self {
                prefix: String::new(),
                map,
            }),
            other => Err(DecodeError::NotAnObject {
                found: describe(other),
            }),
        }
    }

    fn path(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_owned()
        } else {
            format!("{}.{key}", self.prefix)
        }
    }

    fn required(&self, key: &str) -> Result<&'a Value, DecodeError> {
        match self.map.get(key) {
            None => Err(DecodeError::Missing {
                field: self.path(key),
            }),
            Some(Value::Null) => Err(DecodeError::Null {
                field: self.path(key),
            }),
            Some(value) => Ok(value),
        }
    }

    fn object(&self, key: &str) -> Result<Fields<'a>, DecodeError> {
        match self.required(key)? {
            Value::Object(map) => Ok(Fields {
                prefix: self.path(key),
                map,
            }),
            other => Err(self.invalid(key, "object", other)),
        }
    }

    fn integer(&self, key: &str) -> Result<i64, DecodeError> {
        let value = self.required(key)?;
        coerce_integer(value).map_err(|expected| self.invalid(key, expected, value))
    }

    fn float(&self, key: &str) -> Result<f64, DecodeError> {
        let value = self.required(key)?;
        coerce_float(value).map_err(|expected| self.invalid(key, expected, value))
    }

    fn optional_float(&self, key: &str) -> Result<Option<f64>, DecodeError> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => coerce_float(value)
                .map(Some)
                .map_err(|expected| self.invalid(key, expected, value)),
        }
    }

    fn text(&self, key: &str) -> Result<String, DecodeError> {
        let value = self.required(key)?;
        coerce_text(value).map_err(|expected| self.invalid(key, expected, value))
    }

    fn timestamp(&self, key: &str) -> Result<UtcDateTime, DecodeError> {
        let value = self.required(key)?;
        const EXPECTED: &str = "RFC3339 timestamp";
        match value {
            Value::String(text) => {
                UtcDateTime::parse(text).map_err(|_| self.invalid(key, EXPECTED, value))
            }
            other => Err(self.invalid(key, EXPECTED, other)),
        }
    }

    fn invalid(&self, key: &str, expected: &'static str, found: &Value) -> DecodeError {
        DecodeError::Invalid {
            field: self.path(key),
            expected,
            found: describe(found),
        }
    }
}

/// Integer coercion: i64 numbers, whole floats in range, or numeric strings.
pub fn coerce_integer(value: &Value) -> Result<i64, &'static str> {
    const EXPECTED: &str = "integer";
    match value {
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                return Ok(integer);
            }
            match number.as_f64() {
                Some(float)
                    if float.is_finite()
                        && float.fract() == 0.0
                        && float >= i64::MIN as f64
                        && float < i64::MAX as f64 =>
                {
                    Ok(float as i64)
                }
                _ => Err(EXPECTED),
            }
        }
        Value::String(text) => text.trim().parse::<i64>().map_err(|_| EXPECTED),
        _ => Err(EXPECTED),
    }
}

/// Float coercion: any finite number or numeric string.
pub fn coerce_float(value: &Value) -> Result<f64, &'static str> {
    const EXPECTED: &str = "finite float";
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|float| float.is_finite()).ok_or(EXPECTED)
}

/// Text coercion: strings as-is, scalars stringified.
pub fn coerce_text(value: &Value) -> Result<String, &'static str> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        _ => Err("text"),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => String::from("null"),
        Value::Bool(flag) => format!("boolean {flag}"),
        Value::Number(number) => format!("number {number}"),
        Value::String(text) => format!("string {text:?}"),
        Value::Array(_) => String::from("array"),
        Value::Object(_) => String::from("object"),
    }
}
