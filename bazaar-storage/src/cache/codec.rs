//! Versioned cache value codec with tolerant decoding.
//!
//! Values are written as `{"v": SCHEMA_VERSION, "data": ...}`. Reads accept:
//!
//! - the current envelope, decoded strictly (coerced if strict decoding fails);
//! - older envelopes and bare, loosely-typed JSON left by earlier writers,
//!   coerced field by field (legacy names such as `_id` or `purchaseCount`,
//!   numbers stored as strings, naive or array-shaped datetimes).
//!
//! Anything else is a [`CacheError::Decode`], which the cache services treat
//! as "evict and reload from the store of record".

use bazaar_core::{
    millis_to_timestamp, CacheError, CacheNamespace, CachedCartItem, ProductId, ProductSummary,
    Timestamp,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::store::CacheResult;

/// Envelope version written by this build.
pub const SCHEMA_VERSION: u64 = 1;

/// A type the cache services store.
pub trait CacheableValue: Serialize + DeserializeOwned + Sized {
    const NAMESPACE: CacheNamespace;

    /// Best-effort reconstruction from loosely-typed JSON.
    fn coerce(value: &Value) -> Result<Self, String>;

    /// Invariants a decoded value must satisfy regardless of how it was read.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    v: u64,
    data: &'a T,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Envelope {
    v: u64,
    data: Value,
}

pub fn encode<T: CacheableValue>(value: &T) -> CacheResult<Vec<u8>> {
    serde_json::to_vec(&EnvelopeRef {
        v: SCHEMA_VERSION,
        data: value,
    })
    .map_err(|e| CacheError::Encode {
        reason: e.to_string(),
    })
}

pub fn decode<T: CacheableValue>(key: &str, bytes: &[u8]) -> CacheResult<T> {
    let fail = |reason: String| CacheError::Decode {
        key: key.to_string(),
        reason,
    };

    let value: Value = serde_json::from_slice(bytes).map_err(|e| fail(e.to_string()))?;

    let decoded = match Envelope::deserialize(&value) {
        Ok(envelope) if envelope.v > SCHEMA_VERSION => Err(format!(
            "unsupported schema version {} (newest known {})",
            envelope.v, SCHEMA_VERSION
        )),
        Ok(envelope) if envelope.v == SCHEMA_VERSION => {
            serde_json::from_value::<T>(envelope.data.clone())
                .or_else(|_| T::coerce(&envelope.data))
        }
        Ok(envelope) => T::coerce(&envelope.data),
        Err(_) => T::coerce(&value),
    }
    .map_err(fail)?;

    decoded.check().map_err(fail)?;
    Ok(decoded)
}

// =============================================================================
// FIELD COERCION
// =============================================================================

/// Lookup over a JSON object trying several field names in order.
///
/// Absent (or null) fields yield `Ok(None)`; present fields of an
/// unusable shape are errors.
struct Fields<'a>(&'a Map<String, Value>);

impl<'a> Fields<'a> {
    fn of(value: &'a Value) -> Result<Self, String> {
        value
            .as_object()
            .map(Fields)
            .ok_or_else(|| format!("expected an object, found {}", kind(value)))
    }

    fn raw<'n>(&self, names: &[&'n str]) -> Option<(&'n str, &'a Value)> {
        names.iter().find_map(|name| {
            self.0
                .get(*name)
                .filter(|v| !v.is_null())
                .map(|v| (*name, v))
        })
    }

    fn string(&self, names: &[&str]) -> Result<Option<String>, String> {
        match self.raw(names) {
            None => Ok(None),
            Some((_, Value::String(s))) => Ok(Some(s.clone())),
            Some((_, Value::Number(n))) => Ok(Some(n.to_string())),
            Some((_, Value::Bool(b))) => Ok(Some(b.to_string())),
            // Extended-JSON ids: {"$oid": "..."}
            Some((name, Value::Object(o))) => match o.get("$oid") {
                Some(Value::String(s)) => Ok(Some(s.clone())),
                _ => Err(format!("{}: expected a string, found object", name)),
            },
            Some((name, other)) => {
                Err(format!("{}: expected a string, found {}", name, kind(other)))
            }
        }
    }

    fn f64(&self, names: &[&str]) -> Result<Option<f64>, String> {
        match self.raw(names) {
            None => Ok(None),
            Some((name, Value::Number(n))) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| format!("{}: number out of range", name)),
            Some((name, Value::String(s))) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| format!("{}: {:?} is not a number", name, s)),
            Some((name, other)) => {
                Err(format!("{}: expected a number, found {}", name, kind(other)))
            }
        }
    }

    fn i64(&self, names: &[&str]) -> Result<Option<i64>, String> {
        match self.raw(names) {
            None => Ok(None),
            Some((name, Value::Number(n))) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(Some)
                .ok_or_else(|| format!("{}: {} is not an integer", name, n)),
            Some((name, Value::String(s))) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| format!("{}: {:?} is not an integer", name, s)),
            Some((name, other)) => {
                Err(format!("{}: expected an integer, found {}", name, kind(other)))
            }
        }
    }

    fn bool(&self, names: &[&str]) -> Result<Option<bool>, String> {
        match self.raw(names) {
            None => Ok(None),
            Some((_, Value::Bool(b))) => Ok(Some(*b)),
            Some((name, Value::String(s))) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Some(true)),
                "false" | "0" => Ok(Some(false)),
                _ => Err(format!("{}: {:?} is not a boolean", name, s)),
            },
            Some((name, Value::Number(n))) => match n.as_i64() {
                Some(0) => Ok(Some(false)),
                Some(1) => Ok(Some(true)),
                _ => Err(format!("{}: {} is not a boolean", name, n)),
            },
            Some((name, other)) => {
                Err(format!("{}: expected a boolean, found {}", name, kind(other)))
            }
        }
    }

    fn timestamp(&self, names: &[&str]) -> Result<Option<Timestamp>, String> {
        match self.raw(names) {
            None => Ok(None),
            Some((name, value)) => parse_timestamp(value)
                .map(Some)
                .ok_or_else(|| format!("{}: unrecognised datetime {}", name, value)),
        }
    }

    fn object(&self, names: &[&str]) -> Option<&'a Value> {
        self.raw(names).map(|(_, v)| v)
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Accepts RFC 3339, zone-less datetimes (read as UTC), epoch millis and
/// `[y, m, d, h, min, s, nanos?]` arrays.
fn parse_timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) => n.as_i64().map(millis_to_timestamp),
        Value::Array(parts) => {
            let nums: Option<Vec<i64>> = parts.iter().map(Value::as_i64).collect();
            let nums = nums?;
            if nums.len() < 3 {
                return None;
            }
            let part = |i: usize| nums.get(i).copied().unwrap_or(0);
            let date = NaiveDate::from_ymd_opt(part(0) as i32, part(1) as u32, part(2) as u32)?;
            date.and_hms_nano_opt(part(3) as u32, part(4) as u32, part(5) as u32, part(6) as u32)
                .map(|naive| naive.and_utc())
        }
        _ => None,
    }
}

// =============================================================================
// CACHEABLE TYPES
// =============================================================================

impl CacheableValue for ProductSummary {
    const NAMESPACE: CacheNamespace = CacheNamespace::Product;

    fn coerce(value: &Value) -> Result<Self, String> {
        let f = Fields::of(value)?;
        let id = f
            .string(&["id", "_id", "productId"])?
            .ok_or_else(|| "missing product id".to_string())?;

        let stock = f.i64(&["stock"])?.unwrap_or(0);
        let purchase_count = f.i64(&["purchase_count", "purchaseCount"])?.unwrap_or(0);
        let quantity = f.i64(&["quantity"])?.unwrap_or(0);

        Ok(ProductSummary {
            id: ProductId::new(id),
            name: f.string(&["name"])?.unwrap_or_default(),
            description: f.string(&["description"])?,
            price: f.f64(&["price"])?.unwrap_or(0.0),
            stock: i32::try_from(stock).map_err(|_| format!("stock {} out of range", stock))?,
            image_url: f.string(&["image_url", "imageUrl"])?,
            category: f.string(&["category"])?.unwrap_or_default(),
            shop_id: f.string(&["shop_id", "shopId"])?,
            shop_name: f.string(&["shop_name", "shopName"])?,
            created_at: f.timestamp(&["created_at", "createdAt"])?,
            updated_at: f.timestamp(&["updated_at", "updatedAt"])?,
            purchase_count: u64::try_from(purchase_count)
                .map_err(|_| format!("negative purchase count {}", purchase_count))?,
            viewed: f.bool(&["viewed"])?.unwrap_or(false),
            interaction_count: f.i64(&["interaction_count", "interactionCount"])?.unwrap_or(0),
            quantity: u32::try_from(quantity)
                .map_err(|_| format!("quantity {} out of range", quantity))?,
        })
    }
}

impl CacheableValue for CachedCartItem {
    const NAMESPACE: CacheNamespace = CacheNamespace::CartItem;

    fn coerce(value: &Value) -> Result<Self, String> {
        let f = Fields::of(value)?;
        let product_value = f
            .object(&["product"])
            .ok_or_else(|| "missing embedded product".to_string())?;
        let product = ProductSummary::coerce(product_value)?;

        let quantity = f
            .i64(&["quantity"])?
            .ok_or_else(|| "missing quantity".to_string())?;
        if quantity <= 0 {
            return Err(format!("non-positive cart quantity {}", quantity));
        }
        let quantity =
            u32::try_from(quantity).map_err(|_| format!("quantity {} out of range", quantity))?;

        let product_id = f
            .string(&["product_id", "productId"])?
            .map(ProductId::new)
            .unwrap_or_else(|| product.id.clone());

        let timestamp = match f.i64(&["timestamp"]) {
            Ok(ms) => ms.unwrap_or(0),
            Err(_) => f
                .timestamp(&["timestamp"])?
                .map(|ts| ts.timestamp_millis())
                .unwrap_or(0),
        };

        Ok(CachedCartItem {
            product_id,
            quantity,
            product,
            timestamp,
        })
    }

    fn check(&self) -> Result<(), String> {
        if self.quantity == 0 {
            return Err("zero cart quantity".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_loose_number() -> impl Strategy<Value = (i64, Value)> {
        (0i64..100_000).prop_flat_map(|n| {
            prop_oneof![Just((n, json_num(n))), Just((n, Value::String(n.to_string())))]
        })
    }

    fn json_num(n: i64) -> Value {
        Value::Number(n.into())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Numbers survive whether a previous writer stored them as JSON
        /// numbers or as strings.
        #[test]
        fn prop_loose_numbers_coerce(
            (stock, stock_json) in arb_loose_number(),
            (count, count_json) in arb_loose_number(),
            id in "[a-f0-9]{6,24}",
        ) {
            let mut obj = Map::new();
            obj.insert("_id".to_string(), Value::String(id.clone()));
            obj.insert("stock".to_string(), stock_json);
            obj.insert("purchaseCount".to_string(), count_json);
            let bytes = Value::Object(obj).to_string();

            let decoded: ProductSummary = decode("product:x", bytes.as_bytes()).unwrap();
            prop_assert_eq!(decoded.id.as_str(), id.as_str());
            prop_assert_eq!(decoded.stock as i64, stock);
            prop_assert_eq!(decoded.purchase_count as i64, count);
        }

        /// Decoding arbitrary bytes never panics.
        #[test]
        fn prop_decode_total(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let _ = decode::<ProductSummary>("product:x", &bytes);
            let _ = decode::<CachedCartItem>("cart_items:c:x", &bytes);
        }
    }
}
