//! Documents, keys and namespaces.
//!
//! A document is compared by the exact bytes of its BSON encoding. Keys are
//! the `_id` values, ordered the way the server orders them so that cursor
//! walks over `_id` can be checked for monotonicity.

use bson::{Bson, Decimal128, RawDocument, RawDocumentBuf};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

use crate::error::ClusterError;

/// Name of the field every document is keyed by.
pub const KEY_FIELD: &str = "_id";

/// A `database.collection` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// The `_id` value of a document.
///
/// Equality and ordering follow the server's BSON comparison order, so an
/// `Int32(5)` and an `Int64(5)` are the same key.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct DocumentKey(Bson);

impl DocumentKey {
    pub fn new(value: impl Into<Bson>) -> Self {
        Self(value.into())
    }

    /// Extract the key from a raw document.
    pub fn from_document(doc: &RawDocument) -> Result<Self, ClusterError> {
        let value = doc
            .get(KEY_FIELD)
            .map_err(|e| ClusterError::MalformedDocument(e.to_string()))?
            .ok_or_else(|| {
                ClusterError::MalformedDocument(format!("document is missing {KEY_FIELD}"))
            })?;
        let value = Bson::try_from(value.to_raw_bson())
            .map_err(|e| ClusterError::MalformedDocument(e.to_string()))?;
        Ok(Self(value))
    }

    pub fn as_bson(&self) -> &Bson {
        &self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq for DocumentKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DocumentKey {}

impl PartialOrd for DocumentKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DocumentKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_bson(&self.0, &other.0)
    }
}

/// Position of a value's type in the server's cross-type sort order.
fn type_rank(value: &Bson) -> u8 {
    match value {
        Bson::MinKey => 0,
        Bson::Null | Bson::Undefined => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) | Bson::Symbol(_) => 3,
        Bson::Document(_) => 4,
        Bson::Array(_) => 5,
        Bson::Binary(_) => 6,
        Bson::ObjectId(_) => 7,
        Bson::Boolean(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::Timestamp(_) => 10,
        Bson::RegularExpression(_) => 11,
        Bson::MaxKey => 13,
        _ => 12,
    }
}

const DECIMAL128_EXPONENT_BIAS: i32 = 6176;
const DECIMAL128_MAX_DIGITS: u32 = 34;

/// A `Decimal128` decoded from its IEEE 754-2008 BID encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Decimal {
    NaN,
    Infinite {
        negative: bool,
    },
    Finite {
        negative: bool,
        coefficient: u128,
        exponent: i32,
    },
}

impl Decimal {
    fn decode(value: &Decimal128) -> Self {
        let bits = u128::from_le_bytes(value.bytes());
        let negative = bits >> 127 == 1;
        match (bits >> 122) & 0x1f {
            0x1f => return Self::NaN,
            0x1e => return Self::Infinite { negative },
            _ => {}
        }
        let (exponent, coefficient) = if (bits >> 125) & 0b11 == 0b11 {
            // The long form only encodes coefficients above 10^34, which are non-canonical zeros.
            ((bits >> 111) & 0x3fff, 0)
        } else {
            ((bits >> 113) & 0x3fff, bits & ((1 << 113) - 1))
        };
        let coefficient = if coefficient >= 10u128.pow(DECIMAL128_MAX_DIGITS) {
            0
        } else {
            coefficient
        };
        Self::Finite {
            negative,
            coefficient,
            exponent: exponent as i32 - DECIMAL128_EXPONENT_BIAS,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::NaN => 0,
            Self::Infinite { negative: true } => 1,
            Self::Finite { .. } => 2,
            Self::Infinite { negative: false } => 3,
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            Self::NaN => f64::NAN,
            Self::Infinite { negative: true } => f64::NEG_INFINITY,
            Self::Infinite { negative: false } => f64::INFINITY,
            Self::Finite { coefficient: 0, .. } => 0.0,
            Self::Finite {
                negative,
                coefficient,
                exponent,
            } => {
                let magnitude = coefficient as f64 * 10f64.powi(exponent);
                if negative {
                    -magnitude
                } else {
                    magnitude
                }
            }
        }
    }
}

fn digit_count(mut value: u128) -> u32 {
    let mut digits = 0;
    while value > 0 {
        value /= 10;
        digits += 1;
    }
    digits
}

/// Compare `ca * 10^ea` with `cb * 10^eb` for non-zero coefficients.
fn compare_magnitude(ca: u128, ea: i32, cb: u128, eb: i32) -> Ordering {
    let (da, db) = (digit_count(ca), digit_count(cb));
    let order = (da as i32 + ea).cmp(&(db as i32 + eb));
    if order != Ordering::Equal {
        return order;
    }
    let a = ca * 10u128.pow(DECIMAL128_MAX_DIGITS - da);
    let b = cb * 10u128.pow(DECIMAL128_MAX_DIGITS - db);
    a.cmp(&b)
}

/// Exact ordering of two decimals; NaN sorts below every number.
fn compare_decimals(a: Decimal, b: Decimal) -> Ordering {
    match (a, b) {
        (
            Decimal::Finite {
                negative: na,
                coefficient: ca,
                exponent: ea,
            },
            Decimal::Finite {
                negative: nb,
                coefficient: cb,
                exponent: eb,
            },
        ) => {
            let signum = |negative: bool, coefficient: u128| match (coefficient, negative) {
                (0, _) => 0,
                (_, true) => -1,
                (_, false) => 1,
            };
            let (sa, sb) = (signum(na, ca), signum(nb, cb));
            match (sa.cmp(&sb), sa) {
                (Ordering::Equal, 0) => Ordering::Equal,
                (Ordering::Equal, 1) => compare_magnitude(ca, ea, cb, eb),
                (Ordering::Equal, _) => compare_magnitude(cb, eb, ca, ea),
                (order, _) => order,
            }
        }
        _ => a.rank().cmp(&b.rank()),
    }
}

/// Numeric value as `f64`. Decimals only go through here when compared with
/// another numeric type, where precision beyond `f64` is lost.
fn as_f64(value: &Bson) -> f64 {
    match value {
        Bson::Int32(i) => *i as f64,
        Bson::Int64(i) => *i as f64,
        Bson::Double(d) => *d,
        Bson::Decimal128(d) => Decimal::decode(d).to_f64(),
        _ => f64::NAN,
    }
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(i) => Some(*i as i64),
        Bson::Int64(i) => Some(*i),
        _ => None,
    }
}

/// Compare two BSON values in server sort order.
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (Bson::String(x) | Bson::Symbol(x), Bson::String(y) | Bson::Symbol(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.bytes().cmp(&y.bytes()),
        (Bson::Decimal128(x), Bson::Decimal128(y)) => {
            compare_decimals(Decimal::decode(x), Decimal::decode(y))
        }
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => {
            x.timestamp_millis().cmp(&y.timestamp_millis())
        }
        (Bson::Timestamp(x), Bson::Timestamp(y)) => {
            (x.time, x.increment).cmp(&(y.time, y.increment))
        }
        (Bson::Binary(x), Bson::Binary(y)) => x
            .bytes
            .len()
            .cmp(&y.bytes.len())
            .then_with(|| u8::from(x.subtype).cmp(&u8::from(y.subtype)))
            .then_with(|| x.bytes.cmp(&y.bytes)),
        (Bson::Array(x), Bson::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_bson(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Bson::Document(x), Bson::Document(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y.iter()) {
                let ord = lk.cmp(rk).then_with(|| compare_bson(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ if type_rank(a) == 2 => match (as_i64(a), as_i64(b)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => as_f64(a).total_cmp(&as_f64(b)),
        },
        // Same rank without a natural order (MinKey, MaxKey, Null, regexes, code...).
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// A document pulled from the source by a sampler.
#[derive(Debug, Clone)]
pub struct SampledDocument {
    pub key: DocumentKey,
    pub document: RawDocumentBuf,
}

impl SampledDocument {
    pub fn from_raw(document: RawDocumentBuf) -> Result<Self, ClusterError> {
        let key = DocumentKey::from_document(&document)?;
        Ok(Self { key, document })
    }
}

/// Exact byte equality of two canonical encodings.
pub fn canonical_eq(source: &RawDocument, destination: &RawDocument) -> bool {
    source.as_bytes() == destination.as_bytes()
}

/// Render a document for diagnostics when it is smaller than `limit` bytes.
pub fn preview(doc: &RawDocument, limit: usize) -> Option<String> {
    if doc.as_bytes().len() >= limit {
        return None;
    }
    match bson::Document::try_from(doc) {
        Ok(d) => Some(d.to_string()),
        Err(_) => Some(format!("{:?}", doc.as_bytes())),
    }
}

/// One index specification in the server's canonical encoding.
///
/// Ordering is byte-wise so lists of definitions can be sorted independently
/// of the order the indexes were declared in.
#[derive(Debug, Clone)]
pub struct IndexDefinition(RawDocumentBuf);

impl IndexDefinition {
    pub fn new(spec: RawDocumentBuf) -> Self {
        Self(spec)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn as_document(&self) -> &RawDocument {
        &self.0
    }
}

impl PartialEq for IndexDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for IndexDefinition {}

impl PartialOrd for IndexDefinition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexDefinition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl fmt::Display for IndexDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match bson::Document::try_from(self.as_document()) {
            Ok(d) => write!(f, "{d}"),
            Err(_) => write!(f, "{:?}", self.as_bytes()),
        }
    }
}
