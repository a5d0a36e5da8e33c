use crate::flatten::{flatten_record, FlatListing};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::OnceLock;

pub const VIN_FIELD: &str = "vin";
pub const PRICE_FIELD: &str = "pricingDetail";
pub const SALE_PRICE_FIELD: &str = "salePrice";

/// One vehicle record exactly as the listing API returned it.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing(Map<String, Value>);

impl Listing {
    pub fn new(fields: Map<String, Value>) -> Self {
        Listing(fields)
    }

    /// Accepts only JSON objects; anything else is not a listing.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Listing(map)),
            _ => None,
        }
    }

    pub fn vin(&self) -> Option<&str> {
        self.0.get(VIN_FIELD).and_then(Value::as_str)
    }

    /// The sale price, whether `pricingDetail` is a bare value or an object
    /// carrying `salePrice`. Fractions are truncated.
    pub fn price(&self) -> Option<i64> {
        let detail = self.0.get(PRICE_FIELD)?;
        let raw = match detail {
            Value::Object(inner) => inner.get(SALE_PRICE_FIELD)?,
            other => other,
        };
        parse_price(raw)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn flatten(&self) -> FlatListing {
        flatten_record(&self.0)
    }
}

fn price_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-?\d[\d,]*(?:\.\d+)?").expect("price pattern is valid"))
}

/// Reads a price from a JSON number or from text such as `"$12,500"`.
pub fn parse_price(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(text) => {
            let found = price_regex().find(text)?;
            let digits = found.as_str().replace(',', "");
            digits.parse::<f64>().ok().map(|f| f.trunc() as i64)
        }
        _ => None,
    }
}

/// Listings collected during one run, unique by VIN and kept in the order
/// they were first seen.
#[derive(Debug, Default, Clone)]
pub struct ListingSet {
    listings: Vec<Listing>,
    vins: HashSet<String>,
}

/// What happened when a page was merged into a `ListingSet`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub added: usize,
    pub duplicates: usize,
    pub missing_vin: usize,
}

impl ListingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.listings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }

    pub fn contains(&self, vin: &str) -> bool {
        self.vins.contains(vin)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Listing> {
        self.listings.iter()
    }

    /// Adds every listing whose VIN has not been seen yet. Listings without
    /// a string VIN cannot be deduplicated and are skipped.
    pub fn merge(&mut self, page: Vec<Listing>) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        for listing in page {
            let vin = match listing.vin() {
                Some(vin) => vin.to_string(),
                None => {
                    outcome.missing_vin += 1;
                    continue;
                }
            };
            if self.vins.insert(vin) {
                self.listings.push(listing);
                outcome.added += 1;
            } else {
                outcome.duplicates += 1;
            }
        }
        outcome
    }

    pub fn flatten_all(&self) -> Vec<FlatListing> {
        self.listings.iter().map(Listing::flatten).collect()
    }
}
