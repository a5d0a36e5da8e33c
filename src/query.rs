pub const DEFAULT_ENDPOINT: &str = "https://www.kbb.com/rest/lsc/listing";
pub const PAGE_SIZE: usize = 100;
pub const SEARCH_RADIUS: &str = "500";

pub const FIRST_RECORD: &str = "firstRecord";
pub const MIN_PRICE: &str = "minPrice";

// The site's own front end sends these placeholders verbatim.
const OBJECT_PLACEHOLDER: &str = "[object Object]";

/// Search filters chosen by the operator. Unset filters are left out of the
/// query entirely.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub zip_code: Option<String>,
    pub make_codes: Vec<String>,
    pub model_codes: Vec<String>,
    pub min_year: Option<u16>,
    pub max_year: Option<u16>,
    pub max_mileage: Option<u32>,
    pub min_price: Option<u32>,
    pub max_price: Option<u32>,
}

/// Ordered `key=value` pairs sent with every listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameters {
    pairs: Vec<(String, String)>,
}

impl QueryParameters {
    pub fn from_filters(filters: &SearchFilters) -> Self {
        let join = |codes: &[String]| (!codes.is_empty()).then(|| codes.join(","));

        let fields: Vec<(&str, Option<String>)> = vec![
            ("listingType", Some("USED".to_string())),
            (MIN_PRICE, filters.min_price.map(|p| p.to_string())),
            ("maxPrice", filters.max_price.map(|p| p.to_string())),
            ("price", Some(OBJECT_PLACEHOLDER.to_string())),
            ("zip", filters.zip_code.clone()),
            ("location", Some(OBJECT_PLACEHOLDER.to_string())),
            ("newSearch", Some("false".to_string())),
            ("makeCode", join(filters.make_codes.as_slice())),
            ("modelCode", join(filters.model_codes.as_slice())),
            ("marketExtension", Some("off".to_string())),
            ("mileage", filters.max_mileage.map(|m| m.to_string())),
            ("numRecords", Some(PAGE_SIZE.to_string())),
            ("searchRadius", Some(SEARCH_RADIUS.to_string())),
            ("sortBy", Some("derivedpriceASC".to_string())),
            ("startYear", filters.min_year.map(|y| y.to_string())),
            ("endYear", filters.max_year.map(|y| y.to_string())),
            ("dma", Some(OBJECT_PLACEHOLDER.to_string())),
            ("channel", Some("KBB".to_string())),
            ("relevanceConfig", Some("default".to_string())),
            ("vhrProviders", Some("EXPERIAN".to_string())),
            ("vhrProvider", Some("EXPERIAN".to_string())),
            ("stats", Some("year,derivedprice".to_string())),
        ];

        let pairs = fields
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
            .collect();

        QueryParameters { pairs }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replaces the value in place, or appends the pair if the key is new.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key.to_string(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.pairs.iter().position(|(k, _)| k == key)?;
        Some(self.pairs.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_query_string(&self) -> String {
        self.pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}?{}", endpoint.trim(), self.to_query_string())
    }
}
