use crate::error::ScrapeError;
use crate::models::Listing;
use crate::query::QueryParameters;
use crate::{debug_eprintln, debug_println, status_println};
use reqwest::blocking::Client;
use serde_json::Value;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Status and body of one completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs a single GET. Implementations must not retry.
pub trait Transport {
    fn get(&self, url: &str) -> Result<HttpResponse, ScrapeError>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(ReqwestTransport { client })
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str) -> Result<HttpResponse, ScrapeError> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .map_err(|e| ScrapeError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| ScrapeError::Network(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}

/// Why a decoded response produced no listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyPage {
    /// Body is not an object, or it has no `listings` field.
    MissingListings,
    /// `listings` exists but is not an array.
    WrongShape,
}

/// Result of one listing request that did not fail outright.
#[derive(Debug, Clone, PartialEq)]
pub enum Page {
    Listings(Vec<Listing>),
    Empty(EmptyPage),
}

impl Page {
    pub fn into_listings(self) -> Vec<Listing> {
        match self {
            Page::Listings(listings) => listings,
            Page::Empty(_) => Vec::new(),
        }
    }

    pub fn raw_count(&self) -> usize {
        match self {
            Page::Listings(listings) => listings.len(),
            Page::Empty(_) => 0,
        }
    }
}

/// Classifies a decoded body without failing on unexpected shapes.
pub fn parse_page(body: Value) -> Page {
    let listings = match body {
        Value::Object(mut map) => match map.remove("listings") {
            Some(listings) => listings,
            None => {
                status_println!("Listings missing (keys: {:?})", map.keys().collect::<Vec<_>>());
                return Page::Empty(EmptyPage::MissingListings);
            }
        },
        other => {
            status_println!("Listings missing (body is not an object: {})", json_kind(&other));
            return Page::Empty(EmptyPage::MissingListings);
        }
    };

    match listings {
        Value::Array(items) => {
            let total = items.len();
            let listings: Vec<Listing> = items.into_iter().filter_map(Listing::from_value).collect();
            if listings.len() < total {
                debug_eprintln!("Dropped {} non-object entries from listings", total - listings.len());
            }
            Page::Listings(listings)
        }
        other => {
            status_println!("Listings invalid (found {})", json_kind(&other));
            Page::Empty(EmptyPage::WrongShape)
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Requests one page of listings.
pub fn fetch_listings<T: Transport + ?Sized>(
    transport: &T,
    endpoint: &str,
    parameters: &QueryParameters,
) -> Result<Page, ScrapeError> {
    let url = parameters.url(endpoint);
    status_println!(
        "Requesting: minPrice={} firstRecord={}",
        parameters.get(crate::query::MIN_PRICE).unwrap_or("-"),
        parameters.get(crate::query::FIRST_RECORD).unwrap_or("-"),
    );
    debug_println!("GET {}", url);

    let response = transport.get(&url)?;
    if !response.is_success() {
        return Err(ScrapeError::Transport {
            status: response.status,
            url,
        });
    }

    let body: Value =
        serde_json::from_str(&response.body).map_err(|e| ScrapeError::Decode(e.to_string()))?;
    let page = parse_page(body);
    debug_println!("Page yielded {} raw listings", page.raw_count());
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SearchFilters;
    use serde_json::json;
    use std::cell::RefCell;

    struct FixedTransport {
        response: HttpResponse,
        urls: RefCell<Vec<String>>,
    }

    impl FixedTransport {
        fn new(status: u16, body: &str) -> Self {
            FixedTransport {
                response: HttpResponse { status, body: body.to_string() },
                urls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for FixedTransport {
        fn get(&self, url: &str) -> Result<HttpResponse, ScrapeError> {
            self.urls.borrow_mut().push(url.to_string());
            Ok(self.response.clone())
        }
    }

    fn params() -> QueryParameters {
        QueryParameters::from_filters(&SearchFilters::default())
    }

    #[test]
    fn returns_listings_as_delivered() {
        let transport = FixedTransport::new(200, r#"{"listings":[{"vin":"A"},{"vin":"B","extra":{"x":1}}]}"#);
        let page = fetch_listings(&transport, "http://api.test/listing", &params()).unwrap();

        let listings = page.into_listings();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[1].fields()["extra"], json!({"x": 1}));
        assert_eq!(transport.urls.borrow().len(), 1);
        assert!(transport.urls.borrow()[0].starts_with("http://api.test/listing?listingType=USED"));
    }

    #[test]
    fn bad_status_is_a_transport_error() {
        let transport = FixedTransport::new(403, "blocked");
        let err = fetch_listings(&transport, "http://api.test/listing", &params()).unwrap_err();

        assert!(matches!(err, ScrapeError::Transport { status: 403, .. }));
    }

    #[test]
    fn missing_listings_field_is_an_empty_page() {
        let transport = FixedTransport::new(200, r#"{"totalResultCount":0}"#);
        let page = fetch_listings(&transport, "http://api.test/listing", &params()).unwrap();

        assert_eq!(page, Page::Empty(EmptyPage::MissingListings));
        assert!(page.into_listings().is_empty());
    }

    #[test]
    fn malformed_shapes_are_empty_pages() {
        assert_eq!(parse_page(json!([1, 2, 3])), Page::Empty(EmptyPage::MissingListings));
        assert_eq!(parse_page(json!({"listings": {"vin": "A"}})), Page::Empty(EmptyPage::WrongShape));
        assert_eq!(parse_page(json!({"listings": null})), Page::Empty(EmptyPage::WrongShape));
        assert_eq!(parse_page(json!({"listings": []})), Page::Listings(Vec::new()));
    }

    #[test]
    fn non_json_body_is_a_decode_error() {
        let transport = FixedTransport::new(200, "<html>captcha</html>");
        let err = fetch_listings(&transport, "http://api.test/listing", &params()).unwrap_err();

        assert!(matches!(err, ScrapeError::Decode(_)));
    }
}
