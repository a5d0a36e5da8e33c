use crate::error::ScrapeError;
use crate::fetcher::{fetch_listings, Page, Transport};
use crate::models::ListingSet;
use crate::query::{QueryParameters, SearchFilters, DEFAULT_ENDPOINT, FIRST_RECORD, MIN_PRICE, PAGE_SIZE};
use crate::store::{ListingStore, StoreSummary};
use crate::tui::ScrapeTUI;
use crate::{debug_eprintln, debug_println, status_println};
use rand::Rng;
use std::collections::BTreeSet;
use std::io;
use std::time::Duration;

/// Offset pages requested before switching to a price cursor.
pub const OFFSET_PAGE_LIMIT: usize = 8;
/// Floor used when the collected prices cannot place a cursor.
pub const PRICE_FLOOR_SENTINEL: i64 = 1_000_000_000_000;
/// Empty pages in a row tolerated before the run is abandoned.
pub const MAX_CONSECUTIVE_EMPTY_PAGES: usize = 5;

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub endpoint: String,
    pub filters: SearchFilters,
    pub max_listings: Option<usize>,
    pub page_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            filters: SearchFilters::default(),
            max_listings: None,
            page_delay_ms: 500,
            jitter_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMode {
    Offset { first_record: usize },
    Cursor { min_price: i64 },
}

/// Tracks which page comes next and rewrites the cursor fields to match.
#[derive(Debug, Clone)]
pub struct Paginator {
    parameters: QueryParameters,
    page: usize,
    cursor_switches: usize,
}

impl Paginator {
    pub fn new(base: QueryParameters) -> Self {
        Paginator {
            parameters: base,
            page: 0,
            cursor_switches: 0,
        }
    }

    /// Prepares the parameters for the next request. Past the offset limit
    /// the offset is dropped in favour of a price floor derived from `seen`
    /// and the page counter starts over.
    pub fn prepare(&mut self, seen: &ListingSet) -> PageMode {
        if self.page > OFFSET_PAGE_LIMIT {
            self.parameters.remove(FIRST_RECORD);
            let min_price = next_price_floor(seen);
            self.parameters.set(MIN_PRICE, min_price.to_string());
            self.page = 0;
            self.cursor_switches += 1;
            PageMode::Cursor { min_price }
        } else {
            let first_record = self.page * PAGE_SIZE;
            self.parameters.set(FIRST_RECORD, first_record.to_string());
            PageMode::Offset { first_record }
        }
    }

    pub fn advance(&mut self) {
        self.page += 1;
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn cursor_switches(&self) -> usize {
        self.cursor_switches
    }

    pub fn parameters(&self) -> &QueryParameters {
        &self.parameters
    }
}

/// Results arrive sorted by ascending price, so restarting just above the
/// second-highest price continues the listing without losing ties at the top
/// price.
pub fn next_price_floor(seen: &ListingSet) -> i64 {
    let prices: BTreeSet<i64> = seen.iter().filter_map(|l| l.price()).collect();
    match prices.iter().rev().nth(1) {
        Some(second_highest) => second_highest + 1,
        None => PRICE_FLOOR_SENTINEL,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeReport {
    pub requests: usize,
    pub listings: usize,
    pub cursor_switches: usize,
    pub stored: StoreSummary,
}

#[derive(Debug, Default)]
struct RunStats {
    requests: usize,
    cursor_switches: usize,
}

/// Runs the paginated scrape and hands everything collected to `store`,
/// whether the run finished or aborted.
pub fn run_scrape<T, S>(
    transport: &T,
    store: &mut S,
    options: &ScrapeOptions,
    mut tui: Option<&mut ScrapeTUI>,
) -> Result<ScrapeReport, ScrapeError>
where
    T: Transport + ?Sized,
    S: ListingStore + ?Sized,
{
    let mut listings = ListingSet::new();
    let mut stats = RunStats::default();

    let outcome = paginate(transport, options, &mut listings, &mut stats, tui.as_deref_mut());

    status_println!("Flushing {} listings", listings.len());
    let stored = store.store(&listings);

    match (outcome, stored) {
        (Ok(()), Ok(stored)) => {
            let report = ScrapeReport {
                requests: stats.requests,
                listings: listings.len(),
                cursor_switches: stats.cursor_switches,
                stored,
            };
            if let Some(tui) = tui.as_mut() {
                terminal(tui.show_summary(&report));
            }
            Ok(report)
        }
        (Ok(()), Err(e)) => Err(ScrapeError::Store(format!("{:#}", e))),
        (Err(e), stored) => {
            if let Err(store_err) = stored {
                eprintln!("Failed to store listings after abort: {:#}", store_err);
            }
            if let Some(tui) = tui.as_mut() {
                terminal(tui.show_abort(&e, listings.len()));
            }
            Err(e)
        }
    }
}

fn paginate<T: Transport + ?Sized>(
    transport: &T,
    options: &ScrapeOptions,
    listings: &mut ListingSet,
    stats: &mut RunStats,
    mut tui: Option<&mut ScrapeTUI>,
) -> Result<(), ScrapeError> {
    let mut paginator = Paginator::new(QueryParameters::from_filters(&options.filters));
    let mut consecutive_empty = 0;

    while options.max_listings.map_or(true, |max| listings.len() < max) {
        if stats.requests > 0 {
            polite_delay(options);
        }

        let mode = paginator.prepare(listings);
        stats.cursor_switches = paginator.cursor_switches();
        if let (PageMode::Cursor { min_price }, Some(tui)) = (mode, tui.as_mut()) {
            terminal(tui.cursor_switch(min_price));
        }

        let page = fetch_listings(transport, &options.endpoint, paginator.parameters())?;
        stats.requests += 1;
        let first_request = stats.requests == 1;

        match page {
            Page::Empty(reason) => {
                if first_request {
                    return Err(ScrapeError::NoListings);
                }
                consecutive_empty += 1;
                debug_eprintln!("Empty page ({:?}), {} in a row", reason, consecutive_empty);
                if consecutive_empty >= MAX_CONSECUTIVE_EMPTY_PAGES {
                    return Err(ScrapeError::EmptyPages {
                        count: consecutive_empty,
                        accumulated: listings.len(),
                    });
                }
            }
            Page::Listings(raw) => {
                consecutive_empty = 0;
                if raw.is_empty() && first_request {
                    return Err(ScrapeError::NoListings);
                }
                let merged = listings.merge(raw);
                debug_println!(
                    "Merged page: {} new, {} duplicate, {} without vin",
                    merged.added, merged.duplicates, merged.missing_vin
                );
                if merged.missing_vin > 0 {
                    eprintln!("Warning: skipped {} listings without a vin", merged.missing_vin);
                }
                if merged.added == 0 {
                    return Err(ScrapeError::Stalled { accumulated: listings.len() });
                }
                if let Some(tui) = tui.as_mut() {
                    terminal(tui.page_done(stats.requests, merged.added, listings.len(), options.max_listings));
                }
            }
        }

        paginator.advance();
    }

    status_println!("Reached {} listings", listings.len());
    Ok(())
}

fn polite_delay(options: &ScrapeOptions) {
    let jitter = if options.jitter_ms > 0 {
        rand::thread_rng().gen_range(0..=options.jitter_ms)
    } else {
        0
    };
    let delay = options.page_delay_ms + jitter;
    if delay > 0 {
        std::thread::sleep(Duration::from_millis(delay));
    }
}

fn terminal(result: io::Result<()>) {
    if let Err(e) = result {
        debug_eprintln!("Terminal update failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Listing;
    use serde_json::json;

    fn priced(vin: &str, price: serde_json::Value) -> Listing {
        Listing::from_value(json!({"vin": vin, "pricingDetail": price})).unwrap()
    }

    #[test]
    fn price_floor_is_one_above_second_highest_distinct_price() {
        let mut seen = ListingSet::new();
        seen.merge(vec![
            priced("A", json!({"salePrice": 10000})),
            priced("B", json!(12000)),
            priced("C", json!({"salePrice": 12000})),
            priced("D", json!(15000)),
        ]);

        assert_eq!(next_price_floor(&seen), 12001);
    }

    #[test]
    fn price_floor_falls_back_to_sentinel() {
        let mut seen = ListingSet::new();
        assert_eq!(next_price_floor(&seen), PRICE_FLOOR_SENTINEL);

        seen.merge(vec![priced("A", json!(9000)), priced("B", json!({"salePrice": 9000}))]);
        assert_eq!(next_price_floor(&seen), PRICE_FLOOR_SENTINEL);
    }

    #[test]
    fn switches_to_price_cursor_after_offset_limit() {
        let mut seen = ListingSet::new();
        seen.merge(vec![priced("A", json!(100)), priced("B", json!(200)), priced("C", json!(300))]);
        let mut paginator = Paginator::new(QueryParameters::from_filters(&SearchFilters::default()));

        for page in 0..=OFFSET_PAGE_LIMIT {
            let mode = paginator.prepare(&seen);
            assert_eq!(mode, PageMode::Offset { first_record: page * 100 });
            assert_eq!(paginator.parameters().get(FIRST_RECORD), Some((page * 100).to_string().as_str()));
            assert_eq!(paginator.parameters().get(MIN_PRICE), None);
            paginator.advance();
        }

        assert_eq!(paginator.prepare(&seen), PageMode::Cursor { min_price: 201 });
        assert_eq!(paginator.parameters().get(FIRST_RECORD), None);
        assert_eq!(paginator.parameters().get(MIN_PRICE), Some("201"));
        assert_eq!(paginator.page(), 0);
        assert_eq!(paginator.cursor_switches(), 1);

        paginator.advance();
        assert_eq!(paginator.prepare(&seen), PageMode::Offset { first_record: 100 });
        assert_eq!(paginator.parameters().get(MIN_PRICE), Some("201"));
    }
}
