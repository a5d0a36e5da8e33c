use anyhow::Result;
use autofinder::debug::{self, Verbosity};
use autofinder::fetcher::ReqwestTransport;
use autofinder::pagination::{run_scrape, ScrapeOptions};
use autofinder::query::{QueryParameters, SearchFilters, DEFAULT_ENDPOINT};
use autofinder::store::CsvTableStore;
use autofinder::tui::ScrapeTUI;
use clap::Parser;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Autofinder - used car listing scraper")]
struct Args {
    /// Path to the listings CSV table
    #[clap(short, long, default_value = "listings.csv")]
    output: String,

    /// Listing API endpoint
    #[clap(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// ZIP code the search radius is centred on
    #[clap(short, long)]
    zip: Option<String>,

    /// Make codes, e.g. HONDA,TOYOTA
    #[clap(long, value_delimiter = ',')]
    make: Vec<String>,

    /// Model codes
    #[clap(long, value_delimiter = ',')]
    model: Vec<String>,

    #[clap(long)]
    min_year: Option<u16>,

    #[clap(long)]
    max_year: Option<u16>,

    #[clap(long)]
    max_mileage: Option<u32>,

    #[clap(long)]
    min_price: Option<u32>,

    #[clap(long)]
    max_price: Option<u32>,

    /// Stop once this many unique listings are collected (if not set, run until the results run out)
    #[clap(short = 'n', long)]
    max_listings: Option<usize>,

    /// Base delay between requests in milliseconds
    #[clap(long, default_value = "500")]
    delay_ms: u64,

    /// Skip the confirmation prompt
    #[clap(short, long)]
    yes: bool,

    /// Only print warnings and the final summary
    #[clap(short, long, conflicts_with = "debug")]
    quiet: bool,

    /// Enable debug output
    #[clap(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    debug::init_from_env();
    if args.debug {
        debug::set_verbosity(Verbosity::Debug);
    } else if args.quiet {
        debug::set_verbosity(Verbosity::Quiet);
    }

    println!("Autofinder - used car listing scraper");
    println!("=====================================");

    let options = ScrapeOptions {
        endpoint: args.endpoint,
        filters: SearchFilters {
            zip_code: args.zip,
            make_codes: args.make,
            model_codes: args.model,
            min_year: args.min_year,
            max_year: args.max_year,
            max_mileage: args.max_mileage,
            min_price: args.min_price,
            max_price: args.max_price,
        },
        max_listings: args.max_listings,
        page_delay_ms: args.delay_ms,
        ..ScrapeOptions::default()
    };

    let mut tui = ScrapeTUI::new();
    tui.show_settings(&options.endpoint, &QueryParameters::from_filters(&options.filters))?;
    if !args.yes && !tui.confirm()? {
        println!("Cancelled.");
        return Ok(());
    }

    let transport = ReqwestTransport::new()?;
    let mut store = CsvTableStore::new(&args.output);
    let report = run_scrape(&transport, &mut store, &options, Some(&mut tui))?;

    println!("Total listings in table: {}", report.stored.total);
    println!("Saved to: {}", args.output);

    Ok(())
}
