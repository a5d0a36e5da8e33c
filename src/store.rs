use crate::flatten::FlatListing;
use crate::models::{ListingSet, VIN_FIELD};
use crate::{debug_println, status_println};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Counts reported after a store call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreSummary {
    pub previously_stored: usize,
    pub added: usize,
    pub total: usize,
}

/// Sink for the listings of a finished (or aborted) run.
pub trait ListingStore {
    fn store(&mut self, listings: &ListingSet) -> Result<StoreSummary>;
}

/// Flat rows plus the column order used when writing them out.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ListingTable {
    pub columns: Vec<String>,
    pub rows: Vec<FlatListing>,
}

impl ListingTable {
    /// Builds a table whose columns appear in first-seen order.
    pub fn from_rows(rows: Vec<FlatListing>) -> Self {
        let mut table = ListingTable::default();
        for row in &rows {
            table.add_columns(row);
        }
        table.rows = rows;
        table
    }

    fn add_columns(&mut self, row: &FlatListing) {
        for key in row.keys() {
            if !self.columns.iter().any(|c| c == key) {
                self.columns.push(key.clone());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn vins(&self) -> HashSet<&str> {
        self.rows.iter().filter_map(keyed_vin).collect()
    }
}

// Blank cells count as a missing VIN so they never collide with each other.
fn keyed_vin(row: &FlatListing) -> Option<&str> {
    row.get(VIN_FIELD).map(String::as_str).filter(|vin| !vin.trim().is_empty())
}

/// Outcome of [`merge_tables`].
#[derive(Debug, Clone, PartialEq)]
pub struct TableMerge {
    pub table: ListingTable,
    /// Incoming rows appended to the table.
    pub added: usize,
    /// Stored rows dropped because an earlier stored row had the same VIN.
    pub collapsed: usize,
}

/// Unions `incoming` into `existing` by VIN. Stored rows always win over
/// incoming rows with the same VIN, and the result holds each VIN once.
/// Rows without a VIN are kept as they are.
pub fn merge_tables(existing: ListingTable, incoming: Vec<FlatListing>) -> TableMerge {
    let stored = existing.len();
    let mut merged = existing;
    let mut seen = HashSet::new();
    merged
        .rows
        .retain(|row| keyed_vin(row).map_or(true, |vin| seen.insert(vin.to_string())));
    let collapsed = stored - merged.len();

    let fresh: Vec<FlatListing> = incoming
        .into_iter()
        .filter(|row| keyed_vin(row).map_or(true, |vin| seen.insert(vin.to_string())))
        .collect();
    for row in &fresh {
        merged.add_columns(row);
    }
    let added = fresh.len();
    merged.rows.extend(fresh);

    TableMerge {
        table: merged,
        added,
        collapsed,
    }
}

/// Listing table kept in a single CSV file.
pub struct CsvTableStore {
    path: PathBuf,
    backup: bool,
}

impl CsvTableStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CsvTableStore {
            path: path.into(),
            backup: true,
        }
    }

    pub fn without_backup(mut self) -> Self {
        self.backup = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when the table has never been written.
    pub fn load(&self) -> Result<Option<ListingTable>> {
        if !self.path.exists() {
            status_println!("Table does not exist yet: {}", self.path.display());
            return Ok(None);
        }
        load_table(&self.path).map(Some)
    }

    fn backup_existing(&self) -> Result<PathBuf> {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "listings.csv".to_string());
        let backup = self.path.with_file_name(format!("{}.{}.bak", file_name, stamp));
        std::fs::copy(&self.path, &backup)
            .with_context(|| format!("Failed to back up {} to {}", self.path.display(), backup.display()))?;
        Ok(backup)
    }
}

impl ListingStore for CsvTableStore {
    fn store(&mut self, listings: &ListingSet) -> Result<StoreSummary> {
        let incoming = listings.flatten_all();

        let (merge, previously_stored) = match self.load()? {
            None => (merge_tables(ListingTable::default(), incoming), 0),
            Some(existing) => {
                let before = existing.len();
                if self.backup {
                    let backup = self.backup_existing()?;
                    debug_println!("Backed up table to {}", backup.display());
                }
                (merge_tables(existing, incoming), before)
            }
        };

        status_println!("Storing listings. {} new", merge.added);
        if merge.collapsed > 0 {
            eprintln!(
                "Warning: dropped {} stored rows that repeated an earlier vin",
                merge.collapsed
            );
        }

        let table = merge.table;
        if table.is_empty() && previously_stored == 0 {
            status_println!("Nothing to store");
            return Ok(StoreSummary::default());
        }

        save_table(&table, &self.path)?;
        Ok(StoreSummary {
            previously_stored,
            added: merge.added,
            total: table.len(),
        })
    }
}

pub fn save_table(table: &ListingTable, output_path: &Path) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create output file: {}", output_path.display()))?;
    let mut writer = csv::Writer::from_writer(file);

    writer.write_record(&table.columns)?;
    for row in &table.rows {
        let record = table
            .columns
            .iter()
            .map(|column| row.get(column).map(String::as_str).unwrap_or(""));
        writer.write_record(record)?;
    }

    writer.flush()?;
    status_println!("Saved {} listings to {}", table.len(), output_path.display());
    Ok(())
}

pub fn load_table(input_path: &Path) -> Result<ListingTable> {
    let file = File::open(input_path)
        .with_context(|| format!("Failed to open input file: {}", input_path.display()))?;
    let mut reader = csv::Reader::from_reader(file);

    let columns: Vec<String> = reader
        .headers()
        .context("Failed to read table header")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.with_context(|| format!("Malformed row in {}", input_path.display()))?;
        let row: FlatListing = columns
            .iter()
            .cloned()
            .zip(record.iter().map(str::to_string))
            .collect();
        rows.push(row);
    }

    status_println!("Loaded {} listings from {}", rows.len(), input_path.display());
    Ok(ListingTable { columns, rows })
}
