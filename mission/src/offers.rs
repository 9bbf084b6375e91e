//! Offer sources for the broker
//!
//! The broker loads its offer sequence once at startup. The CSV layout is
//! `loot,success_a,success_b,risk` with a header row; malformed rows are
//! skipped with a warning instead of failing the whole file.

use std::io::Read;
use std::path::{Path, PathBuf};

use shared_types::Offer;

#[derive(Debug, thiserror::Error)]
pub enum OfferSourceError {
    #[error("failed to read offers from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read offers: {0}")]
    Read(#[from] std::io::Error),
}

/// Yields the ordered offer sequence served to every requester
pub trait OfferSource: Send + Sync {
    fn load_offers(&self) -> Result<Vec<Offer>, OfferSourceError>;
}

/// CSV file on disk, re-read on every load
#[derive(Debug, Clone)]
pub struct CsvOfferSource {
    path: PathBuf,
}

impl CsvOfferSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OfferSource for CsvOfferSource {
    fn load_offers(&self) -> Result<Vec<Offer>, OfferSourceError> {
        let file = std::fs::File::open(&self.path).map_err(|source| OfferSourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        let offers = parse_offers(file)?;
        tracing::info!(path = %self.path.display(), offers = offers.len(), "Offers loaded");
        Ok(offers)
    }
}

/// Parse CSV offers from any reader; the first line is treated as the header
pub fn parse_offers(mut reader: impl Read) -> Result<Vec<Offer>, OfferSourceError> {
    let mut content = String::new();
    reader.read_to_string(&mut content)?;

    let mut offers = Vec::new();
    for (index, line) in content.lines().enumerate().skip(1) {
        let row = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        match parse_row(line) {
            Ok(offer) => offers.push(offer),
            Err(problem) => {
                tracing::warn!(row, line = %line, problem = %problem, "Skipping offer row");
            }
        }
    }
    Ok(offers)
}

fn parse_row(line: &str) -> Result<Offer, String> {
    let cells: Vec<&str> = line.split(',').map(str::trim).collect();
    if cells.len() < 4 {
        return Err(format!("expected 4 columns, found {}", cells.len()));
    }
    if let Some(column) = cells.iter().take(4).position(|cell| cell.is_empty()) {
        return Err(format!("column {} is empty", column + 1));
    }

    let loot: i64 = cells[0]
        .parse()
        .map_err(|_| format!("invalid loot '{}'", cells[0]))?;
    if loot < 0 {
        return Err(format!("loot {loot} is negative"));
    }

    Ok(Offer {
        loot,
        success_rate_a: percentage(cells[1], "success_a")?,
        success_rate_b: percentage(cells[2], "success_b")?,
        risk_factor: percentage(cells[3], "risk")?,
    })
}

fn percentage(cell: &str, column: &str) -> Result<u8, String> {
    let value: i64 = cell
        .parse()
        .map_err(|_| format!("invalid {column} '{cell}'"))?;
    u8::try_from(value)
        .ok()
        .filter(|value| *value <= 100)
        .ok_or_else(|| format!("{column} {value} is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_valid_rows_in_order() {
        let csv = "loot,success_a,success_b,risk\n50000,70,40,30\n120000,20,90,85\n";
        let offers = parse_offers(csv.as_bytes()).unwrap();
        assert_eq!(
            offers,
            vec![
                Offer {
                    loot: 50_000,
                    success_rate_a: 70,
                    success_rate_b: 40,
                    risk_factor: 30,
                },
                Offer {
                    loot: 120_000,
                    success_rate_a: 20,
                    success_rate_b: 90,
                    risk_factor: 85,
                },
            ]
        );
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let csv = "loot,success_a,success_b,risk\n\
                   10000,,40,30\n\
                   abc,50,50,50\n\
                   -5,50,50,50\n\
                   20000,101,50,50\n\
                   30000,50,50\n\
                   40000, 60 ,70,10\n";
        let offers = parse_offers(csv.as_bytes()).unwrap();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].loot, 40_000);
        assert_eq!(offers[0].success_rate_a, 60);
    }

    #[test]
    fn test_header_only_yields_empty_sequence() {
        let offers = parse_offers("loot,success_a,success_b,risk\n".as_bytes()).unwrap();
        assert!(offers.is_empty());
    }

    #[test]
    fn test_csv_source_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "loot,success_a,success_b,risk").unwrap();
        writeln!(file, "75000,55,45,20").unwrap();

        let source = CsvOfferSource::new(file.path());
        let offers = source.load_offers().unwrap();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].risk_factor, 20);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let source = CsvOfferSource::new("/definitely/not/here/offers.csv");
        assert!(matches!(
            source.load_offers(),
            Err(OfferSourceError::Io { .. })
        ));
    }
}
