//! CSV files in and out.
//!
//! Files are written as UTF-8 with a byte order mark so spreadsheet tools
//! pick the right encoding, and always carry a header row. Reading accepts
//! whatever earlier runs or hand edits left behind: see [`SourceEncoding`].

use encoding_rs::WINDOWS_1252;
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{CrawlError, CrawlResult};
use crate::models::{
    HostRecord, ListingRecord, MergedRecord, Row, HOST_COLUMNS, LISTING_COLUMNS, MERGED_COLUMNS,
};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

// ============================================================================
// Writing
// ============================================================================

pub fn write_listings(path: &Path, records: &[ListingRecord]) -> CrawlResult<()> {
    write_table(path, &LISTING_COLUMNS, records.iter().map(ListingRecord::to_row))
}

pub fn write_hosts(path: &Path, records: &[HostRecord]) -> CrawlResult<()> {
    write_table(path, &HOST_COLUMNS, records.iter().map(HostRecord::to_row))
}

pub fn write_merged(path: &Path, records: &[MergedRecord]) -> CrawlResult<()> {
    write_table(path, &MERGED_COLUMNS, records.iter().map(MergedRecord::to_row))
}

fn write_table<'r, R>(path: &Path, header: &[&str], rows: impl Iterator<Item = R>) -> CrawlResult<()>
where
    R: IntoIterator<Item = &'r str>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(header)?;
    let mut count = 0usize;
    for row in rows {
        writer.write_record(row)?;
        count += 1;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = count, "Saved CSV");
    Ok(())
}

// ============================================================================
// Reading
// ============================================================================

/// Encodings tried on read, in order. The first one whose decode and CSV
/// parse both succeed wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8Bom,
    Utf8,
    Latin1,
    Windows1252,
}

impl SourceEncoding {
    pub const ALL: [SourceEncoding; 4] = [
        SourceEncoding::Utf8Bom,
        SourceEncoding::Utf8,
        SourceEncoding::Latin1,
        SourceEncoding::Windows1252,
    ];

    pub fn decode(self, bytes: &[u8]) -> Option<Cow<'_, str>> {
        match self {
            SourceEncoding::Utf8Bom => {
                let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                std::str::from_utf8(body).ok().map(Cow::Borrowed)
            }
            SourceEncoding::Utf8 => std::str::from_utf8(bytes).ok().map(Cow::Borrowed),
            SourceEncoding::Latin1 => Some(encoding_rs::mem::decode_latin1(bytes)),
            SourceEncoding::Windows1252 => {
                WINDOWS_1252.decode_without_bom_handling_and_without_replacement(bytes)
            }
        }
    }
}

/// Rows keyed by header. Ragged rows are kept: extra cells are dropped and
/// missing ones are simply absent from the row.
fn parse_rows(text: &str) -> Result<Vec<Row>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();
    reader
        .records()
        .map(|record| {
            let record = record?;
            Ok(headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect())
        })
        .collect()
}

/// Rows of one CSV file, keyed by header.
pub fn read_table(path: &Path) -> CrawlResult<(Vec<Row>, SourceEncoding)> {
    let bytes = fs::read(path)?;
    for encoding in SourceEncoding::ALL {
        let Some(text) = encoding.decode(&bytes) else {
            debug!(path = %path.display(), ?encoding, "Decode failed");
            continue;
        };
        match parse_rows(&text) {
            Ok(rows) => return Ok((rows, encoding)),
            Err(e) => debug!(path = %path.display(), ?encoding, error = %e, "CSV parse failed"),
        }
    }
    Err(CrawlError::Encoding {
        path: path.to_path_buf(),
    })
}

/// Rows from several files plus the files that could not be read.
#[derive(Debug, Default)]
pub struct ReadReport {
    pub rows: Vec<Row>,
    pub unreadable: Vec<PathBuf>,
}

/// Read every file in order and concatenate the rows. A file that cannot be
/// read counts as empty and is listed in [`ReadReport::unreadable`].
pub fn read_tables<P: AsRef<Path>>(paths: &[P]) -> ReadReport {
    let mut report = ReadReport::default();
    for path in paths {
        let path = path.as_ref();
        match read_table(path) {
            Ok((rows, encoding)) => {
                info!(path = %path.display(), rows = rows.len(), ?encoding, "Read CSV");
                report.rows.extend(rows);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable file skipped");
                report.unreadable.push(path.to_path_buf());
            }
        }
    }
    report
}

pub fn read_listings<P: AsRef<Path>>(paths: &[P]) -> (Vec<ListingRecord>, Vec<PathBuf>) {
    let report = read_tables(paths);
    (report.rows.iter().map(ListingRecord::from_row).collect(), report.unreadable)
}

pub fn read_hosts<P: AsRef<Path>>(paths: &[P]) -> (Vec<HostRecord>, Vec<PathBuf>) {
    let report = read_tables(paths);
    (report.rows.iter().map(HostRecord::from_row).collect(), report.unreadable)
}
