use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::fips::FipsLookup;
use crate::parser::{ParseError, parse_page};
use crate::types::{CSV_HEADERS, DeathReportRecord, RawPage};
use crate::utils::sort_records;

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> NormalizeError + '_ {
    move |source| NormalizeError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Loads every `*.html` file in `dir`, in path order.
pub fn read_pages(dir: &Path) -> Result<Vec<RawPage>, NormalizeError> {
    let mut paths = fs::read_dir(dir)
        .map_err(io_error(dir))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_error(dir))?;

    paths.retain(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "html"));
    paths.sort();

    paths
        .into_iter()
        .map(|path| -> Result<RawPage, NormalizeError> {
            let html = fs::read_to_string(&path).map_err(io_error(&path))?;
            let label = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            log::debug!("Read {} ({} bytes)", path.display(), html.len());
            Ok(RawPage { label, html })
        })
        .collect()
}

/// Decodes all pages and returns the records in output order.
pub fn normalize_pages(
    pages: &[RawPage],
    fips: &FipsLookup,
) -> Result<Vec<DeathReportRecord>, ParseError> {
    let mut records = Vec::new();
    for page in pages {
        let parsed = parse_page(page, fips)?;
        log::debug!("Parsed {} record(s) from {}", parsed.len(), page.label);
        for record in &parsed {
            log::trace!("{}", record);
        }
        records.extend(parsed);
    }

    let unmatched = records.iter().filter(|r| r.county_fips.is_empty()).count();
    if unmatched > 0 {
        log::info!("{} record(s) have no FIPS match for their county", unmatched);
    }

    sort_records(&mut records);
    Ok(records)
}

/// Writes the header row followed by one row per record.
pub fn write_records<W: Write>(
    writer: W,
    records: &[DeathReportRecord],
) -> Result<(), NormalizeError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    csv_writer.write_record(CSV_HEADERS)?;
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Reads the saved pages in `pages_dir` and writes the dataset to `output`,
/// replacing any existing file. Returns the number of records written.
pub fn normalize_dir(
    pages_dir: &Path,
    output: &Path,
    fips: &FipsLookup,
) -> Result<usize, NormalizeError> {
    let pages = read_pages(pages_dir)?;
    log::info!(
        "Normalizing {} page file(s) from {}",
        pages.len(),
        pages_dir.display()
    );

    let records = normalize_pages(&pages, fips)?;

    let file = fs::File::create(output).map_err(io_error(output))?;
    write_records(file, &records)?;

    log::info!("Wrote file: {} ({} records)", output.display(), records.len());
    Ok(records.len())
}
