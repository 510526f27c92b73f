use std::fmt::Display;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CSV_HEADERS: [&str; 12] = [
    "county",
    "county_fips",
    "agency",
    "tdcj_unit",
    "cdr_number",
    "name",
    "report_pdf_link",
    "death_date",
    "death_datetime_utc",
    "report_datetime_utc",
    "version_type",
    "version_no",
];

/// One page of the listing table as saved by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// Label used in error messages, normally the file stem.
    pub label: String,
    pub html: String,
}

impl RawPage {
    pub fn file_name(page_number: u32) -> String {
        format!("tx-cdr-reports-page-{}.html", page_number)
    }

    pub fn path_in(dir: &Path, page_number: u32) -> PathBuf {
        dir.join(Self::file_name(page_number))
    }
}

/// A normalized row of the output dataset. Field order is the CSV column order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathReportRecord {
    pub county: String,
    pub county_fips: String,
    pub agency: String,
    pub tdcj_unit: String,
    pub cdr_number: String,
    pub name: String,
    pub report_pdf_link: String,
    pub death_date: String,
    pub death_datetime_utc: String,
    pub report_datetime_utc: String,
    pub version_type: String,
    pub version_no: String,
}

impl Display for DeathReportRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.cdr_number, self.name)?;
        if !self.county.is_empty() {
            write!(f, ", {} County", self.county)?;
        }
        if !self.death_datetime_utc.is_empty() {
            write!(f, " ({})", self.death_datetime_utc)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_file_name_embeds_number() {
        assert_eq!(RawPage::file_name(7), "tx-cdr-reports-page-7.html");
        assert_eq!(
            RawPage::path_in(Path::new("pages"), 12),
            PathBuf::from("pages/tx-cdr-reports-page-12.html")
        );
    }

    #[test]
    fn test_headers_match_record_fields() {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .serialize(DeathReportRecord::default())
            .expect("Failed to serialize record");
        let bytes = writer.into_inner().expect("Failed to flush writer");
        let text = String::from_utf8(bytes).expect("CSV should be UTF-8");
        let header_line = text.lines().next().expect("Header line missing");
        assert_eq!(header_line, CSV_HEADERS.join(","));
    }

    #[test]
    fn test_record_display() {
        let record = DeathReportRecord {
            cdr_number: "CDR-2023-0101".to_string(),
            name: "John Q. Doe".to_string(),
            county: "Harris".to_string(),
            death_datetime_utc: "2023-01-03T05:30".to_string(),
            ..Default::default()
        };
        assert_eq!(
            record.to_string(),
            "[CDR-2023-0101] John Q. Doe, Harris County (2023-01-03T05:30)"
        );

        let bare = DeathReportRecord {
            cdr_number: "CDR-1".to_string(),
            name: "Jane".to_string(),
            ..Default::default()
        };
        assert_eq!(bare.to_string(), "[CDR-1] Jane");
    }
}
