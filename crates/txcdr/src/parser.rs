use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::fips::FipsLookup;
use crate::types::{DeathReportRecord, RawPage};
use crate::utils::{clean_text, convert_local_timestamp, timezone_for_county};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to parse record count: {0}")]
    RecordCount(String),
    #[error("Failed to parse last page number: {0}")]
    LastPage(String),
    #[error("Missing required element: {0}")]
    MissingElement(String),
    #[error("Malformed row {row} on page {page}: expected 9 cells, found {cells}")]
    MalformedRow {
        page: String,
        row: usize,
        cells: usize,
    },
    #[error("Malformed reference line {line}: expected 7 fields, found {fields}")]
    MalformedReference { line: usize, fields: usize },
}

/// Number of cells in a listing row.
pub const ROW_CELLS: usize = 9;

static RE_RECORD_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"of\s+([\d,]+)\s+entries").expect("invalid regex: record count")
});

static SEL_FIRST_SPAN: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span").expect("invalid selector: span"));

static SEL_PAGE_BUTTON: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a.paginate_button").expect("invalid selector: paginate_button")
});

static SEL_TBODY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tbody").expect("invalid selector: tbody"));

static SEL_ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("invalid selector: tr"));

static SEL_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("invalid selector: a[href]"));

fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

/// Parses the table summary, e.g. `Showing 1 to 10 of 1,234 entries`.
pub fn parse_record_count(info_text: &str) -> Result<u64, ParseError> {
    let caps = RE_RECORD_COUNT
        .captures(info_text)
        .ok_or_else(|| ParseError::RecordCount(info_text.trim().to_string()))?;

    caps[1]
        .replace(',', "")
        .parse()
        .map_err(|_| ParseError::RecordCount(caps[1].to_string()))
}

/// Reads the last page number from the pagination widget markup: the text of
/// the final page button inside the first `span`.
pub fn parse_last_page(pagination_html: &str) -> Result<u32, ParseError> {
    let fragment = Html::parse_fragment(pagination_html);

    let span = fragment
        .select(&SEL_FIRST_SPAN)
        .next()
        .ok_or_else(|| ParseError::MissingElement("pagination span".to_string()))?;

    let last_button = span
        .select(&SEL_PAGE_BUTTON)
        .last()
        .ok_or_else(|| ParseError::MissingElement("pagination button".to_string()))?;

    let text = clean_text(&elem_text(last_button));
    text.parse().map_err(|_| ParseError::LastPage(text))
}

/// Decodes every row of the first `tbody` in a saved page.
pub fn parse_page(
    page: &RawPage,
    fips: &FipsLookup,
) -> Result<Vec<DeathReportRecord>, ParseError> {
    // The saved markup is the inside of a <table>; without the wrapper the
    // HTML parser drops the row and cell tags.
    let html = if page.html.contains("<table") {
        page.html.clone()
    } else {
        format!("<table>{}</table>", page.html)
    };
    let document = Html::parse_document(&html);

    let tbody = document
        .select(&SEL_TBODY)
        .next()
        .ok_or_else(|| ParseError::MissingElement(format!("tbody on page {}", page.label)))?;

    tbody
        .select(&SEL_ROW)
        .enumerate()
        .map(|(index, row)| {
            decode_row(row, &page.label, index + 1).map(|cells| normalize_row(cells, fips))
        })
        .collect()
}

fn decode_row<'a>(
    row: ElementRef<'a>,
    page: &str,
    row_number: usize,
) -> Result<[ElementRef<'a>; ROW_CELLS], ParseError> {
    let cells: Vec<ElementRef> = row.children().filter_map(ElementRef::wrap).collect();
    let found = cells.len();

    cells.try_into().map_err(|_| ParseError::MalformedRow {
        page: page.to_string(),
        row: row_number,
        cells: found,
    })
}

fn pdf_link(name_cell: &ElementRef) -> String {
    name_cell
        .select(&SEL_LINK)
        .next()
        .and_then(|a| a.value().attr("href"))
        .map(|href| format!("{}{}", crate::BASE_URL, href))
        .unwrap_or_default()
}

fn normalize_row(cells: [ElementRef; ROW_CELLS], fips: &FipsLookup) -> DeathReportRecord {
    let report_pdf_link = pdf_link(&cells[4]);
    let [
        agency,
        county,
        tdcj_unit,
        cdr_number,
        name,
        death_datetime,
        report_datetime,
        version_type,
        version_no,
    ] = cells.map(|cell| clean_text(&elem_text(cell)));

    let tz = timezone_for_county(&county);

    let (death_date, death_datetime_utc) = match convert_local_timestamp(&death_datetime, tz) {
        Some(converted) => (converted.local_date, converted.utc),
        None => (String::new(), death_datetime),
    };

    let report_datetime_utc = convert_local_timestamp(&report_datetime, tz)
        .map(|converted| converted.utc)
        .unwrap_or(report_datetime);

    DeathReportRecord {
        county_fips: fips.code_for(&county),
        county,
        agency,
        tdcj_unit,
        cdr_number,
        name,
        report_pdf_link,
        death_date,
        death_datetime_utc,
        report_datetime_utc,
        version_type,
        version_no,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fixture_page(path: &str) -> RawPage {
        RawPage {
            label: path.to_string(),
            html: fs::read_to_string(path).expect("Failed to read fixture"),
        }
    }

    fn fips() -> FipsLookup {
        [
            ("EL PASO".to_string(), "48141".to_string()),
            ("HARRIS".to_string(), "48201".to_string()),
            ("TOM GREEN".to_string(), "48451".to_string()),
        ]
        .into_iter()
        .collect()
    }

    fn row_html(cells: &[&str]) -> String {
        let tds: String = cells.iter().map(|c| format!("<td>{}</td>", c)).collect();
        format!("<tbody><tr>{}</tr></tbody>", tds)
    }

    #[test]
    fn test_parse_record_count() {
        assert_eq!(
            parse_record_count("Showing 1 to 10 of 1,234 entries").expect("Should parse"),
            1234
        );
        assert_eq!(
            parse_record_count("Showing 1 to 10 of 87 entries").expect("Should parse"),
            87
        );
        assert_eq!(
            parse_record_count("Showing 1 to 10 of 12,345,678 entries\n").expect("Should parse"),
            12_345_678
        );
        assert!(matches!(
            parse_record_count("No data available"),
            Err(ParseError::RecordCount(_))
        ));
    }

    #[test]
    fn test_parse_last_page_from_fixture() {
        let html = fs::read_to_string("fixtures/pagination.html").expect("Failed to read fixture");
        assert_eq!(parse_last_page(&html).expect("Should parse"), 128);
    }

    #[test]
    fn test_parse_last_page_errors() {
        assert!(matches!(
            parse_last_page("<a class=\"paginate_button\">3</a>"),
            Err(ParseError::MissingElement(_))
        ));
        assert!(matches!(
            parse_last_page("<span><a class=\"paginate_button\">…</a></span>"),
            Err(ParseError::LastPage(_))
        ));
    }

    #[test]
    fn test_parse_page_from_fixture() {
        let page = fixture_page("fixtures/tx-cdr-reports-page-1.html");
        let records = parse_page(&page, &fips()).expect("Failed to parse page");

        assert_eq!(records.len(), 3);

        let first = &records[0];
        assert_eq!(first.agency, "Harris County Sheriff's Office");
        assert_eq!(first.county, "Harris");
        assert_eq!(first.county_fips, "48201");
        assert_eq!(first.tdcj_unit, "");
        assert_eq!(first.cdr_number, "CDR-2023-0101");
        assert_eq!(first.name, "John Q. Doe");
        assert_eq!(
            first.report_pdf_link,
            "https://oag.my.site.com/cdr/servlet/servlet.FileDownload?file=00P1"
        );
        assert_eq!(first.death_date, "2023-01-02");
        assert_eq!(first.death_datetime_utc, "2023-01-03T05:30");
        assert_eq!(first.report_datetime_utc, "2023-01-05T15:00");
        assert_eq!(first.version_type, "Original");
        assert_eq!(first.version_no, "1");

        let el_paso = &records[1];
        assert_eq!(el_paso.county, "El Paso");
        assert_eq!(el_paso.county_fips, "48141");
        assert_eq!(el_paso.tdcj_unit, "Sanchez State Jail");
        assert_eq!(el_paso.death_datetime_utc, "2023-07-03T05:30");
        assert_eq!(el_paso.report_pdf_link, "");

        let unparsed = &records[2];
        assert_eq!(unparsed.county, "Tom Green");
        assert_eq!(unparsed.county_fips, "48451");
        assert_eq!(unparsed.death_date, "");
        assert_eq!(unparsed.death_datetime_utc, "Unknown");
        assert_eq!(unparsed.report_datetime_utc, "");
    }

    #[test]
    fn test_unmatched_county_has_empty_fips() {
        let page = RawPage {
            label: "inline".to_string(),
            html: row_html(&[
                "Agency", "Gotham", "-", "CDR-1", "Jane", "-", "-", "Original", "1",
            ]),
        };
        let records = parse_page(&page, &fips()).expect("Failed to parse page");
        assert_eq!(records[0].county, "Gotham");
        assert_eq!(records[0].county_fips, "");
        assert_eq!(records[0].death_datetime_utc, "");
        assert_eq!(records[0].death_date, "");
    }

    #[test]
    fn test_malformed_row_reports_page_and_row() {
        let html = format!(
            "<tbody><tr>{}</tr><tr><td>only</td><td>two</td></tr></tbody>",
            "<td>x</td>".repeat(ROW_CELLS)
        );
        let page = RawPage {
            label: "tx-cdr-reports-page-4".to_string(),
            html,
        };

        let err = parse_page(&page, &fips()).expect_err("Should reject short row");
        match err {
            ParseError::MalformedRow { page, row, cells } => {
                assert_eq!(page, "tx-cdr-reports-page-4");
                assert_eq!(row, 2);
                assert_eq!(cells, 2);
            }
            other => panic!("Unexpected error: {other}"),
        }
    }

    #[test]
    fn test_page_without_tbody_fails() {
        for html in ["<p>No records</p>", ""] {
            let page = RawPage {
                label: "tx-cdr-reports-page-9".to_string(),
                html: html.to_string(),
            };
            let err = parse_page(&page, &fips()).expect_err("Should reject missing tbody");
            match err {
                ParseError::MissingElement(what) => {
                    assert_eq!(what, "tbody on page tx-cdr-reports-page-9");
                }
                other => panic!("Unexpected error: {other}"),
            }
        }
    }
}
