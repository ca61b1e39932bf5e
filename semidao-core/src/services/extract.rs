//! Bill table extraction
//!
//! Turns the bills page into `BillRecord`s. Each `<tr>` under
//! `table#billTable > tbody` is one bill: first cell the date, second the
//! reference, third the amount, and the first `<a>` in the row links the
//! document.

use std::sync::Arc;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::domain::result::Error;
use crate::domain::{BillRecord, RawBillRow};
use crate::ports::LogSink;

static BILL_TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table#billTable > tbody").expect("valid bill table selector"));
static TR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("valid tr selector"));
static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("valid anchor selector"));

/// Bills found on one page, with the rows that could not be used
#[derive(Debug, Default)]
pub struct ExtractionResult {
    /// Valid bills in page order
    pub bills: Vec<BillRecord>,
    pub skipped_without_url: usize,
    pub rejected: usize,
    pub warnings: Vec<String>,
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect::<String>()
}

/// Read the raw cells of every row in the bill table
///
/// Missing cells come back as empty strings; a page without the table
/// yields no rows.
pub fn extract_rows(html: &str) -> Vec<RawBillRow> {
    let document = Html::parse_document(html);
    let mut rows = Vec::new();

    for body in document.select(&BILL_TABLE_SELECTOR) {
        for tr in body.select(&TR_SELECTOR) {
            let cells: Vec<String> = tr
                .children()
                .filter_map(ElementRef::wrap)
                .map(|cell| cell_text(&cell))
                .collect();

            // Only the first anchor counts, even when it has no href
            let href = tr
                .select(&ANCHOR_SELECTOR)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string);

            rows.push(RawBillRow {
                date_text: cells.first().cloned().unwrap_or_default(),
                reference_text: cells.get(1).cloned().unwrap_or_default(),
                amount_text: cells.get(2).cloned().unwrap_or_default(),
                document_href: href,
            });
        }
    }

    rows
}

/// Builds bill records from the bills page markup
pub struct BillExtractor {
    base_url: String,
    log: Arc<dyn LogSink>,
}

impl BillExtractor {
    pub fn new(base_url: impl Into<String>, log: Arc<dyn LogSink>) -> Self {
        Self {
            base_url: base_url.into(),
            log,
        }
    }

    /// Extract every valid bill from `html`
    ///
    /// Absent or empty markup is not an error: it logs "No new bills to
    /// import" and returns nothing. Rows without a document link and rows
    /// whose amount or date does not parse are left out with a warning.
    pub fn extract(&self, html: Option<&str>) -> ExtractionResult {
        let mut result = ExtractionResult::default();

        let html = match html {
            Some(h) if !h.trim().is_empty() => h,
            _ => {
                self.log.info("No new bills to import");
                return result;
            }
        };

        let rows = extract_rows(html);
        if rows.is_empty() {
            self.log.info("No new bills to import");
            return result;
        }

        for (index, row) in rows.iter().enumerate() {
            self.log.debug(&format!(
                "Bill row {}: {} | {} | {}",
                index + 1,
                row.date_text.trim(),
                row.reference_text.trim(),
                row.amount_text.trim()
            ));

            match BillRecord::from_raw(row, &self.base_url) {
                Ok(bill) => result.bills.push(bill),
                Err(Error::Validation(reason)) => {
                    let message = format!("Row {} ignored: {}", index + 1, reason);
                    self.log.warning(&message);
                    if row.document_href().is_none() {
                        result.skipped_without_url += 1;
                    } else {
                        result.rejected += 1;
                    }
                    result.warnings.push(message);
                }
                Err(other) => {
                    let message = format!("Row {} ignored: {}", index + 1, other);
                    self.log.warning(&message);
                    result.rejected += 1;
                    result.warnings.push(message);
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::adapters::log_sink::MemoryLogSink;
    use crate::adapters::portal_mock::bills_page;
    use crate::ports::LogLevel;

    const BASE: &str = "http://agence-en-ligne.semidao.fr/wp/";

    fn extractor() -> (Arc<MemoryLogSink>, BillExtractor) {
        let log = Arc::new(MemoryLogSink::new());
        (log.clone(), BillExtractor::new(BASE, log))
    }

    #[test]
    fn test_single_row_example() {
        let (_log, extractor) = extractor();
        let html = bills_page(&[("05/03/2021", "F-2021-03", "42.50", Some("/docs/123.pdf"))]);

        let result = extractor.extract(Some(&html));

        assert_eq!(result.bills.len(), 1);
        let bill = &result.bills[0];
        assert_eq!(bill.amount, Decimal::new(4250, 2));
        assert_eq!(bill.date, NaiveDate::from_ymd_opt(2021, 3, 5).unwrap());
        assert_eq!(bill.vendor, "Semidao");
        assert_eq!(
            bill.document_url,
            "http://agence-en-ligne.semidao.fr/wp//docs/123.pdf"
        );
    }

    #[test]
    fn test_rows_without_link_are_skipped_in_order() {
        let (log, extractor) = extractor();
        let html = bills_page(&[
            ("01/01/2021", "A", "10.00", Some("/docs/a.pdf")),
            ("01/02/2021", "B", "20.00", None),
            ("01/03/2021", "C", "30.00", Some("/docs/c.pdf")),
            ("01/04/2021", "D", "40.00", Some("")),
        ]);

        let result = extractor.extract(Some(&html));

        let refs: Vec<&str> = result.bills.iter().map(|b| b.reference.as_str()).collect();
        assert_eq!(refs, vec!["A", "C"]);
        assert_eq!(result.skipped_without_url, 2);
        assert_eq!(result.rejected, 0);
        assert_eq!(log.messages_at(LogLevel::Warning).len(), 2);
    }

    #[test]
    fn test_unparseable_rows_are_rejected() {
        let (_log, extractor) = extractor();
        let html = bills_page(&[
            ("2021-03-05", "bad date", "42.50", Some("/docs/1.pdf")),
            ("05/03/2021", "bad amount", "EUR 42.50", Some("/docs/2.pdf")),
            ("06/03/2021", "ok", "7", Some("/docs/3.pdf")),
        ]);

        let result = extractor.extract(Some(&html));

        assert_eq!(result.bills.len(), 1);
        assert_eq!(result.bills[0].reference, "ok");
        assert_eq!(result.rejected, 2);
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_empty_or_absent_markup() {
        for html in [None, Some(""), Some("   \n")] {
            let (log, extractor) = extractor();
            let result = extractor.extract(html);
            assert!(result.bills.is_empty());
            assert_eq!(log.messages_at(LogLevel::Info), vec!["No new bills to import"]);
        }
    }

    #[test]
    fn test_page_without_table_yields_nothing() {
        let (log, extractor) = extractor();
        let result = extractor.extract(Some("<html><body><p>Session expired</p></body></html>"));
        assert!(result.bills.is_empty());
        assert!(log.contains("No new bills to import"));
    }

    #[test]
    fn test_extract_rows_ignores_other_tables() {
        let html = r#"<html><body>
            <table id="other"><tbody><tr><td>01/01/2020</td><td>X</td><td>1</td><td><a href="/x">x</a></td></tr></tbody></table>
            <table id="billTable"><tbody>
              <tr><td> 02/02/2020 </td><td> R1 </td><td> 12.30 </td><td><a href="/d/1.pdf">PDF</a><a href="/d/other">b</a></td></tr>
            </tbody></table>
        </body></html>"#;

        let rows = extract_rows(html);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date_text.trim(), "02/02/2020");
        assert_eq!(rows[0].document_href.as_deref(), Some("/d/1.pdf"));
    }

    #[test]
    fn test_currency_suffix_is_ignored() {
        let (_log, extractor) = extractor();
        let html = bills_page(&[
            ("05/03/2021", "F-1", "42.50 €", Some("/docs/1.pdf")),
            ("05/04/2021", "F-2", "42.50EUR", Some("/docs/2.pdf")),
        ]);

        let result = extractor.extract(Some(&html));

        assert_eq!(result.rejected, 0);
        assert_eq!(result.bills.len(), 2);
        assert!(result.bills.iter().all(|b| b.amount == Decimal::new(4250, 2)));
    }

    #[test]
    fn test_first_anchor_without_href_skips_row() {
        let (log, extractor) = extractor();
        let html = r#"<table id="billTable"><tbody>
            <tr><td>05/03/2021</td><td>F-1</td><td>42.50</td><td><a name="top">x</a><a href="/d/1.pdf">PDF</a></td></tr>
        </tbody></table>"#;

        let rows = extract_rows(html);
        assert_eq!(rows[0].document_href, None);

        let result = extractor.extract(Some(html));
        assert!(result.bills.is_empty());
        assert_eq!(result.skipped_without_url, 1);
        assert_eq!(log.messages_at(LogLevel::Warning).len(), 1);
    }

    #[test]
    fn test_short_rows_are_rejected_not_panicking() {
        let (_log, extractor) = extractor();
        let html = r#"<table id="billTable"><tbody><tr><td><a href="/d.pdf">only</a></td></tr></tbody></table>"#;
        let result = extractor.extract(Some(html));
        assert!(result.bills.is_empty());
        assert_eq!(result.rejected, 1);
    }
}
