use anyhow::{Context, Result};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};

use super::aggregator::ReportTable;
use super::render::table_cells;

// A4 landscape
const PAGE_W: f64 = 297.0;
const PAGE_H: f64 = 210.0;
const MARGIN: f64 = 10.0;
const NAME_COL: f64 = 45.0;
const LINE: f64 = 6.0;

/// Spreadsheet export: header, one line per employee, totals line.
pub fn to_csv(table: &ReportTable, currency: &str) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for line in table_cells(table, currency) {
        writer
            .write_record(&line)
            .context("failed to write csv record")?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush csv: {}", e))
}

/// PDF export with the same layout as the spreadsheet.
pub fn to_pdf(table: &ReportTable, currency: &str) -> Result<Vec<u8>> {
    let (doc, page, layer) =
        PdfDocument::new(&table.title, Mm(PAGE_W as f32), Mm(PAGE_H as f32), "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .context("failed to load Helvetica")?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .context("failed to load Helvetica-Bold")?;

    let cells = table_cells(table, currency);
    let value_cols = cells.first().map_or(1, |h| h.len().saturating_sub(1).max(1));
    let col_w = (PAGE_W - 2.0 * MARGIN - NAME_COL) / value_cols as f64;

    let mut current = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_H - MARGIN - LINE;

    current.use_text(table.title.as_str(), 14.0, Mm(MARGIN as f32), Mm(y as f32), &bold);
    y -= LINE * 2.0;

    let last = cells.len().saturating_sub(1);
    for (i, line) in cells.iter().enumerate() {
        if y < MARGIN {
            current = new_page(&doc);
            y = PAGE_H - MARGIN - LINE;
        }

        let face = if i == 0 || i == last { &bold } else { &font };
        write_row(&current, line, y, col_w, face);
        y -= LINE;
    }

    doc.save_to_bytes().context("failed to render pdf")
}

fn new_page(doc: &PdfDocumentReference) -> PdfLayerReference {
    let (page, layer) = doc.add_page(Mm(PAGE_W as f32), Mm(PAGE_H as f32), "Layer 1");
    doc.get_page(page).get_layer(layer)
}

fn write_row(layer: &PdfLayerReference, line: &[String], y: f64, col_w: f64, font: &IndirectFontRef) {
    for (col, text) in line.iter().enumerate() {
        let x = if col == 0 {
            MARGIN
        } else {
            MARGIN + NAME_COL + (col - 1) as f64 * col_w
        };
        layer.use_text(text.as_str(), 7.0, Mm(x as f32), Mm(y as f32), font);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{employee, payroll};
    use crate::reporting::aggregator::{Metric, monthly_table};
    use chrono::NaiveDate;

    fn table() -> ReportTable {
        let employees = vec![employee::sample(1), employee::sample(2)];
        let payrolls = vec![
            payroll::sample(1, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 160.0, 1500.0),
            payroll::sample(2, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(), 160.0, 2500.25),
        ];
        monthly_table(&employees, 2024, &payrolls, Metric::NetSalary)
    }

    #[test]
    fn csv_has_header_rows_and_totals() {
        let bytes = to_csv(&table(), "$").unwrap();
        let mut reader = csv::Reader::from_reader(bytes.as_slice());

        let header = reader.headers().unwrap().clone();
        assert_eq!(header.get(0), Some("Employee"));
        assert_eq!(header.get(1), Some("Jan"));
        assert_eq!(header.get(13), Some("Total"));

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].get(1), Some("$1,500.00"));
        assert_eq!(rows[0].get(2), Some("-"));
        assert_eq!(rows[2].get(0), Some("Total"));
        assert_eq!(rows[2].get(13), Some("$4,000.25"));
    }

    #[test]
    fn pdf_is_a_pdf() {
        let bytes = to_pdf(&table(), "$").unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_tables_spill_onto_more_pages() {
        let employees: Vec<_> = (1..=80).map(employee::sample).collect();
        let t = monthly_table(&employees, 2024, &[], Metric::Hours);

        let bytes = to_pdf(&t, "$").unwrap();
        assert!(bytes.len() > 1000);
    }
}
