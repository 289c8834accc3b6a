//! Excel export.

use rust_xlsxwriter::Workbook;

use crate::{pipeline::RecognitionResult, prelude::*};

use super::format_confidence;

/// The worksheet name.
const SHEET_NAME: &str = "OCR Sonuçları";

/// Column headers, in order.
const HEADERS: [&str; 3] = ["Dosya Adı", "Güven Skoru", "Metin"];

/// The most characters Excel allows in a single cell.
const MAX_CELL_CHARS: usize = 32_767;

/// Encode results as an `.xlsx` workbook with one row per result.
pub fn encode(results: &[RecognitionResult]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, header) in HEADERS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }
    worksheet.set_column_width(0, 30)?;
    worksheet.set_column_width(1, 14)?;
    worksheet.set_column_width(2, 80)?;

    for (idx, result) in results.iter().enumerate() {
        let row = u32::try_from(idx + 1).context("too many results for a worksheet")?;
        worksheet.write_string(row, 0, &result.file_name)?;
        worksheet.write_string(row, 1, format_confidence(result.confidence))?;
        worksheet.write_string(row, 2, truncate_for_cell(&result.file_name, &result.text))?;
    }

    workbook
        .save_to_buffer()
        .context("failed to build Excel workbook")
}

/// Cut `text` down to what fits in one cell.
fn truncate_for_cell<'a>(file_name: &str, text: &'a str) -> &'a str {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((byte_idx, _)) => {
            warn!(
                file_name = %file_name,
                "Text is too long for a spreadsheet cell, truncating to {} characters",
                MAX_CELL_CHARS,
            );
            &text[..byte_idx]
        }
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::testing::{read_zip_entry, sample_results};

    #[test]
    fn test_rows_contain_name_confidence_and_text() {
        let bytes = encode(&sample_results()).unwrap();

        let strings = read_zip_entry(&bytes, "xl/sharedStrings.xml");
        for expected in [
            "Dosya Adı",
            "Güven Skoru",
            "Metin",
            "a.png",
            "92.3%",
            "Merhaba",
            "b.png",
            "81.0%",
            "World",
        ] {
            assert!(strings.contains(expected), "missing {:?}", expected);
        }

        // A header row and two data rows.
        let sheet = read_zip_entry(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(r#"<row r="3""#));
        assert!(!sheet.contains(r#"<row r="4""#));

        let workbook = read_zip_entry(&bytes, "xl/workbook.xml");
        assert!(workbook.contains("OCR Sonuçları"));
    }

    #[test]
    fn test_empty_results_have_only_headers() {
        let bytes = encode(&[]).unwrap();
        let sheet = read_zip_entry(&bytes, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains(r#"<row r="1""#));
        assert!(!sheet.contains(r#"<row r="2""#));
    }

    #[test]
    fn test_truncate_for_cell() {
        assert_eq!(truncate_for_cell("a.png", "kısa"), "kısa");

        let long = "ş".repeat(MAX_CELL_CHARS + 10);
        let truncated = truncate_for_cell("a.png", &long);
        assert_eq!(truncated.chars().count(), MAX_CELL_CHARS);
    }
}
