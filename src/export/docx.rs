//! Word export.
//!
//! A `.docx` file is a zip archive of WordprocessingML parts. We only need a
//! handful of paragraphs, so we write the XML ourselves.

use std::io::{Cursor, Write as _};

use quick_xml::escape::escape;
use zip::{ZipWriter, write::SimpleFileOptions};

use crate::{pipeline::RecognitionResult, prelude::*};

use super::format_confidence;

/// The title at the top of the document.
const TITLE: &str = "IŞIL OCR Sonuçları";

/// The line drawn between results.
const SEPARATOR: &str = "────────────────────────────────────────";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
<Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/>
</Types>"#;

const PACKAGE_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

const DOCUMENT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#;

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
<w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>
<w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:outlineLvl w:val="0"/></w:pPr></w:style>
<w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:next w:val="Normal"/><w:qFormat/><w:pPr><w:keepNext/><w:outlineLvl w:val="1"/></w:pPr></w:style>
</w:styles>"#;

/// Formatting for a single run of text. Sizes are in half-points, as Word
/// stores them.
#[derive(Default)]
struct RunStyle {
    bold: bool,
    italic: bool,
    size: Option<u32>,
    color: Option<&'static str>,
}

/// Encode results as a `.docx` document.
pub fn encode(results: &[RecognitionResult]) -> Result<Vec<u8>> {
    let document = document_xml(results);

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, contents) in [
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("_rels/.rels", PACKAGE_RELS_XML),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS_XML),
        ("word/styles.xml", STYLES_XML),
        ("word/document.xml", document.as_str()),
    ] {
        zip.start_file(name, options)
            .with_context(|| format!("failed to start {} in Word archive", name))?;
        zip.write_all(contents.as_bytes())
            .with_context(|| format!("failed to write {} to Word archive", name))?;
    }
    let cursor = zip.finish().context("failed to finish Word archive")?;
    Ok(cursor.into_inner())
}

/// Build the main document part.
fn document_xml(results: &[RecognitionResult]) -> String {
    let mut body = String::new();
    body.push_str(&paragraph(
        Some("Heading1"),
        400,
        TITLE,
        &RunStyle {
            bold: true,
            size: Some(48),
            ..RunStyle::default()
        },
    ));

    for (idx, result) in results.iter().enumerate() {
        body.push_str(&paragraph(
            Some("Heading2"),
            200,
            &format!("Dosya: {}", result.file_name),
            &RunStyle {
                bold: true,
                size: Some(32),
                ..RunStyle::default()
            },
        ));
        body.push_str(&paragraph(
            None,
            200,
            &format!("Güven Skoru: {}", format_confidence(result.confidence)),
            &RunStyle {
                italic: true,
                size: Some(24),
                ..RunStyle::default()
            },
        ));
        body.push_str(&paragraph(
            None,
            400,
            &result.text,
            &RunStyle {
                size: Some(22),
                ..RunStyle::default()
            },
        ));
        if idx + 1 < results.len() {
            body.push_str(&paragraph(
                None,
                400,
                SEPARATOR,
                &RunStyle {
                    color: Some("CCCCCC"),
                    ..RunStyle::default()
                },
            ));
        }
    }

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
            "<w:body>{}<w:sectPr/></w:body></w:document>"
        ),
        body
    )
}

/// A paragraph with a single run. Line breaks in `text` become `<w:br/>`.
fn paragraph(style: Option<&str>, space_after: u32, text: &str, run: &RunStyle) -> String {
    let mut xml = String::from("<w:p><w:pPr>");
    if let Some(style) = style {
        xml.push_str(&format!(r#"<w:pStyle w:val="{}"/>"#, style));
    }
    xml.push_str(&format!(r#"<w:spacing w:after="{}"/></w:pPr><w:r>"#, space_after));

    let mut props = String::new();
    if run.bold {
        props.push_str("<w:b/>");
    }
    if run.italic {
        props.push_str("<w:i/>");
    }
    if let Some(color) = run.color {
        props.push_str(&format!(r#"<w:color w:val="{}"/>"#, color));
    }
    if let Some(size) = run.size {
        props.push_str(&format!(r#"<w:sz w:val="{}"/>"#, size));
    }
    if !props.is_empty() {
        xml.push_str(&format!("<w:rPr>{}</w:rPr>", props));
    }

    let normalized = text.replace("\r\n", "\n");
    for (idx, line) in normalized.split('\n').enumerate() {
        if idx > 0 {
            xml.push_str("<w:br/>");
        }
        xml.push_str(&format!(
            r#"<w:t xml:space="preserve">{}</w:t>"#,
            escape(strip_invalid_xml_chars(line).as_str())
        ));
    }
    xml.push_str("</w:r></w:p>");
    xml
}

/// Drop control characters that XML 1.0 cannot represent at all, such as
/// the form feed `tesseract` puts at the end of each page.
fn strip_invalid_xml_chars(text: &str) -> String {
    text.chars()
        .filter(|&ch| ch == '\t' || ch >= ' ')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::testing::{read_zip_entry, sample_results};

    #[test]
    fn test_document_contains_every_result() {
        let bytes = encode(&sample_results()).unwrap();
        let document = read_zip_entry(&bytes, "word/document.xml");

        for expected in [
            "IŞIL OCR Sonuçları",
            "Dosya: a.png",
            "Güven Skoru: 92.3%",
            "Merhaba",
            "Dosya: b.png",
            "Güven Skoru: 81.0%",
            "World",
        ] {
            assert!(document.contains(expected), "missing {:?}", expected);
        }
        assert!(document.contains("<w:i/>"));

        // Separators go between results only.
        assert_eq!(document.matches(SEPARATOR).count(), 1);
        assert!(document.find("World").unwrap() > document.find(SEPARATOR).unwrap());
    }

    #[test]
    fn test_package_parts_present() {
        let bytes = encode(&[]).unwrap();
        assert!(read_zip_entry(&bytes, "[Content_Types].xml").contains("document.main+xml"));
        assert!(read_zip_entry(&bytes, "_rels/.rels").contains("word/document.xml"));
        assert!(read_zip_entry(&bytes, "word/styles.xml").contains("Heading2"));

        let document = read_zip_entry(&bytes, "word/document.xml");
        assert!(document.contains(TITLE));
        assert!(!document.contains(SEPARATOR));
    }

    #[test]
    fn test_text_is_escaped_and_line_breaks_kept() {
        let results = vec![RecognitionResult {
            file_name: "<tag>&.png".to_owned(),
            text: "satır 1\r\nsatır 2\u{c}".to_owned(),
            confidence: 50.0,
        }];
        let document = document_xml(&results);
        assert!(document.contains("Dosya: &lt;tag&gt;&amp;.png"));
        assert!(document.contains(
            r#"satır 1</w:t><w:br/><w:t xml:space="preserve">satır 2</w:t>"#
        ));
        assert!(!document.contains('\u{c}'));
    }
}
