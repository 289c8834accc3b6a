//! PDF export.
//!
//! We lay pages out first, as plain data, and then render that layout with
//! `printpdf`. Keeping layout separate lets us test wrapping and pagination
//! without having to parse PDF files.
//!
//! Text is set in an embedded DejaVu Sans, because the standard PDF fonts
//! can't show Turkish letters like `ş` and `ı`.

use std::io::BufWriter;

use printpdf::{Mm, PdfDocument};
use ttf_parser::Face;

use crate::{pipeline::RecognitionResult, prelude::*};

use super::format_confidence;

/// A4 page size.
const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;

/// Margin on every side of the page.
const MARGIN_MM: f32 = 20.0;

/// The width that body text is wrapped to.
pub const TEXT_WIDTH_MM: f32 = 170.0;

const HEADING_SIZE: f32 = 16.0;
const CONFIDENCE_SIZE: f32 = 12.0;
const BODY_SIZE: f32 = 10.0;

/// Vertical gaps after the heading and the confidence line.
const HEADING_GAP_MM: f32 = 10.0;
const CONFIDENCE_GAP_MM: f32 = 15.0;

/// Line spacing, as a multiple of the font size.
const LINE_HEIGHT_FACTOR: f32 = 1.15;

/// Millimeters per PostScript point.
const MM_PER_PT: f32 = 25.4 / 72.0;

/// Title stored in the PDF metadata.
const DOCUMENT_TITLE: &str = "IŞIL OCR Sonuçları";

/// The font we embed. See `assets/fonts/DejaVuSans-LICENSE.txt`.
static FONT_DATA: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// Metrics for the embedded font.
pub struct PdfFont {
    face: Face<'static>,
}

impl PdfFont {
    /// Parse the embedded font.
    pub fn load() -> Result<Self> {
        let face =
            Face::parse(FONT_DATA, 0).map_err(|e| anyhow!("PDF font error: {}", e))?;
        Ok(Self { face })
    }

    /// The printed width of `text`.
    pub fn text_width_mm(&self, text: &str, font_size: f32) -> f32 {
        let units = text.chars().map(|ch| self.advance(ch)).sum::<u32>();
        units as f32 / f32::from(self.face.units_per_em()) * font_size * MM_PER_PT
    }

    /// The advance width of `ch` in font units. Characters without a glyph
    /// are dropped when drawn, so they take no space.
    fn advance(&self, ch: char) -> u32 {
        self.face
            .glyph_index(ch)
            .and_then(|id| self.face.glyph_hor_advance(id))
            .map_or(0, u32::from)
    }

    /// Wrap `text` to `max_width_mm` at `font_size`, the way a word processor
    /// would.
    ///
    /// Explicit line breaks are kept, including blank lines. Words wider than a
    /// whole line are split wherever they overflow.
    pub fn wrap_text(&self, text: &str, font_size: f32, max_width_mm: f32) -> Vec<String> {
        let mut lines = vec![];
        for paragraph in text.split('\n') {
            let mut current = String::new();
            for word in paragraph.split_whitespace() {
                let candidate = if current.is_empty() {
                    word.to_owned()
                } else {
                    format!("{} {}", current, word)
                };
                if self.text_width_mm(&candidate, font_size) <= max_width_mm {
                    current = candidate;
                    continue;
                }
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                // The word alone may still be too wide.
                for ch in word.chars() {
                    current.push(ch);
                    if current.chars().count() > 1
                        && self.text_width_mm(&current, font_size) > max_width_mm
                    {
                        current.pop();
                        lines.push(std::mem::replace(&mut current, ch.to_string()));
                    }
                }
            }
            lines.push(current);
        }
        lines
    }
}

/// One line of text placed on a page.
#[derive(Clone, Debug, PartialEq)]
pub struct PdfLine {
    /// The text, exactly as it should read.
    pub text: String,

    /// Font size in points.
    pub font_size: f32,

    /// Distance of the baseline from the top of the page.
    pub top_mm: f32,
}

/// A laid-out page.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PdfPage {
    pub lines: Vec<PdfLine>,
}

/// Encode results as a PDF, starting a new page for each result.
pub fn encode(results: &[RecognitionResult]) -> Result<Vec<u8>> {
    let font = PdfFont::load()?;
    render(&layout(&font, results))
}

/// Lay out one or more pages per result.
///
/// Each result starts on a fresh page with its file name and confidence. Body
/// text that doesn't fit continues on extra pages.
pub fn layout(font: &PdfFont, results: &[RecognitionResult]) -> Vec<PdfPage> {
    let bottom = PAGE_HEIGHT_MM - MARGIN_MM;
    let body_line_height = BODY_SIZE * LINE_HEIGHT_FACTOR * MM_PER_PT;

    let mut pages = vec![];
    for result in results {
        let mut page = PdfPage::default();
        let mut y = MARGIN_MM;

        page.lines.push(PdfLine {
            text: format!("Dosya: {}", result.file_name),
            font_size: HEADING_SIZE,
            top_mm: y,
        });
        y += HEADING_GAP_MM;

        page.lines.push(PdfLine {
            text: format!("Güven Skoru: {}", format_confidence(result.confidence)),
            font_size: CONFIDENCE_SIZE,
            top_mm: y,
        });
        y += CONFIDENCE_GAP_MM;

        for line in font.wrap_text(result.text.trim_end(), BODY_SIZE, TEXT_WIDTH_MM) {
            if y > bottom {
                pages.push(std::mem::take(&mut page));
                y = MARGIN_MM;
            }
            page.lines.push(PdfLine {
                text: line,
                font_size: BODY_SIZE,
                top_mm: y,
            });
            y += body_line_height;
        }
        pages.push(page);
    }
    pages
}

/// Render laid-out pages to PDF bytes.
fn render(pages: &[PdfPage]) -> Result<Vec<u8>> {
    let (doc, first_page, first_layer) = PdfDocument::new(
        DOCUMENT_TITLE,
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let font = doc
        .add_external_font(FONT_DATA)
        .map_err(|e| anyhow!("PDF font error: {}", e))?;

    for (idx, page) in pages.iter().enumerate() {
        let (page_idx, layer_idx) = if idx == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1")
        };
        let layer = doc.get_page(page_idx).get_layer(layer_idx);
        for line in &page.lines {
            layer.use_text(
                line.text.as_str(),
                line.font_size,
                Mm(MARGIN_MM),
                Mm(PAGE_HEIGHT_MM - line.top_mm),
                &font,
            );
        }
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| anyhow!("PDF save error: {}", e))?;
    buf.into_inner()
        .map_err(|e| anyhow!("PDF buffer error: {}", e))
}
