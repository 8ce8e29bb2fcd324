//! PDF renderer – takes a [`LayoutConfig`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API).
//!
//! [`DocumentRenderer`] is the seam the assembler and verifier talk to:
//! `layout` produces the paginated IR (nothing is emitted), `render` turns an
//! accepted layout into bytes.

use printpdf::*;

use crate::fonts::FontManager;
use crate::helvetica;
use crate::layout::compute_layout;
use crate::layout_config::{LayoutBox, LayoutConfig};
use crate::markup::{Document, InlineRun};
use crate::page::PageGeometry;
use crate::pagination::paginate;
use crate::style::StyleParameters;

/// Points to millimetres.
const PT_TO_MM: f32 = 0.352778;

/// Lays out and renders documents.
pub trait DocumentRenderer: Send + Sync {
    /// One full layout pass. The page count is `layout.pages.len()`.
    fn layout(&self, doc: &Document, style: &StyleParameters, geometry: PageGeometry) -> Result<LayoutConfig, String>;

    /// Emit the final artifact for a layout produced by [`Self::layout`].
    fn render(&self, layout: &LayoutConfig) -> Result<Vec<u8>, String>;
}

/// Taffy layout plus printpdf output with the builtin Helvetica family.
#[derive(Default)]
pub struct PdfRenderer {
    fonts: FontManager,
}

impl PdfRenderer {
    pub fn new(fonts: FontManager) -> Self {
        Self { fonts }
    }
}

impl DocumentRenderer for PdfRenderer {
    fn layout(&self, doc: &Document, style: &StyleParameters, geometry: PageGeometry) -> Result<LayoutConfig, String> {
        let boxes = compute_layout(doc, style, geometry, &self.fonts)?;
        let title = doc.title.as_deref().unwrap_or("card-printer output");
        Ok(paginate(&boxes, geometry, title))
    }

    fn render(&self, layout: &LayoutConfig) -> Result<Vec<u8>, String> {
        render_pdf(layout, &self.fonts)
    }
}

/// Render a LayoutConfig into PDF bytes.
pub fn render_pdf(config: &LayoutConfig, fonts: &FontManager) -> Result<Vec<u8>, String> {
    if config.page_width_pt <= 0.0 || config.page_height_pt <= 0.0 {
        return Err(format!(
            "invalid page size {}x{}pt",
            config.page_width_pt, config.page_height_pt
        ));
    }
    let page_w = Mm(config.page_width_pt * PT_TO_MM);
    let page_h = Mm(config.page_height_pt * PT_TO_MM);

    let mut doc = PdfDocument::new(&config.title);

    let mut pages: Vec<PdfPage> = config
        .pages
        .iter()
        .map(|page_layout| {
            let mut ops = Vec::new();
            for lbox in &page_layout.boxes {
                render_box(&mut ops, lbox, config.page_height_pt, fonts);
            }
            PdfPage::new(page_w, page_h, ops)
        })
        .collect();

    // Ensure at least one page.
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    doc.with_pages(pages);
    let bytes = doc.save(&PdfSaveOptions::default(), &mut Vec::new());
    log::debug!("rendered {} page(s), {} bytes", config.pages.len().max(1), bytes.len());
    Ok(bytes)
}

/// Convert a UTF-8 string to raw Windows-1252 bytes then wrap in a String so
/// printpdf writes the bytes unchanged into the PDF stream (builtin fonts use
/// WinAnsiEncoding, so each glyph is one byte 0x00–0xFF).
fn to_winlatin(s: &str) -> String {
    let bytes: Vec<u8> = s.chars().map(helvetica::win_ansi).collect();
    // SAFETY: intentionally non-UTF-8 for 0x80-0x9F range; printpdf passes
    // these bytes straight to the PDF stream, decoded by WinAnsiEncoding.
    #[allow(unsafe_code)]
    unsafe {
        String::from_utf8_unchecked(bytes)
    }
}

fn builtin_font(bold: bool, italic: bool) -> BuiltinFont {
    match (bold, italic) {
        (true, true) => BuiltinFont::HelveticaBoldOblique,
        (true, false) => BuiltinFont::HelveticaBold,
        (false, true) => BuiltinFont::HelveticaOblique,
        (false, false) => BuiltinFont::Helvetica,
    }
}

fn fill(color: [f32; 4]) -> Op {
    Op::SetFillColor {
        col: Color::Rgb(Rgb {
            r: color[0],
            g: color[1],
            b: color[2],
            icc_profile: None,
        }),
    }
}

/// Write one piece of text at a baseline position.
#[allow(clippy::too_many_arguments)]
fn write_text(ops: &mut Vec<Op>, text: &str, x: f32, y: f32, size: f32, line_height: f32, font: BuiltinFont, color: [f32; 4]) {
    ops.push(Op::StartTextSection);
    ops.push(Op::SetTextCursor {
        pos: Point { x: Pt(x), y: Pt(y) },
    });
    ops.push(Op::SetFontSizeBuiltinFont { size: Pt(size), font });
    ops.push(Op::SetLineHeight { lh: Pt(line_height) });
    ops.push(fill(color));
    ops.push(Op::WriteTextBuiltinFont {
        items: vec![TextItem::Text(to_winlatin(text))],
        font,
    });
    ops.push(Op::EndTextSection);
}

fn render_box(ops: &mut Vec<Op>, lbox: &LayoutBox, page_height: f32, fonts: &FontManager) {
    let Some(text) = &lbox.text else { return };

    // PDF coordinate system: origin at bottom-left.
    // Our layout uses origin at top-left. Convert:
    let pdf_y = page_height - lbox.y;
    // Baseline sits one ascender below the top of the line box.
    let ascender = fonts.ascender(text.font_size);

    for tline in &text.lines {
        let baseline = pdf_y - tline.y_offset - ascender;
        let mut x = lbox.x + tline.x_offset;
        // One text section per run so each run can switch font variant.
        for run in &tline.runs {
            if run.text.is_empty() {
                continue;
            }
            let bold = text.bold || run.bold;
            let font = builtin_font(bold, run.italic);
            write_text(ops, &run.text, x, baseline, text.font_size, text.line_height, font, text.color);
            x += run_width(run, text.font_size, bold, fonts);
        }
    }

    if let Some(marker) = &text.list_marker {
        let baseline = pdf_y - ascender;
        write_text(
            ops,
            &marker.text,
            marker.x,
            baseline,
            text.font_size,
            text.line_height,
            BuiltinFont::Helvetica,
            text.color,
        );
    }
}

fn run_width(run: &InlineRun, size: f32, bold: bool, fonts: &FontManager) -> f32 {
    fonts.measure_text_width(&run.text, size, bold, run.italic)
}
