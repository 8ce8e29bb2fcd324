//! Pagination – flows positioned boxes onto fixed-height pages.
//!
//! Boxes keep their vertical spacing from the layout pass. A text box that
//! crosses the bottom of a page is split between lines; the remaining lines
//! continue at the top of the next page. A single line taller than a whole
//! page is placed anyway so the flow always makes progress.

use crate::layout::{PositionedBox, PositionedText};
use crate::layout_config::*;
use crate::page::PageGeometry;

/// Slack for float accumulation when comparing against the page bottom.
const EPSILON: f32 = 0.01;

const TEXT_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Convert positioned boxes into a paginated LayoutConfig.
pub fn paginate(boxes: &[PositionedBox], geometry: PageGeometry, title: &str) -> LayoutConfig {
    let mut flow = Flow::new(LayoutConfig::new(title, geometry.width_pt, geometry.height_pt), geometry);

    for pbox in boxes {
        // Spacers have no ink; their gap is already baked into later y values.
        let Some(text) = &pbox.text else { continue };
        flow.place_text(pbox, text);
    }

    flow.finish()
}

struct Flow {
    config: LayoutConfig,
    geometry: PageGeometry,
    current: PageLayout,
    /// Document-space y at which the current page begins.
    page_start: f32,
}

impl Flow {
    fn new(config: LayoutConfig, geometry: PageGeometry) -> Self {
        Self {
            config,
            geometry,
            current: PageLayout {
                page_index: 0,
                boxes: Vec::new(),
            },
            page_start: 0.0,
        }
    }

    fn content_height(&self) -> f32 {
        self.geometry.content_height()
    }

    fn break_page(&mut self, next_start: f32) {
        let index = self.config.pages.len() + 1;
        let done = std::mem::replace(
            &mut self.current,
            PageLayout {
                page_index: index,
                boxes: Vec::new(),
            },
        );
        self.config.pages.push(done);
        self.page_start = next_start;
    }

    fn place_text(&mut self, pbox: &PositionedBox, text: &PositionedText) {
        let mut doc_y = pbox.y;
        let mut first = 0usize;
        let total = text.lines.len();

        while first < total {
            let y_on_page = (doc_y - self.page_start).max(0.0);
            let remaining = total - first;
            let room = self.content_height() - y_on_page;

            let mut fit = if text.leading > 0.0 {
                ((room + EPSILON) / text.leading).floor().max(0.0) as usize
            } else {
                remaining
            };
            fit = fit.min(remaining);

            if fit == 0 {
                if self.current.boxes.is_empty() && y_on_page <= EPSILON {
                    fit = 1;
                } else {
                    self.break_page(doc_y);
                    continue;
                }
            }

            self.emit(pbox, text, first, fit, y_on_page);
            first += fit;
            if first < total {
                doc_y += fit as f32 * text.leading;
                self.break_page(doc_y);
            }
        }
    }

    /// Push lines `first..first + count` of `text` as one box.
    fn emit(&mut self, pbox: &PositionedBox, text: &PositionedText, first: usize, count: usize, y_on_page: f32) {
        let top = first as f32 * text.leading;
        let lines = text.lines[first..first + count]
            .iter()
            .map(|l| TextLine {
                runs: l.runs.clone(),
                x_offset: l.x_offset,
                y_offset: l.y_offset - top,
            })
            .collect();

        let mut lb = LayoutBox::new(
            pbox.x,
            self.geometry.margin_pt + y_on_page,
            pbox.width,
            count as f32 * text.leading,
        );
        lb.text = Some(TextContent {
            lines,
            font_size: text.font_size,
            bold: text.bold,
            color: TEXT_COLOR,
            line_height: text.leading,
            text_align: text.align,
            list_marker: if first == 0 { text.marker.clone() } else { None },
        });
        self.current.boxes.push(lb);
    }

    fn finish(mut self) -> LayoutConfig {
        if !self.current.boxes.is_empty() || self.config.pages.is_empty() {
            self.config.pages.push(self.current);
        }
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FontManager;
    use crate::layout::compute_layout;
    use crate::markup::{parse_markdown, Document};
    use crate::page::CARD_MARGIN_PT;
    use crate::style::StyleParameters;

    fn paginate_text(text: &str, font: f32) -> LayoutConfig {
        let doc = Document::new(None, parse_markdown(text));
        let style = StyleParameters::calculate(font, 1.0);
        let geometry = PageGeometry::card(CARD_MARGIN_PT);
        let boxes = compute_layout(&doc, &style, geometry, &FontManager::default()).unwrap();
        paginate(&boxes, geometry, "test")
    }

    #[test]
    fn single_page() {
        let config = paginate_text("Short text", 10.0);
        assert_eq!(config.pages.len(), 1);
        assert_eq!(config.pages[0].boxes.len(), 1);
    }

    #[test]
    fn empty_document_has_one_page() {
        let config = paginate_text("", 10.0);
        assert_eq!(config.pages.len(), 1);
        assert!(config.pages[0].boxes.is_empty());
    }

    #[test]
    fn multiple_pages() {
        // 40 paragraphs × 18pt on a 273.6pt page
        let text = (0..40).map(|i| format!("Paragraph {i}")).collect::<Vec<_>>().join("\n");
        let config = paginate_text(&text, 10.0);
        assert!(config.pages.len() > 1, "Expected multiple pages, got {}", config.pages.len());
        let lines = config.text_lines();
        assert_eq!(lines.len(), 40);
        assert_eq!(lines[39], "Paragraph 39");
        for page in &config.pages {
            for b in &page.boxes {
                assert!(b.y + b.height <= 288.0 - CARD_MARGIN_PT + 0.05, "box overflows page: {b:?}");
            }
        }
    }

    #[test]
    fn long_paragraph_splits_between_lines() {
        let long = "lorem ipsum ".repeat(400);
        let config = paginate_text(&long, 10.0);
        assert!(config.pages.len() >= 2);
        let first_page_last = config.pages[0].boxes.last().unwrap();
        let second_first = &config.pages[1].boxes[0];
        assert!((second_first.y - CARD_MARGIN_PT).abs() < 1e-3);
        let t = second_first.text.as_ref().unwrap();
        assert_eq!(t.lines[0].y_offset, 0.0);
        assert!(first_page_last.text.as_ref().unwrap().lines.len() > 1);
    }

    #[test]
    fn marker_only_on_first_fragment() {
        let item = format!("- {}", "word ".repeat(600));
        let config = paginate_text(&item, 10.0);
        assert!(config.pages.len() >= 2);
        let first = config.pages[0].boxes[0].text.as_ref().unwrap();
        let next = config.pages[1].boxes[0].text.as_ref().unwrap();
        assert!(first.list_marker.is_some());
        assert!(next.list_marker.is_none());
    }
}
