//! Closed-form height estimate used by the auto-fit search.
//!
//! Text wrapping is ignored: a paragraph counts as one line of its font size.
//! The estimate is fast and monotone, not exact; the layout verifier has the
//! final word.

use crate::markup::{BlockKind, ContentBlock, Document};
use crate::style::StyleParameters;

/// Estimated vertical extent of `blocks`, in points.
pub fn estimate_height(blocks: &[ContentBlock], style: &StyleParameters) -> f32 {
    blocks
        .iter()
        .map(|block| match block.kind {
            BlockKind::Heading(_) => {
                let b = style.block_style(block.kind);
                b.font_size + b.space_before + b.space_after
            }
            BlockKind::Paragraph | BlockKind::OrderedListItem(_) | BlockKind::UnorderedListItem => {
                style.body_size + style.space_after_body
            }
            BlockKind::Blank => style.space_after_body / 2.0,
        })
        .sum()
}

/// Height taken by the title line and the gap below it.
pub fn title_height(style: &StyleParameters) -> f32 {
    style.title_size + style.space_after_title
}

/// Blocks plus the title, if the document has one.
pub fn estimate_document(doc: &Document, style: &StyleParameters) -> f32 {
    let title = if doc.title.is_some() {
        title_height(style)
    } else {
        0.0
    };
    title + estimate_height(&doc.blocks, style)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse_markdown;

    fn sample() -> Vec<ContentBlock> {
        parse_markdown("# Title\n\nBody text\n- one\n- two\n\n## Sub\n1. a\n### Small")
    }

    #[test]
    fn per_kind_contributions() {
        let style = StyleParameters::calculate(10.0, 1.0);
        let h1 = estimate_height(&parse_markdown("# A"), &style);
        assert!((h1 - (14.0 + 15.0 + 12.0)).abs() < 1e-3);
        let p = estimate_height(&parse_markdown("text"), &style);
        assert!((p - 16.0).abs() < 1e-3);
        let blank = estimate_height(&parse_markdown("\n"), &style);
        assert!((blank - 3.0).abs() < 1e-3);
    }

    #[test]
    fn shrinking_never_increases_estimate() {
        let blocks = sample();
        let fonts: Vec<f32> = (0..=10).map(|i| 10.0 - i as f32 * 0.5).collect();
        let scales: Vec<f32> = (0..=5).map(|i| 1.0 - i as f32 * 0.1).collect();
        for &f in &fonts {
            let mut prev = f32::INFINITY;
            for &s in &scales {
                let h = estimate_height(&blocks, &StyleParameters::calculate(f, s));
                assert!(h <= prev + 1e-4, "scale {s} at {f}pt grew: {h} > {prev}");
                prev = h;
            }
        }
        for &s in &scales {
            let mut prev = f32::INFINITY;
            for &f in &fonts {
                let h = estimate_height(&blocks, &StyleParameters::calculate(f, s));
                assert!(h <= prev + 1e-4, "font {f} at scale {s} grew: {h} > {prev}");
                prev = h;
            }
        }
    }

    #[test]
    fn title_adds_to_document_estimate() {
        let style = StyleParameters::calculate(10.0, 1.0);
        let blocks = sample();
        let bare = Document::new(None, blocks.clone());
        let titled = Document::new(Some("Card".into()), blocks);
        let diff = estimate_document(&titled, &style) - estimate_document(&bare, &style);
        assert!((diff - title_height(&style)).abs() < 1e-3);
    }
}
