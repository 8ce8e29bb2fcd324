//! Layout engine – stacks the document's blocks in a Taffy flex column and
//! returns one positioned box per block, in document coordinates.
//!
//! Each block becomes a fixed-size leaf: its height is the number of wrapped
//! lines times the block's leading, and the block's before/after spacing
//! becomes its top/bottom margin. Pagination happens afterwards.

use std::collections::HashMap;

use taffy::prelude::*;

use crate::fonts::{wrap_runs, FontManager};
use crate::layout_config::{ListMarker, TextAlign, TextLine};
use crate::markup::{BlockKind, ContentBlock, Document, InlineRun};
use crate::page::PageGeometry;
use crate::style::{BlockStyle, StyleParameters};

/// Gap between a list marker and the item text, in ems.
const MARKER_GAP_EM: f32 = 0.5;

// ---------------------------------------------------------------------------
// Intermediate layout tree (pre-pagination)
// ---------------------------------------------------------------------------

/// A positioned box in document coordinates (before page splitting).
/// `x` is page-absolute; `y` is measured from the top of the content flow.
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub text: Option<PositionedText>,
}

/// Wrapped text of one block.
#[derive(Debug, Clone)]
pub struct PositionedText {
    pub lines: Vec<TextLine>,
    pub font_size: f32,
    pub leading: f32,
    pub bold: bool,
    pub align: TextAlign,
    pub marker: Option<ListMarker>,
}

// ---------------------------------------------------------------------------
// Build Taffy tree from blocks
// ---------------------------------------------------------------------------

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontManager,
    node_text: HashMap<NodeId, PositionedText>,
    geometry: PageGeometry,
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontManager, geometry: PageGeometry) -> Self {
        Self {
            taffy: TaffyTree::new(),
            fonts,
            node_text: HashMap::new(),
            geometry,
        }
    }

    fn content_width(&self) -> f32 {
        self.geometry.content_width()
    }

    fn title_node(&mut self, title: &str, style: &StyleParameters) -> Result<NodeId, String> {
        let bs = style.title_style();
        let runs = [InlineRun::plain(title)];
        self.text_node(&runs, &bs, 0.0, TextAlign::Center, None)
    }

    fn block_node(&mut self, block: &ContentBlock, style: &StyleParameters) -> Result<NodeId, String> {
        let bs = style.block_style(block.kind);
        match block.kind {
            BlockKind::Blank => self.spacer(bs.space_after),
            BlockKind::OrderedListItem(n) => {
                let marker = format!("{n}.");
                self.list_item(block, &bs, marker)
            }
            BlockKind::UnorderedListItem => self.list_item(block, &bs, "\u{2022}".to_string()),
            BlockKind::Heading(_) | BlockKind::Paragraph => {
                self.text_node(&block.runs, &bs, 0.0, TextAlign::Left, None)
            }
        }
    }

    fn list_item(&mut self, block: &ContentBlock, bs: &BlockStyle, marker: String) -> Result<NodeId, String> {
        // Wide enough for two-digit numbers so item text lines up.
        let gutter = self.fonts.measure_text_width("00.", bs.font_size, false, false) + bs.font_size * MARKER_GAP_EM;
        let marker = ListMarker {
            text: marker,
            x: self.geometry.margin_pt,
        };
        self.text_node(&block.runs, bs, gutter, TextAlign::Left, Some(marker))
    }

    fn spacer(&mut self, height: f32) -> Result<NodeId, String> {
        let style = Style {
            size: Size {
                width: Dimension::Length(self.content_width()),
                height: Dimension::Length(0.0),
            },
            margin: Rect {
                top: LengthPercentageAuto::Length(0.0),
                right: LengthPercentageAuto::Length(0.0),
                bottom: LengthPercentageAuto::Length(height),
                left: LengthPercentageAuto::Length(0.0),
            },
            flex_shrink: 0.0,
            ..Default::default()
        };
        self.taffy.new_leaf(style).map_err(|e| format!("layout: {e}"))
    }

    fn text_node(
        &mut self,
        runs: &[InlineRun],
        bs: &BlockStyle,
        indent: f32,
        align: TextAlign,
        marker: Option<ListMarker>,
    ) -> Result<NodeId, String> {
        let width = (self.content_width() - indent).max(1.0);
        let wrapped = wrap_runs(runs, bs.font_size, bs.bold, width, self.fonts);

        let lines: Vec<TextLine> = wrapped
            .into_iter()
            .enumerate()
            .map(|(i, line_runs)| {
                let x_offset = match align {
                    TextAlign::Left => 0.0,
                    TextAlign::Center => {
                        let w = self.fonts.measure_runs(&line_runs, bs.font_size, bs.bold);
                        ((width - w) / 2.0).max(0.0)
                    }
                };
                TextLine {
                    runs: line_runs,
                    x_offset,
                    y_offset: i as f32 * bs.leading,
                }
            })
            .collect();
        let height = lines.len() as f32 * bs.leading;

        let style = Style {
            size: Size {
                width: Dimension::Length(width),
                height: Dimension::Length(height),
            },
            margin: Rect {
                top: LengthPercentageAuto::Length(bs.space_before),
                right: LengthPercentageAuto::Length(0.0),
                bottom: LengthPercentageAuto::Length(bs.space_after),
                left: LengthPercentageAuto::Length(indent),
            },
            flex_shrink: 0.0,
            ..Default::default()
        };
        let node = self.taffy.new_leaf(style).map_err(|e| format!("layout: {e}"))?;
        self.node_text.insert(
            node,
            PositionedText {
                lines,
                font_size: bs.font_size,
                leading: bs.leading,
                bold: bs.bold,
                align,
                marker,
            },
        );
        Ok(node)
    }

    /// Extract positioned boxes after layout computation.
    fn extract(&self, root: NodeId) -> Result<Vec<PositionedBox>, String> {
        let children = self.taffy.children(root).map_err(|e| format!("layout: {e}"))?;
        children
            .iter()
            .map(|&child| {
                let layout = self.taffy.layout(child).map_err(|e| format!("layout: {e}"))?;
                Ok(PositionedBox {
                    x: self.geometry.margin_pt + layout.location.x,
                    y: layout.location.y,
                    width: layout.size.width,
                    height: layout.size.height,
                    text: self.node_text.get(&child).cloned(),
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Lay out `doc` as one continuous column at the page's content width.
pub fn compute_layout(
    doc: &Document,
    style: &StyleParameters,
    geometry: PageGeometry,
    fonts: &FontManager,
) -> Result<Vec<PositionedBox>, String> {
    let mut builder = LayoutBuilder::new(fonts, geometry);
    let content_width = builder.content_width();
    if content_width <= 0.0 {
        return Err(format!(
            "margin {:.1}pt leaves no room on a {:.0}pt wide page",
            geometry.margin_pt, geometry.width_pt
        ));
    }

    let mut child_ids = Vec::with_capacity(doc.blocks.len() + 1);
    if let Some(title) = &doc.title {
        child_ids.push(builder.title_node(title, style)?);
    }
    for block in &doc.blocks {
        child_ids.push(builder.block_node(block, style)?);
    }

    let root_style = Style {
        display: taffy::Display::Flex,
        flex_direction: taffy::FlexDirection::Column,
        size: Size {
            width: Dimension::Length(content_width),
            height: Dimension::Auto,
        },
        ..Default::default()
    };
    let root = builder
        .taffy
        .new_with_children(root_style, &child_ids)
        .map_err(|e| format!("layout: {e}"))?;

    builder
        .taffy
        .compute_layout(
            root,
            Size {
                width: AvailableSpace::Definite(content_width),
                height: AvailableSpace::MaxContent,
            },
        )
        .map_err(|e| format!("layout: {e}"))?;

    builder.extract(root)
}
