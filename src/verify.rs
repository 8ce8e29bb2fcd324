//! Layout verifier – one real layout pass with the chosen style.
//!
//! The height estimate ignores wrapping, so it can be optimistic. Before a
//! card is accepted the whole document, title included, is laid out with the
//! exact style the artifact will use and its pages are counted.

use crate::layout_config::LayoutConfig;
use crate::markup::Document;
use crate::page::PageBudget;
use crate::render::DocumentRenderer;
use crate::style::StyleParameters;

/// Result of one verification pass. Keeps the layout so an accepted pass can
/// be rendered without laying out again.
#[derive(Debug, Clone)]
pub struct Verification {
    pub layout: LayoutConfig,
    pub page_count: usize,
    pub max_pages: Option<usize>,
}

impl Verification {
    /// Within budget. Always true without a page cap.
    pub fn accepted(&self) -> bool {
        match self.max_pages {
            Some(max) => self.page_count <= max,
            None => true,
        }
    }
}

pub fn verify(
    renderer: &dyn DocumentRenderer,
    doc: &Document,
    style: &StyleParameters,
    budget: &PageBudget,
) -> Result<Verification, String> {
    let layout = renderer.layout(doc, style, budget.geometry)?;
    let page_count = layout.page_count();
    let v = Verification {
        layout,
        page_count,
        max_pages: budget.max_pages,
    };
    log::debug!(
        "verify: {:.1}pt body -> {} page(s) (max {:?}): {}",
        style.body_size,
        page_count,
        budget.max_pages,
        if v.accepted() { "accepted" } else { "rejected" }
    );
    Ok(v)
}
