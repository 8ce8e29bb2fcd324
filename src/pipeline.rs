//! Pipeline – ties together normalisation, the auto-fit search, layout
//! verification and rendering into a single call.
//!
//! Card requests run the search/verify loop: the estimate proposes the largest
//! style that should fit, one real layout pass confirms it, and on overflow
//! the scan resumes at the next grid point. Standard paper skips the search
//! and lays out with the fixed style on as many pages as it takes.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dom::Html;
use crate::error::{FitFailure, PrintError};
use crate::estimate::estimate_document;
use crate::fit::{self, FitGrid, FitResult};
use crate::layout_config::LayoutConfig;
use crate::markup::{Document, Markdown, MarkupSource};
use crate::page::{PageBudget, PageGeometry, PageOrientation, PaperSize, CARD_MARGIN_PT, STANDARD_MARGIN_PT};
use crate::render::{DocumentRenderer, PdfRenderer};
use crate::style::StyleParameters;
use crate::verify::{verify, Verification};

/// Markup language of the request content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    #[default]
    Markdown,
    Html,
}

impl ContentFormat {
    fn source(self) -> Box<dyn MarkupSource> {
        match self {
            ContentFormat::Markdown => Box::new(Markdown),
            ContentFormat::Html => Box::new(Html),
        }
    }
}

/// Layout-related settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Card margin in points (default: 0.1in).
    pub card_margin_pt: f32,
    /// Page cap for card output (default: 2).
    pub card_max_pages: usize,
    /// Margin for letter/A4/legal in points (default: 0.75in).
    pub standard_margin_pt: f32,
    pub grid: FitGrid,
    /// Extra layout passes allowed after the first rejected one.
    pub verify_retries: usize,
    pub render_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            card_margin_pt: CARD_MARGIN_PT,
            card_max_pages: 2,
            standard_margin_pt: STANDARD_MARGIN_PT,
            grid: FitGrid::default(),
            verify_retries: 6,
            render_timeout: Duration::from_secs(30),
        }
    }
}

/// One `print_file` call, after argument decoding.
#[derive(Debug, Clone, Default)]
pub struct PrintRequest {
    pub content: String,
    /// Shown as the title line and used to name the artifact.
    pub display_name: Option<String>,
    pub card_format: bool,
    pub device: Option<String>,
    pub paper: PaperSize,
    pub orientation: PageOrientation,
    pub content_format: ContentFormat,
}

impl PrintRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// `paper = 4x6` implies the card format.
    pub fn is_card(&self) -> bool {
        self.card_format || self.paper == PaperSize::Card
    }

    /// Human label for the output format.
    pub fn format_label(&self) -> String {
        if self.is_card() {
            "4x6 card".to_string()
        } else {
            let paper = match self.paper {
                PaperSize::Letter => "letter",
                PaperSize::A4 => "a4",
                PaperSize::Legal => "legal",
                PaperSize::Card => "4x6",
            };
            let orientation = match self.orientation {
                PageOrientation::Portrait => "portrait",
                PageOrientation::Landscape => "landscape",
            };
            format!("{paper} {orientation}")
        }
    }
}

/// A verified, rendered document ready for dispatch.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub pdf: Vec<u8>,
    pub layout: LayoutConfig,
    pub fit: FitResult,
}

/// Builds print artifacts from requests.
#[derive(Clone)]
pub struct Assembler {
    renderer: Arc<dyn DocumentRenderer>,
    config: PipelineConfig,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new(Arc::new(PdfRenderer::default()), PipelineConfig::default())
    }
}

impl Assembler {
    pub fn new(renderer: Arc<dyn DocumentRenderer>, config: PipelineConfig) -> Self {
        Self { renderer, config }
    }

    /// Normalise, fit, verify and render. Nothing is rendered unless the
    /// layout pass accepted it.
    pub fn prepare(&self, request: &PrintRequest) -> Result<PreparedDocument, PrintError> {
        if request.content.trim().is_empty() {
            return Err(PrintError::Input("content is empty".to_string()));
        }

        let doc = self.document(request);
        let (verification, fit) = if request.is_card() {
            self.fit_card(&doc)?
        } else {
            self.lay_out_standard(&doc, request)?
        };

        let pdf = self.render_with_timeout(&verification.layout)?;
        Ok(PreparedDocument {
            pdf,
            layout: verification.layout,
            fit,
        })
    }

    /// Build the block document for a request without laying it out.
    pub fn document(&self, request: &PrintRequest) -> Document {
        let blocks = request.content_format.source().blocks(&request.content);
        let title = request
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from);
        Document::new(title, blocks)
    }

    pub fn card_budget(&self) -> PageBudget {
        PageBudget::card(self.config.card_margin_pt, self.config.card_max_pages)
    }

    fn fit_card(&self, doc: &Document) -> Result<(Verification, FitResult), PrintError> {
        let budget = self.card_budget();
        let grid = &self.config.grid;
        let mut start = grid.first();
        let mut passes = 0usize;
        let mut last_overflow: Option<(f32, f32, usize)> = None;

        loop {
            let candidate = match fit::search_from(doc, &budget, grid, start) {
                Ok(c) => c,
                Err(failure) => {
                    return Err(match last_overflow {
                        // The resumed scan ran dry after a rejected layout.
                        Some((font_size, spacing_scale, page_count)) => {
                            overflow(font_size, spacing_scale, page_count, &budget, passes)
                        }
                        None => {
                            log::warn!("auto-fit: {failure}");
                            failure
                        }
                    }
                    .into());
                }
            };

            let style = grid.style(candidate.point);
            let verification = verify(self.renderer.as_ref(), doc, &style, &budget).map_err(PrintError::Render)?;
            passes += 1;

            if verification.accepted() {
                let fit = FitResult {
                    font_size: candidate.font_size,
                    spacing_scale: candidate.spacing_scale,
                    estimated_height: candidate.estimated_height,
                    usable_height: budget.usable_height(),
                    searched: true,
                    verification_passes: passes,
                    accepted: true,
                    page_count: verification.page_count,
                };
                log::debug!(
                    "auto-fit: font={:.1}pt spacing={:.1} pages={} passes={}",
                    fit.font_size,
                    fit.spacing_scale,
                    fit.page_count,
                    passes
                );
                return Ok((verification, fit));
            }

            last_overflow = Some((candidate.font_size, candidate.spacing_scale, verification.page_count));
            let next = grid.next(candidate.point);
            match next {
                Some(p) if passes <= self.config.verify_retries => start = p,
                _ => {
                    let err = overflow(
                        candidate.font_size,
                        candidate.spacing_scale,
                        verification.page_count,
                        &budget,
                        passes,
                    );
                    log::warn!("auto-fit: {err}");
                    return Err(err.into());
                }
            }
        }
    }

    fn lay_out_standard(
        &self,
        doc: &Document,
        request: &PrintRequest,
    ) -> Result<(Verification, FitResult), PrintError> {
        let geometry = PageGeometry::paper(request.paper, request.orientation, self.config.standard_margin_pt);
        let budget = PageBudget::unbounded(geometry);
        let style = StyleParameters::standard();
        let verification = verify(self.renderer.as_ref(), doc, &style, &budget).map_err(PrintError::Render)?;
        let fit = FitResult {
            font_size: style.body_size,
            spacing_scale: 1.0,
            estimated_height: estimate_document(doc, &style),
            usable_height: None,
            searched: false,
            verification_passes: 1,
            accepted: true,
            page_count: verification.page_count,
        };
        Ok((verification, fit))
    }

    /// Render on a worker thread so a wedged renderer cannot hang the server.
    fn render_with_timeout(&self, layout: &LayoutConfig) -> Result<Vec<u8>, PrintError> {
        let (tx, rx) = mpsc::channel();
        let renderer = Arc::clone(&self.renderer);
        let layout = layout.clone();
        std::thread::spawn(move || {
            // The receiver may have given up already.
            let _ = tx.send(renderer.render(&layout));
        });

        let timeout = self.config.render_timeout;
        let bytes = match rx.recv_timeout(timeout) {
            Ok(result) => result.map_err(PrintError::Render)?,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                return Err(PrintError::Render(format!("timed out after {} seconds", timeout.as_secs())));
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(PrintError::Render("renderer thread panicked".to_string()));
            }
        };
        if bytes.is_empty() {
            return Err(PrintError::Render("renderer produced an empty document".to_string()));
        }
        Ok(bytes)
    }
}

fn overflow(font_size: f32, spacing_scale: f32, page_count: usize, budget: &PageBudget, passes: usize) -> FitFailure {
    FitFailure::VerificationOverflow {
        font_size,
        spacing_scale,
        page_count,
        max_pages: budget.max_pages.unwrap_or(page_count),
        passes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_basic() {
        let mut req = PrintRequest::new("# Hello\nWorld");
        req.card_format = true;
        let prepared = Assembler::default().prepare(&req).unwrap();
        assert_eq!(&prepared.pdf[0..5], b"%PDF-");
        assert_eq!(prepared.fit.font_size, 10.0);
        assert_eq!(prepared.fit.spacing_scale, 1.0);
        assert!(prepared.fit.searched);
        assert_eq!(prepared.fit.page_count, 1);
    }

    #[test]
    fn empty_content_is_rejected_before_search() {
        let req = PrintRequest::new("  \n\t ");
        let err = Assembler::default().prepare(&req).unwrap_err();
        assert!(matches!(err, PrintError::Input(_)));
    }

    #[test]
    fn standard_paper_uses_fixed_style() {
        let mut req = PrintRequest::new(vec!["line"; 120].join("\n"));
        req.paper = PaperSize::A4;
        req.orientation = PageOrientation::Landscape;
        let prepared = Assembler::default().prepare(&req).unwrap();
        assert!(!prepared.fit.searched);
        assert_eq!(prepared.fit.font_size, 12.0);
        assert!(prepared.fit.page_count > 2);
        assert!((prepared.layout.page_width_pt - 841.89).abs() < 1e-2);
    }

    #[test]
    fn card_paper_size_implies_card_format() {
        let mut req = PrintRequest::new("x");
        req.paper = PaperSize::Card;
        assert!(req.is_card());
        assert_eq!(req.format_label(), "4x6 card");
        let prepared = Assembler::default().prepare(&req).unwrap();
        assert_eq!(prepared.layout.page_height_pt, 288.0);
    }

    #[test]
    fn display_name_becomes_title() {
        let mut req = PrintRequest::new("body");
        req.display_name = Some("  Groceries ".into());
        let doc = Assembler::default().document(&req);
        assert_eq!(doc.title.as_deref(), Some("Groceries"));
        req.display_name = Some("   ".into());
        assert_eq!(Assembler::default().document(&req).title, None);
    }

    #[test]
    fn html_content_is_normalised() {
        let mut req = PrintRequest::new("<h2>Title</h2><ol><li>a</li><li>b</li></ol>");
        req.content_format = ContentFormat::Html;
        let doc = Assembler::default().document(&req);
        assert_eq!(doc.blocks[0].text(), "Title");
        assert_eq!(doc.blocks.len(), 4);
    }
}
