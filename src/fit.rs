//! Auto-fit search – finds the largest font size and spacing scale whose
//! estimated height fits a capped page budget.
//!
//! The grid is scanned font size first (largest first), and within each font
//! size the spacing scale runs from 1.0 down to its floor. The first point
//! that fits wins, so spacing is always given up before font size.
//!
//! Grid points are addressed by integer indices; the float values are derived
//! from them so repeated steps never drift.

use serde::{Deserialize, Serialize};

use crate::error::FitFailure;
use crate::estimate::estimate_document;
use crate::markup::Document;
use crate::page::PageBudget;
use crate::style::StyleParameters;

/// Search bounds and step sizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitGrid {
    pub max_font: f32,
    pub min_font: f32,
    pub font_step: f32,
    pub max_scale: f32,
    pub min_scale: f32,
    pub scale_step: f32,
}

impl Default for FitGrid {
    fn default() -> Self {
        Self {
            max_font: 10.0,
            min_font: 5.0,
            font_step: 0.5,
            max_scale: 1.0,
            min_scale: 0.5,
            scale_step: 0.1,
        }
    }
}

impl FitGrid {
    /// Number of font sizes in the grid (both ends included).
    pub fn font_count(&self) -> usize {
        steps_between(self.max_font, self.min_font, self.font_step)
    }

    /// Number of spacing scales per font size (both ends included).
    pub fn scale_count(&self) -> usize {
        steps_between(self.max_scale, self.min_scale, self.scale_step)
    }

    /// Upper bound on the number of estimates a search performs.
    pub fn point_count(&self) -> usize {
        self.font_count() * self.scale_count()
    }

    pub fn first(&self) -> GridPoint {
        GridPoint {
            font_index: 0,
            scale_index: 0,
        }
    }

    /// The point scanned after `p`, or `None` past the floor.
    pub fn next(&self, p: GridPoint) -> Option<GridPoint> {
        if p.scale_index + 1 < self.scale_count() {
            Some(GridPoint {
                scale_index: p.scale_index + 1,
                ..p
            })
        } else if p.font_index + 1 < self.font_count() {
            Some(GridPoint {
                font_index: p.font_index + 1,
                scale_index: 0,
            })
        } else {
            None
        }
    }

    pub fn font_size(&self, p: GridPoint) -> f32 {
        round2(self.max_font - p.font_index as f32 * self.font_step)
    }

    pub fn spacing_scale(&self, p: GridPoint) -> f32 {
        round2(self.max_scale - p.scale_index as f32 * self.scale_step)
    }

    pub fn style(&self, p: GridPoint) -> StyleParameters {
        StyleParameters::calculate(self.font_size(p), self.spacing_scale(p))
    }

    fn last(&self) -> GridPoint {
        GridPoint {
            font_index: self.font_count().saturating_sub(1),
            scale_index: self.scale_count().saturating_sub(1),
        }
    }
}

fn steps_between(hi: f32, lo: f32, step: f32) -> usize {
    if step <= 0.0 || hi < lo {
        return 1;
    }
    ((hi - lo) / step + 1e-4).floor() as usize + 1
}

fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

/// Position in the search grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridPoint {
    pub font_index: usize,
    pub scale_index: usize,
}

/// A grid point that the estimate accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitCandidate {
    pub point: GridPoint,
    pub font_size: f32,
    pub spacing_scale: f32,
    pub estimated_height: f32,
    pub usable_height: f32,
}

/// Outcome of fitting one request, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub font_size: f32,
    pub spacing_scale: f32,
    pub estimated_height: f32,
    /// `None` for uncapped budgets.
    pub usable_height: Option<f32>,
    /// Whether the auto-fit search ran at all.
    pub searched: bool,
    pub verification_passes: usize,
    pub accepted: bool,
    pub page_count: usize,
}

/// Scan the whole grid from the top.
pub fn search(doc: &Document, budget: &PageBudget, grid: &FitGrid) -> Result<FitCandidate, FitFailure> {
    search_from(doc, budget, grid, grid.first())
}

/// Scan the grid starting at `start` (inclusive).
///
/// An uncapped budget fits at `start` immediately.
pub fn search_from(
    doc: &Document,
    budget: &PageBudget,
    grid: &FitGrid,
    start: GridPoint,
) -> Result<FitCandidate, FitFailure> {
    let usable = budget.usable_height().unwrap_or(f32::INFINITY);
    let mut point = Some(start);
    let mut evaluated = 0usize;

    while let Some(p) = point {
        let style = grid.style(p);
        let estimated = estimate_document(doc, &style);
        evaluated += 1;
        log::trace!(
            "fit: {:.1}pt scale {:.2} -> {:.1}pt of {:.1}pt",
            grid.font_size(p),
            grid.spacing_scale(p),
            estimated,
            usable
        );
        if estimated <= usable {
            log::debug!(
                "fit: {:.1}pt scale {:.2} fits ({:.1}/{:.1}pt) after {} estimate(s)",
                grid.font_size(p),
                grid.spacing_scale(p),
                estimated,
                usable,
                evaluated
            );
            return Ok(FitCandidate {
                point: p,
                font_size: grid.font_size(p),
                spacing_scale: grid.spacing_scale(p),
                estimated_height: estimated,
                usable_height: usable,
            });
        }
        point = grid.next(p);
    }

    let floor = grid.last();
    let estimated = estimate_document(doc, &grid.style(floor));
    Err(FitFailure::Exhausted {
        font_size: grid.font_size(floor),
        spacing_scale: grid.spacing_scale(floor),
        estimated,
        usable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::parse_markdown;

    fn doc(text: &str) -> Document {
        Document::new(None, parse_markdown(text))
    }

    fn card() -> PageBudget {
        PageBudget::card(7.2, 2)
    }

    #[test]
    fn default_grid_shape() {
        let grid = FitGrid::default();
        assert_eq!(grid.font_count(), 11);
        assert_eq!(grid.scale_count(), 6);
        assert_eq!(grid.point_count(), 66);
        let last = grid.last();
        assert_eq!(grid.font_size(last), 5.0);
        assert_eq!(grid.spacing_scale(last), 0.5);
        assert_eq!(grid.spacing_scale(GridPoint { font_index: 0, scale_index: 3 }), 0.7);
    }

    #[test]
    fn next_walks_scale_then_font() {
        let grid = FitGrid::default();
        let mut p = grid.first();
        let mut seen = 1;
        while let Some(n) = grid.next(p) {
            assert!(n > p);
            p = n;
            seen += 1;
        }
        assert_eq!(seen, grid.point_count());
    }

    #[test]
    fn short_content_keeps_max_font_and_full_spacing() {
        let found = search(&doc("A short note."), &card(), &FitGrid::default()).unwrap();
        assert_eq!(found.font_size, 10.0);
        assert_eq!(found.spacing_scale, 1.0);
    }

    #[test]
    fn spacing_shrinks_before_font() {
        // 34 paragraphs: 34 × 16 = 544pt at 10pt/1.0, just under 547.2.
        // 35 × 16 = 560 does not fit; at scale 0.9 each is 10 + 5.4 = 15.4 → 539.
        let text = vec!["line"; 35].join("\n");
        let found = search(&doc(&text), &card(), &FitGrid::default()).unwrap();
        assert_eq!(found.font_size, 10.0);
        assert_eq!(found.spacing_scale, 0.9);
    }

    #[test]
    fn returns_fitting_point_whenever_one_exists() {
        let grid = FitGrid::default();
        let budget = card();
        for n in [1usize, 20, 40, 60, 75, 90] {
            let d = doc(&vec!["# H\nsome text\n- item"; n].join("\n\n"));
            let any_fits = {
                let mut p = Some(grid.first());
                let mut fits = false;
                while let Some(q) = p {
                    if estimate_document(&d, &grid.style(q)) <= budget.usable_height().unwrap() {
                        fits = true;
                        break;
                    }
                    p = grid.next(q);
                }
                fits
            };
            match search(&d, &budget, &grid) {
                Ok(found) => {
                    assert!(any_fits);
                    assert!(found.estimated_height <= found.usable_height);
                }
                Err(_) => assert!(!any_fits, "search missed a fit for n={n}"),
            }
        }
    }

    #[test]
    fn exhausted_grid_is_a_failure() {
        let text = vec!["paragraph"; 200].join("\n");
        let err = search(&doc(&text), &card(), &FitGrid::default()).unwrap_err();
        match err {
            FitFailure::Exhausted {
                font_size,
                spacing_scale,
                estimated,
                usable,
            } => {
                assert_eq!(font_size, 5.0);
                assert_eq!(spacing_scale, 0.5);
                assert!(estimated > usable);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn resume_skips_earlier_points() {
        let grid = FitGrid::default();
        let start = GridPoint {
            font_index: 2,
            scale_index: 0,
        };
        let found = search_from(&doc("tiny"), &card(), &grid, start).unwrap();
        assert_eq!(found.point, start);
        assert_eq!(found.font_size, 9.0);
    }

    #[test]
    fn title_counts_against_the_budget() {
        // 33 lines fit bare (528pt) but not with a 41pt title.
        let text = vec!["line"; 33].join("\n");
        let bare = Document::new(None, parse_markdown(&text));
        let titled = Document::new(Some("Title".into()), parse_markdown(&text));
        let grid = FitGrid::default();
        assert_eq!(search(&bare, &card(), &grid).unwrap().spacing_scale, 1.0);
        assert!(search(&titled, &card(), &grid).unwrap().spacing_scale < 1.0);
    }
}
