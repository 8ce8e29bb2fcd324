//! Page geometry and page budgets.

use serde::{Deserialize, Serialize};

/// Points per inch.
pub const PT_PER_INCH: f32 = 72.0;

/// Default card margin: 0.1in.
pub const CARD_MARGIN_PT: f32 = 7.2;

/// Default margin for standard paper: 0.75in.
pub const STANDARD_MARGIN_PT: f32 = 54.0;

/// Page orientation for standard paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageOrientation {
    #[default]
    Portrait,
    Landscape,
}

/// Supported paper sizes. `Card` is the landscape 6in x 4in index card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    #[default]
    Letter,
    A4,
    Legal,
    #[serde(rename = "4x6")]
    Card,
}

impl PaperSize {
    /// Portrait `(width, height)` in points.
    pub fn dimensions(self) -> (f32, f32) {
        match self {
            PaperSize::Letter => (612.0, 792.0),
            PaperSize::A4 => (595.28, 841.89),
            PaperSize::Legal => (612.0, 1008.0),
            // Cards are used lying down: 6in wide, 4in tall.
            PaperSize::Card => (6.0 * PT_PER_INCH, 4.0 * PT_PER_INCH),
        }
    }
}

/// Physical page: size and uniform margin, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub width_pt: f32,
    pub height_pt: f32,
    pub margin_pt: f32,
}

impl PageGeometry {
    pub fn card(margin_pt: f32) -> Self {
        let (w, h) = PaperSize::Card.dimensions();
        Self {
            width_pt: w,
            height_pt: h,
            margin_pt,
        }
    }

    /// Standard paper; landscape swaps width and height.
    pub fn paper(size: PaperSize, orientation: PageOrientation, margin_pt: f32) -> Self {
        let (w, h) = size.dimensions();
        let (width_pt, height_pt) = match orientation {
            PageOrientation::Portrait => (w, h),
            PageOrientation::Landscape => (h, w),
        };
        Self {
            width_pt,
            height_pt,
            margin_pt,
        }
    }

    pub fn content_width(&self) -> f32 {
        self.width_pt - 2.0 * self.margin_pt
    }

    pub fn content_height(&self) -> f32 {
        self.height_pt - 2.0 * self.margin_pt
    }
}

/// Geometry plus an optional cap on the number of pages.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBudget {
    pub geometry: PageGeometry,
    /// `None` means any number of pages is fine.
    pub max_pages: Option<usize>,
}

impl PageBudget {
    pub fn card(margin_pt: f32, max_pages: usize) -> Self {
        Self {
            geometry: PageGeometry::card(margin_pt),
            max_pages: Some(max_pages),
        }
    }

    pub fn unbounded(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            max_pages: None,
        }
    }

    /// Total content height across all allowed pages, if capped.
    pub fn usable_height(&self) -> Option<f32> {
        self.max_pages
            .map(|n| self.geometry.content_height() * n as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_is_six_by_four() {
        let g = PageGeometry::card(CARD_MARGIN_PT);
        assert_eq!(g.width_pt, 432.0);
        assert_eq!(g.height_pt, 288.0);
    }

    #[test]
    fn card_budget_spans_two_pages() {
        let budget = PageBudget::card(7.2, 2);
        let usable = budget.usable_height().unwrap();
        assert!((usable - 2.0 * (288.0 - 14.4)).abs() < 1e-3);
        assert_eq!(PageBudget::unbounded(budget.geometry).usable_height(), None);
    }

    #[test]
    fn landscape_swaps_dimensions() {
        let g = PageGeometry::paper(PaperSize::Letter, PageOrientation::Landscape, 54.0);
        assert_eq!((g.width_pt, g.height_pt), (792.0, 612.0));
    }

    #[test]
    fn paper_size_names() {
        let p: PaperSize = serde_json::from_str("\"4x6\"").unwrap();
        assert_eq!(p, PaperSize::Card);
        let p: PaperSize = serde_json::from_str("\"a4\"").unwrap();
        assert_eq!(p, PaperSize::A4);
    }
}
