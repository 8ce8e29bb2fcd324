//! Style parameters – every font size and vertical gap used on a page,
//! derived from a base font size and a spacing scale.
//!
//! The same [`StyleParameters`] value drives the height estimate, the
//! verification layout and the final render, so the three can never disagree
//! about how big a heading is.

use serde::{Deserialize, Serialize};

use crate::markup::BlockKind;

/// Line height factor for headings and the title.
pub const HEADING_LEADING: f32 = 1.2;

/// Every derived size, in PDF points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StyleParameters {
    pub title_size: f32,
    pub h1_size: f32,
    pub h2_size: f32,
    pub h3_size: f32,
    pub body_size: f32,
    pub body_leading: f32,
    pub space_after_body: f32,
    pub space_after_h1: f32,
    pub space_after_h2: f32,
    pub space_after_h3: f32,
    pub space_before_h1: f32,
    pub space_before_h2: f32,
    pub space_before_h3: f32,
    pub space_after_title: f32,
}

/// Resolved metrics for one block kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockStyle {
    pub font_size: f32,
    pub leading: f32,
    pub space_before: f32,
    pub space_after: f32,
    pub bold: bool,
}

impl StyleParameters {
    /// Card style for `base_font_size` with vertical whitespace multiplied by
    /// `spacing_scale`.
    ///
    /// Heading sizes sit at a fixed offset above the body size, and every gap
    /// has a floor that holds at any scale.
    pub fn calculate(base_font_size: f32, spacing_scale: f32) -> Self {
        let b = base_font_size;
        let s = spacing_scale;
        Self {
            title_size: b + 4.0,
            h1_size: b + 4.0,
            h2_size: b + 2.0,
            h3_size: b + 1.0,
            body_size: b,
            body_leading: b * (1.0 + 0.2 * s),
            space_after_body: (0.6 * b * s).max(2.0),
            space_after_h1: (1.2 * b * s).max(4.0),
            space_after_h2: (1.0 * b * s).max(3.0),
            space_after_h3: (0.8 * b * s).max(3.0),
            space_before_h1: (1.5 * b * s).max(10.0),
            space_before_h2: (1.2 * b * s).max(8.0),
            space_before_h3: (1.0 * b * s).max(6.0),
            space_after_title: (2.7 * b * s).max(6.0),
        }
    }

    /// Fixed style for the unconstrained (letter/A4/legal) format.
    pub fn standard() -> Self {
        Self {
            title_size: 18.0,
            h1_size: 16.0,
            h2_size: 14.0,
            h3_size: 12.0,
            body_size: 12.0,
            body_leading: 14.0,
            space_after_body: 8.0,
            space_after_h1: 16.0,
            space_after_h2: 12.0,
            space_after_h3: 10.0,
            space_before_h1: 20.0,
            space_before_h2: 16.0,
            space_before_h3: 12.0,
            space_after_title: 40.0,
        }
    }

    /// Metrics for a block kind. Blank blocks have no text; their height is
    /// carried entirely by `space_after`.
    pub fn block_style(&self, kind: BlockKind) -> BlockStyle {
        let heading = |size: f32, before: f32, after: f32| BlockStyle {
            font_size: size,
            leading: size * HEADING_LEADING,
            space_before: before,
            space_after: after,
            bold: true,
        };
        match kind {
            BlockKind::Heading(1) => heading(self.h1_size, self.space_before_h1, self.space_after_h1),
            BlockKind::Heading(2) => heading(self.h2_size, self.space_before_h2, self.space_after_h2),
            BlockKind::Heading(_) => heading(self.h3_size, self.space_before_h3, self.space_after_h3),
            BlockKind::Paragraph | BlockKind::OrderedListItem(_) | BlockKind::UnorderedListItem => {
                BlockStyle {
                    font_size: self.body_size,
                    leading: self.body_leading,
                    space_before: 0.0,
                    space_after: self.space_after_body,
                    bold: false,
                }
            }
            BlockKind::Blank => BlockStyle {
                font_size: self.body_size,
                leading: 0.0,
                space_before: 0.0,
                space_after: self.space_after_body / 2.0,
                bold: false,
            },
        }
    }

    /// Metrics for the centred title line.
    pub fn title_style(&self) -> BlockStyle {
        BlockStyle {
            font_size: self.title_size,
            leading: self.title_size * HEADING_LEADING,
            space_before: 0.0,
            space_after: self.space_after_title,
            bold: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scale_matches_card_defaults() {
        let s = StyleParameters::calculate(10.0, 1.0);
        assert_eq!(s.title_size, 14.0);
        assert_eq!(s.h1_size, 14.0);
        assert_eq!(s.h2_size, 12.0);
        assert_eq!(s.h3_size, 11.0);
        assert!((s.body_leading - 12.0).abs() < 1e-4);
        assert!((s.space_after_body - 6.0).abs() < 1e-4);
        assert!((s.space_before_h1 - 15.0).abs() < 1e-4);
        assert!((s.space_after_title - 27.0).abs() < 1e-4);
    }

    #[test]
    fn calculate_is_pure() {
        for &(f, s) in &[(10.0, 1.0), (7.5, 0.7), (5.0, 0.5)] {
            let a = StyleParameters::calculate(f, s);
            let b = StyleParameters::calculate(f, s);
            assert_eq!(a, b);
            assert_eq!(a.body_size.to_bits(), b.body_size.to_bits());
            assert_eq!(a.body_leading.to_bits(), b.body_leading.to_bits());
        }
    }

    #[test]
    fn spacing_floors_hold_at_extreme_shrink() {
        let s = StyleParameters::calculate(5.0, 0.1);
        assert_eq!(s.space_after_body, 2.0);
        assert_eq!(s.space_before_h1, 10.0);
        assert_eq!(s.space_before_h2, 8.0);
        assert_eq!(s.space_before_h3, 6.0);
        assert!(s.body_leading >= s.body_size);
    }

    #[test]
    fn headings_track_body_size() {
        let small = StyleParameters::calculate(5.0, 1.0);
        assert_eq!(small.h1_size - small.body_size, 4.0);
        assert_eq!(small.h3_size - small.body_size, 1.0);
    }

    #[test]
    fn block_styles_by_kind() {
        let s = StyleParameters::standard();
        let h2 = s.block_style(BlockKind::Heading(2));
        assert!(h2.bold);
        assert_eq!(h2.font_size, 14.0);
        assert_eq!(h2.space_before, 16.0);
        let li = s.block_style(BlockKind::OrderedListItem(3));
        assert_eq!(li.leading, 14.0);
        assert_eq!(s.block_style(BlockKind::Blank).space_after, 4.0);
    }
}
