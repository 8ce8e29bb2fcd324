//! Built-in test pages for the `test_print` tool.
//!
//! Each page exercises headings, emphasis and lists so one print shows
//! whether the whole formatting path works on a given printer.

/// Test page sized for a 4x6 index card.
pub fn card_test_page() -> &'static str {
    r#"# 4x6 Index Card Test

This is a **test page** for 4x6 index card printing.

## Features Tested:
- *Italic text*
- **Bold text**
- Headers (H1, H2, H3)
- Lists

### Card Specifications:
- Size: 4" x 6"
- Auto-scaling enabled
- Optimized fonts

If you can read this clearly, your 4x6 setup is working!
"#
}

/// Test page for letter/A4/legal paper.
pub fn standard_test_page() -> &'static str {
    r#"# Printer Test Page

This is a **test page** to verify your printer setup.

## Features Tested:
- **Bold text** formatting
- *Italic text* formatting
- Headers (H1, H2)
- Lists and spacing
- Page layout

## System Information:
- card-printer MCP server
- Direct PDF printing
- Markdown formatting supported

If this page prints correctly, your setup is working!
"#
}

/// The test page for the chosen format.
pub fn test_page(card: bool) -> &'static str {
    if card {
        card_test_page()
    } else {
        standard_test_page()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::{parse_markdown, BlockKind};

    #[test]
    fn test_pages_use_every_heading_level() {
        let blocks = parse_markdown(card_test_page());
        for level in 1..=3 {
            assert!(blocks.iter().any(|b| b.kind == BlockKind::Heading(level)), "missing h{level}");
        }
        assert!(blocks.iter().any(|b| b.runs.iter().any(|r| r.bold)));
        assert!(blocks.iter().any(|b| b.runs.iter().any(|r| r.italic)));
    }

    #[test]
    fn format_selects_page() {
        assert!(test_page(true).starts_with("# 4x6"));
        assert!(test_page(false).starts_with("# Printer Test Page"));
    }
}
