//! HTML block source – parses a controlled HTML subset and flattens it into
//! [`ContentBlock`]s.
//!
//! Supported elements:
//! - Block: h1-h3, p, ul, ol, li, div, br
//! - Inline emphasis: strong/b, em/i, span
//! - html/body/head wrappers, comments and doctype are skipped
//!
//! Unknown tags are transparent containers, so any fragment produces some
//! text rather than an error.

use std::collections::HashMap;

use crate::markup::{BlockKind, ContentBlock, InlineRun, MarkupSource};

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Div,
    P,
    H1,
    H2,
    H3,
    Ul,
    Ol,
    Li,
    Strong,
    Em,
    Span,
    Br,
    Body,
    Html,
    Head,
    Unknown(String),
}

impl Tag {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "div" => Tag::Div,
            "p" => Tag::P,
            "h1" => Tag::H1,
            "h2" => Tag::H2,
            "h3" => Tag::H3,
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "strong" | "b" => Tag::Strong,
            "em" | "i" => Tag::Em,
            "span" => Tag::Span,
            "br" => Tag::Br,
            "body" => Tag::Body,
            "html" => Tag::Html,
            "head" => Tag::Head,
            other => Tag::Unknown(other.to_string()),
        }
    }

    fn is_void(&self) -> bool {
        matches!(self, Tag::Br)
            || matches!(self, Tag::Unknown(t) if matches!(t.as_str(), "hr" | "img" | "meta" | "link" | "input"))
    }

    fn is_inline(&self) -> bool {
        matches!(self, Tag::Strong | Tag::Em | Tag::Span | Tag::Br)
    }
}

#[derive(Debug, Clone)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    /// `start` attribute of an `<ol>`.
    pub fn list_start(&self) -> u32 {
        self.attributes
            .get("start")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(1)
    }
}

// ---------------------------------------------------------------------------
// Parser – simple recursive descent over HTML
// ---------------------------------------------------------------------------

/// Elements nested deeper than this lose their tags; their text is kept.
const MAX_NESTING: usize = 256;

/// Parse an HTML string into a list of DOM nodes.
pub fn parse_html(html: &str) -> Vec<DomNode> {
    let mut parser = Parser::new(html);
    let mut nodes = parser.parse_nodes(0);
    // A stray closing tag at the top level ends `parse_nodes` early; drop it
    // and keep going so the rest of the fragment is not lost.
    while !parser.eof() {
        parser.advance(2);
        parser.parse_tag_name();
        while !parser.eof() && !parser.starts_with(">") {
            parser.advance(1);
        }
        parser.advance(1);
        nodes.extend(parser.parse_nodes(0));
    }
    nodes
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse_nodes(&mut self, depth: usize) -> Vec<DomNode> {
        let mut nodes = Vec::new();
        loop {
            self.skip_whitespace_preserve();
            if self.eof() || self.starts_with("</") {
                break;
            }
            if let Some(node) = self.parse_node(depth) {
                nodes.push(node);
            }
        }
        nodes
    }

    fn parse_node(&mut self, depth: usize) -> Option<DomNode> {
        if self.starts_with("<!--") {
            self.skip_comment();
            return None;
        }
        let opens_element = self.starts_with("<") && self.next_is_tag_start();
        if self.starts_with("<!") || self.starts_with("<?") || (opens_element && depth >= MAX_NESTING) {
            self.skip_tag();
            return None;
        }
        if opens_element {
            Some(self.parse_element(depth))
        } else {
            Some(self.parse_text())
        }
    }

    /// A `<` not followed by a letter is literal text ("a < b").
    fn next_is_tag_start(&self) -> bool {
        self.input[self.pos + 1..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
    }

    fn at_markup(&self) -> bool {
        self.starts_with("</") || self.starts_with("<!") || (self.starts_with("<") && self.next_is_tag_start())
    }

    fn parse_text(&mut self) -> DomNode {
        let start = self.pos;
        // Always consume at least one char so a stray '<' cannot stall us.
        self.advance(1);
        while !self.eof() && !self.at_markup() {
            self.advance(1);
        }
        DomNode::Text(decode_entities(&self.input[start..self.pos]))
    }

    fn parse_element(&mut self, depth: usize) -> DomNode {
        self.advance(1); // '<'
        let tag_name = self.parse_tag_name();
        let tag = Tag::parse(&tag_name);
        let mut elem = ElementNode::new(tag.clone());

        loop {
            self.skip_whitespace();
            if self.eof() || self.starts_with(">") || self.starts_with("/>") {
                break;
            }
            let before = self.pos;
            let (key, value) = self.parse_attribute();
            if self.pos == before {
                // Garbage inside the tag; skip one char and carry on.
                self.advance(1);
                continue;
            }
            elem.attributes.insert(key.to_ascii_lowercase(), value);
        }

        if self.starts_with("/>") {
            self.advance(2);
            return DomNode::Element(elem);
        }
        if self.starts_with(">") {
            self.advance(1);
        }
        if tag.is_void() {
            return DomNode::Element(elem);
        }

        elem.children = self.parse_nodes(depth + 1);

        if self.starts_with("</") {
            self.advance(2);
            self.parse_tag_name();
            self.skip_whitespace();
            if self.starts_with(">") {
                self.advance(1);
            }
        }

        DomNode::Element(elem)
    }

    fn parse_tag_name(&mut self) -> String {
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_alphanumeric() || c == '-' || c == '_' {
                self.advance(1);
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(&mut self) -> (String, String) {
        let key = self.parse_tag_name();
        self.skip_whitespace();
        if !self.starts_with("=") {
            return (key, String::new());
        }
        self.advance(1);
        self.skip_whitespace();
        let value = self.parse_attr_value();
        (key, value)
    }

    fn parse_attr_value(&mut self) -> String {
        for quote in ["\"", "'"] {
            if self.starts_with(quote) {
                self.advance(1);
                let start = self.pos;
                while !self.eof() && !self.starts_with(quote) {
                    self.advance(1);
                }
                let val = self.input[start..self.pos].to_string();
                if !self.eof() {
                    self.advance(1);
                }
                return decode_entities(&val);
            }
        }
        let start = self.pos;
        while !self.eof() {
            let c = self.current_char();
            if c.is_whitespace() || c == '>' || c == '/' {
                break;
            }
            self.advance(1);
        }
        self.input[start..self.pos].to_string()
    }

    fn skip_whitespace(&mut self) {
        while !self.eof() && self.current_char().is_whitespace() {
            self.advance(1);
        }
    }

    fn skip_whitespace_preserve(&mut self) {
        let saved = self.pos;
        while !self.eof() && self.current_char().is_whitespace() {
            self.advance(1);
        }
        if !self.eof() && !self.starts_with("<") {
            self.pos = saved;
        }
    }

    fn skip_tag(&mut self) {
        while !self.eof() && !self.starts_with(">") {
            self.advance(1);
        }
        if !self.eof() {
            self.advance(1);
        }
    }

    fn skip_comment(&mut self) {
        self.advance(4);
        while !self.eof() && !self.starts_with("-->") {
            self.advance(1);
        }
        if !self.eof() {
            self.advance(3);
        }
    }

    fn starts_with(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> char {
        self.input[self.pos..].chars().next().unwrap_or('\0')
    }

    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            if let Some(c) = self.input[self.pos..].chars().next() {
                self.pos += c.len_utf8();
            }
        }
    }
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{00A0}")
        .replace("&amp;", "&")
}

// ---------------------------------------------------------------------------
// DOM → blocks
// ---------------------------------------------------------------------------

/// HTML fragment source.
#[derive(Debug, Clone, Copy, Default)]
pub struct Html;

impl MarkupSource for Html {
    fn blocks(&self, text: &str) -> Vec<ContentBlock> {
        let dom = parse_html(text);
        let mut out = Vec::new();
        flatten(&dom, None, &mut out);
        out
    }
}

/// List context of the enclosing `<ul>`/`<ol>`.
#[derive(Debug, Clone, Copy)]
enum ListCtx {
    Ordered { next: u32 },
    Unordered,
}

fn flatten(nodes: &[DomNode], mut list: Option<&mut ListCtx>, out: &mut Vec<ContentBlock>) {
    // Loose inline content between blocks gathers into one paragraph.
    let mut pending: Vec<InlineRun> = Vec::new();

    for node in nodes {
        let is_block = match node {
            DomNode::Text(_) => false,
            DomNode::Element(e) => !e.tag.is_inline(),
        };
        if !is_block {
            collect_runs(node, false, false, &mut pending);
            continue;
        }
        flush_paragraph(&mut pending, out);

        let DomNode::Element(e) = node else { continue };
        match &e.tag {
            Tag::Head => {}
            Tag::H1 | Tag::H2 | Tag::H3 => {
                let level = match e.tag {
                    Tag::H1 => 1,
                    Tag::H2 => 2,
                    _ => 3,
                };
                out.push(ContentBlock::new(BlockKind::Heading(level), inline_runs(e)));
            }
            Tag::P => {
                let runs = inline_runs(e);
                if !is_blank(&runs) {
                    out.push(ContentBlock::new(BlockKind::Paragraph, runs));
                }
            }
            Tag::Ul | Tag::Ol => {
                let mut ctx = if e.tag == Tag::Ol {
                    ListCtx::Ordered {
                        next: e.list_start(),
                    }
                } else {
                    ListCtx::Unordered
                };
                flatten(&e.children, Some(&mut ctx), out);
                out.push(ContentBlock::blank());
            }
            Tag::Li => {
                let kind = match list.as_deref_mut() {
                    Some(ListCtx::Ordered { next }) => {
                        let index = *next;
                        *next = next.saturating_add(1);
                        BlockKind::OrderedListItem(index)
                    }
                    _ => BlockKind::UnorderedListItem,
                };
                out.push(ContentBlock::new(kind, inline_runs(e)));
            }
            _ => flatten(&e.children, list.as_deref_mut(), out),
        }
    }
    flush_paragraph(&mut pending, out);
}

fn flush_paragraph(pending: &mut Vec<InlineRun>, out: &mut Vec<ContentBlock>) {
    let runs = std::mem::take(pending);
    if !is_blank(&runs) {
        out.push(ContentBlock::new(BlockKind::Paragraph, normalise_space(runs)));
    }
}

fn is_blank(runs: &[InlineRun]) -> bool {
    runs.iter().all(|r| r.text.trim().is_empty())
}

/// Inline text of an element with whitespace collapsed.
fn inline_runs(e: &ElementNode) -> Vec<InlineRun> {
    let mut runs = Vec::new();
    for child in &e.children {
        collect_runs(child, false, false, &mut runs);
    }
    let runs = normalise_space(runs);
    if runs.is_empty() {
        vec![InlineRun::plain("")]
    } else {
        runs
    }
}

fn collect_runs(node: &DomNode, bold: bool, italic: bool, out: &mut Vec<InlineRun>) {
    match node {
        DomNode::Text(t) => out.push(InlineRun {
            text: t.clone(),
            bold,
            italic,
        }),
        DomNode::Element(e) => {
            let bold = bold || e.tag == Tag::Strong;
            let italic = italic || e.tag == Tag::Em;
            if e.tag == Tag::Br {
                out.push(InlineRun {
                    text: " ".to_string(),
                    bold,
                    italic,
                });
            }
            for child in &e.children {
                collect_runs(child, bold, italic, out);
            }
        }
    }
}

/// Collapse whitespace runs to single spaces (across run boundaries) and
/// merge neighbours with the same emphasis.
fn normalise_space(runs: Vec<InlineRun>) -> Vec<InlineRun> {
    let mut out: Vec<InlineRun> = Vec::new();
    let mut last_was_space = true;
    for run in runs {
        let mut text = String::new();
        for c in run.text.chars() {
            if c.is_whitespace() && c != '\u{00A0}' {
                if !last_was_space {
                    text.push(' ');
                }
                last_was_space = true;
            } else {
                text.push(c);
                last_was_space = false;
            }
        }
        if text.is_empty() {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.same_style(&run) => last.text.push_str(&text),
            _ => out.push(run.with_text(text)),
        }
    }
    if let Some(last) = out.last_mut() {
        let trimmed = last.text.trim_end().len();
        last.text.truncate(trimmed);
    }
    out.retain(|r| !r.text.is_empty());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(html: &str) -> Vec<ContentBlock> {
        Html.blocks(html)
    }

    #[test]
    fn parse_nested_emphasis() {
        let nodes = parse_html("<p>Hello <strong>world</strong>!</p>");
        assert_eq!(nodes.len(), 1);
        if let DomNode::Element(e) = &nodes[0] {
            assert_eq!(e.tag, Tag::P);
            assert_eq!(e.children.len(), 3);
        } else {
            panic!("Expected p element");
        }
    }

    #[test]
    fn headings_and_paragraphs() {
        let b = blocks("<h1>Title</h1>\n<p>Body <em>text</em></p>\n<h3>Small</h3>");
        let kinds: Vec<_> = b.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![BlockKind::Heading(1), BlockKind::Paragraph, BlockKind::Heading(3)]
        );
        assert_eq!(b[1].text(), "Body text");
        assert!(b[1].runs.iter().any(|r| r.italic && r.text == "text"));
    }

    #[test]
    fn ordered_list_counts_from_start() {
        let b = blocks(r#"<ol start="4"><li>a</li><li>b</li></ol><ul><li>c</li></ul>"#);
        let kinds: Vec<_> = b.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BlockKind::OrderedListItem(4),
                BlockKind::OrderedListItem(5),
                BlockKind::Blank,
                BlockKind::UnorderedListItem,
                BlockKind::Blank
            ]
        );
    }

    #[test]
    fn body_wrapper_and_comments_are_skipped() {
        let b = blocks(
            "<!DOCTYPE html><html><head><title>x</title></head><body><!-- c --><p>Only</p></body></html>",
        );
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].text(), "Only");
    }

    #[test]
    fn loose_text_becomes_paragraph() {
        let b = blocks("just   some\n text &amp; more");
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].kind, BlockKind::Paragraph);
        assert_eq!(b[0].text(), "just some text & more");
    }

    #[test]
    fn stray_closing_tag_does_not_truncate() {
        let b = blocks("<p>one</p></div><p>two</p>");
        assert_eq!(b.len(), 2);
        assert_eq!(b[1].text(), "two");
    }

    #[test]
    fn deep_nesting_keeps_text() {
        let html = "<div>".repeat(50_000) + "deep <b>text</b>" + &"</div>".repeat(50_000);
        let b = blocks(&html);
        assert_eq!(b.len(), 1);
        assert_eq!(b[0].kind, BlockKind::Paragraph);
        assert_eq!(b[0].text(), "deep text");

        let unclosed = "<div>".repeat(50_000) + "x";
        assert_eq!(blocks(&unclosed)[0].text(), "x");
    }

    #[test]
    fn stray_angle_bracket_is_text() {
        let b = blocks("<p>a < b</p>");
        assert_eq!(b[0].text(), "a < b");
    }
}
