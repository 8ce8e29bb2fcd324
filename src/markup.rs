//! Markup normaliser – turns lightweight Markdown into a flat, ordered list of
//! typed [`ContentBlock`]s.
//!
//! Supported line syntax:
//! - `#`, `##`, `###` headings (a space after the hashes is required)
//! - `1.` ordered items, `-` / `*` / `+` / `•` unordered items
//! - blank lines
//! - everything else is a paragraph
//!
//! Inline `**bold**` and `*italic*` markers are resolved into [`InlineRun`]s.
//! Nothing here ever fails: text that does not match a rule is kept verbatim.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Block model
// ---------------------------------------------------------------------------

/// Structural kind of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockKind {
    /// Heading level 1–3.
    Heading(u8),
    Paragraph,
    /// Ordered list item carrying its display number.
    OrderedListItem(u32),
    UnorderedListItem,
    Blank,
}

/// A run of text sharing one emphasis style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

impl InlineRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
        }
    }

    /// Same emphasis, different text.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: self.bold,
            italic: self.italic,
        }
    }

    pub fn same_style(&self, other: &InlineRun) -> bool {
        self.bold == other.bold && self.italic == other.italic
    }
}

/// One block of normalised content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub kind: BlockKind,
    pub runs: Vec<InlineRun>,
}

impl ContentBlock {
    pub fn new(kind: BlockKind, runs: Vec<InlineRun>) -> Self {
        Self { kind, runs }
    }

    pub fn blank() -> Self {
        Self::new(BlockKind::Blank, Vec::new())
    }

    /// Plain display text with emphasis hints dropped.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// Everything that goes on the page for one request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    /// Centred title line (the request's display name).
    pub title: Option<String>,
    pub blocks: Vec<ContentBlock>,
}

impl Document {
    pub fn new(title: Option<String>, blocks: Vec<ContentBlock>) -> Self {
        Self { title, blocks }
    }
}

/// Anything that can turn request text into a block stream.
pub trait MarkupSource {
    fn blocks(&self, text: &str) -> Vec<ContentBlock>;
}

/// Line-oriented Markdown source (the default).
#[derive(Debug, Clone, Copy, Default)]
pub struct Markdown;

impl MarkupSource for Markdown {
    fn blocks(&self, text: &str) -> Vec<ContentBlock> {
        parse_markdown(text)
    }
}

// ---------------------------------------------------------------------------
// Line parser
// ---------------------------------------------------------------------------

/// Which kind of list the previous list line belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListState {
    None,
    Ordered(u32),
    Unordered,
}

/// Parse Markdown text into blocks.
pub fn parse_markdown(text: &str) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    let mut list = ListState::None;

    for raw in text.lines() {
        let line = raw.trim();

        if line.is_empty() {
            // Blank lines do not break list continuity.
            blocks.push(ContentBlock::blank());
            continue;
        }

        if let Some((written, rest)) = ordered_item(line) {
            let index = match list {
                ListState::Ordered(prev) => prev.saturating_add(1),
                ListState::None | ListState::Unordered => written,
            };
            list = ListState::Ordered(index);
            blocks.push(ContentBlock::new(
                BlockKind::OrderedListItem(index),
                parse_inline(rest),
            ));
            continue;
        }

        if let Some(rest) = unordered_item(line) {
            // Switching type keeps the numbers already emitted; a later
            // ordered item starts a fresh list from its written number.
            list = ListState::Unordered;
            blocks.push(ContentBlock::new(
                BlockKind::UnorderedListItem,
                parse_inline(rest),
            ));
            continue;
        }

        list = ListState::None;

        let block = match heading(line) {
            Some((level, rest)) => {
                ContentBlock::new(BlockKind::Heading(level), parse_inline(rest))
            }
            None => ContentBlock::new(BlockKind::Paragraph, parse_inline(line)),
        };
        blocks.push(block);
    }

    blocks
}

/// `N. text` → `(N, text)`.
fn ordered_item(line: &str) -> Option<(u32, &str)> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    let rest = line[digits..].strip_prefix('.')?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    if rest.is_empty() {
        return None;
    }
    let number = line[..digits].parse().ok()?;
    Some((number, rest))
}

/// `- text`, `* text`, `+ text` or `• text` → `text`.
fn unordered_item(line: &str) -> Option<&str> {
    let mut chars = line.chars();
    let marker = chars.next()?;
    if !matches!(marker, '-' | '*' | '+' | '\u{2022}') {
        return None;
    }
    let rest = chars.as_str();
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    if rest.is_empty() {
        return None;
    }
    Some(rest)
}

/// `# text` → `(1, text)`; levels deeper than 3 are not headings.
fn heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    if !(1..=3).contains(&hashes) {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some((hashes as u8, rest.trim()))
}

// ---------------------------------------------------------------------------
// Inline emphasis
// ---------------------------------------------------------------------------

/// Split a line into runs, resolving `**bold**` and `*italic*`.
///
/// A marker only opens a span when a matching closer exists further along the
/// line; otherwise it is kept as a literal character.
pub fn parse_inline(text: &str) -> Vec<InlineRun> {
    let chars: Vec<char> = text.chars().collect();
    let mut runs: Vec<InlineRun> = Vec::new();
    let mut buf = String::new();
    let mut bold = false;
    let mut italic = false;
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '*' {
            let double = chars.get(i + 1) == Some(&'*');
            let width = if double { 2 } else { 1 };
            let open = if double { bold } else { italic };
            let toggles = open || has_closer(&chars[i + width..], double);
            if toggles {
                flush(&mut runs, &mut buf, bold, italic);
                if double {
                    bold = !bold;
                } else {
                    italic = !italic;
                }
                i += width;
                continue;
            }
        }
        buf.push(chars[i]);
        i += 1;
    }
    flush(&mut runs, &mut buf, bold, italic);

    if runs.is_empty() {
        runs.push(InlineRun::plain(""));
    }
    runs
}

fn has_closer(rest: &[char], double: bool) -> bool {
    if rest.first().map_or(true, |c| c.is_whitespace()) {
        return false;
    }
    if double {
        rest.windows(2).skip(1).any(|w| w == ['*', '*'])
    } else {
        (1..rest.len()).any(|j| {
            rest[j] == '*'
                && rest.get(j + 1) != Some(&'*')
                && rest.get(j - 1) != Some(&'*')
        })
    }
}

fn flush(runs: &mut Vec<InlineRun>, buf: &mut String, bold: bool, italic: bool) {
    if buf.is_empty() {
        return;
    }
    let text = std::mem::take(buf);
    match runs.last_mut() {
        Some(last) if last.bold == bold && last.italic == italic => last.text.push_str(&text),
        _ => runs.push(InlineRun { text, bold, italic }),
    }
}
