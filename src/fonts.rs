//! Text measurement and line wrapping.
//!
//! Output uses the builtin Helvetica family, so by default widths come from
//! its standard advance tables ([`crate::helvetica`]). A TrueType face can be
//! loaded to measure with its glyph advances instead (`--metrics-font`).

use std::collections::HashMap;

use crate::helvetica;
use crate::markup::InlineRun;

/// A loaded font face with metrics.
#[derive(Clone)]
pub struct FontData {
    /// Raw font bytes (kept alive for ttf-parser's zero-copy API).
    pub bytes: Vec<u8>,
    pub units_per_em: f32,
    pub ascender: f32,
    pub descender: f32,
}

/// Emphasis variant of the family.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub bold: bool,
    pub italic: bool,
}

/// Measures text for the layout pass.
pub struct FontManager {
    fonts: HashMap<FontKey, FontData>,
}

impl FontManager {
    /// Builtin Helvetica metrics only.
    pub fn new() -> Self {
        Self {
            fonts: HashMap::new(),
        }
    }

    /// Register a TTF/OTF face for one emphasis variant.
    pub fn load_font(&mut self, bold: bool, italic: bool, bytes: Vec<u8>) -> Result<(), String> {
        let face = ttf_parser::Face::parse(&bytes, 0).map_err(|e| format!("Failed to parse font: {e}"))?;
        let data = FontData {
            units_per_em: face.units_per_em() as f32,
            ascender: face.ascender() as f32,
            descender: face.descender() as f32,
            bytes,
        };
        self.fonts.insert(FontKey { bold, italic }, data);
        Ok(())
    }

    /// Load one face from disk and use it for every variant.
    pub fn from_file(path: &std::path::Path) -> Result<Self, String> {
        let bytes = std::fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
        let mut mgr = Self::new();
        for (bold, italic) in [(false, false), (true, false), (false, true), (true, true)] {
            mgr.load_font(bold, italic, bytes.clone())?;
        }
        log::debug!("metrics font loaded from {}", path.display());
        Ok(mgr)
    }

    pub fn has_real_fonts(&self) -> bool {
        !self.fonts.is_empty()
    }

    /// Width of `text` at `font_size`, in points.
    pub fn measure_text_width(&self, text: &str, font_size: f32, bold: bool, italic: bool) -> f32 {
        let data = self
            .fonts
            .get(&FontKey { bold, italic })
            .or_else(|| self.fonts.get(&FontKey { bold: false, italic: false }));

        let Some(data) = data else {
            return helvetica::text_width(text, font_size, bold);
        };

        match ttf_parser::Face::parse(&data.bytes, 0) {
            Ok(face) => {
                let scale = font_size / data.units_per_em;
                text.chars()
                    .map(|ch| match face.glyph_index(ch) {
                        Some(gid) => face.glyph_hor_advance(gid).unwrap_or(0) as f32 * scale,
                        None => font_size * 0.5,
                    })
                    .sum()
            }
            Err(_) => helvetica::text_width(text, font_size, bold),
        }
    }

    pub fn measure_runs(&self, runs: &[InlineRun], font_size: f32, base_bold: bool) -> f32 {
        runs.iter()
            .map(|r| self.measure_text_width(&r.text, font_size, base_bold || r.bold, r.italic))
            .sum()
    }

    /// Distance from the top of a line to its baseline.
    pub fn ascender(&self, font_size: f32) -> f32 {
        match self.fonts.get(&FontKey { bold: false, italic: false }) {
            Some(d) => d.ascender * font_size / d.units_per_em,
            None => font_size * helvetica::ASCENDER,
        }
    }
}

impl Default for FontManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Word-wrap styled runs to `max_width`. Each returned line is a list of runs
/// with adjacent same-style words merged; lines never start or end with a
/// space. A word wider than the whole line is broken between characters, so
/// no line measures wider than `max_width` unless a single glyph does.
pub fn wrap_runs(
    runs: &[InlineRun],
    font_size: f32,
    base_bold: bool,
    max_width: f32,
    fonts: &FontManager,
) -> Vec<Vec<InlineRun>> {
    let words = split_words(runs);
    if words.is_empty() {
        return vec![Vec::new()];
    }
    if max_width <= 0.0 {
        return vec![join_words(&words)];
    }

    let measure = |text: &str, w: &Word| fonts.measure_text_width(text, font_size, base_bold || w.bold, w.italic);
    let space = fonts.measure_text_width(" ", font_size, base_bold, false);

    let mut lines = Vec::new();
    let mut current: Vec<Word> = Vec::new();
    let mut current_width = 0.0f32;

    for cluster in clusters(words) {
        let width: f32 = cluster.iter().map(|w| measure(&w.text, w)).sum();
        let gap = if current.is_empty() { 0.0 } else { space };
        if current_width + gap + width <= max_width {
            current_width += gap + width;
            current.extend(cluster);
            continue;
        }
        if !current.is_empty() {
            lines.push(join_words(&current));
            current.clear();
        }
        if width <= max_width {
            current = cluster;
            current_width = width;
            continue;
        }

        // Too wide for any line: fill lines character by character.
        current_width = 0.0;
        for word in cluster {
            let mut started = false;
            let mut buf = [0u8; 4];
            for ch in word.text.chars() {
                let cw = measure(ch.encode_utf8(&mut buf), &word);
                if !current.is_empty() && current_width + cw > max_width {
                    lines.push(join_words(&current));
                    current.clear();
                    current_width = 0.0;
                    started = false;
                }
                if !started {
                    current.push(Word {
                        text: String::new(),
                        bold: word.bold,
                        italic: word.italic,
                        glued: true,
                    });
                    started = true;
                }
                if let Some(piece) = current.last_mut() {
                    piece.text.push(ch);
                }
                current_width += cw;
            }
        }
    }
    if !current.is_empty() {
        lines.push(join_words(&current));
    }
    lines
}

/// Group each word with the glued words that continue it.
fn clusters(words: Vec<Word>) -> Vec<Vec<Word>> {
    let mut out: Vec<Vec<Word>> = Vec::new();
    for word in words {
        match out.last_mut() {
            Some(cluster) if word.glued => cluster.push(word),
            _ => out.push(vec![word]),
        }
    }
    out
}

/// A whitespace-delimited piece of a run. `glued` words continue the
/// previous word without a space (emphasis changed mid-word).
#[derive(Debug, Clone)]
struct Word {
    text: String,
    bold: bool,
    italic: bool,
    glued: bool,
}

fn split_words(runs: &[InlineRun]) -> Vec<Word> {
    let mut words: Vec<Word> = Vec::new();
    // Whitespace seen since the last word character.
    let mut boundary = true;
    for run in runs {
        let mut chunk = String::new();
        let mut glued = false;
        for ch in run.text.chars() {
            if ch.is_whitespace() {
                if !chunk.is_empty() {
                    words.push(Word {
                        text: std::mem::take(&mut chunk),
                        bold: run.bold,
                        italic: run.italic,
                        glued,
                    });
                }
                boundary = true;
            } else {
                if chunk.is_empty() {
                    glued = !boundary && !words.is_empty();
                }
                chunk.push(ch);
                boundary = false;
            }
        }
        if !chunk.is_empty() {
            words.push(Word {
                text: chunk,
                bold: run.bold,
                italic: run.italic,
                glued,
            });
        }
    }
    words
}

fn join_words(words: &[Word]) -> Vec<InlineRun> {
    let mut line: Vec<InlineRun> = Vec::new();
    for (i, w) in words.iter().enumerate() {
        let sep = if i == 0 || w.glued { "" } else { " " };
        match line.last_mut() {
            Some(last) if last.bold == w.bold && last.italic == w.italic => {
                last.text.push_str(sep);
                last.text.push_str(&w.text);
            }
            Some(last) => {
                last.text.push_str(sep);
                line.push(InlineRun {
                    text: w.text.clone(),
                    bold: w.bold,
                    italic: w.italic,
                });
            }
            None => line.push(InlineRun {
                text: w.text.clone(),
                bold: w.bold,
                italic: w.italic,
            }),
        }
    }
    line
}
