//! Error taxonomy for a single print request.
//!
//! Everything that can go wrong between receiving `print_file` arguments and
//! the spooler returning is a [`PrintError`]. The tool server turns every
//! variant into a tool result, so nothing escapes the request boundary.

use thiserror::Error;

/// Top-level failure of a print request.
#[derive(Debug, Error)]
pub enum PrintError {
    /// The request itself is unusable (e.g. empty content). No search runs.
    #[error("invalid request: {0}")]
    Input(String),

    /// The content does not fit the page budget.
    #[error(transparent)]
    Fit(#[from] FitFailure),

    /// The document renderer failed or produced an unusable artifact.
    #[error("render failed: {0}")]
    Render(String),

    /// The print spooler rejected the job, could not be started, or hung.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A collaborator needed at startup is not installed.
    #[error("required dependency missing: {0}")]
    DependencyMissing(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why the auto-fit engine gave up.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitFailure {
    /// Every grid point was estimated and none fit.
    #[error(
        "content cannot be shrunk to fit the page budget: needs ~{estimated:.0}pt \
         at {font_size:.1}pt/{spacing_scale:.1}, {usable:.0}pt available"
    )]
    Exhausted {
        font_size: f32,
        spacing_scale: f32,
        estimated: f32,
        usable: f32,
    },

    /// The estimate fit but the real layout pass still overflowed.
    #[error(
        "verification exceeded page budget: {page_count} pages at \
         {font_size:.1}pt/{spacing_scale:.1}, at most {max_pages} allowed \
         (layout passes: {passes})"
    )]
    VerificationOverflow {
        font_size: f32,
        spacing_scale: f32,
        page_count: usize,
        max_pages: usize,
        passes: usize,
    },
}

/// Failure reported by the print-dispatch collaborator.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("could not start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit. `diagnostic` is the collaborator's own output, verbatim.
    #[error("{program} error (code {code}): {diagnostic}")]
    Failed {
        program: String,
        code: i32,
        diagnostic: String,
    },

    #[error("{program} timed out ({secs} seconds)")]
    TimedOut { program: String, secs: u64 },

    #[error("could not write to {target}: {source}")]
    Io {
        target: String,
        #[source]
        source: std::io::Error,
    },
}
