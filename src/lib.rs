//! # card-printer – auto-fitting print server
//!
//! Turns lightweight markup into print-ready PDFs and hands them to a
//! spooler, exposed as MCP tools over stdio. The pipeline stages are:
//!
//! 1. **Normalise** – Markdown or HTML → typed blocks ([`markup`], [`dom`])
//! 2. **Style** – base font size + spacing scale → every size ([`style`])
//! 3. **Fit** – estimate heights ([`estimate`]) and search the largest style
//!    that fits a 4x6 card budget ([`fit`])
//! 4. **Verify** – one real layout pass counts pages ([`verify`], [`layout`],
//!    [`pagination`])
//! 5. **Render** – emit PDF bytes via printpdf ([`render`])
//! 6. **Dispatch** – hand the artifact to a spooler ([`spooler`])
//!
//! [`pipeline::Assembler`] runs stages 1–5; [`server::McpServer`] wraps it in
//! the tool protocol.

pub mod config;
pub mod dom;
pub mod error;
pub mod estimate;
pub mod fit;
pub mod fonts;
pub mod helvetica;
pub mod layout;
pub mod layout_config;
pub mod markup;
pub mod page;
pub mod pagination;
pub mod pipeline;
pub mod render;
pub mod server;
pub mod spooler;
pub mod style;
pub mod templates;
pub mod verify;

// Re-exports for convenience
pub use error::{DispatchError, FitFailure, PrintError};
pub use pipeline::{Assembler, PipelineConfig, PrintRequest};
pub use style::StyleParameters;
