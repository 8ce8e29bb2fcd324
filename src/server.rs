//! MCP tool server – JSON-RPC 2.0, one message per line.
//!
//! stdout carries protocol messages only; all diagnostics go through `log`
//! to stderr. Tool failures are reported as tool results with `isError`
//! set, so the client sees the message instead of a protocol error.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tempfile::TempPath;

use crate::config::ServerConfig;
use crate::error::PrintError;
use crate::page::{PageOrientation, PaperSize};
use crate::pipeline::{Assembler, ContentFormat, PreparedDocument, PrintRequest};
use crate::spooler::{format_printers, PrintSpooler};
use crate::templates;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "card-printer";

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

/// Printer listing is a quick query; it gets a shorter leash than printing.
const LIST_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Option<Value>,
    method: Option<String>,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
}

impl RpcResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i64, message: impl Into<String>, data: Option<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PrintFileArgs {
    content: String,
    filename: Option<String>,
    #[serde(default)]
    format4x6: bool,
    printer_name: Option<String>,
    paper_size: Option<PaperSize>,
    orientation: Option<PageOrientation>,
    content_format: Option<ContentFormat>,
    #[serde(default)]
    debug: bool,
}

#[derive(Debug, Default, Deserialize)]
struct TestPrintArgs {
    #[serde(default)]
    format4x6: bool,
    printer_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

pub struct McpServer {
    assembler: Assembler,
    spooler: Arc<dyn PrintSpooler>,
    dispatch_timeout: Duration,
    artifact_dir: Option<PathBuf>,
    /// Deleted when dropped.
    artifacts: Vec<TempPath>,
    debug: bool,
}

impl McpServer {
    pub fn new(assembler: Assembler, spooler: Arc<dyn PrintSpooler>, config: &ServerConfig) -> Self {
        Self {
            assembler,
            spooler,
            dispatch_timeout: config.dispatch_timeout,
            artifact_dir: config.artifact_dir.clone(),
            artifacts: Vec::new(),
            debug: config.debug,
        }
    }

    /// Number of temporary artifacts currently kept on disk.
    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }

    /// Serve until `input` reaches end of file or fails, then remove
    /// artifacts either way.
    pub fn serve<R: BufRead, W: Write>(&mut self, input: R, output: W) -> io::Result<()> {
        log::info!("{SERVER_NAME} serving on stdio via {}", self.spooler.name());
        let result = self.serve_lines(input, output);
        self.cleanup();
        match &result {
            Ok(()) => log::info!("input closed, shutting down"),
            Err(e) => log::error!("stdio failed: {e}"),
        }
        result
    }

    fn serve_lines<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line) {
                writeln!(output, "{response}")?;
                output.flush()?;
            }
        }
        Ok(())
    }

    /// Handle one raw message. `None` for notifications.
    pub fn handle_line(&mut self, line: &str) -> Option<String> {
        let response = match serde_json::from_str::<Value>(line) {
            Err(e) => Some(RpcResponse::error(Value::Null, PARSE_ERROR, "Parse error", Some(e.to_string()))),
            Ok(value) => self.handle_message(value),
        }?;
        match serde_json::to_string(&response) {
            Ok(s) => Some(s),
            Err(e) => {
                log::warn!("could not encode response: {e}");
                None
            }
        }
    }

    fn handle_message(&mut self, value: Value) -> Option<RpcResponse> {
        let request: RpcRequest = match serde_json::from_value(value) {
            Ok(r) => r,
            Err(e) => {
                return Some(RpcResponse::error(
                    Value::Null,
                    INVALID_REQUEST,
                    "Invalid Request",
                    Some(e.to_string()),
                ))
            }
        };
        let Some(method) = request.method else {
            // A response from the client; nothing to answer.
            return None;
        };
        log::debug!("received {method}");

        let Some(id) = request.id else {
            if method != "notifications/initialized" {
                log::debug!("ignoring notification {method}");
            }
            return None;
        };

        Some(match method.as_str() {
            "initialize" => RpcResponse::result(id, self.initialize_result()),
            "ping" => RpcResponse::result(id, json!({})),
            "tools/list" => RpcResponse::result(id, json!({ "tools": tool_definitions() })),
            "tools/call" => match serde_json::from_value::<CallParams>(request.params) {
                Ok(params) => self.call_tool(id, params),
                Err(e) => RpcResponse::error(id, INVALID_PARAMS, "Invalid params", Some(e.to_string())),
            },
            other => RpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {other}"), None),
        })
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            }
        })
    }

    fn call_tool(&mut self, id: Value, params: CallParams) -> RpcResponse {
        let arguments = params.arguments.unwrap_or_else(|| json!({}));
        let outcome = match params.name.as_str() {
            "print_file" => match serde_json::from_value::<PrintFileArgs>(arguments) {
                Ok(args) => {
                    let debug = args.debug || self.debug;
                    self.print(&args.into_request(), debug)
                }
                Err(e) => return invalid_arguments(id, "print_file", e),
            },
            "list_printers" => self.list_printers(),
            "test_print" => match serde_json::from_value::<TestPrintArgs>(arguments) {
                Ok(args) => self.test_print(args),
                Err(e) => return invalid_arguments(id, "test_print", e),
            },
            other => {
                return RpcResponse::error(id, INVALID_PARAMS, format!("Unknown tool: {other}"), None);
            }
        };

        match outcome {
            Ok(text) => RpcResponse::result(id, tool_result(&text, false)),
            Err(e) => {
                log::warn!("{} failed: {e}", params.name);
                RpcResponse::result(id, tool_result(&format!("Error: {e}"), true))
            }
        }
    }

    /// Prepare, write and dispatch one request.
    pub fn print(&mut self, request: &PrintRequest, debug: bool) -> Result<String, PrintError> {
        let prepared = self.assembler.prepare(request)?;
        let path = self.write_artifact(request, &prepared)?;
        let artifact = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let device = self
            .spooler
            .submit(&path, request.device.as_deref(), self.dispatch_timeout)?;
        log::info!("printed {artifact} on {device}");

        let fit = &prepared.fit;
        let mut text = format!(
            "Successfully printed '{artifact}' on {device} ({}, {} page(s), font={:.1}pt, spacing={:.1})",
            request.format_label(),
            fit.page_count,
            fit.font_size,
            fit.spacing_scale
        );
        if debug {
            text.push_str(&format!("\nestimated height: {:.1}pt", fit.estimated_height));
            if let Some(usable) = fit.usable_height {
                text.push_str(&format!(" of {usable:.1}pt usable"));
            }
            text.push_str(&format!(
                "\nlayout passes: {}\nartifact: {}",
                fit.verification_passes,
                path.display()
            ));
        }
        Ok(text)
    }

    fn write_artifact(&mut self, request: &PrintRequest, prepared: &PreparedDocument) -> Result<PathBuf, PrintError> {
        let prefix = format!("{}_", artifact_stem(request.display_name.as_deref()));
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(".pdf");
        let mut file = match &self.artifact_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempfile_in(dir)?
            }
            None => builder.tempfile()?,
        };
        file.write_all(&prepared.pdf)?;
        file.flush()?;

        let temp_path = file.into_temp_path();
        let path = temp_path.to_path_buf();
        log::debug!("wrote {} ({} bytes)", path.display(), prepared.pdf.len());
        self.artifacts.push(temp_path);
        Ok(path)
    }

    fn list_printers(&self) -> Result<String, PrintError> {
        let printers = self.spooler.list_devices(LIST_TIMEOUT)?;
        Ok(format_printers(&printers))
    }

    fn test_print(&mut self, args: TestPrintArgs) -> Result<String, PrintError> {
        let request = PrintRequest {
            display_name: Some("test_page".to_string()),
            card_format: args.format4x6,
            device: args.printer_name,
            ..PrintRequest::new(templates::test_page(args.format4x6))
        };
        self.print(&request, true)
    }

    /// Delete every artifact written so far.
    pub fn cleanup(&mut self) {
        for path in self.artifacts.drain(..) {
            let shown = path.display().to_string();
            if let Err(e) = path.close() {
                log::warn!("could not remove {shown}: {e}");
            }
        }
    }
}

impl Drop for McpServer {
    fn drop(&mut self) {
        self.cleanup();
    }
}

impl PrintFileArgs {
    fn into_request(self) -> PrintRequest {
        PrintRequest {
            content: self.content,
            display_name: self.filename,
            card_format: self.format4x6,
            device: self.printer_name.filter(|p| !p.trim().is_empty()),
            paper: self.paper_size.unwrap_or_default(),
            orientation: self.orientation.unwrap_or_default(),
            content_format: self.content_format.unwrap_or_default(),
        }
    }
}

fn invalid_arguments(id: Value, tool: &str, err: serde_json::Error) -> RpcResponse {
    RpcResponse::error(
        id,
        INVALID_PARAMS,
        format!("Invalid arguments for {tool}"),
        Some(err.to_string()),
    )
}

fn tool_result(text: &str, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error,
    })
}

/// File-name-safe stem from the display name.
fn artifact_stem(display_name: Option<&str>) -> String {
    let stem: String = display_name
        .unwrap_or("")
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .take(40)
        .collect();
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        "print".to_string()
    } else {
        stem.to_string()
    }
}

fn tool_definitions() -> Value {
    json!([
        {
            "name": "print_file",
            "description": "Print content with proper formatting. 4x6 cards are auto-fitted to at most two cards.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "content": {
                        "type": "string",
                        "description": "Content to print (supports Markdown formatting)"
                    },
                    "filename": {
                        "type": "string",
                        "description": "Optional title for the document"
                    },
                    "format4x6": {
                        "type": "boolean",
                        "description": "Format for 4x6 index card printing",
                        "default": false
                    },
                    "printer_name": {
                        "type": "string",
                        "description": "Specific printer to use (uses default if not specified)"
                    },
                    "paper_size": {
                        "type": "string",
                        "enum": ["letter", "a4", "legal", "4x6"],
                        "description": "Paper size to use (letter, a4, legal, or 4x6)"
                    },
                    "orientation": {
                        "type": "string",
                        "enum": ["portrait", "landscape"],
                        "description": "Page orientation (portrait or landscape)"
                    },
                    "content_format": {
                        "type": "string",
                        "enum": ["markdown", "html"],
                        "description": "Markup language of content (default markdown)"
                    },
                    "debug": {
                        "type": "boolean",
                        "description": "Include layout details in the reply",
                        "default": false
                    }
                },
                "required": ["content"]
            }
        },
        {
            "name": "list_printers",
            "description": "List available printers on this system",
            "inputSchema": { "type": "object", "properties": {} }
        },
        {
            "name": "test_print",
            "description": "Print a test page to verify printer setup",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "format4x6": {
                        "type": "boolean",
                        "description": "Format test page for 4x6 index card",
                        "default": false
                    },
                    "printer_name": {
                        "type": "string",
                        "description": "Specific printer to use for test (uses default if not specified)"
                    }
                }
            }
        }
    ])
}
