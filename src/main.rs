//! card-printer-mcp – print server speaking MCP over stdio.
//!
//! Usage:
//!   card-printer-mcp [--spooler lp|dir:<path>|pdftoprinter[:path]] [--debug] ...
//!
//! The client talks JSON-RPC on stdin/stdout; logs go to stderr.

use std::{env, io, process, sync::Arc};

use card_printer::config::{usage, CliAction, ServerConfig};
use card_printer::fonts::FontManager;
use card_printer::pipeline::Assembler;
use card_printer::render::PdfRenderer;
use card_printer::server::McpServer;

fn main() {
    let args: Vec<String> = env::args().collect();
    let prog = args.first().cloned().unwrap_or_else(|| "card-printer-mcp".to_string());

    let config = match ServerConfig::from_args(args.into_iter().skip(1), |key| env::var(key).ok()) {
        Ok(CliAction::Serve(config)) => config,
        Ok(CliAction::Help) => {
            eprintln!("{}", usage(&prog));
            process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("{}", usage(&prog));
            process::exit(1);
        }
    };

    // stdout is the protocol channel; env_logger writes to stderr.
    let default_level = if config.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    let fonts = match &config.metrics_font {
        Some(path) => match FontManager::from_file(path) {
            Ok(fonts) => fonts,
            Err(e) => {
                eprintln!("Error loading metrics font: {e}");
                process::exit(1);
            }
        },
        None => FontManager::default(),
    };

    let spooler = config.spooler.build();
    if let Err(e) = spooler.check_available() {
        log::error!("{e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }

    let assembler = Assembler::new(Arc::new(PdfRenderer::new(fonts)), config.pipeline.clone());
    let mut server = McpServer::new(assembler, spooler, &config);

    let stdin = io::stdin();
    let stdout = io::stdout();
    let result = server.serve(stdin.lock(), stdout.lock());
    // process::exit skips destructors; release the server first.
    drop(server);
    if result.is_err() {
        process::exit(1);
    }
}
