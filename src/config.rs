//! Server configuration: defaults, then environment, then command line.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::pipeline::PipelineConfig;
use crate::spooler::{Directory, Lp, PdfToPrinter, PrintSpooler};

/// Which print backend to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpoolerChoice {
    /// `None` means `PDFtoPrinter.exe` beside the executable.
    PdfToPrinter(Option<PathBuf>),
    Lp,
    Directory(PathBuf),
}

impl Default for SpoolerChoice {
    fn default() -> Self {
        if cfg!(windows) {
            SpoolerChoice::PdfToPrinter(None)
        } else {
            SpoolerChoice::Lp
        }
    }
}

impl std::str::FromStr for SpoolerChoice {
    type Err = String;

    /// `pdftoprinter[:path]`, `lp` or `dir:<path>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, arg) = match s.split_once(':') {
            Some((k, a)) => (k, Some(a)),
            None => (s, None),
        };
        match (kind.to_ascii_lowercase().as_str(), arg) {
            ("pdftoprinter", None) => Ok(SpoolerChoice::PdfToPrinter(None)),
            // Windows paths carry their own colon, so keep everything after the first one.
            ("pdftoprinter", Some(path)) if !path.is_empty() => Ok(SpoolerChoice::PdfToPrinter(Some(PathBuf::from(path)))),
            ("lp", None) => Ok(SpoolerChoice::Lp),
            ("dir", Some(path)) if !path.is_empty() => Ok(SpoolerChoice::Directory(PathBuf::from(path))),
            _ => Err(format!(
                "unknown spooler '{s}' (expected pdftoprinter[:path], lp or dir:<path>)"
            )),
        }
    }
}

impl SpoolerChoice {
    pub fn build(&self) -> Arc<dyn PrintSpooler> {
        match self {
            SpoolerChoice::PdfToPrinter(Some(path)) => Arc::new(PdfToPrinter::new(path)),
            SpoolerChoice::PdfToPrinter(None) => Arc::new(PdfToPrinter::beside_executable()),
            SpoolerChoice::Lp => Arc::new(Lp),
            SpoolerChoice::Directory(dir) => Arc::new(Directory::new(dir)),
        }
    }
}

/// Everything the binary needs to start serving.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub spooler: SpoolerChoice,
    pub pipeline: PipelineConfig,
    pub dispatch_timeout: Duration,
    /// Where temporary PDFs are written (default: system temp dir).
    pub artifact_dir: Option<PathBuf>,
    /// TrueType face used for text measurement.
    pub metrics_font: Option<PathBuf>,
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            spooler: SpoolerChoice::default(),
            pipeline: PipelineConfig::default(),
            dispatch_timeout: Duration::from_secs(60),
            artifact_dir: None,
            metrics_font: None,
            debug: false,
        }
    }
}

/// What `main` should do after parsing.
#[derive(Debug, Clone)]
pub enum CliAction {
    Serve(ServerConfig),
    Help,
}

fn truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

fn parse_value<T: std::str::FromStr>(flag: &str, value: Option<String>) -> Result<T, String> {
    let value = value.ok_or_else(|| format!("{flag} needs a value"))?;
    value
        .parse()
        .map_err(|_| format!("invalid value for {flag}: '{value}'"))
}

impl ServerConfig {
    /// Parse `args` (without the program name). `env` looks up environment
    /// variables so tests can inject them.
    pub fn from_args<I, F>(args: I, env: F) -> Result<CliAction, String>
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ServerConfig::default();

        if let Some(spooler) = env("CARD_PRINTER_SPOOLER") {
            config.spooler = spooler.parse()?;
        }
        config.debug = ["CARD_PRINTER_DEBUG", "MCP_DEBUG"]
            .iter()
            .any(|key| env(key).is_some_and(|v| truthy(&v)));

        let mut iter = args.into_iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--spooler" => config.spooler = parse_value(&arg, iter.next())?,
                "--card-margin" => config.pipeline.card_margin_pt = parse_value(&arg, iter.next())?,
                "--card-pages" => config.pipeline.card_max_pages = parse_value(&arg, iter.next())?,
                "--min-font" => config.pipeline.grid.min_font = parse_value(&arg, iter.next())?,
                "--max-font" => config.pipeline.grid.max_font = parse_value(&arg, iter.next())?,
                "--verify-retries" => config.pipeline.verify_retries = parse_value(&arg, iter.next())?,
                "--dispatch-timeout" => {
                    config.dispatch_timeout = Duration::from_secs(parse_value(&arg, iter.next())?)
                }
                "--render-timeout" => {
                    config.pipeline.render_timeout = Duration::from_secs(parse_value(&arg, iter.next())?)
                }
                "--artifact-dir" => config.artifact_dir = Some(parse_value(&arg, iter.next())?),
                "--metrics-font" => config.metrics_font = Some(parse_value(&arg, iter.next())?),
                "--debug" | "-d" => config.debug = true,
                "--help" | "-h" => return Ok(CliAction::Help),
                other => return Err(format!("unknown argument: {other}")),
            }
        }

        config.validate()?;
        Ok(CliAction::Serve(config))
    }

    fn validate(&self) -> Result<(), String> {
        let grid = &self.pipeline.grid;
        if !(grid.min_font > 0.0 && grid.min_font <= grid.max_font) {
            return Err(format!(
                "font range {}..{} is empty",
                grid.min_font, grid.max_font
            ));
        }
        if self.pipeline.card_max_pages == 0 {
            return Err("--card-pages must be at least 1".to_string());
        }
        if self.pipeline.card_margin_pt < 0.0 || self.pipeline.card_margin_pt * 2.0 >= 288.0 {
            return Err(format!("card margin {}pt is out of range", self.pipeline.card_margin_pt));
        }
        if self.dispatch_timeout.is_zero() || self.pipeline.render_timeout.is_zero() {
            return Err("timeouts must be at least one second".to_string());
        }
        Ok(())
    }
}

pub fn usage(prog: &str) -> String {
    format!(
        "card-printer-mcp – print server speaking MCP over stdio

Usage:
  {prog} [flags]

Flags:
  --spooler <kind>          pdftoprinter[:path] | lp | dir:<path>  (env CARD_PRINTER_SPOOLER)
  --card-margin <pt>        card margin in points (default 7.2)
  --card-pages <n>          page cap for 4x6 cards (default 2)
  --min-font <pt>           smallest body size the auto-fit may use (default 5)
  --max-font <pt>           largest body size (default 10)
  --verify-retries <n>      extra layout passes after an overflow (default 6)
  --dispatch-timeout <s>    spooler timeout in seconds (default 60)
  --render-timeout <s>      PDF render timeout in seconds (default 30)
  --artifact-dir <path>     where temporary PDFs go (default: system temp)
  --metrics-font <ttf>      measure text with this font's glyph advances
  --debug, -d               verbose logging to stderr (env CARD_PRINTER_DEBUG / MCP_DEBUG)
  --help, -h                print this message"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn serve(list: &[&str], env: &[(&str, &str)]) -> Result<ServerConfig, String> {
        let env: Vec<(String, String)> = env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let lookup = |key: &str| env.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone());
        match ServerConfig::from_args(args(list), lookup)? {
            CliAction::Serve(c) => Ok(c),
            CliAction::Help => Err("help".to_string()),
        }
    }

    #[test]
    fn defaults() {
        let c = serve(&[], &[]).unwrap();
        assert_eq!(c.dispatch_timeout, Duration::from_secs(60));
        assert_eq!(c.pipeline.verify_retries, 6);
        assert_eq!(c.pipeline.card_max_pages, 2);
        assert!(!c.debug);
    }

    #[test]
    fn flags_override_env() {
        let c = serve(
            &["--spooler", "dir:/tmp/out", "--max-font", "12", "--verify-retries", "0"],
            &[("CARD_PRINTER_SPOOLER", "lp"), ("MCP_DEBUG", "yes")],
        )
        .unwrap();
        assert_eq!(c.spooler, SpoolerChoice::Directory(PathBuf::from("/tmp/out")));
        assert_eq!(c.pipeline.grid.max_font, 12.0);
        assert_eq!(c.pipeline.verify_retries, 0);
        assert!(c.debug);
    }

    #[test]
    fn spooler_names() {
        assert_eq!("lp".parse::<SpoolerChoice>().unwrap(), SpoolerChoice::Lp);
        assert_eq!(
            r"pdftoprinter:C:\tools\PDFtoPrinter.exe".parse::<SpoolerChoice>().unwrap(),
            SpoolerChoice::PdfToPrinter(Some(PathBuf::from(r"C:\tools\PDFtoPrinter.exe")))
        );
        assert!("dir:".parse::<SpoolerChoice>().is_err());
        assert!("cups".parse::<SpoolerChoice>().is_err());
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(serve(&["--card-pages", "0"], &[]).is_err());
        assert!(serve(&["--min-font", "11"], &[]).is_err());
        assert!(serve(&["--dispatch-timeout"], &[]).is_err());
        assert!(serve(&["--dispatch-timeout", "soon"], &[]).is_err());
        assert!(serve(&["--bogus"], &[]).is_err());
        assert_eq!(serve(&["--help"], &[]).unwrap_err(), "help");
    }

    #[test]
    fn debug_env_needs_truthy_value() {
        assert!(!serve(&[], &[("CARD_PRINTER_DEBUG", "0")]).unwrap().debug);
        assert!(serve(&[], &[("CARD_PRINTER_DEBUG", "TRUE")]).unwrap().debug);
    }
}
