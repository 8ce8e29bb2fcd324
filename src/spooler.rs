//! Print dispatch – hands a finished PDF to an external spooler.
//!
//! Every backend runs its command without a shell, with stdout and stderr
//! drained on reader threads and a hard timeout. A hung command is killed.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::{DispatchError, PrintError};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A printer as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterInfo {
    pub name: String,
    pub driver: Option<String>,
    pub status: Option<String>,
}

impl PrinterInfo {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            driver: None,
            status: None,
        }
    }
}

/// Something that can put a PDF on paper.
pub trait PrintSpooler: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Fails with [`PrintError::DependencyMissing`] when the backend cannot
    /// work on this machine.
    fn check_available(&self) -> Result<(), PrintError>;

    /// Submit `artifact`; returns the display name of the target device.
    fn submit(&self, artifact: &Path, device: Option<&str>, timeout: Duration) -> Result<String, DispatchError>;

    fn list_devices(&self, timeout: Duration) -> Result<Vec<PrinterInfo>, DispatchError>;
}

/// Captured output of a successful command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run `cmd` to completion or kill it after `timeout`.
///
/// Exit status 0 is success. Anything else is [`DispatchError::Failed`] with
/// stderr (or stdout when stderr is empty) passed through verbatim.
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<CommandOutput, DispatchError> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    log::debug!("spawning {cmd:?}");

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| DispatchError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                // Best effort; the process may have exited in between.
                let _ = child.kill();
                let _ = child.wait();
                log::warn!("{program} killed after {}s", timeout.as_secs());
                return Err(DispatchError::TimedOut {
                    program,
                    secs: timeout.as_secs(),
                });
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(source) => return Err(DispatchError::Spawn { program, source }),
        }
    };

    let output = CommandOutput {
        stdout: stdout.map(join_reader).unwrap_or_default(),
        stderr: stderr.map(join_reader).unwrap_or_default(),
    };

    if status.success() {
        return Ok(output);
    }
    let diagnostic = if output.stderr.trim().is_empty() {
        output.stdout.trim().to_string()
    } else {
        output.stderr.trim().to_string()
    };
    Err(DispatchError::Failed {
        program,
        code: status.code().unwrap_or(-1),
        diagnostic: if diagnostic.is_empty() {
            "Unknown error".to_string()
        } else {
            diagnostic
        },
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: std::thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

/// Look `program` up on `PATH`.
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

// ---------------------------------------------------------------------------
// PDFtoPrinter (Windows)
// ---------------------------------------------------------------------------

/// `PDFtoPrinter.exe /s <file> [printer]`.
#[derive(Debug, Clone)]
pub struct PdfToPrinter {
    exe: PathBuf,
}

impl PdfToPrinter {
    pub fn new(exe: impl Into<PathBuf>) -> Self {
        Self { exe: exe.into() }
    }

    /// `PDFtoPrinter.exe` next to the running executable.
    pub fn beside_executable() -> Self {
        let dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        Self::new(dir.join("PDFtoPrinter.exe"))
    }

    fn list_with_wmi(&self, timeout: Duration) -> Result<Vec<PrinterInfo>, DispatchError> {
        let mut cmd = Command::new("powershell");
        cmd.args([
            "-NoProfile",
            "-Command",
            "Get-WmiObject -Class Win32_Printer | Select-Object -ExpandProperty Name",
        ]);
        let out = run_with_timeout(cmd, timeout)?;
        Ok(out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(PrinterInfo::named)
            .collect())
    }
}

impl PrintSpooler for PdfToPrinter {
    fn name(&self) -> &str {
        "PDFtoPrinter"
    }

    fn check_available(&self) -> Result<(), PrintError> {
        if self.exe.is_file() {
            Ok(())
        } else {
            Err(PrintError::DependencyMissing(format!(
                "PDFtoPrinter.exe not found at {}",
                self.exe.display()
            )))
        }
    }

    fn submit(&self, artifact: &Path, device: Option<&str>, timeout: Duration) -> Result<String, DispatchError> {
        let mut cmd = Command::new(&self.exe);
        cmd.arg("/s").arg(artifact);
        if let Some(device) = device {
            cmd.arg(device);
        }
        if let Some(dir) = self.exe.parent().filter(|d| !d.as_os_str().is_empty()) {
            cmd.current_dir(dir);
        }
        run_with_timeout(cmd, timeout).map_err(|e| rename_program(e, "PDFtoPrinter"))?;
        Ok(device.unwrap_or("default printer").to_string())
    }

    fn list_devices(&self, timeout: Duration) -> Result<Vec<PrinterInfo>, DispatchError> {
        let mut cmd = Command::new("powershell");
        cmd.args([
            "-NoProfile",
            "-Command",
            "Get-Printer | Select-Object Name, DriverName, Status | ConvertTo-Json",
        ]);
        match run_with_timeout(cmd, timeout) {
            Ok(out) => match parse_get_printer_json(&out.stdout) {
                Some(list) if !list.is_empty() => Ok(list),
                _ => self.list_with_wmi(timeout),
            },
            Err(e) => {
                log::debug!("Get-Printer failed ({e}), trying WMI");
                self.list_with_wmi(timeout)
            }
        }
    }
}

/// Use a friendly program name in errors instead of the full path.
fn rename_program(err: DispatchError, name: &str) -> DispatchError {
    match err {
        DispatchError::Spawn { source, .. } => DispatchError::Spawn {
            program: name.to_string(),
            source,
        },
        DispatchError::Failed { code, diagnostic, .. } => DispatchError::Failed {
            program: name.to_string(),
            code,
            diagnostic,
        },
        DispatchError::TimedOut { secs, .. } => DispatchError::TimedOut {
            program: name.to_string(),
            secs,
        },
        other => other,
    }
}

/// `ConvertTo-Json` emits a bare object for one printer and an array for
/// several. Status may be numeric.
pub fn parse_get_printer_json(json: &str) -> Option<Vec<PrinterInfo>> {
    let value: Value = serde_json::from_str(json.trim()).ok()?;
    let items = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        _ => return None,
    };
    let field = |item: &Value, key: &str| -> Option<String> {
        match item.get(key)? {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    };
    Some(
        items
            .iter()
            .map(|item| PrinterInfo {
                name: field(item, "Name").unwrap_or_else(|| "Unknown".to_string()),
                driver: field(item, "DriverName"),
                status: field(item, "Status"),
            })
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// CUPS
// ---------------------------------------------------------------------------

/// `lp [-d printer] <file>`.
#[derive(Debug, Clone, Default)]
pub struct Lp;

impl PrintSpooler for Lp {
    fn name(&self) -> &str {
        "lp"
    }

    fn check_available(&self) -> Result<(), PrintError> {
        find_on_path("lp")
            .map(|_| ())
            .ok_or_else(|| PrintError::DependencyMissing("'lp' not found on PATH (install CUPS)".to_string()))
    }

    fn submit(&self, artifact: &Path, device: Option<&str>, timeout: Duration) -> Result<String, DispatchError> {
        let mut cmd = Command::new("lp");
        if let Some(device) = device {
            cmd.arg("-d").arg(device);
        }
        cmd.arg(artifact);
        let out = run_with_timeout(cmd, timeout)?;
        log::debug!("lp: {}", out.stdout.trim());
        Ok(device.unwrap_or("default printer").to_string())
    }

    fn list_devices(&self, timeout: Duration) -> Result<Vec<PrinterInfo>, DispatchError> {
        let mut cmd = Command::new("lpstat");
        cmd.arg("-p");
        let out = run_with_timeout(cmd, timeout)?;
        Ok(parse_lpstat(&out.stdout))
    }
}

/// Parse `lpstat -p` lines such as
/// `printer Office is idle.  enabled since Mon 01 Jan`.
pub fn parse_lpstat(output: &str) -> Vec<PrinterInfo> {
    output
        .lines()
        .filter_map(|line| {
            let rest = line.strip_prefix("printer ")?;
            let (name, tail) = rest.split_once(' ').unwrap_or((rest, ""));
            let status = tail
                .strip_prefix("is ")
                .map(|s| s.split('.').next().unwrap_or(s).trim().to_string())
                .filter(|s| !s.is_empty());
            Some(PrinterInfo {
                name: name.to_string(),
                driver: None,
                status,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Directory (dry run)
// ---------------------------------------------------------------------------

/// Copies artifacts into a directory instead of printing them.
#[derive(Debug, Clone)]
pub struct Directory {
    dir: PathBuf,
}

impl Directory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl PrintSpooler for Directory {
    fn name(&self) -> &str {
        "directory"
    }

    fn check_available(&self) -> Result<(), PrintError> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    fn submit(&self, artifact: &Path, device: Option<&str>, _timeout: Duration) -> Result<String, DispatchError> {
        let file_name = artifact.file_name().unwrap_or_else(|| artifact.as_os_str());
        let target = self.dir.join(file_name);
        std::fs::create_dir_all(&self.dir)
            .and_then(|_| std::fs::copy(artifact, &target))
            .map_err(|source| DispatchError::Io {
                target: target.display().to_string(),
                source,
            })?;
        log::info!("copied {} to {}", artifact.display(), target.display());
        Ok(device
            .map(str::to_string)
            .unwrap_or_else(|| self.dir.display().to_string()))
    }

    fn list_devices(&self, _timeout: Duration) -> Result<Vec<PrinterInfo>, DispatchError> {
        Ok(vec![PrinterInfo {
            name: self.dir.display().to_string(),
            driver: Some("directory".to_string()),
            status: Some("Ready".to_string()),
        }])
    }
}

/// Text for the `list_printers` tool.
pub fn format_printers(printers: &[PrinterInfo]) -> String {
    if printers.is_empty() {
        return "No printers found or unable to list printers.".to_string();
    }
    let entries: Vec<String> = printers
        .iter()
        .map(|p| match (&p.driver, &p.status) {
            (None, None) => format!("- {}", p.name),
            (driver, status) => format!(
                "- {}\n   Driver: {}\n   Status: {}",
                p.name,
                driver.as_deref().unwrap_or("Unknown Driver"),
                status.as_deref().unwrap_or("Ready")
            ),
        })
        .collect();
    format!("Available Printers:\n{}", entries.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_printer_json_single_and_list() {
        let one = r#"{"Name":"Zebra","DriverName":"ZDesigner","Status":0}"#;
        let list = parse_get_printer_json(one).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].driver.as_deref(), Some("ZDesigner"));
        assert_eq!(list[0].status.as_deref(), Some("0"));

        let many = r#"[{"Name":"A","DriverName":"x","Status":null},{"Name":"B"}]"#;
        let list = parse_get_printer_json(many).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].status, None);
        assert_eq!(list[1].name, "B");

        assert!(parse_get_printer_json("not json").is_none());
    }

    #[test]
    fn lpstat_lines() {
        let out = "printer Office is idle.  enabled since Mon\nprinter Label_4x6 disabled since Tue -\n\treason unknown\n";
        let list = parse_lpstat(out);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "Office");
        assert_eq!(list[0].status.as_deref(), Some("idle"));
        assert_eq!(list[1].name, "Label_4x6");
        assert_eq!(list[1].status, None);
    }

    #[test]
    fn printer_list_text() {
        let text = format_printers(&[
            PrinterInfo {
                name: "Zebra".into(),
                driver: Some("ZDesigner".into()),
                status: None,
            },
            PrinterInfo::named("Plain"),
        ]);
        assert!(text.starts_with("Available Printers:\n- Zebra\n   Driver: ZDesigner\n   Status: Ready"));
        assert!(text.ends_with("- Plain"));
        assert_eq!(format_printers(&[]), "No printers found or unable to list printers.");
    }

    #[test]
    fn directory_spooler_copies_artifact() {
        let out = tempfile::tempdir().unwrap();
        let src = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        std::fs::write(src.path(), b"%PDF-test").unwrap();

        let spooler = Directory::new(out.path().join("spool"));
        spooler.check_available().unwrap();
        let device = spooler.submit(src.path(), Some("Desk"), Duration::from_secs(1)).unwrap();
        assert_eq!(device, "Desk");
        let copied = out.path().join("spool").join(src.path().file_name().unwrap());
        assert_eq!(std::fs::read(copied).unwrap(), b"%PDF-test");
    }

    #[test]
    fn missing_pdftoprinter_is_a_missing_dependency() {
        let spooler = PdfToPrinter::new("/definitely/not/here/PDFtoPrinter.exe");
        assert!(matches!(spooler.check_available(), Err(PrintError::DependencyMissing(_))));
    }

    #[test]
    fn spawn_failure_is_reported() {
        let cmd = Command::new("/definitely/not/a/program");
        let err = run_with_timeout(cmd, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, DispatchError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_passes_stderr_through() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo 'printer jammed' >&2; exit 3"]);
        match run_with_timeout(cmd, Duration::from_secs(5)).unwrap_err() {
            DispatchError::Failed { code, diagnostic, .. } => {
                assert_eq!(code, 3);
                assert_eq!(diagnostic, "printer jammed");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn hung_command_is_killed() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let started = Instant::now();
        let err = run_with_timeout(cmd, Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, DispatchError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
