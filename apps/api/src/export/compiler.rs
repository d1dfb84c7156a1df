use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::AppError;

const SOURCE_FILE: &str = "document.tex";
const OUTPUT_FILE: &str = "document.pdf";
/// Lines of the pdflatex log kept in error messages.
const LOG_TAIL_LINES: usize = 15;

/// Runs `pdflatex` on a LaTeX source in a scratch directory.
#[derive(Debug, Clone)]
pub struct PdfCompiler {
    program: String,
    timeout: Duration,
}

impl PdfCompiler {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub async fn compile(&self, source: &str) -> Result<Vec<u8>, AppError> {
        let dir = tempfile::tempdir()
            .map_err(|e| AppError::Pdf(format!("Failed to create working directory: {e}")))?;
        tokio::fs::write(dir.path().join(SOURCE_FILE), source)
            .await
            .map_err(|e| AppError::Pdf(format!("Failed to write LaTeX source: {e}")))?;

        let child = Command::new(&self.program)
            .args([
                "-interaction=nonstopmode",
                "-halt-on-error",
                "-no-shell-escape",
                SOURCE_FILE,
            ])
            .current_dir(dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::Pdf(format!("Failed to start {}: {e}", self.program)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                warn!("pdflatex timed out after {}s", self.timeout.as_secs());
                AppError::Pdf(format!(
                    "PDF compilation timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| AppError::Pdf(format!("{} failed: {e}", self.program)))?;

        if !output.status.success() {
            let log = String::from_utf8_lossy(&output.stdout);
            return Err(AppError::Pdf(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                log_tail(&log)
            )));
        }

        let pdf = tokio::fs::read(dir.path().join(OUTPUT_FILE))
            .await
            .map_err(|e| AppError::Pdf(format!("{} produced no PDF: {e}", self.program)))?;
        debug!("Compiled PDF ({} bytes)", pdf.len());
        Ok(pdf)
    }
}

/// The last lines of the log, where pdflatex reports the fatal error.
fn log_tail(log: &str) -> String {
    let lines: Vec<&str> = log.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(LOG_TAIL_LINES)..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_tail_keeps_last_lines() {
        let log: String = (1..=40).map(|i| format!("line {i}\n\n")).collect();
        let tail = log_tail(&log);
        assert_eq!(tail.lines().count(), LOG_TAIL_LINES);
        assert!(tail.ends_with("line 40"));
        assert!(tail.starts_with("line 26"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_pdf_error() {
        let compiler = PdfCompiler::new("/nonexistent/pdflatex", Duration::from_secs(5));
        let err = compiler.compile("\\relax").await.unwrap_err();
        assert!(matches!(err, AppError::Pdf(msg) if msg.contains("Failed to start")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_run_without_output_is_an_error() {
        let compiler = PdfCompiler::new("true", Duration::from_secs(5));
        let err = compiler.compile("\\relax").await.unwrap_err();
        assert!(matches!(err, AppError::Pdf(msg) if msg.contains("produced no PDF")));
    }
}
