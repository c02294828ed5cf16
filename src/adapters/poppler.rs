//! poppler-utils (`pdftotext`, `pdftoppm`, `pdfinfo`) behind the PDF ports.

use crate::domain::ports::{PageRasterizer, TextLayerExtractor};
use crate::utils::error::{PhototypeError, Result};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Install locations checked when poppler is neither on PATH nor configured.
const WELL_KNOWN_DIRS: &[&str] = &[
    r"C:\Program Files\poppler\Library\bin",
    r"C:\Program Files\poppler\bin",
    r"C:\poppler\Library\bin",
    r"C:\poppler\bin",
    "/opt/homebrew/bin",
    "/usr/local/bin",
];

#[derive(Debug, Clone, Default)]
pub struct PopplerTools {
    /// Directory holding the binaries; `None` means "rely on PATH"
    bin_dir: Option<PathBuf>,
}

/// Where `pdfinfo` lives: PATH first, then `configured`, then well-known dirs.
pub fn find_poppler_path(configured: Option<&Path>) -> Option<PathBuf> {
    if let Ok(found) = which::which("pdfinfo") {
        return found.parent().map(Path::to_path_buf);
    }
    configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(WELL_KNOWN_DIRS.iter().map(PathBuf::from))
        .find(|dir| has_binary(dir, "pdfinfo"))
}

fn has_binary(dir: &Path, name: &str) -> bool {
    dir.join(name).is_file() || dir.join(format!("{}.exe", name)).is_file()
}

impl PopplerTools {
    pub fn new(bin_dir: Option<PathBuf>) -> Self {
        Self { bin_dir }
    }

    /// 依照 PATH、設定值、常見安裝路徑的順序尋找 poppler
    pub fn discover(configured: Option<&Path>) -> Self {
        let bin_dir = find_poppler_path(configured);
        match &bin_dir {
            Some(dir) => tracing::info!("Using poppler from {}", dir.display()),
            None => tracing::warn!("poppler not found, PDF conversion will fail"),
        }
        Self { bin_dir }
    }

    pub fn bin_dir(&self) -> Option<&Path> {
        self.bin_dir.as_deref()
    }

    fn command(&self, tool: &str) -> Command {
        match &self.bin_dir {
            Some(dir) if has_binary(dir, tool) => Command::new(dir.join(tool)),
            _ => Command::new(tool),
        }
    }

    fn run(&self, tool: &str, configure: impl FnOnce(&mut Command)) -> Result<Output> {
        let mut command = self.command(tool);
        configure(&mut command);
        let output = command.output().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PhototypeError::ToolNotFound {
                tool: tool.to_string(),
            },
            _ => PhototypeError::IoError(e),
        })?;
        if !output.status.success() {
            return Err(PhototypeError::ExtractionError {
                message: format!(
                    "{} failed: {}",
                    tool,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(output)
    }

    /// `pdfinfo -v` 的版本字串，用於健康檢查
    pub fn check_pdfinfo(&self) -> Result<String> {
        let output = self.run("pdfinfo", |cmd| {
            cmd.arg("-v");
        })?;
        // pdfinfo prints its version to stderr
        let banner = if output.stderr.is_empty() {
            &output.stdout
        } else {
            &output.stderr
        };
        Ok(String::from_utf8_lossy(banner)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    fn stage_pdf(pdf: &[u8]) -> Result<(TempDir, PathBuf)> {
        let dir = TempDir::new()?;
        let path = dir.path().join("input.pdf");
        std::fs::write(&path, pdf)?;
        Ok((dir, path))
    }
}

impl TextLayerExtractor for PopplerTools {
    fn extract_text(&self, pdf: &[u8], char_limit: usize) -> Result<String> {
        let (_dir, pdf_path) = Self::stage_pdf(pdf)?;
        let output = self.run("pdftotext", |cmd| {
            cmd.args(["-enc", "UTF-8"]).arg(&pdf_path).arg("-");
        })?;
        // form feeds separate pages
        let text = String::from_utf8_lossy(&output.stdout).replace('\x0c', "\n");
        Ok(text.chars().take(char_limit).collect())
    }
}

impl PageRasterizer for PopplerTools {
    fn rasterize(&self, pdf: &[u8], dpi: u32) -> Result<Vec<DynamicImage>> {
        let (dir, pdf_path) = Self::stage_pdf(pdf)?;
        let prefix = dir.path().join("page");
        let dpi = dpi.to_string();
        self.run("pdftoppm", |cmd| {
            cmd.args(["-png", "-r", &dpi]).arg(&pdf_path).arg(&prefix);
        })?;

        // page-1.png, page-01.png, ... all share a width per run, so names sort in order
        let mut pages: Vec<PathBuf> = std::fs::read_dir(dir.path())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "png"))
            .collect();
        pages.sort();

        if pages.is_empty() {
            return Err(PhototypeError::ExtractionError {
                message: "pdftoppm produced no pages".to_string(),
            });
        }
        pages
            .iter()
            .map(|page| image::open(page).map_err(PhototypeError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool_maps_to_tool_not_found() {
        let tools = PopplerTools::new(None);
        let err = tools
            .run("phototype-definitely-missing-tool", |_| {})
            .unwrap_err();
        assert!(matches!(err, PhototypeError::ToolNotFound { .. }));
    }

    #[test]
    fn test_has_binary_checks_directory() {
        let dir = TempDir::new().unwrap();
        assert!(!has_binary(dir.path(), "pdfinfo"));
        std::fs::write(dir.path().join("pdfinfo"), b"").unwrap();
        assert!(has_binary(dir.path(), "pdfinfo"));
    }
}
