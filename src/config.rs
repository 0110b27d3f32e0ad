use serde::Deserialize;
use std::path::PathBuf;
use std::{fs, path::Path};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Yield catalog file; the built-in catalog is used when unset.
    #[serde(default)]
    pub catalog_path: Option<String>,
    #[serde(default)]
    pub ocr: OcrSection,
}

fn default_db_path() -> String {
    "records/yield_desk.db".to_string()
}

/// External tools used to read scanned invoices.
#[derive(Debug, Clone, Deserialize)]
pub struct OcrSection {
    #[serde(default = "default_pdftoppm")]
    pub pdftoppm: String,
    #[serde(default = "default_tesseract")]
    pub tesseract: String,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    /// Scratch directory for rendered pages.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

fn default_pdftoppm() -> String {
    "pdftoppm".to_string()
}

fn default_tesseract() -> String {
    "tesseract".to_string()
}

fn default_dpi() -> u32 {
    300
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("yield_desk")
}

impl Default for OcrSection {
    fn default() -> Self {
        Self {
            pdftoppm: default_pdftoppm(),
            tesseract: default_tesseract(),
            dpi: default_dpi(),
            work_dir: default_work_dir(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            catalog_path: None,
            ocr: OcrSection::default(),
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let path = path.as_ref();
        if path.exists() {
            info!(path = %path.display(), "Loading config");
            Self::load(path)
        } else {
            info!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let cfg: Config = toml::from_str("[ocr]\ndpi = 200\n").unwrap();
        assert_eq!(cfg.db_path, "records/yield_desk.db");
        assert_eq!(cfg.catalog_path, None);
        assert_eq!(cfg.ocr.dpi, 200);
        assert_eq!(cfg.ocr.tesseract, "tesseract");
    }

    #[test]
    fn test_full_config() {
        let cfg: Config = toml::from_str(
            r#"
            db_path = "/var/lib/yield/records.db"
            catalog_path = "catalog.toml"

            [ocr]
            pdftoppm = "/opt/homebrew/bin/pdftoppm"
            tesseract = "/opt/homebrew/bin/tesseract"
            work_dir = "/tmp/scans"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.db_path, "/var/lib/yield/records.db");
        assert_eq!(cfg.catalog_path.as_deref(), Some("catalog.toml"));
        assert_eq!(cfg.ocr.dpi, 300);
        assert_eq!(cfg.ocr.work_dir, PathBuf::from("/tmp/scans"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let cfg = Config::load_or_default("/nonexistent/yield_desk.toml").unwrap();
        assert_eq!(cfg.db_path, default_db_path());
    }
}
