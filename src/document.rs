// src/document.rs

use crate::config::OcrSection;
use crate::error::OcrError;
use crate::heuristics::{self, ExtractedInvoice};
use lopdf::Document;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

/// How an invoice PDF has to be read.
#[derive(Debug)]
pub enum PdfContent {
    /// Text layer with enough content to extract from.
    Text(String),
    /// Image-only pages; run OCR.
    ScannedImage,
    /// Not a readable PDF.
    Error(String),
}

/// Visible characters below which a text layer is treated as empty.
const MIN_TEXT_CHARS: usize = 30;

/// Renders the pages of a PDF on disk to image files.
pub trait PageRenderer {
    fn render(&self, pdf: &Path) -> Result<Vec<PathBuf>, OcrError>;
}

/// Reads the text off a single page image.
pub trait OcrEngine {
    fn image_to_text(&self, image: &Path) -> Result<String, OcrError>;
}

/// `pdftoppm` from poppler.
pub struct PopplerRenderer {
    program: String,
    dpi: u32,
}

impl PopplerRenderer {
    pub fn new(ocr: &OcrSection) -> Self {
        Self {
            program: ocr.pdftoppm.clone(),
            dpi: ocr.dpi,
        }
    }
}

impl PageRenderer for PopplerRenderer {
    fn render(&self, pdf: &Path) -> Result<Vec<PathBuf>, OcrError> {
        let dir = pdf.parent().unwrap_or_else(|| Path::new("."));
        let stem = pdf
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "page".to_string());
        let prefix = dir.join(&stem);

        let output = Command::new(&self.program)
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-jpeg")
            .arg(pdf)
            .arg(&prefix)
            .output()
            .map_err(|source| OcrError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(OcrError::CommandFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // pdftoppm writes <prefix>-1.jpg, or zero-padded numbers for longer documents.
        let page_prefix = format!("{stem}-");
        let mut pages: Vec<(u32, PathBuf)> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?;
                let number = name.strip_prefix(&page_prefix)?.strip_suffix(".jpg")?;
                Some((number.parse().ok()?, path))
            })
            .collect();
        pages.sort_by_key(|(n, _)| *n);

        if pages.is_empty() {
            return Err(OcrError::NoPages(self.program.clone()));
        }
        info!(pages = pages.len(), dpi = self.dpi, "Rendered PDF pages");
        Ok(pages.into_iter().map(|(_, path)| path).collect())
    }
}

/// The `tesseract` command line.
pub struct TesseractOcr {
    program: String,
}

impl TesseractOcr {
    pub fn new(ocr: &OcrSection) -> Self {
        Self {
            program: ocr.tesseract.clone(),
        }
    }
}

impl OcrEngine for TesseractOcr {
    fn image_to_text(&self, image: &Path) -> Result<String, OcrError> {
        let output = Command::new(&self.program)
            .arg(image)
            .arg("stdout")
            .output()
            .map_err(|source| OcrError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(OcrError::CommandFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Decide whether an invoice PDF carries a usable text layer.
///
/// Image-only page structure, a failed text extraction, or fewer than
/// [`MIN_TEXT_CHARS`] visible characters all mean the file needs OCR.
pub fn extract_text_from_pdf(pdf_bytes: &[u8]) -> PdfContent {
    let doc = match Document::load_mem(pdf_bytes) {
        Ok(doc) => doc,
        Err(e) => return PdfContent::Error(format!("Failed to parse PDF: {e}")),
    };
    if looks_like_scanned(&doc) {
        return PdfContent::ScannedImage;
    }

    let text = match pdf_extract::extract_text_from_mem(pdf_bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "No readable text layer");
            return PdfContent::ScannedImage;
        }
    };
    let visible = text.chars().filter(|c| !c.is_whitespace()).count();
    info!(chars = visible, "Text layer read");
    if visible < MIN_TEXT_CHARS {
        PdfContent::ScannedImage
    } else {
        PdfContent::Text(text)
    }
}

/// Heuristic: a page that carries XObject images but no Font resources is
/// almost certainly a scan.
fn looks_like_scanned(doc: &Document) -> bool {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false; // let text extraction decide
    }

    let resource = |page: &lopdf::Dictionary, key: &[u8]| -> bool {
        page.get(b"Resources")
            .ok()
            .and_then(|r| doc.dereference(r).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok())
            .and_then(|res| res.get(key).ok())
            .and_then(|x| doc.dereference(x).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok())
            .is_some_and(|dict| !dict.is_empty())
    };

    let image_only_pages = pages
        .values()
        .filter_map(|object_id| doc.get_object(*object_id).ok())
        .filter_map(|page_obj| page_obj.as_dict().ok())
        .filter(|page| resource(page, b"XObject") && !resource(page, b"Font"))
        .count();

    let total = pages.len();
    let ratio = image_only_pages as f64 / total as f64;
    info!(
        total_pages = total,
        image_only = image_only_pages,
        ratio = format!("{ratio:.2}"),
        "Scanned-page analysis"
    );

    // If 80% or more of pages are image-only, treat the whole PDF as scanned
    ratio >= 0.8
}

/// Where the text of a document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    Plain,
    TextLayer,
    Ocr { pages: usize },
}

/// Content-addressed id for an uploaded document.
pub fn document_uid(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// OCR every page of a scanned PDF.
pub fn ocr_pdf(
    pdf_bytes: &[u8],
    work_dir: &Path,
    renderer: &dyn PageRenderer,
    ocr: &dyn OcrEngine,
) -> Result<(String, usize), OcrError> {
    let scratch = work_dir.join(&document_uid(pdf_bytes)[..16]);
    fs::create_dir_all(&scratch)?;
    let result = ocr_pages(pdf_bytes, &scratch, renderer, ocr);
    if let Err(e) = fs::remove_dir_all(&scratch) {
        warn!(error = %e, dir = %scratch.display(), "Failed to clean up scratch directory");
    }
    result
}

fn ocr_pages(
    pdf_bytes: &[u8],
    scratch: &Path,
    renderer: &dyn PageRenderer,
    ocr: &dyn OcrEngine,
) -> Result<(String, usize), OcrError> {
    let pdf_path = scratch.join("invoice.pdf");
    fs::write(&pdf_path, pdf_bytes)?;

    let pages = renderer.render(&pdf_path)?;
    let mut text = String::new();
    for (idx, page) in pages.iter().enumerate() {
        info!(page = idx + 1, "Running OCR");
        let page_text = ocr.image_to_text(page)?;
        text.push_str(&format!("\n--- Page {} ---\n{}", idx + 1, page_text));
    }
    Ok((text, pages.len()))
}

/// Text of a PDF: its text layer when it has one, OCR otherwise.
pub fn pdf_text(
    pdf_bytes: &[u8],
    work_dir: &Path,
    renderer: &dyn PageRenderer,
    ocr: &dyn OcrEngine,
) -> Result<(String, TextSource), Box<dyn std::error::Error>> {
    match extract_text_from_pdf(pdf_bytes) {
        PdfContent::Text(text) => Ok((text, TextSource::TextLayer)),
        PdfContent::ScannedImage => {
            info!("PDF is scanned, running OCR");
            let (text, pages) = ocr_pdf(pdf_bytes, work_dir, renderer, ocr)?;
            Ok((text, TextSource::Ocr { pages }))
        }
        PdfContent::Error(e) => Err(e.into()),
    }
}

/// An uploaded invoice and the proposal read from it.
#[derive(Debug)]
pub struct ScannedInvoice {
    pub uid: String,
    pub file_name: String,
    pub text: String,
    pub source: TextSource,
    pub invoice: ExtractedInvoice,
}

/// Read an invoice file (PDF, or already-OCR'd `.txt`) and extract a proposal.
pub fn scan_invoice(path: &Path, ocr_cfg: &OcrSection) -> Result<ScannedInvoice, Box<dyn std::error::Error>> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let span = tracing::info_span!("invoice", file = %file_name);
    let _guard = span.enter();

    let bytes = fs::read(path)?;
    let is_text = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));

    let (text, source) = if is_text {
        (String::from_utf8_lossy(&bytes).into_owned(), TextSource::Plain)
    } else {
        pdf_text(
            &bytes,
            &ocr_cfg.work_dir,
            &PopplerRenderer::new(ocr_cfg),
            &TesseractOcr::new(ocr_cfg),
        )?
    };

    let invoice = heuristics::extract_invoice(&text);
    let (filled, total) = invoice.coverage();
    info!(
        filled,
        total,
        source = ?source,
        invoice_no = ?invoice.invoice_number,
        invoice_date = ?invoice.invoice_date,
        line_items = invoice.line_items.len(),
        "Extraction result"
    );

    for (i, item) in invoice.line_items.iter().enumerate() {
        info!(
            idx = i,
            material = %item.raw_material,
            quantity = item.quantity,
            price_per_lb = item.price_per_lb,
            total = item.total,
            "Line item"
        );
        if let Some(computed) = item.total_mismatch() {
            warn!(
                idx = i,
                computed = format!("{computed:.2}"),
                printed = format!("{:.2}", item.total),
                "Calculated total differs from invoice total"
            );
        }
    }
    if invoice.line_items.is_empty() {
        warn!("No line items found; check the raw text and the invoice layout");
    }

    Ok(ScannedInvoice {
        uid: document_uid(&bytes),
        file_name,
        text,
        source,
        invoice,
    })
}
