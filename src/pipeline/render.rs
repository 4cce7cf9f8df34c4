//! PDF rendering: report text → paginated A4 document.
//!
//! Rendering is split in two so the deterministic part can be tested on its
//! own:
//!
//! 1. [`layout_document`] is pure. It classifies, sanitises, wraps and
//!    paginates every line and returns a [`DocumentLayout`]. Same inputs,
//!    same layout.
//! 2. [`write_pdf`] draws a layout with printpdf's builtin Helvetica and
//!    writes it atomically (temp file + rename). The PDF dates and the
//!    trailer `/ID` are derived from the layout, so the same layout always
//!    encodes to the same bytes.
//!
//! Line styling is a one-line prefix test: `##` or deeper is a secondary
//! heading, a single `#` the primary heading, anything else body text. The
//! `#` markers themselves are not drawn.

use crate::config::{CharsetPolicy, ReportConfig};
use crate::error::ReportError;
use crate::model::{CompanyProfile, SynthesizedReport};
use crate::pipeline::guarded;
use crate::pipeline::sanitize::{apply_charset, split_lines};
use crate::progress::Stage;
use chrono::{DateTime, Utc};
use printpdf::lopdf::{self, Object, StringFormat};
use printpdf::{BuiltinFont, Mm, OffsetDateTime, PdfDocument};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 10.0;
const BOTTOM_MARGIN_MM: f32 = 20.0;
const CONTENT_WIDTH_MM: f32 = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
const MM_PER_PT: f32 = 25.4 / 72.0;

const BODY_LINE_HEIGHT_MM: f32 = 6.0;
const PARAGRAPH_GAP_MM: f32 = 2.0;
const TITLE_LINE_HEIGHT_MM: f32 = 10.0;
const STAMP_LINE_HEIGHT_MM: f32 = 5.0;
const HEADER_GAP_MM: f32 = 10.0;

/// Title block prefix; the company name follows.
pub const TITLE_PREFIX: &str = "PORTER ANALYSIS - ";

/// Visual style of one rendered line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    /// Document title block.
    Title,
    /// `# ` line.
    Primary,
    /// `## ` (or deeper) line.
    Secondary,
    Body,
}

impl LineStyle {
    pub fn font_size_pt(self) -> f32 {
        match self {
            LineStyle::Title => 16.0,
            LineStyle::Primary => 12.0,
            LineStyle::Secondary => 11.0,
            LineStyle::Body => 10.0,
        }
    }

    pub fn is_bold(self) -> bool {
        !matches!(self, LineStyle::Body)
    }
}

/// Pick the style of a raw report line and strip its heading markers.
pub fn classify_line(line: &str) -> (LineStyle, &str) {
    if line.starts_with("##") {
        (LineStyle::Secondary, line.trim_start_matches('#').trim_start())
    } else if let Some(rest) = line.strip_prefix('#') {
        (LineStyle::Primary, rest.trim_start())
    } else {
        (LineStyle::Body, line)
    }
}

/// One line of text at its final position.
///
/// `x_mm` is the left edge, `y_mm` the baseline measured from the bottom of
/// the page, as printpdf expects.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub style: LineStyle,
    pub x_mm: f32,
    pub y_mm: f32,
}

/// A fully laid out document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    /// Document title for the PDF metadata.
    pub title: String,
    /// Run timestamp; also the PDF creation and modification date.
    pub generated_at: DateTime<Utc>,
    /// Never empty.
    pub pages: Vec<Vec<PlacedLine>>,
}

impl DocumentLayout {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn lines(&self) -> impl Iterator<Item = &PlacedLine> {
        self.pages.iter().flatten()
    }
}

// Helvetica advance widths for ' '..='~', in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

/// Estimated width of `text` in millimetres.
///
/// Bold is approximated as 6% wider than regular. Characters outside the
/// table count as an average lowercase letter.
pub fn text_width_mm(text: &str, style: LineStyle) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| {
            let idx = (c as u32).wrapping_sub(' ' as u32) as usize;
            HELVETICA_WIDTHS.get(idx).copied().unwrap_or(556) as u32
        })
        .sum();
    let bold = if style.is_bold() { 1.06 } else { 1.0 };
    units as f32 / 1000.0 * style.font_size_pt() * MM_PER_PT * bold
}

/// Greedy word wrap to `max_width_mm`. Words wider than a line are split.
///
/// An empty input yields one empty line so blank lines keep their spacing.
pub fn wrap_line(text: &str, style: LineStyle, max_width_mm: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split(' ').filter(|w| !w.is_empty()) {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if text_width_mm(&candidate, style) <= max_width_mm {
            current = candidate;
            continue;
        }
        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        for c in word.chars() {
            current.push(c);
            if text_width_mm(&current, style) > max_width_mm && current.chars().count() > 1 {
                current.pop();
                lines.push(std::mem::replace(&mut current, c.to_string()));
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Center,
}

struct Cursor {
    pages: Vec<Vec<PlacedLine>>,
    top_mm: f32,
}

impl Cursor {
    fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            top_mm: MARGIN_MM,
        }
    }

    fn place(&mut self, text: String, style: LineStyle, line_height: f32, align: Align) {
        if self.top_mm + line_height > PAGE_HEIGHT_MM - BOTTOM_MARGIN_MM {
            self.pages.push(Vec::new());
            self.top_mm = MARGIN_MM;
        }
        let x_mm = match align {
            Align::Left => MARGIN_MM,
            Align::Center => {
                MARGIN_MM + ((CONTENT_WIDTH_MM - text_width_mm(&text, style)) / 2.0).max(0.0)
            }
        };
        let baseline_from_top = self.top_mm + line_height * 0.75;
        if !text.is_empty() {
            if let Some(page) = self.pages.last_mut() {
                page.push(PlacedLine {
                    text,
                    style,
                    x_mm,
                    y_mm: PAGE_HEIGHT_MM - baseline_from_top,
                });
            }
        }
        self.top_mm += line_height;
    }

    fn place_wrapped(&mut self, text: &str, style: LineStyle, line_height: f32, align: Align) {
        for part in wrap_line(text, style, CONTENT_WIDTH_MM) {
            self.place(part, style, line_height, align);
        }
    }

    fn gap(&mut self, mm: f32) {
        self.top_mm += mm;
    }
}

/// Lay out the title block and every report line.
pub fn layout_document(
    report: &SynthesizedReport,
    profile: &CompanyProfile,
    generated_at: DateTime<Utc>,
    charset: CharsetPolicy,
) -> DocumentLayout {
    let title = format!(
        "{TITLE_PREFIX}{}",
        apply_charset(profile.display_name(), charset)
    );
    let stamp = format!("Generated on {}", generated_at.format("%d/%m/%Y %H:%M"));

    let mut cursor = Cursor::new();
    cursor.place_wrapped(&title, LineStyle::Title, TITLE_LINE_HEIGHT_MM, Align::Center);
    cursor.place_wrapped(&stamp, LineStyle::Body, STAMP_LINE_HEIGHT_MM, Align::Center);
    cursor.gap(HEADER_GAP_MM);

    for raw in split_lines(report.as_str()) {
        let (style, text) = classify_line(raw);
        let text = apply_charset(text, charset);
        cursor.place_wrapped(&text, style, BODY_LINE_HEIGHT_MM, Align::Left);
        cursor.gap(PARAGRAPH_GAP_MM);
    }

    DocumentLayout {
        title,
        generated_at,
        pages: cursor.pages,
    }
}

fn render_error(path: &Path, detail: impl Into<String>) -> ReportError {
    ReportError::Render {
        path: path.to_path_buf(),
        detail: detail.into(),
    }
}

fn write_failed(path: &Path, source: std::io::Error) -> ReportError {
    ReportError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    }
}

/// Draw `layout` into an in-memory PDF.
///
/// printpdf stamps documents with the wall clock and a random `/ID`; both
/// are replaced with values derived from the layout.
pub fn encode_pdf(layout: &DocumentLayout) -> Result<Vec<u8>, String> {
    let stamp = OffsetDateTime::from_unix_timestamp(layout.generated_at.timestamp())
        .map_err(|e| e.to_string())?;
    let (doc, first_page, first_layer) =
        PdfDocument::new(&layout.title, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
    let doc = doc
        .with_creation_date(stamp)
        .with_mod_date(stamp)
        .with_metadata_date(stamp)
        .with_document_id(document_id(layout));
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| format!("{e:?}"))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| format!("{e:?}"))?;

    for (idx, lines) in layout.pages.iter().enumerate() {
        let (page, layer) = if idx == 0 {
            (first_page, first_layer)
        } else {
            doc.add_page(
                Mm(PAGE_WIDTH_MM),
                Mm(PAGE_HEIGHT_MM),
                format!("Page {}, Layer 1", idx + 1),
            )
        };
        let layer = doc.get_page(page).get_layer(layer);
        for line in lines {
            let font = if line.style.is_bold() { &bold } else { &regular };
            layer.use_text(
                line.text.as_str(),
                line.style.font_size_pt(),
                Mm(line.x_mm),
                Mm(line.y_mm),
                font,
            );
        }
    }

    let bytes = doc.save_to_bytes().map_err(|e| format!("{e:?}"))?;
    pin_trailer_id(&bytes, &document_id(layout))
}

/// 32 hex digits: FNV-1a of the title, then the timestamp.
fn document_id(layout: &DocumentLayout) -> String {
    let hash = layout
        .title
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325_u64, |h, b| {
            (h ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3)
        });
    format!("{hash:016X}{:016X}", layout.generated_at.timestamp() as u64)
}

fn pin_trailer_id(bytes: &[u8], id: &str) -> Result<Vec<u8>, String> {
    let mut doc = lopdf::Document::load_mem(bytes).map_err(|e| e.to_string())?;
    let id = Object::String(id.as_bytes().to_vec(), StringFormat::Literal);
    doc.trailer.set("ID", Object::Array(vec![id.clone(), id]));
    let mut out = Vec::with_capacity(bytes.len());
    doc.save_to(&mut out).map_err(|e| e.to_string())?;
    Ok(out)
}

/// Write `layout` to `path`, creating parent directories.
///
/// Blocking. The file appears only once complete, and not at all if
/// `cancel` fires before the final rename.
pub fn write_pdf(
    layout: &DocumentLayout,
    path: &Path,
    cancel: &CancellationToken,
) -> Result<(), ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| write_failed(path, e))?;
    }

    let bytes = encode_pdf(layout).map_err(|detail| render_error(path, detail))?;

    let tmp_path = tmp_path_for(path);
    if let Err(e) = std::fs::write(&tmp_path, &bytes) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(write_failed(path, e));
    }
    if cancel.is_cancelled() {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(ReportError::Cancelled {
            stage: Stage::Render,
        });
    }
    std::fs::rename(&tmp_path, path).map_err(|e| write_failed(path, e))?;

    debug!("Wrote {} pages to {}", layout.page_count(), path.display());
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Render `report` to `output_path`. Returns the number of pages written.
pub async fn render_document(
    report: &SynthesizedReport,
    profile: &CompanyProfile,
    output_path: &Path,
    config: &ReportConfig,
) -> Result<usize, ReportError> {
    let layout = layout_document(report, profile, config.run_timestamp(), config.charset);
    let pages = layout.page_count();
    let path = output_path.to_path_buf();

    // Dropping the guarded future (timeout or cancellation) cancels `abort`,
    // which stops the blocking writer before it renames into place.
    let abort = config.cancel.child_token();
    let task_abort = abort.clone();
    guarded(Stage::Render, config.render_timeout_secs, &config.cancel, async move {
        let _abort_on_drop = abort.drop_guard();
        tokio::task::spawn_blocking(move || write_pdf(&layout, &path, &task_abort))
            .await
            .map_err(|e| ReportError::Internal(format!("Render task panicked: {e}")))?
    })
    .await?;

    info!("Rendered {} pages to {}", pages, output_path.display());
    Ok(pages)
}
