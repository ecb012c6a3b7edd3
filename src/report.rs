//! Registration report rendering.
//!
//! A render runs in two phases.  [`ReportRenderer::prepare`] loads the record,
//! fetches its photos into temporary assets and performs a first layout pass
//! that only counts pages.  [`PreparedReport::write_to`] then lays the document
//! out again with the final page count known, stamping "Page X of N" on every
//! page, and writes the PDF into the sink.  Temporary assets live inside the
//! prepared report and are removed when it is consumed or dropped.

use std::cell::{Cell, RefCell};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use genpdf::elements::{Break, Paragraph};
use genpdf::style::{Color, Style, StyledString};
use genpdf::{Alignment, Element, Margins, PaperSize};
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::assets::TempAssets;
use crate::builder::DocumentBuilder;
use crate::elements::{decode_photo, mm_from_f64, mm_from_pt, UnderlinedHeading};
use crate::error::{ReportError, Result};
use crate::fetch::{remote_url, AssetFetcher};
use crate::grid::{GridPhoto, PhotoGrid};
use crate::layout::{footer_text, LayoutProbe, PhotoPlacement};
use crate::model::Record;
use crate::richtext::{labeled_value, Span};
use crate::store::RecordStore;

/// Heading printed at the top of every report.
pub const REPORT_TITLE: &str = "Driver Registration";
/// Line printed instead of the grid when no photo could be placed.
pub const NO_IMAGES_TEXT: &str = "No images available";
/// Heading of the photo section.
pub const PHOTOS_HEADING: &str = "Photos:";
/// Photos placed in the grid at most.
pub const DEFAULT_MAX_PHOTOS: usize = 6;

const PAGE_MARGIN_PT: f64 = 50.0;
const CELL_HEIGHT_PT: f64 = 200.0;
const CELL_INSET_PT: f64 = 5.0;
const FOOTER_HEIGHT_MM: f64 = 8.0;
const TITLE_FONT_SIZE: u8 = 20;
const FIELD_FONT_SIZE: u8 = 14;
const HEADING_FONT_SIZE: u8 = 16;
const FOOTER_FONT_SIZE: u8 = 10;

/// Metadata title of the document for a driver.
pub fn document_title(name: &str) -> String {
    format!("{} - {}", REPORT_TITLE, name)
}

/// Knobs of a single render.
#[derive(Clone, Debug)]
pub struct ReportSettings {
    /// Directory holding the temporary photo files.
    pub temp_dir: PathBuf,
    /// Maximum number of photos placed in the grid.
    pub max_photos: usize,
    /// Substring a remote host must contain to be fetched.
    pub host_filter: Option<String>,
    /// Font directory searched before the default locations.
    pub font_dir: Option<PathBuf>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir().join("checkin_report"),
            max_photos: DEFAULT_MAX_PHOTOS,
            host_filter: None,
            font_dir: None,
        }
    }
}

/// Why a photo reference did not make it into the grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// The reference is not a fetchable http(s) URL.
    NotRemote,
    /// Fetching failed, returned a non-success status or timed out.
    Fetch(String),
    /// The bytes could not be written to a temporary file.
    Storage(String),
    /// The bytes are not an image genpdf can embed.
    Decode(String),
}

/// A photo reference that was left out of the report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedPhoto {
    /// Position of the reference within the record.
    pub index: usize,
    pub reference: String,
    pub reason: SkipReason,
}

/// What a completed render produced.
#[derive(Clone, Debug, Serialize)]
pub struct RenderSummary {
    pub record_id: i64,
    pub page_count: usize,
    /// Footer text stamped on each page, in page order.
    pub footers: Vec<String>,
    pub placements: Vec<PhotoPlacement>,
    pub skipped: Vec<SkippedPhoto>,
    pub bytes_written: u64,
}

/// Renders registration reports from a record store and a photo fetcher.
pub struct ReportRenderer {
    store: Arc<dyn RecordStore>,
    fetcher: Arc<dyn AssetFetcher>,
    settings: ReportSettings,
}

impl ReportRenderer {
    pub fn new(
        store: Arc<dyn RecordStore>,
        fetcher: Arc<dyn AssetFetcher>,
        settings: ReportSettings,
    ) -> Self {
        Self {
            store,
            fetcher,
            settings,
        }
    }

    /// Loads the record, fetches its photos and counts the pages of the report.
    ///
    /// Fails with [`ReportError::NotFound`] before touching the network or the
    /// temporary directory when the record does not exist.
    pub async fn prepare(&self, id: i64) -> Result<PreparedReport> {
        let record = self
            .store
            .find_by_id_with_photos(id)
            .await?
            .ok_or(ReportError::NotFound { id })?;
        debug!(
            "preparing report for registration {} ({} store) with {} photo references",
            id,
            self.store.store_tag(),
            record.photos().len()
        );

        let mut assets = TempAssets::new(&self.settings.temp_dir)?;
        let (photos, skipped) = self.collect_photos(&record, &mut assets).await;

        let font_dir = self.settings.font_dir.clone();
        let (record, photos, page_count) = tokio::task::spawn_blocking(move || {
            let probe = LayoutProbe::new();
            compose(&record, photos.clone(), font_dir.as_deref(), None, &probe)?
                .render(io::sink())
                .map_err(ReportError::Layout)?;
            Ok::<_, ReportError>((record, photos, probe.page_count()))
        })
        .await
        .map_err(|err| ReportError::internal(format!("layout worker failed: {}", err)))??;
        debug!(
            "registration {} lays out on {} page(s) with {} photo(s)",
            id,
            page_count,
            photos.len()
        );

        Ok(PreparedReport {
            record,
            photos,
            skipped,
            page_count,
            font_dir: self.settings.font_dir.clone(),
            assets,
        })
    }

    /// Prepares and writes the report for `id` into `sink`.
    pub async fn render<W>(&self, id: i64, sink: W) -> Result<RenderSummary>
    where
        W: Write + Send + 'static,
    {
        let prepared = self.prepare(id).await?;
        tokio::task::spawn_blocking(move || prepared.write_to(sink))
            .await
            .map_err(|err| ReportError::internal(format!("render worker failed: {}", err)))?
    }

    async fn collect_photos(
        &self,
        record: &Record,
        assets: &mut TempAssets,
    ) -> (Vec<GridPhoto>, Vec<SkippedPhoto>) {
        let host_filter = self.settings.host_filter.as_deref();
        let mut photos = Vec::new();
        let mut skipped = Vec::new();

        for (index, photo) in record.photos().iter().enumerate() {
            if photos.len() >= self.settings.max_photos {
                debug!(
                    "photo limit of {} reached; ignoring remaining references",
                    self.settings.max_photos
                );
                break;
            }

            let mut skip = |reason: SkipReason| {
                warn!(
                    "skipping photo {} ({}) of registration {}: {:?}",
                    index,
                    photo.url(),
                    record.id(),
                    reason
                );
                skipped.push(SkippedPhoto {
                    index,
                    reference: photo.url().to_owned(),
                    reason,
                });
            };

            let Some(url) = remote_url(photo.url(), host_filter) else {
                skip(SkipReason::NotRemote);
                continue;
            };

            let bytes = match self.fetcher.fetch(&url).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    skip(SkipReason::Fetch(err.to_string()));
                    continue;
                }
            };

            let path = match assets.store(index, photo.url(), &bytes) {
                Ok(asset) => asset.path().to_path_buf(),
                Err(err) => {
                    skip(SkipReason::Storage(err.to_string()));
                    continue;
                }
            };

            let decoded =
                tokio::task::spawn_blocking(move || decode_photo(path).map_err(|e| e.to_string()))
                    .await
                    .unwrap_or_else(|err| Err(decode_worker_failure(index, err)));
            match decoded {
                Ok(image) => photos.push(GridPhoto::new(image, photo.url())),
                Err(message) => {
                    assets.discard_last();
                    skip(SkipReason::Decode(message));
                }
            }
        }

        debug!(
            "fetched {} photo(s) via {}, skipped {}",
            photos.len(),
            self.fetcher.fetcher_tag(),
            skipped.len()
        );
        (photos, skipped)
    }
}

fn decode_worker_failure(index: usize, err: tokio::task::JoinError) -> String {
    if err.is_panic() {
        error!("decode worker for photo {} panicked: {}", index, err);
        format!("decode worker panicked: {}", err)
    } else {
        error!("decode worker for photo {} was cancelled: {}", index, err);
        format!("decode worker cancelled: {}", err)
    }
}

/// A report whose record and photos are loaded and whose page count is known.
#[derive(Debug)]
pub struct PreparedReport {
    record: Record,
    photos: Vec<GridPhoto>,
    skipped: Vec<SkippedPhoto>,
    page_count: usize,
    font_dir: Option<PathBuf>,
    assets: TempAssets,
}

impl PreparedReport {
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Number of pages found by the counting pass.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Number of photos that will be placed in the grid.
    pub fn photo_count(&self) -> usize {
        self.photos.len()
    }

    /// Renders the final document into `sink` and removes the temporary assets.
    ///
    /// The sink is flushed once the document is complete.  Any write or flush
    /// failure is reported as [`ReportError::Sink`].
    pub fn write_to<W: Write>(self, sink: W) -> Result<RenderSummary> {
        let PreparedReport {
            record,
            photos,
            skipped,
            page_count,
            font_dir,
            assets,
        } = self;

        let probe = LayoutProbe::new();
        let mut tracked = TrackedSink::new(sink);
        let outcome = render_final(
            &record,
            photos,
            font_dir.as_deref(),
            page_count,
            &probe,
            &mut tracked,
        );

        let removed = assets.len();
        drop(assets);
        debug!("released {} temporary asset(s)", removed);
        outcome?;

        let rendered_pages = probe.page_count();
        if rendered_pages != page_count {
            warn!(
                "registration {} rendered {} page(s) but {} were counted",
                record.id(),
                rendered_pages,
                page_count
            );
        }

        let summary = RenderSummary {
            record_id: record.id(),
            page_count: rendered_pages,
            footers: probe.take_footers(),
            placements: probe.take_placements(),
            skipped,
            bytes_written: tracked.written(),
        };
        info!(
            "rendered registration {}: {} page(s), {} photo(s), {} bytes",
            summary.record_id,
            summary.page_count,
            summary.placements.len(),
            summary.bytes_written
        );
        Ok(summary)
    }
}

fn render_final<W: Write>(
    record: &Record,
    photos: Vec<GridPhoto>,
    font_dir: Option<&Path>,
    page_count: usize,
    probe: &LayoutProbe,
    tracked: &mut TrackedSink<W>,
) -> Result<()> {
    let document = compose(record, photos, font_dir, Some(page_count), probe)?;
    document
        .render(&mut *tracked)
        .map_err(|err| match tracked.take_failure() {
            Some(io_err) => ReportError::Sink(io_err),
            None => ReportError::Layout(err),
        })?;
    tracked.flush().map_err(ReportError::Sink)
}

/// Content of a report, top to bottom.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReportBlock {
    /// Centred document heading.
    Title(String),
    /// A bold label followed by its value.
    Field { label: &'static str, value: String },
    /// Underlined section heading.
    Heading(String),
    /// Grid holding this many photos.
    PhotoGrid(usize),
    /// Marker shown when no photo could be placed.
    NoImages,
}

/// Lists the blocks of the report for `record` with `photo_count` placed photos.
pub fn report_blocks(record: &Record, photo_count: usize) -> Vec<ReportBlock> {
    let mut blocks = vec![ReportBlock::Title(REPORT_TITLE.to_string())];
    blocks.extend(
        record
            .labeled_fields()
            .into_iter()
            .map(|(label, value)| ReportBlock::Field {
                label,
                value: value.to_string(),
            }),
    );
    blocks.push(ReportBlock::Heading(PHOTOS_HEADING.to_string()));
    blocks.push(if photo_count == 0 {
        ReportBlock::NoImages
    } else {
        ReportBlock::PhotoGrid(photo_count)
    });
    blocks
}

/// Builds the document for one layout pass.
///
/// Without `total_pages` the footers carry a placeholder total; their height is
/// fixed, so the page breaks are the same in both passes.
fn compose(
    record: &Record,
    photos: Vec<GridPhoto>,
    font_dir: Option<&Path>,
    total_pages: Option<usize>,
    probe: &LayoutProbe,
) -> Result<genpdf::Document> {
    let footer_probe = probe.clone();
    let mut document = DocumentBuilder::new()
        .with_title(document_title(record.name()))
        .with_paper_size(PaperSize::A4)
        .with_margins(Margins::all(mm_from_f64(mm_from_pt(PAGE_MARGIN_PT))))
        .with_footer(mm_from_f64(FOOTER_HEIGHT_MM), move |page| {
            footer_probe.enter_page(page);
            let text = footer_text(page, total_pages.unwrap_or(page));
            footer_probe.record_footer(text.clone());
            Paragraph::new(text)
                .aligned(Alignment::Center)
                .styled(
                    Style::new()
                        .with_font_size(FOOTER_FONT_SIZE)
                        .with_color(Color::Greyscale(90)),
                )
        })
        .with_font_directory(font_dir.map(Path::to_path_buf))
        .build()
        .map_err(ReportError::Font)?;

    let mut photos = Some(photos);
    for block in report_blocks(record, photos.as_ref().map_or(0, Vec::len)) {
        match block {
            ReportBlock::Title(title) => {
                document.push(
                    Paragraph::new(StyledString::new(
                        title,
                        Style::new().bold().with_font_size(TITLE_FONT_SIZE),
                    ))
                    .aligned(Alignment::Center),
                );
                document.push(Break::new(1));
            }
            ReportBlock::Field { label, value } => {
                let mut line = Paragraph::default();
                for span in labeled_value(label, &value) {
                    line.push(span);
                }
                document.push(
                    line.styled(Style::new().with_font_size(FIELD_FONT_SIZE))
                        .padded(Margins::trbl(0, 0, 2, 0)),
                );
            }
            ReportBlock::Heading(heading) => {
                document.push(Break::new(1));
                document.push(
                    UnderlinedHeading::new(Span::new(heading).bold().underline())
                        .styled(Style::new().with_font_size(HEADING_FONT_SIZE)),
                );
                document.push(Break::new(0.5));
            }
            ReportBlock::PhotoGrid(_) => {
                let grid = PhotoGrid::new(
                    photos.take().unwrap_or_default(),
                    mm_from_pt(CELL_HEIGHT_PT),
                    mm_from_pt(CELL_INSET_PT),
                );
                document.push(grid.with_probe(probe.clone()));
            }
            ReportBlock::NoImages => document.push(Paragraph::new(NO_IMAGES_TEXT)),
        }
    }

    Ok(document)
}

/// Write adapter that counts bytes and remembers the first write failure.
///
/// genpdf wraps io failures in its own error type; the remembered failure lets
/// the caller report them as sink errors instead of layout errors.
struct TrackedSink<W> {
    inner: W,
    written: Cell<u64>,
    failure: RefCell<Option<io::Error>>,
}

impl<W: Write> TrackedSink<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            written: Cell::new(0),
            failure: RefCell::new(None),
        }
    }

    fn written(&self) -> u64 {
        self.written.get()
    }

    fn take_failure(&self) -> Option<io::Error> {
        self.failure.borrow_mut().take()
    }

    fn remember(&self, err: &io::Error) {
        let mut failure = self.failure.borrow_mut();
        if failure.is_none() {
            *failure = Some(io::Error::new(err.kind(), err.to_string()));
        }
    }
}

impl<W: Write> Write for TrackedSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner.write(buf) {
            Ok(n) => {
                self.written.set(self.written.get() + n as u64);
                Ok(n)
            }
            Err(err) => {
                self.remember(&err);
                Err(err)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush().map_err(|err| {
            self.remember(&err);
            err
        })
    }
}
