#![allow(dead_code)]

use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::Path as UrlPath;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use checkin_report::fonts;
use checkin_report::{
    HttpFetcher, MemoryRecordStore, PhotoRef, Record, ReportRenderer, ReportSettings,
};
use sha2::{Digest, Sha256};

pub fn fonts_available() -> bool {
    fonts::default_fonts_available(None)
}

pub fn skip_without_fonts(test: &str) -> bool {
    if fonts_available() {
        return false;
    }
    eprintln!(
        "Skipping {}: no usable fonts. Set CHECKIN_REPORT_FONTS_DIR or install Liberation Sans / DejaVu Sans.",
        test
    );
    true
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::new_rgb8(width, height)
        .write_to(&mut bytes, image::ImageOutputFormat::Png)
        .expect("encode png");
    bytes
}

async fn photo_handler(UrlPath(name): UrlPath<String>) -> Response {
    let (width, height) = match name.as_str() {
        "missing.png" => return StatusCode::NOT_FOUND.into_response(),
        "broken.png" => return ([(header::CONTENT_TYPE, "image/png")], b"not a png".to_vec()).into_response(),
        "slow.png" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            (40, 40)
        }
        n if n.starts_with("tall") => (30, 90),
        n if n.starts_with("wide") => (120, 40),
        _ => (60, 60),
    };
    ([(header::CONTENT_TYPE, "image/png")], png(width, height)).into_response()
}

/// Local HTTP host serving generated PNGs under `/photos/:name`.
///
/// `missing.png` answers 404, `broken.png` serves garbage and `slow.png`
/// answers after three seconds.
pub struct PhotoHost {
    addr: SocketAddr,
}

impl PhotoHost {
    pub async fn start() -> Self {
        let app = Router::new().route("/photos/:name", get(photo_handler));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind photo host");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move { axum::serve(listener, app).await.expect("serve photos") });
        Self { addr }
    }

    pub fn url(&self, name: &str) -> String {
        format!("http://{}/photos/{}", self.addr, name)
    }

    pub fn photo(&self, name: &str) -> PhotoRef {
        PhotoRef::new(self.url(name), name)
    }
}

pub fn driver(id: i64) -> Record {
    Record::new(id)
        .with_name("Carlos Pereira")
        .with_carrier("Rodovia Cargas")
        .with_plate("BRA2E19")
        .with_destination("Warehouse 7")
        .with_registered_on("2024-03-18")
}

pub fn settings(temp_dir: &Path) -> ReportSettings {
    ReportSettings {
        temp_dir: temp_dir.to_path_buf(),
        ..ReportSettings::default()
    }
}

pub fn renderer(records: Vec<Record>, settings: ReportSettings) -> ReportRenderer {
    ReportRenderer::new(
        Arc::new(MemoryRecordStore::with_records(records)),
        Arc::new(HttpFetcher::new(Duration::from_millis(500))),
        settings,
    )
}

pub fn file_count(dir: &Path) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}

/// In-memory sink whose contents stay readable after the renderer took it.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().expect("buffer lock").clone()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink that accepts `limit` bytes and then fails like a closed connection.
pub struct FailingSink {
    limit: usize,
    written: usize,
}

impl FailingSink {
    pub fn after(limit: usize) -> Self {
        Self { limit, written: 0 }
    }
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.written >= self.limit {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"));
        }
        let n = buf.len().min(self.limit - self.written);
        self.written += n;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.written >= self.limit {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer went away"));
        }
        Ok(())
    }
}

pub fn page_count(pdf: &[u8]) -> usize {
    lopdf::Document::load_mem(pdf)
        .expect("parse pdf")
        .get_pages()
        .len()
}

pub fn image_xobject_count(pdf: &[u8]) -> usize {
    let document = lopdf::Document::load_mem(pdf).expect("parse pdf");
    document
        .objects
        .values()
        .filter(|object| match object {
            lopdf::Object::Stream(stream) => matches!(
                stream.dict.get(b"Subtype").and_then(|o| o.as_name()),
                Ok(name) if name == b"Image"
            ),
            _ => false,
        })
        .count()
}

fn resolve<'a>(document: &'a lopdf::Document, object: &'a lopdf::Object) -> Option<&'a lopdf::Object> {
    match object {
        lopdf::Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

fn image_size(dict: &lopdf::Dictionary) -> Option<(i64, i64)> {
    let subtype = dict.get(b"Subtype").and_then(|o| o.as_name()).ok()?;
    if subtype != b"Image" {
        return None;
    }
    let width = dict.get(b"Width").and_then(|o| o.as_i64()).ok()?;
    let height = dict.get(b"Height").and_then(|o| o.as_i64()).ok()?;
    Some((width, height))
}

/// Pixel sizes of the embedded images, sorted, for every image in the file.
pub fn image_sizes(pdf: &[u8]) -> Vec<(i64, i64)> {
    let document = lopdf::Document::load_mem(pdf).expect("parse pdf");
    let mut sizes: Vec<(i64, i64)> = document
        .objects
        .values()
        .filter_map(|object| match object {
            lopdf::Object::Stream(stream) => image_size(&stream.dict),
            _ => None,
        })
        .collect();
    sizes.sort_unstable();
    sizes
}

/// Pixel sizes of the images each page's resources reference, sorted per page.
///
/// Resource names are not stable between renders, so only the sizes are kept.
pub fn page_image_sizes(pdf: &[u8]) -> Vec<Vec<(i64, i64)>> {
    let document = lopdf::Document::load_mem(pdf).expect("parse pdf");
    document
        .get_pages()
        .values()
        .map(|page_id| {
            let mut sizes: Vec<(i64, i64)> = document
                .get_dictionary(*page_id)
                .ok()
                .and_then(|page| page.get(b"Resources").ok())
                .and_then(|resources| resolve(&document, resources))
                .and_then(|resources| resources.as_dict().ok())
                .and_then(|resources| resources.get(b"XObject").ok())
                .and_then(|xobjects| resolve(&document, xobjects))
                .and_then(|xobjects| xobjects.as_dict().ok())
                .map(|xobjects| {
                    xobjects
                        .iter()
                        .filter_map(|(_, object)| resolve(&document, object))
                        .filter_map(|object| object.as_stream().ok())
                        .filter_map(|stream| image_size(&stream.dict))
                        .collect()
                })
                .unwrap_or_default();
            sizes.sort_unstable();
            sizes
        })
        .collect()
}

pub fn scrub_pdf(bytes: &[u8]) -> Vec<u8> {
    fn scrub_segment(data: &mut [u8], tag: &[u8], terminator: u8) {
        let mut index = 0;
        while index + tag.len() < data.len() {
            if data[index..].starts_with(tag) {
                let mut cursor = index + tag.len();
                while cursor < data.len() {
                    let byte = data[cursor];
                    if byte == terminator {
                        break;
                    }
                    if terminator == b')' {
                        data[cursor] = b'0';
                    } else if !matches!(byte, b'<' | b'>' | b' ' | b'\n' | b'\r' | b'\t') {
                        data[cursor] = b'0';
                    }
                    cursor += 1;
                }
                index = cursor;
            } else {
                index += 1;
            }
        }
    }

    fn scrub_xml(data: &mut [u8], start: &[u8], end: &[u8]) {
        let mut offset = 0;
        while offset + start.len() < data.len() {
            let Some(start_pos) = data[offset..]
                .windows(start.len())
                .position(|window| window == start)
            else {
                break;
            };
            let start_index = offset + start_pos + start.len();
            let Some(end_pos) = data[start_index..]
                .windows(end.len())
                .position(|window| window == end)
            else {
                break;
            };
            for byte in &mut data[start_index..start_index + end_pos] {
                if !matches!(*byte, b'<' | b'>' | b'/' | b' ' | b'\n' | b'\r' | b'\t') {
                    *byte = b'0';
                }
            }
            offset = start_index + end_pos + end.len();
        }
    }

    let mut normalized = bytes.to_vec();
    scrub_segment(&mut normalized, b"/CreationDate(", b')');
    scrub_segment(&mut normalized, b"/ModDate(", b')');
    scrub_segment(&mut normalized, b"/ID[", b']');
    scrub_segment(&mut normalized, b"/Producer(", b')');
    for tag in [
        "xmp:CreateDate",
        "xmp:ModifyDate",
        "xmp:MetadataDate",
        "xmpMM:DocumentID",
        "xmpMM:InstanceID",
        "xmpMM:VersionID",
    ] {
        let open = format!("<{}>", tag);
        let close = format!("</{}>", tag);
        scrub_xml(&mut normalized, open.as_bytes(), close.as_bytes());
    }
    normalized
}

pub fn normalized_hash(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(scrub_pdf(bytes)).into()
}
