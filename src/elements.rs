//! Element helpers built on top of `genpdf` primitives.
//!
//! Photo decoding goes through the [`image`] crate with descriptive errors, and
//! [`UnderlinedHeading`] adds the underline stroke genpdf paragraphs lack.

use std::path::Path;

use image::GenericImageView;

use genpdf::elements::Paragraph;
use genpdf::error::{Context as _, Error};
use genpdf::style::Style;
use genpdf::{render, Element, Mm, Position, RenderResult};

use crate::richtext::StyledSpan;

/// Resolution assumed when converting pixel dimensions to millimetres.
pub const DEFAULT_IMAGE_DPI: f64 = 300.0;
const MM_PER_INCH: f64 = 25.4;
const MM_PER_PT: f64 = MM_PER_INCH / 72.0;
const BASELINE_RATIO: f64 = 0.8;
const DEFAULT_UNDERLINE_GAP_MM: f64 = 0.4;

pub(crate) fn mm_from_f64(value: f64) -> Mm {
    Mm::from(printpdf::Mm(value))
}

pub(crate) fn mm_to_f64(value: Mm) -> f64 {
    let mm: printpdf::Mm = value.into();
    mm.0
}

/// Converts PDF points to millimetres.
pub fn mm_from_pt(points: f64) -> f64 {
    points * MM_PER_PT
}

/// Size in millimetres genpdf gives an unscaled image at [`DEFAULT_IMAGE_DPI`].
pub fn natural_size_mm(image: &image::DynamicImage) -> (f64, f64) {
    let (px_width, px_height) = image.dimensions();
    let width_mm = MM_PER_INCH * f64::from(px_width) / DEFAULT_IMAGE_DPI;
    let height_mm = MM_PER_INCH * f64::from(px_height) / DEFAULT_IMAGE_DPI;
    (width_mm, height_mm)
}

/// Loads an image from the given path using the [`image`] crate with descriptive errors.
pub fn decode_image_from_path(path: impl AsRef<Path>) -> Result<image::DynamicImage, Error> {
    let path = path.as_ref();
    let reader = image::io::Reader::open(path)
        .with_context(|| format!("Failed to open image file {}", path.display()))?;
    reader
        .with_guessed_format()
        .context("Unable to determine image format")?
        .decode()
        .with_context(|| format!("Failed to decode image file {}", path.display()))
}

/// Decodes a stored photo into an image genpdf can embed.
///
/// genpdf rejects images with an alpha channel, so those are flattened to RGB.
pub fn decode_photo(path: impl AsRef<Path>) -> Result<image::DynamicImage, Error> {
    let image = decode_image_from_path(path)?;
    if image.color().has_alpha() {
        Ok(image::DynamicImage::ImageRgb8(image.to_rgb8()))
    } else {
        Ok(image)
    }
}

/// A single-line heading whose text can be underlined.
pub struct UnderlinedHeading {
    paragraph: Paragraph,
    underline: bool,
    underline_gap: Mm,
}

impl UnderlinedHeading {
    /// Creates a heading from a styled span; the underline follows the span's flag.
    pub fn new(span: impl Into<StyledSpan>) -> Self {
        let span = span.into();
        Self {
            paragraph: Paragraph::new(span.string),
            underline: span.underline,
            underline_gap: mm_from_f64(DEFAULT_UNDERLINE_GAP_MM),
        }
    }
}

impl Element for UnderlinedHeading {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let result = self.paragraph.render(context, area.clone(), style)?;
        if result.has_more || !self.underline {
            return Ok(result);
        }

        let baseline = mm_from_f64(
            mm_to_f64(result.size.height) * BASELINE_RATIO + mm_to_f64(self.underline_gap),
        );
        let mut line_style = Style::new();
        if let Some(color) = style.color() {
            line_style = line_style.with_color(color);
        }
        area.draw_line(
            vec![
                Position::new(Mm::default(), baseline),
                Position::new(result.size.width, baseline),
            ],
            line_style,
        );

        Ok(result)
    }
}
