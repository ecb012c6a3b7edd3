//! Three-column photo grid.
//!
//! Cells share the width of the content area equally and have a fixed height.
//! Photos are scaled to fit their cell minus an inset, keep their aspect ratio
//! and are centred on both axes.  Rows that do not fit on the current page are
//! continued on the next one.

use genpdf::elements::Image;
use genpdf::error::Error;
use genpdf::style::Style;
use genpdf::{render, Element, Position, RenderResult, Scale, Size};

use crate::elements::{mm_from_f64, mm_to_f64, natural_size_mm};
use crate::layout::{LayoutProbe, PhotoPlacement};

/// Number of photos per row.
pub const GRID_COLUMNS: usize = 3;

/// A decoded photo ready for placement.
#[derive(Clone, Debug)]
pub struct GridPhoto {
    image: image::DynamicImage,
    source: String,
}

impl GridPhoto {
    pub fn new(image: image::DynamicImage, source: impl Into<String>) -> Self {
        Self {
            image,
            source: source.into(),
        }
    }

    pub fn image(&self) -> &image::DynamicImage {
        &self.image
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Row and column of the cell holding the photo at `position`.
pub fn grid_cell(position: usize) -> (usize, usize) {
    (position / GRID_COLUMNS, position % GRID_COLUMNS)
}

/// Result of fitting a box into bounds while keeping its aspect ratio.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fit {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
    pub width: f64,
    pub height: f64,
}

/// Scales `natural` (width, height) to the largest size inside `bounds`, centred.
pub fn fit_within(natural: (f64, f64), bounds: (f64, f64)) -> Fit {
    let (natural_width, natural_height) = natural;
    let (bound_width, bound_height) = (bounds.0.max(0.0), bounds.1.max(0.0));
    let scale = if natural_width <= f64::EPSILON || natural_height <= f64::EPSILON {
        0.0
    } else {
        (bound_width / natural_width).min(bound_height / natural_height)
    };
    let width = natural_width * scale;
    let height = natural_height * scale;
    Fit {
        scale,
        offset_x: (bound_width - width) / 2.0,
        offset_y: (bound_height - height) / 2.0,
        width,
        height,
    }
}

/// Element that lays photos out row by row, three per row.
pub struct PhotoGrid {
    photos: Vec<GridPhoto>,
    next: usize,
    cell_height_mm: f64,
    inset_mm: f64,
    probe: Option<LayoutProbe>,
}

impl PhotoGrid {
    /// Creates a grid with the given cell height and inset, both in millimetres.
    pub fn new(photos: Vec<GridPhoto>, cell_height_mm: f64, inset_mm: f64) -> Self {
        Self {
            photos,
            next: 0,
            cell_height_mm,
            inset_mm,
            probe: None,
        }
    }

    pub(crate) fn with_probe(mut self, probe: LayoutProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    fn place(
        &self,
        context: &genpdf::Context,
        position: usize,
        cell: render::Area<'_>,
        cell_width_mm: f64,
        style: Style,
    ) -> Result<(), Error> {
        let photo = &self.photos[position];
        let (row, column) = grid_cell(position);
        let fit = fit_within(
            natural_size_mm(&photo.image),
            (
                cell_width_mm - 2.0 * self.inset_mm,
                self.cell_height_mm - 2.0 * self.inset_mm,
            ),
        );
        let x = self.inset_mm + fit.offset_x;
        let y = self.inset_mm + fit.offset_y;

        let mut image = Image::from_dynamic_image(photo.image.clone())?;
        image.set_scale(Scale::new(fit.scale, fit.scale));
        image.set_position(Position::new(mm_from_f64(x), mm_from_f64(y)));
        image.render(context, cell, style)?;

        if let Some(probe) = &self.probe {
            probe.record_placement(PhotoPlacement {
                index: position,
                source: photo.source.clone(),
                page: probe.current_page(),
                row,
                column,
                x_mm: cell_width_mm * column as f64 + x,
                y_mm: y,
                width_mm: fit.width,
                height_mm: fit.height,
            });
        }
        Ok(())
    }
}

impl Element for PhotoGrid {
    fn render(
        &mut self,
        context: &genpdf::Context,
        area: render::Area<'_>,
        style: Style,
    ) -> Result<RenderResult, Error> {
        let mut result = RenderResult::default();
        let width_mm = mm_to_f64(area.size().width);
        let height_mm = mm_to_f64(area.size().height);
        let cell_width_mm = width_mm / GRID_COLUMNS as f64;

        let mut row_top_mm = 0.0;
        let mut row_y_mm = None;
        while self.next < self.photos.len() {
            let (_, column) = grid_cell(self.next);
            if column == 0 {
                let top = row_y_mm.map_or(0.0, |y: f64| y + self.cell_height_mm);
                if top + self.cell_height_mm > height_mm {
                    result.has_more = true;
                    break;
                }
                row_y_mm = Some(top);
                row_top_mm = top;
            }

            let mut cell = area.clone();
            cell.add_offset(Position::new(
                mm_from_f64(cell_width_mm * column as f64),
                mm_from_f64(row_top_mm),
            ));
            self.place(context, self.next, cell, cell_width_mm, style)?;
            self.next += 1;
        }

        let used_mm = row_y_mm.map_or(0.0, |y| y + self.cell_height_mm);
        result.size = Size::new(area.size().width, mm_from_f64(used_mm));
        Ok(result)
    }
}
