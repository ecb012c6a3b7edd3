//! Bookkeeping shared between the page decorator and the photo grid.
//!
//! genpdf lays pages out one after another and never hands them back, so the
//! report records what happened during a pass in a [`LayoutProbe`]: how many
//! pages were started, which footer each page received, and where every photo
//! landed.  The first pass uses the probe to learn the final page count, the
//! second pass uses it to produce the [`PhotoPlacement`] list returned to
//! callers.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

/// Where a photo was drawn.
///
/// Coordinates are millimetres relative to the top-left corner of the grid
/// area on `page` (pages are counted from 1).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PhotoPlacement {
    /// Position of the photo in the grid (0-based, record order).
    pub index: usize,
    /// URL the photo was fetched from.
    pub source: String,
    pub page: usize,
    pub row: usize,
    pub column: usize,
    pub x_mm: f64,
    pub y_mm: f64,
    pub width_mm: f64,
    pub height_mm: f64,
}

#[derive(Debug, Default)]
struct LayoutLog {
    pages: usize,
    footers: Vec<String>,
    placements: Vec<PhotoPlacement>,
}

/// Cheap handle onto the log of one layout pass.
#[derive(Clone, Debug, Default)]
pub(crate) struct LayoutProbe(Rc<RefCell<LayoutLog>>);

impl LayoutProbe {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn enter_page(&self, page: usize) {
        let mut log = self.0.borrow_mut();
        log.pages = log.pages.max(page);
    }

    pub(crate) fn current_page(&self) -> usize {
        self.0.borrow().pages
    }

    pub(crate) fn record_footer(&self, footer: String) {
        self.0.borrow_mut().footers.push(footer);
    }

    pub(crate) fn record_placement(&self, placement: PhotoPlacement) {
        self.0.borrow_mut().placements.push(placement);
    }

    pub(crate) fn page_count(&self) -> usize {
        self.0.borrow().pages
    }

    pub(crate) fn take_footers(&self) -> Vec<String> {
        std::mem::take(&mut self.0.borrow_mut().footers)
    }

    pub(crate) fn take_placements(&self) -> Vec<PhotoPlacement> {
        std::mem::take(&mut self.0.borrow_mut().placements)
    }
}

/// Text stamped at the bottom of each page.
pub fn footer_text(page: usize, total: usize) -> String {
    format!("Page {} of {}", page, total)
}
