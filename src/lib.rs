//! PDF reports for driver check-in registrations.
//!
//! [`ReportRenderer`] loads a registration from a [`RecordStore`], fetches its
//! photos through an [`AssetFetcher`] and writes a paginated PDF into any
//! [`std::io::Write`] sink.  [`http::build_router`] exposes the renderer as
//! `GET /pdf/:id`.

pub mod assets;
pub mod builder;
pub mod config;
pub mod elements;
pub mod error;
pub mod fetch;
pub mod fonts;
pub mod grid;
pub mod http;
pub mod layout;
pub mod model;
pub mod report;
pub mod richtext;
pub mod server;
pub mod sink;
pub mod store;

pub use config::Config;
pub use error::{FetchError, ReportError, Result};
pub use fetch::{AssetFetcher, HttpFetcher};
pub use layout::PhotoPlacement;
pub use model::{PhotoRef, Record};
pub use report::{
    PreparedReport, RenderSummary, ReportRenderer, ReportSettings, SkipReason, SkippedPhoto,
};
pub use sink::ChannelSink;
pub use store::{MemoryRecordStore, RecordStore, SqliteRecordStore};
