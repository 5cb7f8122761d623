pub mod attributes;
pub mod census;
pub mod classify;
pub mod config;
pub mod error;
pub mod event;
pub mod fixer;
pub mod melder;
pub mod numbering;
pub mod path;
pub mod pending;
pub mod pipeline;
pub mod pseudopage;
pub mod reader;
pub mod readorn;
pub mod strip;
pub mod word;
pub mod wordinfo;
pub mod writer;

pub use config::AdornConfig;
pub use error::AdornError;
pub use pipeline::{adorn_file, readorn_file, strip_file, AdornSummary};

pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");
