//! Media extraction: per-platform strategy chains with fallback.

mod archive;
mod direct;
mod dispatcher;
mod html5;
pub mod http;
mod traits;
mod twitter;
mod types;
mod ytdlp;

pub use archive::ArchiveStrategy;
pub use direct::DirectStrategy;
pub use dispatcher::{Dispatcher, StrategyTable};
pub use html5::Html5Strategy;
pub use traits::ExtractionStrategy;
pub use twitter::TwitterPageStrategy;
pub use types::*;
pub use ytdlp::YtDlpStrategy;
