// Download/encode pipeline
//
// Two steps, run strictly in order for each request:
// - resolver/downloader: probe stream metadata, then walk a fallback
//   ladder of quality selectors (plus per-format-id retries) until one
//   produces a non-empty file
// - transcoder: normalize the download to a broadly playable MP4, with
//   the raw file as fallback output when encoding fails

pub mod errors;
pub mod ladder;
pub mod metadata;
pub mod models;
pub mod orchestrator;
pub mod transcode;
pub mod utils;

pub use errors::DownloadError;
pub use models::{DownloadResult, PipelineConfig};
pub use orchestrator::Pipeline;
