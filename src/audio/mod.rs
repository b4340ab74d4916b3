//! Audio retrieval for analysis jobs.

mod downloader;

pub use downloader::{fetch_audio, temp_file_name, AudioFetcher, TempAudio};
