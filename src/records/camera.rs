use serde::{Deserialize, Serialize};

use super::CsvRecord;

/// One captured camera frame with its metadata.
///
/// The raw JPEG bytes travel through the channel alongside the metadata; only
/// the metadata row lands in the CSV, the bytes are persisted separately by
/// the recorder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraFrame {
    /// Capture time, nanoseconds since the Unix epoch.
    pub timestamp_ns: i64,
    /// Monotonic per-session frame counter, starting at 0.
    pub frame_id: u64,
    pub width: u32,
    pub height: u32,
    /// Pixel/container format tag (MJPEG, RAW, PNG, ...).
    pub format: String,
    /// Relative path the frame was saved under, assigned by the recorder.
    pub file_path: String,
    pub size_bytes: usize,
    /// Raw image data, never serialized to CSV.
    #[serde(skip)]
    pub jpeg: Vec<u8>,
}

impl CsvRecord for CameraFrame {
    fn columns() -> &'static [&'static str] {
        &[
            "timestamp_ns",
            "frame_id",
            "width",
            "height",
            "format",
            "file_path",
            "size_bytes",
        ]
    }

    fn to_row(&self) -> Vec<String> {
        vec![
            self.timestamp_ns.to_string(),
            self.frame_id.to_string(),
            self.width.to_string(),
            self.height.to_string(),
            self.format.clone(),
            self.file_path.clone(),
            self.size_bytes.to_string(),
        ]
    }
}
