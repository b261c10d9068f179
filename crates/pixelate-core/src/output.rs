//! Persisting batch results: pixelated rasters and the batch report.
//!
//! Reports are either a single JSON document or JSON Lines, one record per
//! image followed by a summary line.

use serde::Serialize;
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::RasterCodec;
use crate::types::{BatchStats, ImageRecord, Raster};

/// Report format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Single JSON object
    Json,
    /// One JSON object per line (newline-delimited JSON)
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ReportDocument<'a> {
    stats: &'a BatchStats,
    images: &'a [ImageRecord],
}

#[derive(Serialize)]
struct SummaryLine<'a> {
    summary: &'a BatchStats,
}

/// Serializes a batch report to JSON or JSONL.
pub struct ReportWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
}

impl<W: Write> ReportWriter<W> {
    /// `pretty` only affects the JSON format.
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
        }
    }

    /// Write every record and the batch statistics, then flush.
    pub fn write_report(&mut self, records: &[ImageRecord], stats: &BatchStats) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                let document = ReportDocument {
                    stats,
                    images: records,
                };
                if self.pretty {
                    serde_json::to_writer_pretty(&mut self.writer, &document)
                        .map_err(io::Error::other)?;
                } else {
                    serde_json::to_writer(&mut self.writer, &document).map_err(io::Error::other)?;
                }
                writeln!(self.writer)?;
            }
            OutputFormat::JsonLines => {
                for record in records {
                    serde_json::to_writer(&mut self.writer, record).map_err(io::Error::other)?;
                    writeln!(self.writer)?;
                }
                serde_json::to_writer(&mut self.writer, &SummaryLine { summary: stats })
                    .map_err(io::Error::other)?;
                writeln!(self.writer)?;
            }
        }
        self.writer.flush()
    }

    /// Consume the writer and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Picks output file names: `<dir>/<stem><suffix>.png`.
///
/// Inputs from different directories can share a stem; later ones get the
/// batch index appended so no output overwrites another.
#[derive(Debug)]
pub struct OutputNamer {
    dir: PathBuf,
    suffix: String,
    taken: HashSet<PathBuf>,
}

impl OutputNamer {
    pub fn new(dir: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            suffix: suffix.into(),
            taken: HashSet::new(),
        }
    }

    /// Output path for the input at `index` in the batch.
    pub fn name(&mut self, index: usize, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("image{index}"));

        let mut path = self.dir.join(format!("{stem}{}.png", self.suffix));
        if self.taken.contains(&path) {
            path = self.dir.join(format!("{stem}{}_{index}.png", self.suffix));
        }
        self.taken.insert(path.clone());
        path
    }
}

/// Encode `raster` with `codec` and write it to `path`, creating parent
/// directories as needed.
pub fn save_raster(codec: &dyn RasterCodec, raster: &Raster, path: &Path) -> PipelineResult<()> {
    let bytes = codec.encode(raster)?;
    let io_error = |e: io::Error| PipelineError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    std::fs::write(path, bytes).map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ImageCodec;
    use crate::types::RecordStatus;
    use image::{Rgba, RgbaImage};

    fn record(index: usize) -> ImageRecord {
        ImageRecord {
            index,
            input: PathBuf::from(format!("/in/{index}.png")),
            output: Some(PathBuf::from(format!("/out/{index}_pixelated.png"))),
            status: RecordStatus::Ok,
            width: Some(10),
            height: Some(5),
            chunks: Some(2),
            error: None,
        }
    }

    fn stats() -> BatchStats {
        BatchStats {
            images: 2,
            succeeded: 2,
            chunks: 4,
            ..BatchStats::default()
        }
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("jsonl"), Some(OutputFormat::JsonLines));
        assert_eq!(OutputFormat::parse("ndjson"), Some(OutputFormat::JsonLines));
        assert_eq!(OutputFormat::parse("xml"), None);
    }

    #[test]
    fn test_json_report_is_one_document() {
        let mut writer = ReportWriter::new(Vec::new(), OutputFormat::Json, false);
        writer.write_report(&[record(0), record(1)], &stats()).unwrap();
        let output = String::from_utf8(writer.into_inner()).unwrap();

        let value: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(value["stats"]["succeeded"], 2);
        assert_eq!(value["images"].as_array().unwrap().len(), 2);
        assert_eq!(value["images"][1]["status"], "ok");
    }

    #[test]
    fn test_jsonl_report_ends_with_summary() {
        let mut writer = ReportWriter::new(Vec::new(), OutputFormat::JsonLines, true);
        writer.write_report(&[record(0), record(1)], &stats()).unwrap();
        let output = String::from_utf8(writer.into_inner()).unwrap();

        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: ImageRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first, record(0));
        assert!(lines[2].starts_with("{\"summary\":"));
    }

    #[test]
    fn test_output_namer_avoids_collisions() {
        let mut namer = OutputNamer::new("/out", "_px");
        assert_eq!(namer.name(0, Path::new("/a/face.jpg")), PathBuf::from("/out/face_px.png"));
        assert_eq!(namer.name(1, Path::new("/b/face.png")), PathBuf::from("/out/face_px_1.png"));
        assert_eq!(namer.name(2, Path::new("/b/cat.gif")), PathBuf::from("/out/cat_px.png"));
    }

    #[test]
    fn test_save_raster_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.png");
        let raster = RgbaImage::from_pixel(3, 3, Rgba([5, 6, 7, 255]));

        save_raster(&ImageCodec, &raster, &path).unwrap();
        let reloaded = image::open(&path).unwrap().into_rgba8();
        assert_eq!(reloaded, raster);
    }
}
