//! Per-chapter ffmpeg extraction from a VOB concatenation.

use std::path::Path;
use std::time::Duration;

use homereel_model::DvdChapter;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;
use tracing::{info, warn};

use crate::external;

use super::DvdError;

/// Chapters shorter than this are menu stubs and copyright cards; skip.
pub const MIN_CHAPTER_SECS: f64 = 3.0;

/// Anything smaller than this out of ffmpeg is a header-only failure.
const MIN_OUTPUT_BYTES: u64 = 1000;

const FFMPEG_TIMEOUT: Duration = Duration::from_secs(300);

static CONTENT_VOB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^vts_\d+_[1-9]\.vob$").unwrap());

/// The chapters worth extracting: everything at or above the minimum
/// duration, in disc order.
pub fn plan_chapters(chapters: &[DvdChapter]) -> Vec<&DvdChapter> {
    chapters
        .iter()
        .filter(|chapter| chapter.duration >= MIN_CHAPTER_SECS)
        .collect()
}

/// ffmpeg `concat:` input over the title's content VOBs, in order.
pub fn vob_concat_input(video_ts: &Path) -> Result<String, DvdError> {
    let mut vobs: Vec<String> = std::fs::read_dir(video_ts)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            CONTENT_VOB_RE.is_match(&entry.file_name().to_string_lossy())
        })
        .map(|entry| entry.path().to_string_lossy().into_owned())
        .collect();

    if vobs.is_empty() {
        return Err(DvdError::NoVobFiles);
    }
    vobs.sort();
    Ok(format!("concat:{}", vobs.join("|")))
}

/// `{date}_{batch}_{prefix}_chNN.mp4` — date groups the batch, the batch
/// hash keeps simultaneous extractions apart, the zero-padded chapter
/// index keeps disc order sortable.
pub fn chapter_output_name(
    date: &str,
    batch: &str,
    prefix: &str,
    index: u32,
) -> String {
    format!("{date}_{batch}_{prefix}_ch{index:02}.mp4")
}

/// Cut one chapter out of the concatenated VOB stream, re-encoding to
/// H.264/AAC for direct play. The output is sanity-checked for size; a
/// stub file is removed and reported as a failure.
pub async fn extract_chapter(
    concat_input: &str,
    chapter: &DvdChapter,
    total_chapters: usize,
    output: &Path,
) -> Result<(), DvdError> {
    let mut command = Command::new("ffmpeg");
    command
        .arg("-y")
        .args(["-hide_banner", "-loglevel", "warning"])
        .args(["-analyzeduration", "100M"])
        .args(["-probesize", "100M"])
        .args(["-i", concat_input])
        .args(["-ss", &chapter.start_time.to_string()])
        .args(["-t", &chapter.duration.to_string()])
        .args(["-c:v", "libx264", "-preset", "fast", "-crf", "23"])
        .args(["-c:a", "aac", "-b:a", "192k"])
        .args([
            "-metadata",
            &format!("title=Chapter {:02}", chapter.index),
        ])
        .args([
            "-metadata",
            &format!("track={}/{total_chapters}", chapter.index),
        ])
        .arg(output);

    external::run("ffmpeg", &mut command, FFMPEG_TIMEOUT).await?;

    let size = tokio::fs::metadata(output).await?.len();
    if size < MIN_OUTPUT_BYTES {
        warn!(
            chapter = chapter.index,
            size, "extraction produced a stub file"
        );
        if let Err(e) = tokio::fs::remove_file(output).await {
            warn!(path = %output.display(), error = %e, "stub cleanup failed");
        }
        return Err(DvdError::StubOutput {
            chapter: chapter.index,
            size,
        });
    }

    info!(
        chapter = chapter.index,
        mb = size / (1024 * 1024),
        path = %output.display(),
        "chapter extracted"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(index: u32, duration: f64, start_time: f64) -> DvdChapter {
        DvdChapter {
            index,
            duration,
            start_time,
        }
    }

    #[test]
    fn short_chapters_are_skipped() {
        let chapters = vec![
            chapter(1, 2.0, 0.0),
            chapter(2, 30.0, 2.0),
            chapter(3, 45.0, 32.0),
        ];
        let planned = plan_chapters(&chapters);
        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0].index, 2);
        assert_eq!(planned[1].index, 3);
    }

    #[test]
    fn boundary_duration_is_kept() {
        let chapters = vec![chapter(1, 3.0, 0.0), chapter(2, 2.999, 3.0)];
        let planned = plan_chapters(&chapters);
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].index, 1);
    }

    #[test]
    fn concat_input_is_sorted_content_vobs_only() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "VTS_01_2.VOB",
            "VTS_01_1.VOB",
            "VTS_01_0.VOB",
            "VIDEO_TS.VOB",
            "VTS_01_0.IFO",
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let concat = vob_concat_input(dir.path()).unwrap();
        let root = dir.path().to_string_lossy();
        assert_eq!(
            concat,
            format!("concat:{root}/VTS_01_1.VOB|{root}/VTS_01_2.VOB")
        );
    }

    #[test]
    fn no_content_vobs_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("VIDEO_TS.VOB"), b"menu").unwrap();
        assert!(matches!(
            vob_concat_input(dir.path()),
            Err(DvdError::NoVobFiles)
        ));
    }

    #[test]
    fn output_name_is_zero_padded() {
        assert_eq!(
            chapter_output_name("2024-05-01", "k3x9ab", "Wedding", 7),
            "2024-05-01_k3x9ab_Wedding_ch07.mp4"
        );
    }
}
