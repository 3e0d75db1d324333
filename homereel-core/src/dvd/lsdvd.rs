//! Chapter table parsing from lsdvd.
//!
//! `lsdvd -x -Oy` prints the DVD structure as Python literals. We only need
//! the first title track: its length and the per-chapter lengths, from
//! which cumulative start times are derived.

use std::path::Path;
use std::time::Duration;

use homereel_model::DvdChapter;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;
use tracing::debug;

use crate::external;

use super::DvdError;

const LSDVD_TIMEOUT: Duration = Duration::from_secs(30);

static TRACK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)'ix'\s*:\s*1,\s*'length'\s*:\s*([\d.]+).*?'chapter'\s*:\s*\[(.*?)\]",
    )
    .unwrap()
});
static CHAPTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"'ix'\s*:\s*(\d+),\s*'length'\s*:\s*([\d.]+)").unwrap()
});

/// Run lsdvd against a DVD root (the directory containing VIDEO_TS) and
/// parse the chapter table of title 1.
pub async fn read_chapters(dvd_root: &Path) -> Result<Vec<DvdChapter>, DvdError> {
    let mut command = Command::new("lsdvd");
    command.arg("-x").arg("-Oy").arg(dvd_root);
    let output = external::run("lsdvd", &mut command, LSDVD_TIMEOUT).await?;

    let chapters = parse_output(&String::from_utf8_lossy(&output.stdout))?;
    debug!(count = chapters.len(), "parsed DVD chapters");
    Ok(chapters)
}

/// Parse lsdvd's Python-literal output into an ordered chapter list with
/// cumulative start times.
pub fn parse_output(stdout: &str) -> Result<Vec<DvdChapter>, DvdError> {
    let track = TRACK_RE
        .captures(stdout)
        .ok_or(DvdError::UnparseableChapters)?;
    let chapter_block = &track[2];

    let mut chapters = Vec::new();
    let mut start_time = 0.0_f64;

    for capture in CHAPTER_RE.captures_iter(chapter_block) {
        let index: u32 = capture[1]
            .parse()
            .map_err(|_| DvdError::UnparseableChapters)?;
        let duration: f64 = capture[2]
            .parse()
            .map_err(|_| DvdError::UnparseableChapters)?;

        chapters.push(DvdChapter {
            index,
            duration,
            start_time,
        });
        start_time += duration;
    }

    if chapters.is_empty() {
        return Err(DvdError::NoChapters);
    }
    Ok(chapters)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"lsdvd = {
  'device': '/dvd',
  'title': 'FAMILY_DISC',
  'track': [
    {
      'ix': 1,
      'length': 77.500,
      'vts_id': 'DVDVIDEO-VTS',
      'chapter': [
        { 'ix': 1, 'length': 2.000, 'startcell': 1 },
        { 'ix': 2, 'length': 30.500, 'startcell': 2 },
        { 'ix': 3, 'length': 45.000, 'startcell': 3 },
      ],
    },
  ],
  'longest_track': 1,
}"#;

    #[test]
    fn parses_chapters_with_cumulative_starts() {
        let chapters = parse_output(SAMPLE).unwrap();
        assert_eq!(chapters.len(), 3);
        assert_eq!(chapters[0].index, 1);
        assert_eq!(chapters[0].start_time, 0.0);
        assert_eq!(chapters[1].duration, 30.5);
        assert_eq!(chapters[1].start_time, 2.0);
        assert_eq!(chapters[2].start_time, 32.5);
    }

    #[test]
    fn missing_track_is_an_error() {
        assert!(matches!(
            parse_output("lsdvd = { 'track': [] }"),
            Err(DvdError::UnparseableChapters)
        ));
    }

    #[test]
    fn empty_chapter_list_is_an_error() {
        let output = "{ 'ix': 1, 'length': 10.0, 'chapter': [] }";
        assert!(matches!(
            parse_output(output),
            Err(DvdError::NoChapters)
        ));
    }
}
