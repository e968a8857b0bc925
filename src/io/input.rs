use std::path::Path;

use anyhow::{Context, Result};

use crate::error::PipelineError;
use crate::models::DialogueTurn;
use crate::stages::{SegmenterConfig, segment};

/// Read a transcript file, rejecting anything that is not UTF-8 text
pub fn read_transcript(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| PipelineError::ParseFailure(format!("transcript is not valid UTF-8: {}", e)))
        .with_context(|| format!("Failed to decode transcript: {:?}", path))?;
    Ok(text)
}

/// Read and segment a transcript file into dialogue turns
pub fn load_transcript_file(path: &Path, config: &SegmenterConfig) -> Result<Vec<DialogueTurn>> {
    let text = read_transcript(path)?;
    let turns = segment(&text, config).context("Failed to segment transcript")?;
    Ok(turns)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_load_transcript_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Advisor: What's your email?").unwrap();
        writeln!(file, "Client: It's michael.thompson@email.com.").unwrap();

        let turns = load_transcript_file(file.path(), &SegmenterConfig::default()).unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].prompt_text(), "What's your email?");
    }

    #[test]
    fn test_invalid_utf8_is_a_parse_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0x43, 0x6c, 0x69, 0xff, 0xfe, 0x3a]).unwrap();

        let err = read_transcript(file.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::ParseFailure(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(read_transcript(Path::new("/nonexistent/transcript.txt")).is_err());
    }
}
