//! JSON persistence for patterns.

use std::fs;
use std::path::Path;

use hb_ir::Pattern;

use crate::FormatError;

/// Serialize a pattern to pretty-printed JSON.
pub fn pattern_to_json(pattern: &Pattern) -> Result<String, FormatError> {
    Ok(serde_json::to_string_pretty(pattern)?)
}

/// Parse a pattern from JSON, rejecting grids whose cells don't match
/// their declared shape or whose pitches fall outside [0, 1].
pub fn pattern_from_json(json: &str) -> Result<Pattern, FormatError> {
    let pattern: Pattern = serde_json::from_str(json)?;
    if !pattern.is_well_formed() {
        return Err(FormatError::MalformedPattern(format!(
            "expected {}x{} cells",
            pattern.voices(),
            pattern.steps()
        )));
    }
    if let Some((voice, step, pitch)) = pattern.find_invalid_pitch() {
        return Err(FormatError::MalformedPattern(format!(
            "pitch {pitch} at voice {voice}, step {step} is outside [0, 1]"
        )));
    }
    Ok(pattern)
}

pub fn save_pattern(path: &Path, pattern: &Pattern) -> Result<(), FormatError> {
    fs::write(path, pattern_to_json(pattern)?)?;
    Ok(())
}

pub fn load_pattern(path: &Path) -> Result<Pattern, FormatError> {
    pattern_from_json(&fs::read_to_string(path)?)
}
