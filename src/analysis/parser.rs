//! Decoding of the provider's semi-structured response.

use super::AnalysisResult;
use crate::error::{Result, SermonError};

const OPENING_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Remove every Markdown code-fence marker from the response text.
pub fn strip_code_fences(raw: &str) -> String {
    raw.replace(OPENING_FENCE, "").replace(FENCE, "")
}

/// Parse a raw provider response into an [`AnalysisResult`].
///
/// On failure the error carries the original text verbatim.
pub fn parse_response(raw: &str) -> Result<AnalysisResult> {
    let stripped = strip_code_fences(raw);
    serde_json::from_str(stripped.trim()).map_err(|source| SermonError::Parse {
        source,
        raw: raw.to_string(),
    })
}
