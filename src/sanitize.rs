use std::sync::OnceLock;

use regex::Regex;

/// Characters that are not allowed in a file name on at least one platform
const ILLEGAL_CHARS: &str = r#"[\\/*?:"<>|]"#;

/// Two or more consecutive whitespaces
const MULTI_SPACES: &str = r"\s{2,}";

static ILLEGAL_RE: OnceLock<Regex> = OnceLock::new();
static SPACES_RE: OnceLock<Regex> = OnceLock::new();

/// Make a video title usable as a file name.
///
/// Illegal path characters are removed, whitespace runs are collapsed
/// into a single space and the result is trimmed.
pub fn sanitize_filename(name: &str) -> String {
    let illegal = ILLEGAL_RE.get_or_init(|| Regex::new(ILLEGAL_CHARS).unwrap());
    let spaces = SPACES_RE.get_or_init(|| Regex::new(MULTI_SPACES).unwrap());

    let cleaned = illegal.replace_all(name, "");
    spaces.replace_all(&cleaned, " ").trim().to_string()
}
