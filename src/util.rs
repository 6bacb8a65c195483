//! Shared utility functions used across the codebase.

/// Minimum secret length eligible for masking.
const MASK_MIN_LEN: usize = 14;

/// Fixed-width redaction inserted between the visible head and tail.
const MASK_PAD: &str = "****************";

/// Marker returned for secrets too short to mask safely.
pub const INVALID_SECRET_MARKER: &str = "(invalid format)";

/// Mask a secret for display: first 10 characters, a fixed 16-character
/// redaction, and the last 4 characters.
///
/// The redaction width is constant regardless of the original length so the
/// masked form never leaks how long the secret is. Secrets shorter than 14
/// characters cannot keep head and tail disjoint and are reported as
/// [`INVALID_SECRET_MARKER`] instead of partially masked.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() < MASK_MIN_LEN {
        return INVALID_SECRET_MARKER.to_string();
    }

    let head: String = chars[..10].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}{MASK_PAD}{tail}")
}

/// Parse an environment variable as a boolean, returning `default` if unset.
///
/// Recognises `1`, `true`, `yes`, `y`, `on` (case-insensitive) as `true`;
/// everything else (including unset) maps to `default`.
pub fn env_var_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(
            value.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
        Err(_) => default,
    }
}

/// Join non-empty fragments with ` | `, used for the loaded-items summary.
pub fn join_fragments(fragments: &[String]) -> String {
    fragments
        .iter()
        .filter(|f| !f.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_fixed_width_redaction() {
        // 22-char key: first 10 + 16 asterisks + last 4.
        let masked = mask_secret("sk-abcdefghijklmnop1234");
        assert_eq!(masked, "sk-abcdefg****************1234");
        assert_eq!(masked.len(), 10 + 16 + 4);
    }

    #[test]
    fn mask_width_independent_of_input_length() {
        let short = mask_secret("sk-aaaaaa12345"); // exactly 14 chars
        let long = mask_secret(&format!("sk-{}1234", "x".repeat(60)));
        assert_eq!(short.len(), long.len());
    }

    #[test]
    fn mask_rejects_short_secrets() {
        assert_eq!(mask_secret("sk-short"), INVALID_SECRET_MARKER);
        assert_eq!(mask_secret(""), INVALID_SECRET_MARKER);
        assert_eq!(mask_secret("1234567890123"), INVALID_SECRET_MARKER);
    }

    #[test]
    fn join_fragments_skips_empty() {
        let fragments = vec![
            "3 prompts".to_string(),
            String::new(),
            "Theme: Dark".to_string(),
        ];
        assert_eq!(join_fragments(&fragments), "3 prompts | Theme: Dark");
    }
}
