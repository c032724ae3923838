//! Secret masking for text that reaches logs or chat threads.

use regex::Regex;
use std::sync::LazyLock;

/// Ordered (pattern, replacement) pairs. URL-embedded credentials are matched
/// before the bare token shapes they contain.
static SECRET_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"sk-ant-[A-Za-z0-9_-]{10,}").expect("hardcoded regex"),
            "sk-ant-***",
        ),
        (
            Regex::new(r"ANTHROPIC_API_KEY=\S+").expect("hardcoded regex"),
            "ANTHROPIC_API_KEY=***",
        ),
        (
            Regex::new(r"CLAUDE_CODE_OAUTH_TOKEN=\S+").expect("hardcoded regex"),
            "CLAUDE_CODE_OAUTH_TOKEN=***",
        ),
        (
            Regex::new(r"[MN][A-Za-z\d_-]{23,25}\.[A-Za-z\d_-]{6}\.[A-Za-z\d_-]{27,}")
                .expect("hardcoded regex"),
            "DISCORD_TOKEN=***",
        ),
        (
            Regex::new(r"DISCORD_BOT_TOKEN=\S+").expect("hardcoded regex"),
            "DISCORD_BOT_TOKEN=***",
        ),
        (
            Regex::new(r"https?://[^/\s@]+@github\.com").expect("hardcoded regex"),
            "https://***@github.com",
        ),
        (
            Regex::new(r"gh[pousr]_[A-Za-z0-9]{10,}").expect("hardcoded regex"),
            "ghp_***",
        ),
        (
            Regex::new(r"GITHUB_TOKEN=\S+").expect("hardcoded regex"),
            "GITHUB_TOKEN=***",
        ),
        (
            Regex::new(r"Bearer\s+[A-Za-z0-9._-]+").expect("hardcoded regex"),
            "Bearer ***",
        ),
    ]
});

/// Mask every known secret shape in `text`.
pub fn redact(text: &str) -> String {
    let mut output = text.to_string();
    for (pattern, replacement) in SECRET_PATTERNS.iter() {
        if pattern.is_match(&output) {
            output = pattern.replace_all(&output, *replacement).into_owned();
        }
    }
    output
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
