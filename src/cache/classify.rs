//! Hit/miss classification of cache CLI runs
//!
//! The cache CLI has no structured result format. A run that exits zero is
//! a hit unless its combined output contains one of the phrases below. This
//! couples us to the CLI's log wording: if those messages change, misses are
//! silently reported as hits. Add new phrases to `MISS_PATTERNS`.

use regex_lite::Regex;
use std::sync::LazyLock;

/// Case-insensitive phrases that mark a zero-exit run as a miss
const MISS_PATTERNS: &[&str] = &[r"cache miss", r"no cache entries", r"found 0/"];

static MISS_RE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    MISS_PATTERNS
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("miss pattern is a valid regex"))
        .collect()
});

/// Classify one cache CLI run from its exit code and combined output
pub fn classify(exit_code: i32, output: &str) -> bool {
    if exit_code != 0 {
        return false;
    }

    if output.is_empty() {
        return true;
    }

    !MISS_RE.iter().any(|re| re.is_match(output))
}
