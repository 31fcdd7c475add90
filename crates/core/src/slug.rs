use std::sync::LazyLock;

use regex::Regex;

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex is valid"));

/// Lower-case, hyphen-separated slug for URLs (`"The Forest Hiker"` ->
/// `"the-forest-hiker"`).
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    NON_ALNUM
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}
