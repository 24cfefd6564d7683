use std::sync::LazyLock;

use regex::Regex;

static SIGNED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-+]?(?:\d+(?:\.\d*)?|\d*\.\d+)(?:[eE][-+]?\d+)?").expect("regex to compile")
});
static UNSIGNED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\d+(?:\.\d*)?|\d*\.\d+)").expect("regex to compile"));

/// All unsigned decimal numbers in `text`, in order. Any other character acts as a
/// separator, including `-` and `+`.
pub(crate) fn unsigned_tokens(text: &str) -> Vec<f64> {
    UNSIGNED
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

fn signed_tokens(text: &str) -> Vec<f64> {
    SIGNED
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

/// Return the number in `text` if there is exactly one, otherwise `None`.
///
/// With `signed` a leading sign and an exponent are accepted.
#[must_use]
pub fn single_number(text: &str, signed: bool) -> Option<f64> {
    let nums = if signed {
        signed_tokens(text)
    } else {
        unsigned_tokens(text)
    };
    match nums.as_slice() {
        [v] => Some(*v),
        _ => None,
    }
}
