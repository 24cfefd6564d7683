//! FITS header card parsing and formatting.
//!
//! A card is a fixed 80 byte ASCII record. Bytes 0-7 hold the keyword, byte 8 holds
//! the `=` value indicator and the rest holds a value, optionally followed by a `/`
//! introduced comment. Log keywords (`COMMENT`, `HISTORY`, `HIERARCH`) carry free text
//! from byte 8 onward.

/// Length in bytes of a single card.
pub const CARD_LEN: usize = 80;
/// Length in bytes of the keyword field.
pub const KEY_LEN: usize = 8;
/// Keywords whose cards are free text accumulated into a newline separated log.
pub const LOG_KEYS: [&str; 3] = ["COMMENT", "HISTORY", "HIERARCH"];

/// A single decoded header card.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// The `END` card terminating the header.
    End,
    /// A card with an empty keyword.
    Blank,
    /// A `COMMENT`, `HISTORY` or `HIERARCH` card.
    Log { key: String, text: String },
    /// A keyword/value card. `value` retains any enclosing quotes.
    Value {
        key: String,
        value: String,
        comment: Option<String>,
    },
}

impl Record {
    /// Decode a card. `card` is normally [CARD_LEN] bytes; shorter slices are treated
    /// as if padded with spaces.
    #[must_use]
    pub fn parse(card: &[u8]) -> Record {
        let key = String::from_utf8_lossy(&card[..card.len().min(KEY_LEN)])
            .trim()
            .to_string();

        if key == "END" {
            return Record::End;
        }
        if key.is_empty() {
            return Record::Blank;
        }
        if is_log_key(&key) {
            let text = String::from_utf8_lossy(card.get(KEY_LEN..).unwrap_or_default())
                .trim_end()
                .to_string();
            return Record::Log { key, text };
        }

        let text = String::from_utf8_lossy(card.get(KEY_LEN + 1..).unwrap_or_default());
        let (value, comment) = split_value(text.trim());
        Record::Value {
            key,
            value,
            comment,
        }
    }
}

#[must_use]
pub fn is_log_key(key: &str) -> bool {
    LOG_KEYS.contains(&key)
}

/// Split the value area of a card into a value and an optional comment.
///
/// Quoted values may contain `/`. When a `/` falls between the quotes only a later
/// `/` after the closing quote starts a comment. An unterminated opening quote
/// gets a closing quote appended.
pub(crate) fn split_value(text: &str) -> (String, Option<String>) {
    let quote = text.find('\'');
    let endquote = quote.and_then(|q| text[q + 1..].find('\'').map(|i| i + q + 1));
    let slash = text.find('/');

    let split_at = |pos: usize| {
        let comment = text[pos + 1..].trim();
        (
            text[..pos].trim().to_string(),
            (!comment.is_empty()).then(|| comment.to_string()),
        )
    };

    match (quote, endquote, slash) {
        (Some(q), _, Some(s)) if s < q => split_at(s),
        (Some(_), Some(e), Some(s)) if s < e => match text[e..].find('/') {
            Some(k) => split_at(e + k),
            None => (text.to_string(), None),
        },
        (Some(_), Some(_), Some(s)) => split_at(s),
        (Some(_), Some(_), None) => (text.to_string(), None),
        (Some(_), None, _) => (format!("{text}'"), None),
        (None, _, Some(s)) => split_at(s),
        (None, _, None) => (text.to_string(), None),
    }
}

/// Format a keyword/value card.
///
/// Quoted values are left justified in a 20 character field, everything else is right
/// justified. Newlines in the value or comment are replaced by spaces. An empty value
/// produces a card containing only the keyword.
#[must_use]
pub fn format_value(key: &str, value: &str, comment: Option<&str>) -> String {
    let value = value.replace('\n', " ");
    if value.is_empty() {
        return fit(key.to_string());
    }

    let mut out = if value.starts_with('\'') || value.starts_with('"') {
        format!("{key:<8.8}= {value:<20}")
    } else {
        format!("{key:<8.8}= {value:>20}")
    };
    if let Some(comment) = comment {
        out.push_str(" / ");
        out.push_str(&comment.replace('\n', " "));
    }
    fit(out)
}

/// Format a single line of a log keyword.
#[must_use]
pub fn format_log(key: &str, line: &str) -> String {
    fit(format!("{key:<8}{line}"))
}

#[must_use]
pub fn format_end() -> String {
    fit("END".to_string())
}

/// Force `s` to exactly [CARD_LEN] ASCII bytes.
fn fit(s: String) -> String {
    let mut out: String = s
        .chars()
        .map(|c| if c.is_ascii() { c } else { '?' })
        .take(CARD_LEN)
        .collect();
    while out.len() < CARD_LEN {
        out.push(' ');
    }
    out
}
