//! Parsing and serialization of the embedded metadata convention.
//!
//! Both sides of a sync share the same document shape: a line containing
//! exactly [`METADATA_DELIMITER`], a YAML mapping, a second delimiter line,
//! then free-form body text. [`parse`] and [`serialize`] are exact inverses up
//! to YAML value normalization; the body is preserved byte-for-byte.
//!
//! Published dates carry two interchangeable external representations:
//! `MM/DD/YYYY` on the local side and `YYYY-MM-DD` on the remote side.
//! [`to_local_date`] and [`to_remote_date`] convert between them by splitting
//! on the respective separator and reassembling in the other order; neither
//! validates calendar semantics.

use serde_yaml::Mapping;

use crate::error::ParleyError;

/// The delimiter line that opens and closes a metadata block.
pub const METADATA_DELIMITER: &str = "---";

/// Byte spans of the opening and closing delimiter lines.
fn delimiter_spans(text: &str) -> Result<[(usize, usize); 2], ParleyError> {
    let mut spans: Vec<(usize, usize)> = Vec::with_capacity(2);
    let mut offset = 0usize;
    for line in text.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        if line.trim_end_matches(['\r', '\n']) == METADATA_DELIMITER {
            spans.push((start, offset));
            if spans.len() == 2 {
                break;
            }
        }
    }
    if spans.len() < 2 {
        return Err(ParleyError::malformed(
            "",
            format!(
                "expected an opening and closing '{METADATA_DELIMITER}' delimiter line, found {}",
                spans.len()
            ),
        ));
    }
    if spans[0].0 != 0 {
        return Err(ParleyError::malformed(
            "",
            format!("text precedes the opening '{METADATA_DELIMITER}' delimiter line"),
        ));
    }
    Ok([spans[0], spans[1]])
}

/// Splits document text into its raw metadata block (both delimiter lines
/// included, bytes untouched) and body. Callers that carry the block forward
/// without modifying it use this slice instead of re-serializing the parsed
/// mapping, so comments and scalar quoting inside the block survive.
pub fn split(text: &str) -> Result<(&str, &str), ParleyError> {
    let [_, second] = delimiter_spans(text)?;
    Ok((&text[..second.1], &text[second.1..]))
}

/// Splits document text into its metadata mapping and body.
///
/// Fails with [`ParleyError::MalformedDocument`] when the text does not start
/// with a delimiter line, contains fewer than two of them, or when the block
/// between them is not a YAML mapping. The caller attaches the document
/// context (path or slug) via [`ParleyError::in_context`].
pub fn parse(text: &str) -> Result<(Mapping, String), ParleyError> {
    let [first, second] = delimiter_spans(text)?;
    let block = &text[first.1..second.0];
    let metadata = if block.trim().is_empty() {
        Mapping::new()
    } else {
        serde_yaml::from_str::<Mapping>(block)
            .map_err(|e| ParleyError::malformed("", format!("metadata block is not a YAML mapping: {e}")))?
    };
    Ok((metadata, text[second.1..].to_string()))
}

/// Reassembles a document from its metadata mapping and body.
///
/// Inverse of [`parse`]: key order follows the mapping's insertion order and
/// the body is appended verbatim after the closing delimiter.
pub fn serialize(metadata: &Mapping, body: &str) -> Result<String, ParleyError> {
    let block = if metadata.is_empty() {
        String::new()
    } else {
        serde_yaml::to_string(metadata)?
    };
    Ok(format!(
        "{METADATA_DELIMITER}\n{block}{METADATA_DELIMITER}\n{body}"
    ))
}

/// `YYYY-MM-DD` → `MM/DD/YYYY`.
pub fn to_local_date(remote: &str) -> Result<String, ParleyError> {
    let parts: Vec<&str> = remote.split('-').collect();
    match parts.as_slice() {
        [year, month, day] => Ok(format!("{month}/{day}/{year}")),
        _ => Err(ParleyError::InvalidDateFormat(remote.to_string())),
    }
}

/// `MM/DD/YYYY` → `YYYY-MM-DD`.
pub fn to_remote_date(local: &str) -> Result<String, ParleyError> {
    let parts: Vec<&str> = local.split('/').collect();
    match parts.as_slice() {
        [month, day, year] => Ok(format!("{year}-{month}-{day}")),
        _ => Err(ParleyError::InvalidDateFormat(local.to_string())),
    }
}
