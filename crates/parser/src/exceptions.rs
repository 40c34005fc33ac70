//! Scanner for the exception logs written next to the operation logs.
//!
//! A line such as `12:00:01 WARN com.store.client.TrimmedException: epoch 4`
//! counts one `TrimmedException`.

use std::collections::BTreeMap;

const SUFFIX: &str = "Exception:";

/// Name of the exception a log line reports, if any.
///
/// The name is the last dotted component that ends in `Exception` and is
/// followed by `": "`.
#[must_use]
pub fn exception_name(line: &str) -> Option<&str> {
    let line = line.trim_end_matches(['\r', '\n']);
    line.match_indices('.').rev().find_map(|(dot, _)| {
        let start = dot + 1;
        let first = line[start..].chars().next()?;
        let tail = &line[start + first.len_utf8()..];
        let word_len = tail.find(' ')?;
        tail[..word_len].ends_with(SUFFIX).then(|| {
            let end = start + first.len_utf8() + word_len - 1;
            &line[start..end]
        })
    })
}

/// Count exceptions by name over the lines of one or more exception logs.
pub fn tally_exceptions<I, S>(lines: I) -> BTreeMap<String, u64>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts = BTreeMap::new();
    for line in lines {
        if let Some(name) = exception_name(line.as_ref()) {
            *counts.entry(name.to_string()).or_insert(0) += 1;
        }
    }
    tracing::debug!(distinct = counts.len(), "tallied exceptions");
    counts
}
