// Text parsing for scheduler command output
//
// Scheduler listings and accounting reports are read as whitespace-delimited
// `key value...` rows. Repeated whitespace in values is normalized.

/// Return the value for `key` from `key<ws>value...` formatted text
///
/// Column 1 is matched against `key`; the remaining columns are rejoined with
/// single spaces. Returns `None` when the key never appears, when its row has
/// no value, or when the text is empty.
///
/// # Example
/// ```text
/// exit_status   1
/// failed        100 : assumedly after job
/// ```
/// `value_for_key(text, "failed")` returns `"100 : assumedly after job"`.
pub fn value_for_key(text: &str, key: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let mut words = line.split_whitespace();
        if words.next()? != key {
            return None;
        }
        let value = words.collect::<Vec<_>>().join(" ");
        (!value.is_empty()).then_some(value)
    })
}

/// Parse the leading line count printed by `wc -l <file>`
///
/// Returns `None` when the count command failed (e.g. `wc: jobProgress: No such
/// file or directory`) or printed nothing.
pub fn parse_line_count(text: &str) -> Option<usize> {
    text.lines()
        .next()?
        .split_whitespace()
        .next()?
        .parse::<usize>()
        .ok()
}
