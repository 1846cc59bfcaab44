const ELLIPSIS: &str = "...";

/// Cut `text` to at most `width` characters, marking the cut with an ellipsis.
/// Control characters are replaced so they cannot break the table.
pub fn truncate(text: &str, width: usize) -> String {
    let clean: String = text
        .chars()
        .map(|c| if c.is_control() { '?' } else { c })
        .collect();

    if clean.chars().count() <= width {
        return clean;
    }
    if width <= ELLIPSIS.len() {
        return clean.chars().take(width).collect();
    }

    let mut cut: String = clean.chars().take(width - ELLIPSIS.len()).collect();
    cut.push_str(ELLIPSIS);
    cut
}

pub fn fit_left(text: &str, width: usize) -> String {
    format!("{:<width$}", truncate(text, width))
}

pub fn fit_right(text: &str, width: usize) -> String {
    format!("{:>width$}", truncate(text, width))
}

/// `2048 MiB`, or `N/A` when the tool did not report it.
pub fn mebibytes(value: Option<u64>) -> String {
    match value {
        Some(mib) => format!("{mib} MiB"),
        None => "N/A".to_string(),
    }
}
