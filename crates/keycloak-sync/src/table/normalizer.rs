/// Spellings a spreadsheet export uses for "no value".
const NULL_MARKERS: &[&str] = &[
    "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "<NA>", "#N/A",
    "#NA",
];

/// Collapses blank cells and null spellings into an absent value.
pub(crate) fn normalize_cell(raw: &str) -> Option<String> {
    let cleaned = raw.trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}');
    if cleaned.is_empty() || NULL_MARKERS.contains(&cleaned) {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Cleans a header cell; blank cells are named after their position.
pub(crate) fn normalize_header(position: usize, raw: &str) -> String {
    let name = raw.replace(['\u{feff}', '\u{200b}'], "");
    match name.trim() {
        "" => format!("Unnamed: {position}"),
        trimmed => trimmed.to_string(),
    }
}
