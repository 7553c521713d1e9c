//! Parsing of `p4 -F "%headAction% %fileSize%" fstat` output.

use streamwatch_types::Measurement;

/// Head actions whose revision no longer exists at head.
const DELETED_ACTIONS: [&str; 2] = ["delete", "move/delete"];

/// Sum sizes of live head revisions.
///
/// Each line is `<headAction> <fileSize>`. Deleted revisions and lines
/// without a numeric size (e.g. purged content) are ignored.
pub fn parse_fstat_sizes(output: &str) -> Measurement {
    let mut total = Measurement::EMPTY;

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (action, size) = line.split_once(' ').unwrap_or((line, ""));
        if DELETED_ACTIONS.contains(&action) {
            continue;
        }

        let size = size.trim();
        if size.is_empty() || !size.bytes().all(|b| b.is_ascii_digit()) {
            continue;
        }
        if let Ok(bytes) = size.parse::<u64>() {
            total.size_bytes = total.size_bytes.saturating_add(bytes);
            total.file_count += 1;
        }
    }

    total
}

/// Depot paths are absolute (`//depot/main`); accept `depot/main` and
/// `/depot/main` as shorthands.
pub fn normalize_stream_path(stream: &str) -> String {
    if stream.starts_with("//") {
        stream.to_string()
    } else if stream.starts_with('/') {
        format!("/{stream}")
    } else {
        format!("//{stream}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sums_live_revisions() {
        let output = "add 100\nedit 250\nintegrate 50\n";
        assert_eq!(parse_fstat_sizes(output), Measurement::new(400, 3));
    }

    #[test]
    fn test_skips_deleted_and_malformed_lines() {
        let output = "add 100\ndelete 999\nmove/delete 40\nmove/add 10\npurge \nedit abc\n\n  \n";
        assert_eq!(parse_fstat_sizes(output), Measurement::new(110, 2));
    }

    #[test]
    fn test_empty_output_is_empty_stream() {
        assert_eq!(parse_fstat_sizes(""), Measurement::EMPTY);
    }

    #[test]
    fn test_normalize_stream_path() {
        assert_eq!(normalize_stream_path("//depot/main"), "//depot/main");
        assert_eq!(normalize_stream_path("/depot/main"), "//depot/main");
        assert_eq!(normalize_stream_path("depot/main"), "//depot/main");
    }
}
