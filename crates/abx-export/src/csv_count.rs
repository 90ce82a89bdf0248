//! Row counting for downloaded CSV exports.
//!
//! The export definitions in the back office are user-configurable, so the
//! delimiter varies between accounts and description columns regularly
//! carry embedded newlines and stray quote characters (inch marks in
//! product names). The sniffer picks the delimiter; parsing is the `csv`
//! reader's job.

use std::path::Path;

use csv::ReaderBuilder;

const SNIFF_SAMPLE_LEN: usize = 4096;
const CANDIDATE_DELIMITERS: [u8; 4] = [b',', b';', b'|', b'\t'];

/// Picks the most frequent candidate delimiter outside quoted sections of
/// the sample. Falls back to `,` when nothing matches.
#[must_use]
pub fn sniff_delimiter(sample: &str) -> u8 {
    let mut counts = [0usize; 4];
    let mut in_quotes = false;
    for byte in sample.bytes().take(SNIFF_SAMPLE_LEN) {
        if byte == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if byte == b'\n' {
            break;
        }
        if let Some(slot) = CANDIDATE_DELIMITERS.iter().position(|d| *d == byte) {
            counts[slot] += 1;
        }
    }
    counts
        .iter()
        .enumerate()
        .max_by_key(|(_, count)| **count)
        .filter(|(_, count)| **count > 0)
        .map_or(b',', |(slot, _)| CANDIDATE_DELIMITERS[slot])
}

/// Counts data records, excluding the header line. The reader runs
/// `flexible`, since ragged rows still count as rows; a record the reader
/// cannot make sense of at all does not.
#[must_use]
pub fn count_data_rows(content: &str) -> usize {
    if content.trim().is_empty() {
        return 0;
    }
    let mut reader = ReaderBuilder::new()
        .delimiter(sniff_delimiter(content))
        .flexible(true)
        .from_reader(content.as_bytes());
    reader.records().filter(Result::is_ok).count()
}

/// Reads a CSV file and counts its data rows.
///
/// # Errors
///
/// Propagates I/O failures; an unreadable file must not pass verification.
pub fn count_data_rows_in_file(path: &Path) -> std::io::Result<usize> {
    let content = std::fs::read_to_string(path)?;
    Ok(count_data_rows(&content))
}

#[cfg(test)]
mod tests {
    use super::{count_data_rows, sniff_delimiter};

    #[test]
    fn sniffs_the_dominant_delimiter() {
        assert_eq!(sniff_delimiter("a;b;c;d\n1;2;3;4\n"), b';');
        assert_eq!(sniff_delimiter("a,b,c\n"), b',');
        assert_eq!(sniff_delimiter("a\tb\tc\n"), b'\t');
        assert_eq!(sniff_delimiter("single-column\n"), b',');
    }

    #[test]
    fn quoted_delimiters_do_not_count() {
        assert_eq!(sniff_delimiter("\"a;b;c\",x|y|z\n"), b'|');
    }

    #[test]
    fn counts_rows_minus_header() {
        assert_eq!(count_data_rows("id;name\n1;Alpha\n2;Beta\n"), 2);
        assert_eq!(count_data_rows("id;name\n"), 0);
        assert_eq!(count_data_rows(""), 0);
    }

    #[test]
    fn embedded_newlines_stay_in_one_record() {
        let csv = "id;desc\n1;\"line one\nline two\"\n2;\"a \"\"quoted\"\" word\"\n";
        assert_eq!(count_data_rows(csv), 2);
    }

    #[test]
    fn bare_quote_in_an_unquoted_field_does_not_merge_records() {
        // Inch marks show up in product names without any field quoting.
        assert_eq!(count_data_rows("id;name\n1;pipe 5\" steel\n2;banana\n"), 2);
    }

    #[test]
    fn trailing_record_without_newline_is_counted() {
        assert_eq!(count_data_rows("id;name\n1;Alpha"), 1);
    }

    #[test]
    fn blank_lines_are_not_records() {
        assert_eq!(count_data_rows("id;name\n1;Alpha\n\n\n2;Beta\n"), 2);
    }
}
