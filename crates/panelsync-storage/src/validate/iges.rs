//! IGES soft-validation.
//!
//! IGES is a fixed 80-column format; column 73 carries the section letter
//! (Start, Global, Directory, Parameter, Terminate). All five must appear.

use std::path::Path;

use super::{file_len, ValidationReport};

/// Smallest plausible IGES file.
pub const MIN_BYTES: u64 = 512;

const SECTION_COLUMN: usize = 72;
const SECTIONS: [u8; 5] = [b'S', b'G', b'D', b'P', b'T'];

pub fn validate(path: &Path) -> ValidationReport {
    let len = match file_len(path) {
        Ok(len) => len,
        Err(report) => return report,
    };
    if len < MIN_BYTES {
        return ValidationReport::fail("too small");
    }

    let content = match std::fs::read(path) {
        Ok(c) => c,
        Err(e) => return ValidationReport::fail(format!("exception: {e}")),
    };
    check(&content)
}

/// Check in-memory IGES content.
pub fn check(content: &[u8]) -> ValidationReport {
    let mut seen = [false; 5];
    for line in content.split(|b| *b == b'\n') {
        let Some(letter) = line.get(SECTION_COLUMN) else {
            continue;
        };
        let letter = letter.to_ascii_uppercase();
        if let Some(idx) = SECTIONS.iter().position(|s| *s == letter) {
            seen[idx] = true;
        }
    }

    let missing: String = SECTIONS
        .iter()
        .zip(seen.iter())
        .filter(|(_, seen)| !**seen)
        .map(|(s, _)| *s as char)
        .collect();

    if missing.is_empty() {
        ValidationReport::pass()
    } else {
        ValidationReport::fail(format!("missing IGES section tags: {missing}"))
    }
}

#[cfg(test)]
pub(crate) fn sample() -> Vec<u8> {
    let mut out = Vec::new();
    let mut record = |body: &str, section: char, seq: usize| {
        out.extend_from_slice(format!("{body:<72}{section}{seq:>7}\n").as_bytes());
    };
    record("PanelSync test IGES", 'S', 1);
    record("1H,,1H;,4HPART,8HPART.IGS,9HPanelSync,5H1.0.0,32,38,6,308,15;", 'G', 1);
    record("1H,,1H;,4HPART,8HPART.IGS,9HPanelSync,5H1.0.0,32,38,6,308,15;", 'G', 2);
    record("     110       1       0       0       0       0       0       000000000", 'D', 1);
    record("     110       0       0       1       0                               0", 'D', 2);
    record("110,0.0,0.0,0.0,1.0,0.0,0.0;                                    1", 'P', 1);
    record("S      1G      2D      2P      1", 'T', 1);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_complete_iges() {
        let content = sample();
        assert!(content.len() as u64 >= MIN_BYTES);
        assert!(check(&content).ok);
    }

    #[test]
    fn test_reports_missing_sections() {
        let content: Vec<u8> = sample()
            .split(|b| *b == b'\n')
            .filter(|l| l.get(SECTION_COLUMN) != Some(&b'T'))
            .flat_map(|l| l.iter().copied().chain(std::iter::once(b'\n')))
            .collect();
        let report = check(&content);
        assert!(!report.ok);
        assert!(report.reason.ends_with('T'));
    }

    #[test]
    fn test_small_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.igs");
        std::fs::write(&path, b"S      1\n").unwrap();
        assert_eq!(validate(&path).reason, "too small");
    }

    #[test]
    fn test_crlf_records_accepted() {
        let content: Vec<u8> = sample()
            .split(|b| *b == b'\n')
            .filter(|l| !l.is_empty())
            .flat_map(|l| l.iter().copied().chain(*b"\r\n"))
            .collect();
        assert!(check(&content).ok);
    }
}
