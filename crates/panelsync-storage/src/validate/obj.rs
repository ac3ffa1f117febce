//! Wavefront OBJ soft-validation.

use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{file_len, ValidationReport};

pub const MIN_BYTES: u64 = 32;

pub fn validate(path: &Path) -> ValidationReport {
    let len = match file_len(path) {
        Ok(len) => len,
        Err(report) => return report,
    };
    if len < MIN_BYTES {
        return ValidationReport::fail("too small");
    }

    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) => return ValidationReport::fail(format!("exception: {e}")),
    };

    let mut has_vertex = false;
    let mut has_face = false;
    for line in BufReader::new(file).split(b'\n') {
        let line = match line {
            Ok(l) => l,
            Err(e) => return ValidationReport::fail(format!("exception: {e}")),
        };
        let trimmed = line.trim_ascii_start();
        has_vertex |= trimmed.starts_with(b"v ") || trimmed.starts_with(b"v\t");
        has_face |= trimmed.starts_with(b"f ") || trimmed.starts_with(b"f\t");
        if has_vertex && has_face {
            return ValidationReport::pass();
        }
    }

    match (has_vertex, has_face) {
        (false, _) => ValidationReport::fail("no vertex records"),
        _ => ValidationReport::fail("no face records"),
    }
}
