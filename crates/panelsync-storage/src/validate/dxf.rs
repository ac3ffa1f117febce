//! DXF soft-validation.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::{file_len, ValidationReport};

pub const MIN_BYTES: u64 = 200;

/// Files above this size are scanned head and tail only.
pub const MAX_FULL_SCAN: u64 = 8 * 1024 * 1024;
const PARTIAL_SCAN: u64 = 2 * 1024 * 1024;

const GEOMETRY_TOKENS: [&str; 6] = [
    "\n0\nline",
    "\n0\nlwpolyline",
    "\n0\npolyline",
    "\n0\ncircle",
    "\n0\narc",
    "\n0\nspline",
];

/// Signature written at the top of placeholder DXF files.
pub const STUB_SIGNATURE: &str = "999 PANELSYNC_STUB";

/// Minimal placeholder DXF published when a real export fails.
pub fn stub() -> Vec<u8> {
    format!(
        "{STUB_SIGNATURE}\n\
         0\nSECTION\n2\nHEADER\n9\n$ACADVER\n1\nAC1009\n0\nENDSEC\n\
         0\nSECTION\n2\nENTITIES\n0\nENDSEC\n0\nEOF\n"
    )
    .into_bytes()
}

/// Whether `content` is a placeholder produced by [`stub`].
pub fn is_stub(content: &[u8]) -> bool {
    content.starts_with(STUB_SIGNATURE.as_bytes())
}

pub fn validate(path: &Path) -> ValidationReport {
    let len = match file_len(path) {
        Ok(len) => len,
        Err(report) => return report,
    };
    if len < MIN_BYTES {
        return ValidationReport::fail("too small");
    }

    match read_scan_window(path, len) {
        Ok(text) => check(&text),
        Err(e) => ValidationReport::fail(format!("exception: {e}")),
    }
}

fn read_scan_window(path: &Path, len: u64) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    if len <= MAX_FULL_SCAN {
        let mut buf = Vec::with_capacity(len as usize);
        file.read_to_end(&mut buf)?;
        return Ok(String::from_utf8_lossy(&buf).into_owned());
    }

    let mut head = vec![0u8; PARTIAL_SCAN as usize];
    file.read_exact(&mut head)?;
    file.seek(SeekFrom::End(-(PARTIAL_SCAN as i64)))?;
    let mut tail = Vec::with_capacity(PARTIAL_SCAN as usize);
    file.read_to_end(&mut tail)?;

    Ok(format!(
        "{}\n...TAIL...\n{}",
        String::from_utf8_lossy(&head),
        String::from_utf8_lossy(&tail)
    ))
}

/// Check DXF text (already windowed for very large files).
pub fn check(text: &str) -> ValidationReport {
    let normalized = text.replace('\r', "\n");
    if !normalized.contains("\nEOF") {
        return ValidationReport::fail("missing EOF");
    }

    let lower = normalized.to_ascii_lowercase();
    if !(lower.contains("\nsection") && lower.contains("\nentities")) {
        return ValidationReport::fail("missing ENTITIES section markers");
    }

    let compact = compact_group_codes(&lower);
    if !GEOMETRY_TOKENS.iter().any(|tok| compact.contains(tok)) {
        return ValidationReport::fail("no known entity tokens found");
    }

    ValidationReport::pass()
}

/// Collapse indented group codes (`  0`) and blank lines left by `\r\n`.
fn compact_group_codes(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 1);
    out.push('\n');
    for line in text.split('\n').map(str::trim).filter(|l| !l.is_empty()) {
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
pub(crate) fn sample() -> String {
    let mut dxf = String::from("0\nSECTION\n2\nHEADER\n9\n$ACADVER\n1\nAC1015\n0\nENDSEC\n");
    dxf.push_str("0\nSECTION\n2\nENTITIES\n");
    for i in 0..4 {
        dxf.push_str(&format!(
            "0\nLINE\n8\n0\n10\n{i}.0\n20\n0.0\n30\n0.0\n11\n{}.0\n21\n1.0\n31\n0.0\n",
            i + 1
        ));
    }
    dxf.push_str("0\nENDSEC\n0\nEOF\n");
    dxf
}
