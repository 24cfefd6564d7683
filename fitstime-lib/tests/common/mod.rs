use std::fs;
use std::path::{Path, PathBuf};

use fitstime::BLOCK_LEN;

/// Header bytes for `cards`, each padded to 80 bytes, followed by `END` and block
/// padding.
pub fn header_bytes(cards: &[&str]) -> Vec<u8> {
    let mut buf = Vec::new();
    for card in cards.iter().chain(&["END"]) {
        buf.extend_from_slice(format!("{card:<80}").as_bytes());
    }
    let rem = buf.len() % BLOCK_LEN;
    if rem != 0 {
        buf.resize(buf.len() + BLOCK_LEN - rem, b' ');
    }
    buf
}

/// Write a header only file named `name` in `dir`.
pub fn write_fixture(dir: &Path, name: &str, cards: &[&str]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, header_bytes(cards)).unwrap();
    path
}
