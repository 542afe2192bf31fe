//! Raw program files: a flat stream of little-endian `i32` words.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use vm_core::Word;

/// Reads `path` as whole little-endian words.
pub fn read_words(path: &Path) -> Result<Vec<Word>> {
    let bytes = fs::read(path).with_context(|| format!("could not read `{}`", path.display()))?;
    words_from_bytes(&bytes).with_context(|| format!("malformed program `{}`", path.display()))
}

/// Splits `bytes` into words, rejecting a trailing partial word.
pub fn words_from_bytes(bytes: &[u8]) -> Result<Vec<Word>> {
    let chunks = bytes.chunks_exact(4);
    if !chunks.remainder().is_empty() {
        bail!("length {} is not a multiple of 4 bytes", bytes.len());
    }
    Ok(chunks
        .map(|chunk| Word::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::words_from_bytes;

    #[test]
    fn decodes_little_endian_words() {
        let words = words_from_bytes(&[1, 0, 0, 0, 0xff, 0xff, 0xff, 0xff]).expect("aligned");
        assert_eq!(words, vec![1, -1]);
    }

    #[test]
    fn rejects_partial_word() {
        assert!(words_from_bytes(&[1, 2, 3]).is_err());
    }
}
