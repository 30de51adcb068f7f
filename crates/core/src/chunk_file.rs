//! The chunk file: the corpus as JSON Lines, one [`Chunk`] per line, in
//! indexing order. Non-ASCII characters are written as `\uXXXX` escapes.

use crate::error::IngestError;
use crate::models::Chunk;
use crate::state::write_atomically;
use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        let mut start = 0;
        for (index, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..index])?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = index + ch.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}

pub fn to_ascii_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, AsciiFormatter);
    value.serialize(&mut serializer)?;
    // Only ASCII bytes are ever written.
    Ok(String::from_utf8_lossy(&out).into_owned())
}

pub fn write_chunk_file(path: &Path, chunks: &[Chunk]) -> Result<(), IngestError> {
    let mut body = String::new();
    for (index, chunk) in chunks.iter().enumerate() {
        let line = to_ascii_json(chunk).map_err(|error| IngestError::ChunkFile {
            line: index + 1,
            reason: error.to_string(),
        })?;
        body.push_str(&line);
        body.push('\n');
    }
    write_atomically(path, body.as_bytes())?;
    Ok(())
}

pub fn read_chunk_file(path: &Path) -> Result<Vec<Chunk>, IngestError> {
    let raw = fs::read_to_string(path)?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str::<Chunk>(line).map_err(|error| IngestError::ChunkFile {
                line: index + 1,
                reason: error.to_string(),
            })
        })
        .collect()
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}
