//! USTAR/PAX emitter: packs [`PackEntry`] values into a raw tar byte
//! stream.

use pacm_constants::TAR_MAX_OCTAL_SIZE;
use pacm_error::NpmError;

use super::header::BLOCK_SIZE;
use super::pax;
use super::{EntryType, PackEntry};

const NAME_LEN: usize = 100;
const PREFIX_LEN: usize = 155;
const LINKNAME_LEN: usize = 100;

fn octal_field(value: u64, width: usize) -> Vec<u8> {
    let digits = width - 1;
    let formatted = format!("{value:0digits$o}", digits = digits);
    let mut out = formatted.into_bytes();
    out.push(0);
    out
}

/// Largest value a `width`-byte octal field can hold: `width - 1` usable
/// digits (the last byte is the NUL terminator), capped at
/// [`pacm_constants::TAR_MAX_OCTAL_SIZE`] for the 12-byte size/mtime fields
/// to match the limit that constant documents.
fn max_octal(width: usize) -> u64 {
    if width == 12 {
        return TAR_MAX_OCTAL_SIZE;
    }
    8u64.saturating_pow((width - 1) as u32).saturating_sub(1)
}

/// Encode `value` into a `width`-byte tar numeric field, falling back to
/// GNU base-256 binary encoding (high bit set on the first byte, the
/// value packed big-endian into the rest) when it doesn't fit in octal —
/// mirrors the decoder in `header::numeric_field`.
fn numeric_field(value: u64, width: usize) -> Vec<u8> {
    if value <= max_octal(width) {
        return octal_field(value, width);
    }
    let mut out = vec![0u8; width];
    out[0] = 0x80;
    let value_bytes = value.to_be_bytes();
    let start = width - value_bytes.len().min(width - 1);
    out[start..].copy_from_slice(&value_bytes[value_bytes.len() - (width - start)..]);
    out
}

fn write_field(block: &mut [u8], off: usize, len: usize, bytes: &[u8]) {
    let n = bytes.len().min(len);
    block[off..off + n].copy_from_slice(&bytes[..n]);
}

/// Split a path into (prefix, name) for the USTAR 155+100 layout, or
/// `None` if it doesn't fit even with a prefix split — callers fall
/// back to a PAX `path` record in that case.
fn split_ustar_path(path: &str) -> Option<(String, String)> {
    if path.len() <= NAME_LEN {
        return Some((String::new(), path.to_string()));
    }
    let bytes = path.as_bytes();
    for split_at in (0..bytes.len()).rev() {
        if bytes[split_at] == b'/' {
            let prefix = &path[..split_at];
            let name = &path[split_at + 1..];
            if prefix.len() <= PREFIX_LEN && name.len() <= NAME_LEN {
                return Some((prefix.to_string(), name.to_string()));
            }
        }
    }
    None
}

#[allow(clippy::too_many_arguments)]
fn build_header_block(
    name: &str,
    prefix: &str,
    mode: u32,
    uid: u64,
    gid: u64,
    size: u64,
    mtime: u64,
    typeflag: u8,
    linkname: &str,
) -> Vec<u8> {
    let mut block = vec![0u8; BLOCK_SIZE];
    write_field(&mut block, 0, NAME_LEN, name.as_bytes());
    write_field(&mut block, 100, 8, &numeric_field(u64::from(mode), 8));
    write_field(&mut block, 108, 8, &numeric_field(uid, 8));
    write_field(&mut block, 116, 8, &numeric_field(gid, 8));
    write_field(&mut block, 124, 12, &numeric_field(size, 12));
    write_field(&mut block, 136, 12, &numeric_field(mtime, 12));
    block[156] = typeflag;
    write_field(&mut block, 157, LINKNAME_LEN, linkname.as_bytes());
    write_field(&mut block, 257, 8, b"ustar\x0000");
    write_field(&mut block, 265, 32, b"pacm"); // uname
    write_field(&mut block, 297, 32, b"pacm"); // gname
    write_field(&mut block, 329, 8, &octal_field(0, 8)); // devmajor
    write_field(&mut block, 337, 8, &octal_field(0, 8)); // devminor
    write_field(&mut block, 345, PREFIX_LEN, prefix.as_bytes());

    let checksum: u32 = block
        .iter()
        .enumerate()
        .map(|(i, &b)| if (148..156).contains(&i) { u32::from(b' ') } else { u32::from(b) })
        .sum();
    write_field(&mut block, 148, 8, format!("{checksum:06o}\0 ").as_bytes());
    block
}

fn pad_to_block(buf: &mut Vec<u8>) {
    let remainder = buf.len() % BLOCK_SIZE;
    if remainder != 0 {
        buf.resize(buf.len() + (BLOCK_SIZE - remainder), 0);
    }
}

fn push_pax_header(out: &mut Vec<u8>, path: &str, records: &[u8]) -> Result<(), NpmError> {
    let header = build_header_block(
        &format!("PaxHeader/{path}")[..NAME_LEN.min(format!("PaxHeader/{path}").len())],
        "",
        0o644,
        0,
        0,
        records.len() as u64,
        0,
        b'x',
        "",
    );
    out.extend_from_slice(&header);
    out.extend_from_slice(records);
    pad_to_block(out);
    Ok(())
}

/// Emit one or more [`PackEntry`] values as a raw (ungzipped) tar byte
/// stream, terminated by two all-zero blocks.
pub fn pack(entries: &[PackEntry]) -> Result<Vec<u8>, NpmError> {
    let mut out = Vec::new();

    for entry in entries {
        let path = if matches!(entry.entry_type, EntryType::Directory) && !entry.path.ends_with('/') {
            format!("{}/", entry.path)
        } else {
            entry.path.clone()
        };

        match split_ustar_path(&path) {
            Some((prefix, name)) => {
                let header = build_header_block(
                    &name,
                    &prefix,
                    entry.mode,
                    entry.uid,
                    entry.gid,
                    entry.contents.len() as u64,
                    entry.mtime,
                    entry.entry_type.to_typeflag(),
                    &entry.linkname,
                );
                out.extend_from_slice(&header);
            }
            None => {
                let records = pax::emit_record("path", &path);
                push_pax_header(&mut out, &path, &records)?;
                let header = build_header_block(
                    &path[path.len().saturating_sub(NAME_LEN)..],
                    "",
                    entry.mode,
                    entry.uid,
                    entry.gid,
                    entry.contents.len() as u64,
                    entry.mtime,
                    entry.entry_type.to_typeflag(),
                    &entry.linkname,
                );
                out.extend_from_slice(&header);
            }
        }

        out.extend_from_slice(&entry.contents);
        pad_to_block(&mut out);
    }

    out.extend_from_slice(&[0u8; BLOCK_SIZE * 2]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_path_fits_ustar_name_field() {
        let entries = vec![PackEntry {
            path: "package/index.js".to_string(),
            entry_type: EntryType::File,
            mode: 0o644,
            uid: 0,
            gid: 0,
            mtime: 0,
            linkname: String::new(),
            contents: b"x".to_vec(),
        }];
        let archive = pack(&entries).expect("packs");
        assert_eq!(archive.len() % BLOCK_SIZE, 0);
        assert!(archive.len() >= BLOCK_SIZE * 2);
    }

    #[test]
    fn long_path_falls_back_to_pax() {
        let long_path = "package/".to_string() + &"a".repeat(300) + ".js";
        let entries = vec![PackEntry {
            path: long_path,
            entry_type: EntryType::File,
            mode: 0o644,
            uid: 0,
            gid: 0,
            mtime: 0,
            linkname: String::new(),
            contents: b"x".to_vec(),
        }];
        let archive = pack(&entries).expect("packs long path");
        assert_eq!(archive.len() % BLOCK_SIZE, 0);
    }

    #[test]
    fn archive_ends_with_two_zero_blocks() {
        let archive = pack(&[]).expect("packs empty");
        assert_eq!(archive.len(), BLOCK_SIZE * 2);
        assert!(archive.iter().all(|&b| b == 0));
    }

    #[test]
    fn oversized_size_falls_back_to_base256() {
        let block = numeric_field(TAR_MAX_OCTAL_SIZE + 1, 12);
        assert_eq!(block.len(), 12);
        assert_eq!(block[0] & 0x80, 0x80, "high bit marks base-256 encoding");
    }

    #[test]
    fn numeric_field_within_octal_range_round_trips_through_header_decoder() {
        let encoded = numeric_field(0o644, 8);
        assert_eq!(encoded, octal_field(0o644, 8));
    }

    #[test]
    fn real_uid_and_gid_are_written_into_the_header() {
        let entries = vec![PackEntry {
            path: "package/bin.sh".to_string(),
            entry_type: EntryType::File,
            mode: 0o755,
            uid: 501,
            gid: 20,
            mtime: 0,
            linkname: String::new(),
            contents: b"#!/bin/sh".to_vec(),
        }];
        let archive = pack(&entries).expect("packs");
        let header = &archive[..BLOCK_SIZE];
        assert_eq!(&header[108..116], b"0000765\0");
        assert_eq!(&header[116..124], b"0000024\0");
    }
}
