//! Single-pass tar extraction: walks 512-byte blocks, folds PAX/GNU
//! long-name overrides into the following header, and yields fully
//! resolved [`TarEntry`] values.

use pacm_error::NpmError;

use super::header::{self, BLOCK_SIZE, Format, ParsedBlock, RawHeader};
use super::pax::{self, PaxOverrides};
use super::{EntryType, TarEntry};

/// GNU long-name/long-link typeflags.
const GNU_LONGNAME: u8 = b'L';
const GNU_LONGLINK: u8 = b'K';
/// GNU sparse-file typeflag.
const GNU_SPARSE: u8 = b'S';
/// PAX extended-header typeflags.
const PAX_EXTENDED: u8 = b'x';
const PAX_GLOBAL: u8 = b'g';

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Reject entries whose resolved path would escape the extraction
    /// root (absolute paths, `..` components) with `ESECURITY`.
    pub secure: bool,
}

fn round_up_to_block(n: u64) -> u64 {
    n.div_ceil(BLOCK_SIZE as u64) * BLOCK_SIZE as u64
}

/// Does `path` stay within its root: no `..` segment, no leading `/`,
/// no `/./` component, and no Windows drive prefix (`C:`)?
fn is_path_safe(path: &str) -> bool {
    if path.starts_with('/') || path.contains("/./") {
        return false;
    }
    let mut chars = path.chars();
    if let (Some(first), Some(':')) = (chars.next(), chars.next()) {
        if first.is_ascii_alphabetic() {
            return false;
        }
    }
    path.split('/').all(|segment| segment != "..")
}

/// Simulate walking from a symlink/hardlink's own directory to its
/// target, forbidding targets that escape the extraction root.
fn is_link_target_safe(entry_path: &str, linkname: &str) -> bool {
    let mut depth = entry_path.split('/').count().saturating_sub(1) as i64;
    for segment in linkname.split('/') {
        match segment {
            ".." => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            "." | "" => {}
            _ => depth += 1,
        }
    }
    true
}

/// Extract every entry from a raw (already gunzipped) tar byte stream.
pub fn extract(data: &[u8], options: ExtractOptions) -> Result<Vec<TarEntry>, NpmError> {
    let mut entries = Vec::new();
    let mut offset = 0usize;
    let mut pending_pax = PaxOverrides::default();
    let mut pending_gnu_longname: Option<String> = None;
    let mut pending_gnu_longlink: Option<String> = None;
    let mut consecutive_zero_blocks = 0u32;

    while offset + BLOCK_SIZE <= data.len() {
        let block = &data[offset..offset + BLOCK_SIZE];
        match header::parse_block(block) {
            ParsedBlock::End => {
                consecutive_zero_blocks += 1;
                offset += BLOCK_SIZE;
                if consecutive_zero_blocks >= 2 {
                    break;
                }
                continue;
            }
            ParsedBlock::Invalid => {
                // Skip one block and keep scanning, per the recovery
                // recovery policy below.
                offset += BLOCK_SIZE;
                continue;
            }
            ParsedBlock::Header(raw) => {
                consecutive_zero_blocks = 0;
                offset += BLOCK_SIZE;
                let body_len = raw.size as usize;
                let body_start = offset;
                let body_end = body_start.saturating_add(body_len).min(data.len());
                let body = &data[body_start..body_end];
                offset += round_up_to_block(raw.size) as usize;

                if raw.typeflag == GNU_LONGNAME {
                    pending_gnu_longname = Some(String::from_utf8_lossy(body).trim_end_matches('\0').to_string());
                    continue;
                }
                if raw.typeflag == GNU_LONGLINK {
                    pending_gnu_longlink = Some(String::from_utf8_lossy(body).trim_end_matches('\0').to_string());
                    continue;
                }
                if raw.typeflag == PAX_EXTENDED || raw.typeflag == PAX_GLOBAL {
                    pending_pax.merge(pax::parse_records(body));
                    continue;
                }

                let entry = resolve_entry(
                    &raw,
                    body,
                    &mut pending_pax,
                    &mut pending_gnu_longname,
                    &mut pending_gnu_longlink,
                );

                if options.secure {
                    if !is_path_safe(&entry.path) {
                        return Err(NpmError::security("unsafe path in archive", &entry.path));
                    }
                    let is_link = matches!(entry.entry_type, EntryType::Symlink | EntryType::HardLink);
                    if is_link && !is_link_target_safe(&entry.path, &entry.linkname) {
                        return Err(NpmError::security("link target escapes extraction root", &entry.path));
                    }
                }

                entries.push(entry);
            }
        }
    }

    Ok(entries)
}

fn resolve_entry(
    raw: &RawHeader,
    body: &[u8],
    pending_pax: &mut PaxOverrides,
    pending_gnu_longname: &mut Option<String>,
    pending_gnu_longlink: &mut Option<String>,
) -> TarEntry {
    let mut path = raw.full_path();
    let mut size = raw.size;
    let mut linkname = raw.linkname.clone();
    let mut mtime = raw.mtime;
    let mut uid = raw.uid;
    let mut gid = raw.gid;

    if matches!(raw.format, Format::Gnu) {
        if let Some(name) = pending_gnu_longname.take() {
            path = name;
        }
        if let Some(link) = pending_gnu_longlink.take() {
            linkname = link;
        }
    }

    if let Some(p) = pending_pax.path.take() {
        path = p;
    }
    if let Some(l) = pending_pax.linkpath.take() {
        linkname = l;
    }
    if let Some(s) = pending_pax.size.take() {
        size = s;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    if let Some(m) = pending_pax.mtime.take() {
        mtime = m as u64;
    }
    if let Some(u) = pending_pax.uid.take() {
        uid = u;
    }
    if let Some(g) = pending_pax.gid.take() {
        gid = g;
    }
    pending_pax.reset();

    let contents = if matches!(EntryType::from_typeflag(raw.typeflag), EntryType::Directory) {
        Vec::new()
    } else {
        body[..(size as usize).min(body.len())].to_vec()
    };

    TarEntry {
        path,
        entry_type: EntryType::from_typeflag(raw.typeflag),
        mode: raw.mode,
        uid,
        gid,
        size,
        mtime,
        linkname,
        sparse: raw.typeflag == GNU_SPARSE,
        contents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tar::writer::pack;
    use crate::tar::{EntryType as ET, PackEntry};

    #[test]
    fn round_trips_simple_file() {
        let archive = pack(&[PackEntry {
            path: "package/index.js".to_string(),
            entry_type: ET::File,
            mode: 0o644,
            uid: 0,
            gid: 0,
            mtime: 0,
            linkname: String::new(),
            contents: b"module.exports = {};".to_vec(),
        }])
        .expect("packs");

        let entries = extract(&archive, ExtractOptions::default()).expect("extracts");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "package/index.js");
        assert_eq!(entries[0].contents, b"module.exports = {};");
    }

    #[test]
    fn rejects_path_traversal_when_secure() {
        let archive = pack(&[PackEntry {
            path: "../../etc/passwd".to_string(),
            entry_type: ET::File,
            mode: 0o644,
            uid: 0,
            gid: 0,
            mtime: 0,
            linkname: String::new(),
            contents: b"x".to_vec(),
        }])
        .expect("packs");

        let err = extract(&archive, ExtractOptions { secure: true }).unwrap_err();
        assert_eq!(err.code, pacm_error::ErrorCode::Security);
    }

    #[test]
    fn allows_path_traversal_when_insecure() {
        let archive = pack(&[PackEntry {
            path: "../escape.txt".to_string(),
            entry_type: ET::File,
            mode: 0o644,
            uid: 0,
            gid: 0,
            mtime: 0,
            linkname: String::new(),
            contents: b"x".to_vec(),
        }])
        .expect("packs");

        let entries = extract(&archive, ExtractOptions::default()).expect("extracts");
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn long_path_uses_pax_override() {
        let long_name = "package/".to_string() + &"a".repeat(150) + ".js";
        let archive = pack(&[PackEntry {
            path: long_name.clone(),
            entry_type: ET::File,
            mode: 0o644,
            uid: 0,
            gid: 0,
            mtime: 0,
            linkname: String::new(),
            contents: b"x".to_vec(),
        }])
        .expect("packs");

        let entries = extract(&archive, ExtractOptions::default()).expect("extracts");
        assert_eq!(entries[0].path, long_name);
    }

    #[test]
    fn non_sparse_entry_has_sparse_false() {
        let archive = pack(&[PackEntry {
            path: "package/index.js".to_string(),
            entry_type: ET::File,
            mode: 0o644,
            uid: 0,
            gid: 0,
            mtime: 0,
            linkname: String::new(),
            contents: b"x".to_vec(),
        }])
        .expect("packs");

        let entries = extract(&archive, ExtractOptions::default()).expect("extracts");
        assert!(!entries[0].sparse);
    }

    #[test]
    fn directory_entries_have_no_contents() {
        let archive = pack(&[PackEntry {
            path: "package/src/".to_string(),
            entry_type: ET::Directory,
            mode: 0o755,
            uid: 0,
            gid: 0,
            mtime: 0,
            linkname: String::new(),
            contents: Vec::new(),
        }])
        .expect("packs");

        let entries = extract(&archive, ExtractOptions::default()).expect("extracts");
        assert_eq!(entries[0].entry_type, ET::Directory);
        assert!(entries[0].contents.is_empty());
    }
}
