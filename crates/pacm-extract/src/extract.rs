//! Applying a parsed tar stream to a [`VirtualFs`].

use pacm_codec::{EntryType, ExtractOptions, TarEntry, gzip_decompress, is_gzip, tar_extract};
use pacm_error::NpmError;

use crate::vfs::VirtualFs;

/// Options governing a single [`extract`] call.
#[derive(Default)]
pub struct ExtractInput<'a> {
    /// Remove the first N path segments of every entry before placing it.
    pub strip_prefix: usize,
    /// Skip this many entries (after `stripPrefix` filtering) before writing.
    pub start_offset: usize,
    /// Stop after writing this many entries. `None` means unbounded.
    pub limit: Option<usize>,
    /// Reject entries that would escape the extraction root.
    pub secure: bool,
    /// Called once per materialized entry with cumulative bytes written.
    pub on_progress: Option<&'a mut dyn FnMut(&TarEntry, u64)>,
}

fn strip_path(path: &str, strip_prefix: usize) -> Option<String> {
    if strip_prefix == 0 {
        return Some(path.to_string());
    }
    let mut segments: Vec<&str> = path.split('/').collect();
    if segments.len() <= strip_prefix {
        return None;
    }
    segments.drain(0..strip_prefix);
    Some(segments.join("/"))
}

/// Extracts `data` (raw or gzipped tar bytes) into `output`.
///
/// Returns the number of entries actually materialized.
pub async fn extract<F: VirtualFs>(
    data: &[u8],
    output: &F,
    mut input: ExtractInput<'_>,
) -> Result<usize, NpmError> {
    let raw = if is_gzip(data) { gzip_decompress(data)? } else { data.to_vec() };

    let entries = tar_extract(&raw, ExtractOptions { secure: input.secure })?;

    let mut written = 0usize;
    let mut bytes_processed = 0u64;
    let mut seen = 0usize;

    for entry in &entries {
        if matches!(
            entry.entry_type,
            EntryType::PaxExtended | EntryType::PaxGlobal | EntryType::GnuLongName | EntryType::GnuLongLink
        ) {
            continue;
        }

        let Some(path) = strip_path(&entry.path, input.strip_prefix) else {
            continue;
        };
        if path.is_empty() {
            continue;
        }

        seen += 1;
        if seen <= input.start_offset {
            continue;
        }
        if let Some(limit) = input.limit {
            if written >= limit {
                break;
            }
        }

        materialize(output, entry, &path).await?;

        bytes_processed += entry.contents.len() as u64;
        written += 1;
        if let Some(on_progress) = input.on_progress.as_deref_mut() {
            on_progress(entry, bytes_processed);
        }
    }

    Ok(written)
}

async fn materialize<F: VirtualFs>(output: &F, entry: &TarEntry, path: &str) -> Result<(), NpmError> {
    match entry.entry_type {
        EntryType::Directory => output.mkdir(path, true).await,
        EntryType::Symlink => output.symlink(&entry.linkname, path).await,
        EntryType::HardLink => {
            let Some(target) = strip_path(&entry.linkname, 0) else {
                return Ok(());
            };
            match output.read_file(&target).await {
                Ok(contents) => output.write_file(path, &contents, Some(entry.mode)).await,
                Err(_) => output.symlink(&target, path).await,
            }
        }
        EntryType::File => output.write_file(path, &entry.contents, Some(entry.mode)).await,
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryFs;
    use pacm_codec::{PackEntry, tar_pack};

    fn file(path: &str, contents: &[u8]) -> PackEntry {
        PackEntry {
            path: path.to_string(),
            entry_type: EntryType::File,
            mode: 0o644,
            uid: 0,
            gid: 0,
            mtime: 0,
            linkname: String::new(),
            contents: contents.to_vec(),
        }
    }

    fn dir(path: &str) -> PackEntry {
        PackEntry {
            path: path.to_string(),
            entry_type: EntryType::Directory,
            mode: 0o755,
            uid: 0,
            gid: 0,
            mtime: 0,
            linkname: String::new(),
            contents: Vec::new(),
        }
    }

    #[tokio::test]
    async fn extracts_files_and_directories() {
        let entries = vec![dir("package/"), file("package/index.js", b"module.exports = 1;")];
        let archive = tar_pack(&entries).expect("packs");

        let fs = MemoryFs::new();
        let written = extract(&archive, &fs, ExtractInput { strip_prefix: 1, ..Default::default() })
            .await
            .expect("extracts");

        assert_eq!(written, 1);
        assert_eq!(fs.read_file("index.js").await.expect("reads"), b"module.exports = 1;");
    }

    #[tokio::test]
    async fn strip_prefix_drops_entries_with_too_few_segments() {
        let entries = vec![file("package/index.js", b"x")];
        let archive = tar_pack(&entries).expect("packs");

        let fs = MemoryFs::new();
        let written = extract(&archive, &fs, ExtractInput { strip_prefix: 5, ..Default::default() })
            .await
            .expect("extracts");

        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn limit_bounds_the_number_of_entries_written() {
        let entries = vec![file("a.txt", b"1"), file("b.txt", b"2"), file("c.txt", b"3")];
        let archive = tar_pack(&entries).expect("packs");

        let fs = MemoryFs::new();
        let written = extract(&archive, &fs, ExtractInput { limit: Some(2), ..Default::default() })
            .await
            .expect("extracts");

        assert_eq!(written, 2);
        assert!(fs.exists("a.txt").await.expect("exists"));
        assert!(fs.exists("b.txt").await.expect("exists"));
        assert!(!fs.exists("c.txt").await.expect("exists"));
    }

    #[tokio::test]
    async fn reports_progress_per_entry() {
        let entries = vec![file("a.txt", b"hello")];
        let archive = tar_pack(&entries).expect("packs");

        let fs = MemoryFs::new();
        let mut calls = Vec::new();
        let mut on_progress = |entry: &TarEntry, bytes: u64| calls.push((entry.path.clone(), bytes));
        extract(&archive, &fs, ExtractInput { on_progress: Some(&mut on_progress), ..Default::default() })
            .await
            .expect("extracts");

        assert_eq!(calls, vec![("a.txt".to_string(), 5)]);
    }
}
