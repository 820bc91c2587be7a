//! Packing a [`VirtualFs`] subtree or a path-keyed content map into a
//! gzipped tarball.

use indexmap::IndexMap;

use pacm_codec::{Algorithm, EntryType, PackEntry, integrity_calculate, pack_tarball};
use pacm_error::NpmError;

use crate::vfs::VirtualFs;

/// Packs a path-keyed map of contents. Keys ending in `/` emit
/// zero-sized directory entries; everything else is a file.
pub fn pack_contents(
    contents: &IndexMap<String, Vec<u8>>,
    on_complete: Option<&mut dyn FnMut(&str)>,
) -> Result<Vec<u8>, NpmError> {
    let mut entries = Vec::with_capacity(contents.len());
    let mut names: Vec<&String> = contents.keys().collect();
    names.sort();

    for path in names {
        let data = &contents[path];
        if let Some(dir_path) = path.strip_suffix('/') {
            entries.push(PackEntry {
                path: dir_path.to_string(),
                entry_type: EntryType::Directory,
                mode: 0o755,
                uid: 0,
                gid: 0,
                mtime: 0,
                linkname: String::new(),
                contents: Vec::new(),
            });
        } else {
            entries.push(PackEntry {
                path: path.clone(),
                entry_type: EntryType::File,
                mode: 0o644,
                uid: 0,
                gid: 0,
                mtime: 0,
                linkname: String::new(),
                contents: data.clone(),
            });
        }
    }

    finish(&entries, on_complete)
}

/// Packs the subtree rooted at `root` of a [`VirtualFs`], walked via
/// `readdir`/`stat`/`read_file`.
pub async fn pack_vfs<F: VirtualFs>(
    fs: &F,
    root: &str,
    on_complete: Option<&mut dyn FnMut(&str)>,
) -> Result<Vec<u8>, NpmError> {
    let mut entries = Vec::new();
    walk(fs, root, &mut entries).await?;
    finish(&entries, on_complete)
}

fn finish(entries: &[PackEntry], on_complete: Option<&mut dyn FnMut(&str)>) -> Result<Vec<u8>, NpmError> {
    let gzipped = pack_tarball(entries)?;
    if let Some(on_complete) = on_complete {
        let sri = integrity_calculate(&gzipped, Algorithm::Sha512);
        on_complete(&sri);
    }
    Ok(gzipped)
}

fn walk<'a, F: VirtualFs>(
    fs: &'a F,
    path: &'a str,
    entries: &'a mut Vec<PackEntry>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), NpmError>> + Send + 'a>> {
    Box::pin(async move {
        let stat = fs.stat(path).await?;
        if stat.is_directory {
            entries.push(PackEntry {
                path: path.to_string(),
                entry_type: EntryType::Directory,
                mode: stat.mode,
                uid: 0, // FileStat carries no ownership; VirtualFs is not a real filesystem
                gid: 0,
                mtime: 0,
                linkname: String::new(),
                contents: Vec::new(),
            });

            let mut children = fs.readdir(path).await?;
            children.sort();
            for child in children {
                let child_path = if path.is_empty() { child } else { format!("{path}/{child}") };
                walk(fs, &child_path, entries).await?;
            }
        } else {
            let contents = fs.read_file(path).await?;
            entries.push(PackEntry {
                path: path.to_string(),
                entry_type: EntryType::File,
                mode: stat.mode,
                uid: 0,
                gid: 0,
                mtime: 0,
                linkname: String::new(),
                contents,
            });
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryFs;
    use pacm_codec::{ExtractOptions, unpack_tarball};

    #[test]
    fn pack_contents_emits_directories_and_files() {
        let mut contents = IndexMap::new();
        contents.insert("package/".to_string(), Vec::new());
        contents.insert("package/index.js".to_string(), b"1".to_vec());

        let mut sri = String::new();
        let mut on_complete = |s: &str| sri = s.to_string();
        let tgz = pack_contents(&contents, Some(&mut on_complete)).expect("packs");

        assert!(sri.starts_with("sha512-"));
        let entries = unpack_tarball(&tgz, ExtractOptions::default()).expect("unpacks");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "package/");
        assert_eq!(entries[1].path, "package/index.js");
    }

    #[tokio::test]
    async fn pack_vfs_walks_nested_directories() {
        let fs = MemoryFs::new();
        fs.write_file("package/index.js", b"module.exports = 1;", None).await.expect("writes");
        fs.write_file("package/lib/helper.js", b"exports.help = 1;", None).await.expect("writes");
        fs.mkdir("package", true).await.expect("mkdir");

        let tgz = pack_vfs(&fs, "package", None).await.expect("packs");
        let entries = unpack_tarball(&tgz, ExtractOptions::default()).expect("unpacks");

        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert!(paths.contains(&"package/index.js"));
        assert!(paths.contains(&"package/lib/helper.js"));
    }
}
