//! The virtual filesystem port: every method the extractor
//! and packer need, kept deliberately small so any real filesystem,
//! in-memory fixture, or sandboxed host can satisfy it.

use std::collections::BTreeMap;
use std::sync::Mutex;

use pacm_error::{ErrorCode, NpmError};

#[derive(Debug, Clone, Copy, Default)]
pub struct FileStat {
    pub is_directory: bool,
    pub size: u64,
    pub mode: u32,
}

/// Async because VFS writes are a suspension point — real
/// implementations hit disk or network storage.
pub trait VirtualFs: Send + Sync {
    fn readdir(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<String>, NpmError>> + Send;
    fn stat(&self, path: &str) -> impl std::future::Future<Output = Result<FileStat, NpmError>> + Send;
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>, NpmError>> + Send;
    fn write_file(&self, path: &str, contents: &[u8], mode: Option<u32>) -> impl std::future::Future<Output = Result<(), NpmError>> + Send;
    fn mkdir(&self, path: &str, recursive: bool) -> impl std::future::Future<Output = Result<(), NpmError>> + Send;
    fn symlink(&self, target: &str, path: &str) -> impl std::future::Future<Output = Result<(), NpmError>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = Result<bool, NpmError>> + Send;
}

#[derive(Debug, Clone)]
enum Node {
    File { contents: Vec<u8>, mode: u32 },
    Directory,
    Symlink { target: String },
}

/// An in-memory [`VirtualFs`] — the reference implementation used by
/// tests and anywhere a real filesystem would be overkill.
#[derive(Debug, Default)]
pub struct MemoryFs {
    nodes: Mutex<BTreeMap<String, Node>>,
}

impl MemoryFs {
    #[must_use]
    pub fn new() -> Self {
        Self { nodes: Mutex::new(BTreeMap::new()) }
    }

    fn parent_dirs(path: &str) -> Vec<String> {
        let mut parts: Vec<&str> = path.split('/').collect();
        parts.pop();
        let mut dirs = Vec::new();
        let mut acc = String::new();
        for part in parts {
            if part.is_empty() {
                continue;
            }
            if !acc.is_empty() {
                acc.push('/');
            }
            acc.push_str(part);
            dirs.push(acc.clone());
        }
        dirs
    }
}

impl VirtualFs for MemoryFs {
    async fn readdir(&self, path: &str) -> Result<Vec<String>, NpmError> {
        let prefix = if path.is_empty() { String::new() } else { format!("{path}/") };
        let nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut children: Vec<String> = nodes
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect();
        children.sort();
        children.dedup();
        Ok(children)
    }

    async fn stat(&self, path: &str) -> Result<FileStat, NpmError> {
        let nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match nodes.get(path) {
            Some(Node::File { contents, mode }) => {
                Ok(FileStat { is_directory: false, size: contents.len() as u64, mode: *mode })
            }
            Some(Node::Directory) => Ok(FileStat { is_directory: true, size: 0, mode: 0o755 }),
            Some(Node::Symlink { .. }) => Ok(FileStat { is_directory: false, size: 0, mode: 0o777 }),
            None => Err(NpmError::new(ErrorCode::Tarball, format!("no such path: {path}"))),
        }
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, NpmError> {
        let nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match nodes.get(path) {
            Some(Node::File { contents, .. }) => Ok(contents.clone()),
            _ => Err(NpmError::new(ErrorCode::Tarball, format!("no such file: {path}"))),
        }
    }

    async fn write_file(&self, path: &str, contents: &[u8], mode: Option<u32>) -> Result<(), NpmError> {
        let mut nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for dir in Self::parent_dirs(path) {
            nodes.entry(dir).or_insert(Node::Directory);
        }
        nodes.insert(path.to_string(), Node::File { contents: contents.to_vec(), mode: mode.unwrap_or(0o644) });
        Ok(())
    }

    async fn mkdir(&self, path: &str, recursive: bool) -> Result<(), NpmError> {
        let mut nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if recursive {
            for dir in Self::parent_dirs(&format!("{path}/_")) {
                nodes.entry(dir).or_insert(Node::Directory);
            }
        }
        nodes.insert(path.to_string(), Node::Directory);
        Ok(())
    }

    async fn symlink(&self, target: &str, path: &str) -> Result<(), NpmError> {
        let mut nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for dir in Self::parent_dirs(path) {
            nodes.entry(dir).or_insert(Node::Directory);
        }
        nodes.insert(path.to_string(), Node::Symlink { target: target.to_string() });
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, NpmError> {
        let nodes = self.nodes.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(nodes.contains_key(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let fs = MemoryFs::new();
        fs.write_file("a/b.txt", b"hello", Some(0o644)).await.expect("writes");
        assert_eq!(fs.read_file("a/b.txt").await.expect("reads"), b"hello");
        assert!(fs.exists("a/b.txt").await.expect("exists"));
        assert!(fs.exists("a").await.expect("parent dir created"));
    }

    #[tokio::test]
    async fn readdir_lists_immediate_children_only() {
        let fs = MemoryFs::new();
        fs.write_file("dir/one.txt", b"1", None).await.expect("writes");
        fs.write_file("dir/nested/two.txt", b"2", None).await.expect("writes");

        let mut children = fs.readdir("dir").await.expect("reads dir");
        children.sort();
        assert_eq!(children, vec!["nested".to_string(), "one.txt".to_string()]);
    }

    #[tokio::test]
    async fn stat_reports_directory_and_file() {
        let fs = MemoryFs::new();
        fs.write_file("dir/file.txt", b"hi", Some(0o600)).await.expect("writes");

        let file_stat = fs.stat("dir/file.txt").await.expect("stats file");
        assert!(!file_stat.is_directory);
        assert_eq!(file_stat.mode, 0o600);

        let dir_stat = fs.stat("dir").await.expect("stats dir");
        assert!(dir_stat.is_directory);
    }
}
