//! Ordered tree enumeration.
//!
//! Breadth-first: each directory's entries are listed and sorted by name,
//! then its sub-directories are visited in that same order.  Hidden
//! entries are included, symlinks are never followed, and the root itself
//! is not emitted — an empty directory enumerates to nothing.  The order
//! is deterministic, which both fixes the archive layout and guarantees a
//! parent directory always precedes its contents.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// All entries under `root`, breadth-first, sorted within each directory.
pub fn entries(root: &Path) -> io::Result<Vec<PathBuf>> {
    entries_filtered(root, |_| true)
}

/// Like [`entries`], with a keep-predicate.  A dropped directory is also
/// pruned from the traversal.
pub fn entries_filtered<F>(root: &Path, keep: F) -> io::Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    let mut queue = VecDeque::from([root.to_path_buf()]);
    let mut out = Vec::new();

    while let Some(dir) = queue.pop_front() {
        let mut batch = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            // DirEntry::file_type is an lstat: symlinks to directories are
            // not descended into.
            let is_dir = entry.file_type()?.is_dir();
            batch.push((entry.path(), is_dir));
        }
        batch.sort_by(|a, b| a.0.cmp(&b.0));

        for (path, is_dir) in batch {
            if !keep(&path) {
                continue;
            }
            if is_dir {
                queue.push_back(path.clone());
            }
            out.push(path);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    fn touch(path: &Path) {
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn breadth_first_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("b")).unwrap();
        fs::create_dir(root.join("a")).unwrap();
        touch(&root.join("z.txt"));
        touch(&root.join("a/nested.txt"));
        touch(&root.join("b/deep.txt"));

        let relative: Vec<PathBuf> = entries(root)
            .unwrap()
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            relative,
            vec![
                PathBuf::from("a"),
                PathBuf::from("b"),
                PathBuf::from("z.txt"),
                PathBuf::from("a/nested.txt"),
                PathBuf::from("b/deep.txt"),
            ]
        );
    }

    #[test]
    fn hidden_entries_are_included() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join(".hidden"));
        fs::create_dir(dir.path().join(".config")).unwrap();
        touch(&dir.path().join(".config/settings"));
        assert_eq!(entries(dir.path()).unwrap().len(), 3);
    }

    #[test]
    fn empty_root_enumerates_to_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(entries(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn symlinked_directories_are_not_descended() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("real")).unwrap();
        touch(&root.join("real/file.txt"));
        symlink(root.join("real"), root.join("alias")).unwrap();

        let found = entries(root).unwrap();
        // alias itself appears, but not alias/file.txt
        assert_eq!(found.len(), 3);
        assert!(!found.iter().any(|p| p.ends_with("alias/file.txt")));
    }

    #[test]
    fn filter_prunes_subtrees() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("keep")).unwrap();
        fs::create_dir(root.join("skip")).unwrap();
        touch(&root.join("keep/a"));
        touch(&root.join("skip/b"));

        let found = entries_filtered(root, |p| !p.ends_with("skip")).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(names, vec![PathBuf::from("keep"), PathBuf::from("keep/a")]);
    }
}
