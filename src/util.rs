//! File-tree helpers shared by the post build and the site build.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Recursively copies the contents of `src` into `dst`, creating `dst` if it
/// doesn't exist. Existing files in `dst` are overwritten.
pub fn copy_dir(src: &Path, dst: &Path) -> Result<(), CopyError> {
    fs::create_dir_all(dst).map_err(|source| CopyError::Io {
        path: dst.to_owned(),
        source,
    })?;

    for result in WalkDir::new(src).min_depth(1).follow_links(true) {
        let entry = result?;
        // `WalkDir` only yields paths under `src`.
        let relative = match entry.path().strip_prefix(src) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|source| CopyError::Io {
                path: target.clone(),
                source,
            })?;
        } else {
            fs::copy(entry.path(), &target).map_err(|source| CopyError::Io {
                path: target.clone(),
                source,
            })?;
        }
    }

    Ok(())
}

/// Represents a failure copying a directory tree.
#[derive(Error, Debug)]
pub enum CopyError {
    /// Returned when the source tree can't be walked (including when it
    /// doesn't exist).
    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    /// Returned when a directory or file can't be written.
    #[error("copying to `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_helpers::write_file;
    use tempfile::TempDir;

    #[test]
    fn test_copy_dir() -> Result<(), CopyError> {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("out/dst");
        write_file(&src.join("a.txt"), "a");
        write_file(&src.join("nested/deeper/b.txt"), "b");
        fs::create_dir_all(src.join("empty")).unwrap();

        copy_dir(&src, &dst)?;

        assert_eq!("a", fs::read_to_string(dst.join("a.txt")).unwrap());
        assert_eq!("b", fs::read_to_string(dst.join("nested/deeper/b.txt")).unwrap());
        assert!(dst.join("empty").is_dir());
        Ok(())
    }

    #[test]
    fn test_copy_dir_overwrites() -> Result<(), CopyError> {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        write_file(&src.join("a.txt"), "new");
        write_file(&dst.join("a.txt"), "old");
        write_file(&dst.join("keep.txt"), "keep");

        copy_dir(&src, &dst)?;

        assert_eq!("new", fs::read_to_string(dst.join("a.txt")).unwrap());
        assert_eq!("keep", fs::read_to_string(dst.join("keep.txt")).unwrap());
        Ok(())
    }

    #[test]
    fn test_copy_missing_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            copy_dir(&tmp.path().join("missing"), &tmp.path().join("dst")),
            Err(CopyError::Walk(_))
        ));
    }
}
