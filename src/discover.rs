//! Searches a directory tree for post directories. A post directory holds a
//! metadata file (see [`crate::metadata`]) and a [`CONTENT_FILE`]; the search
//! doesn't descend into a post directory. The tree is walked breadth-first
//! and every directory is scheduled at most once (by canonical path), so
//! symlink cycles and very deep trees are both safe.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::metadata::is_metadata_file;
use crate::post::Post;

/// The markdown file holding a post's content.
pub const CONTENT_FILE: &str = "content.md";

/// The optional subdirectory of a post directory whose files are copied next
/// to the post's rendered page.
pub const RESOURCE_DIR: &str = "resources";

/// Returns a [`Post`] for every post directory under `root`, in the order
/// they were found.
pub fn find_posts(root: &Path) -> Vec<Post> {
    info!(root = %root.display(), "looking for posts");

    let mut frontier = VecDeque::new();
    let mut scheduled = HashSet::new();
    scheduled.insert(identity(root));
    frontier.push_back(root.to_owned());

    let mut posts = Vec::new();
    while let Some(dir) = frontier.pop_front() {
        debug!(dir = %dir.display(), "looking for posts");

        let listing = match Listing::read(&dir) {
            Ok(listing) => listing,
            Err(err) => {
                warn!(dir = %dir.display(), "could not list directory: {}", err);
                continue;
            }
        };

        match (listing.has_metadata, listing.content_file) {
            (true, Some(content_file)) => {
                debug!(dir = %dir.display(), "found post");
                posts.push(Post::new(dir, content_file, listing.resource_dir));
                continue;
            }
            (true, None) => {
                warn!(dir = %dir.display(), "directory has a metadata file but no {}", CONTENT_FILE)
            }
            (false, Some(_)) => {
                warn!(dir = %dir.display(), "directory has a {} but no metadata file", CONTENT_FILE)
            }
            (false, None) => {}
        }

        for subdir in listing.subdirs {
            if scheduled.insert(identity(&subdir)) {
                frontier.push_back(subdir);
            }
        }
    }

    info!(root = %root.display(), "found {} posts", posts.len());
    posts
}

/// The parts of a directory listing that matter for discovery.
struct Listing {
    has_metadata: bool,
    content_file: Option<PathBuf>,
    resource_dir: Option<PathBuf>,
    subdirs: Vec<PathBuf>,
}

impl Listing {
    fn read(dir: &Path) -> std::io::Result<Listing> {
        let mut listing = Listing {
            has_metadata: false,
            content_file: None,
            resource_dir: None,
            subdirs: Vec::new(),
        };

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_name = entry.file_name();
            // `is_dir` follows symlinks; `identity` guards against cycles.
            let is_dir = path.is_dir();

            if is_metadata_file(&file_name) && !is_dir {
                listing.has_metadata = true;
            } else if file_name == CONTENT_FILE && !is_dir {
                listing.content_file = Some(path);
            } else if is_dir {
                if file_name == RESOURCE_DIR {
                    listing.resource_dir = Some(path.clone());
                }
                listing.subdirs.push(path);
            }
        }

        Ok(listing)
    }
}

/// The key under which a directory is scheduled.
fn identity(dir: &Path) -> PathBuf {
    fs::canonicalize(dir).unwrap_or_else(|_| dir.to_owned())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_helpers::{write_file, write_post};
    use tempfile::TempDir;

    const METADATA: &str = "title: Post\n";
    const CONTENT: &str = "# Post\n";

    fn found(root: &Path) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = find_posts(root)
            .into_iter()
            .map(|post| post.source_dir)
            .collect();
        dirs.sort();
        dirs
    }

    #[test]
    fn test_find_posts() {
        let root = TempDir::new().unwrap();
        let a = write_post(root.path(), "2021/01/post1", METADATA, CONTENT);
        let b = write_post(root.path(), "2021/01/post2", METADATA, CONTENT);
        let c = write_post(root.path(), "2020/12/deep/er/post", METADATA, CONTENT);
        write_file(&root.path().join("2020/notes.txt"), "not a post");

        let mut wanted = vec![a, b, c];
        wanted.sort();
        assert_eq!(wanted, found(root.path()));
    }

    #[test]
    fn test_post_directories_are_leaves() {
        let root = TempDir::new().unwrap();
        let outer = write_post(root.path(), "outer", METADATA, CONTENT);
        write_post(root.path(), "outer/inner", METADATA, CONTENT);

        assert_eq!(vec![outer], found(root.path()));
    }

    #[test]
    fn test_root_can_be_a_post() {
        let root = TempDir::new().unwrap();
        write_post(root.path(), "", METADATA, CONTENT);
        assert_eq!(1, find_posts(root.path()).len());
    }

    #[test]
    fn test_malformed_directories_are_skipped() {
        let root = TempDir::new().unwrap();
        write_file(&root.path().join("only-metadata/metadata.yaml"), METADATA);
        write_file(&root.path().join("only-content/content.md"), CONTENT);
        let nested = write_post(root.path(), "only-metadata/nested", METADATA, CONTENT);

        assert_eq!(vec![nested], found(root.path()));
    }

    #[test]
    fn test_resource_dir() {
        let root = TempDir::new().unwrap();
        let dir = write_post(root.path(), "post", METADATA, CONTENT);
        write_file(&dir.join("resources/image.png"), "png");

        let posts = find_posts(root.path());
        assert_eq!(1, posts.len());
        assert_eq!(Some(dir.join("resources")), posts[0].resource_dir);
        assert_eq!(dir.join(CONTENT_FILE), posts[0].content_file);
    }

    #[test]
    fn test_missing_root() {
        let root = TempDir::new().unwrap();
        assert!(find_posts(&root.path().join("missing")).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_cycle() {
        let root = TempDir::new().unwrap();
        let post = write_post(root.path(), "a/post", METADATA, CONTENT);
        std::os::unix::fs::symlink(root.path(), root.path().join("a/loop")).unwrap();

        assert_eq!(vec![post], found(root.path()));
    }
}
