//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site: finding the posts
//! ([`crate::discover`]), building each of them on a pool of worker threads
//! ([`crate::post`]), copying the static source directory into the output
//! directory, pruning output left behind by posts that no longer exist, and
//! rendering the index page ([`crate::template`]) and the RSS feed
//! ([`crate::feed`]).

use chrono::{Local, NaiveDate, Utc};
use rayon::prelude::*;
use std::fs::{self, DirEntry, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::{self, Config};
use crate::discover::find_posts;
use crate::feed::{self, write_feed, FeedConfig};
use crate::post::{build_post, BuildContext, Post, PostState, INDEX_FILE};
use crate::registry::OutputRegistry;
use crate::template::{self, Templates};
use crate::util::{copy_dir, CopyError};

/// The name of the RSS feed in the output directory.
pub const RSS_FILE: &str = "rss.xml";

/// The outcome of a build.
#[derive(Debug)]
pub struct Site {
    /// The published posts, newest first.
    pub posts: Vec<Post>,

    /// The number of posts left out because they're dated in the future.
    pub skipped: usize,

    /// The number of posts left out because they failed to build.
    pub failed: usize,
}

/// Builds the site described by `config` from its posts directory into its
/// output directory.
pub fn build_site(config: &Config) -> Result<Site> {
    build(&config.posts_dir, &config.output_dir, config)
}

/// Builds the posts under `input_dir` into `output_dir`. Both directories are
/// made absolute first. Posts that fail to build are logged and left out;
/// only whole-site failures are returned as errors.
pub fn build(input_dir: &Path, output_dir: &Path, config: &Config) -> Result<Site> {
    let input_dir = config::absolute(input_dir)?;
    let output_root = config::absolute(output_dir)?;

    let templates = Templates::load(&config.template_dir)?;
    let mut posts = find_posts(&input_dir);

    let registry = OutputRegistry::new();
    let today = Local::now().date_naive();
    build_posts(&mut posts, &templates, config, &output_root, &registry, today)?;

    info!(
        "copying static files from `{}` to `{}`",
        config.static_dir.display(),
        output_root.display()
    );
    copy_dir(&config.static_dir, &output_root).map_err(|source| Error::StaticCopy {
        dir: config.static_dir.clone(),
        source,
    })?;

    let (mut published, left_out): (Vec<Post>, Vec<Post>) =
        posts.into_iter().partition(Post::is_published);
    // Stable, so posts sharing a date keep their discovery order.
    published.sort_by(|a, b| b.publish_date().cmp(&a.publish_date()));

    if !config.no_output_cleanup {
        match prune(&output_root, &registry) {
            Ok(removed) => debug!("removed {} stale post directories", removed),
            Err(err) => error!(
                dir = %output_root.display(),
                "failed to remove stale post directories: {}",
                err
            ),
        }
    }

    let index_file = output_root.join(INDEX_FILE);
    templates
        .renderer(config)?
        .write_index(&published, &index_file)
        .map_err(Error::Index)?;

    if !config.no_rss {
        write_rss(config, &published, &output_root.join(RSS_FILE))?;
    }

    let count = |state: PostState| left_out.iter().filter(|post| post.state == state).count();
    Ok(Site {
        skipped: count(PostState::Skipped),
        failed: count(PostState::Failed),
        posts: published,
    })
}

/// Builds every post on a pool of `config.parallelism` threads (never more
/// than there are posts) and returns once all of them are done. Parsed
/// templates aren't shared between threads; each batch of posts parses its
/// own.
fn build_posts(
    posts: &mut [Post],
    templates: &Templates,
    config: &Config,
    output_root: &Path,
    registry: &OutputRegistry,
    today: NaiveDate,
) -> Result<()> {
    let workers = config.parallelism.min(posts.len());
    if workers == 0 {
        return Ok(());
    }
    info!("building {} posts with {} workers", posts.len(), workers);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()?;
    pool.install(|| {
        posts.par_iter_mut().for_each_init(
            || templates.renderer(config),
            |pages, post| match pages {
                Ok(pages) => {
                    let ctx = BuildContext {
                        config,
                        output_root,
                        registry,
                        pages,
                        today,
                    };
                    build_post(post, &ctx);
                }
                Err(err) => {
                    error!(
                        dir = %post.source_dir.display(),
                        "failed to prepare templates: {}",
                        err
                    );
                    post.state = PostState::Failed;
                }
            },
        )
    });
    Ok(())
}

/// Deletes every `YYYY/MM/<name>` directory under `output_root` that no post
/// in `registry` owns. Returns the number of directories deleted.
fn prune(output_root: &Path, registry: &OutputRegistry) -> io::Result<usize> {
    let mut removed = 0;
    for year in numbered_dirs(output_root, 4)? {
        for month in numbered_dirs(&year, 2)? {
            for entry in fs::read_dir(&month)? {
                let entry = entry?;
                let dir = entry.path();
                if entry.file_type()?.is_dir() && !registry.contains(&dir) {
                    info!(dir = %dir.display(), "removing stale post directory");
                    fs::remove_dir_all(&dir)?;
                    removed += 1;
                }
            }
        }
    }
    Ok(removed)
}

/// The subdirectories of `dir` whose names are exactly `digits` ASCII digits.
fn numbered_dirs(dir: &Path, digits: usize) -> io::Result<Vec<PathBuf>> {
    let is_numbered = |entry: &DirEntry| {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        name.len() == digits && name.bytes().all(|b| b.is_ascii_digit())
    };

    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() && is_numbered(&entry) {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}

fn write_rss(config: &Config, posts: &[Post], path: &Path) -> Result<()> {
    info!(path = %path.display(), "writing RSS feed");
    let feed_config = FeedConfig {
        title: config.blog_name.clone(),
        description: config.blog_description.clone(),
        link: format!("{}{}", config.rss_link_url, config.base_url_path),
        link_base: config.rss_link_url.clone(),
    };
    let file = File::create(path).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })?;
    write_feed(&feed_config, posts, Utc::now(), BufWriter::new(file))?;
    Ok(())
}

pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Only failures that stop the whole
/// build end up here; see [`crate::post::build_post`].
#[derive(Error, Debug)]
pub enum Error {
    /// Returned when the input or output directory can't be made absolute.
    #[error(transparent)]
    ResolvePath(#[from] config::Error),

    /// Returned when the templates can't be loaded or parsed.
    #[error(transparent)]
    Template(#[from] template::Error),

    /// Returned when the static directory can't be copied into the output.
    #[error("copying static files from `{}`: {source}", dir.display())]
    StaticCopy { dir: PathBuf, source: CopyError },

    /// Returned when the worker threads can't be started.
    #[error("starting worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Returned when the index page can't be rendered or written.
    #[error("writing the index page: {0}")]
    Index(#[source] template::Error),

    /// Returned when the RSS feed can't be written.
    #[error("writing the RSS feed: {0}")]
    Feed(#[from] feed::Error),

    /// Returned for other I/O errors.
    #[error("`{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_helpers::{site_config, write_file, write_post};
    use rss::Channel;
    use tempfile::TempDir;

    fn post_yaml(title: &str, date: &str) -> String {
        format!("title: {}\npublishDate: {}\n", title, date)
    }

    #[test]
    fn test_build_site() -> Result<()> {
        let root = TempDir::new().unwrap();
        let config = site_config(root.path());
        write_post(&config.posts_dir, "a", &post_yaml("Old", "2020-05-01"), "old\n");
        write_post(&config.posts_dir, "b", &post_yaml("New", "2021-02-03"), "new\n");

        let site = build_site(&config)?;
        let titles: Vec<&str> = site.posts.iter().map(Post::title).collect();
        assert_eq!(vec!["New", "Old"], titles);
        assert_eq!((0, 0), (site.skipped, site.failed));

        let out = &config.output_dir;
        assert!(out.join("2020/05/old").join(INDEX_FILE).is_file());
        assert!(out.join("2021/02/new").join(INDEX_FILE).is_file());
        assert_eq!("body {}", fs::read_to_string(out.join("style.css")).unwrap());

        let index = fs::read_to_string(out.join(INDEX_FILE)).unwrap();
        let new = index.find("/blog/2021/02/new").unwrap();
        let old = index.find("/blog/2020/05/old").unwrap();
        assert!(new < old);
        Ok(())
    }

    #[test]
    fn test_failed_and_duplicate_posts_are_left_out() -> Result<()> {
        let root = TempDir::new().unwrap();
        let config = site_config(root.path());
        write_post(&config.posts_dir, "one", &post_yaml("Same", "2021-01-05"), "1\n");
        write_post(&config.posts_dir, "two", &post_yaml("same", "2021-01-20"), "2\n");
        write_post(&config.posts_dir, "bad", "publishDate: 2021-01-05\n", "bad\n");

        let site = build_site(&config)?;
        assert_eq!(1, site.posts.len());
        assert_eq!(2, site.failed);
        assert!(config.output_dir.join("2021/01/same").join(INDEX_FILE).is_file());
        Ok(())
    }

    #[test]
    fn test_future_posts_are_skipped() -> Result<()> {
        let root = TempDir::new().unwrap();
        let config = site_config(root.path());
        write_post(&config.posts_dir, "now", &post_yaml("Now", "2021-01-05"), "x\n");
        write_post(&config.posts_dir, "later", &post_yaml("Later", "9999-01-01"), "x\n");

        let site = build_site(&config)?;
        assert_eq!(1, site.posts.len());
        assert_eq!(1, site.skipped);
        assert!(!config.output_dir.join("9999").exists());
        Ok(())
    }

    #[test]
    fn test_prune_stale_output() -> Result<()> {
        let root = TempDir::new().unwrap();
        let mut config = site_config(root.path());
        write_post(&config.posts_dir, "kept", &post_yaml("Kept", "2021-01-05"), "x\n");
        let out = config.output_dir.clone();
        write_file(&out.join("2020/12/gone/index.html"), "stale");
        write_file(&out.join("2021/01/also-gone/index.html"), "stale");
        write_file(&out.join("notes/2020/12/keep.txt"), "not a post");
        write_file(&out.join("2021/1/odd/index.html"), "wrong shape");

        build_site(&config)?;
        assert!(out.join("2021/01/kept").join(INDEX_FILE).is_file());
        assert!(!out.join("2020/12/gone").exists());
        assert!(!out.join("2021/01/also-gone").exists());
        assert!(out.join("notes/2020/12/keep.txt").is_file());
        assert!(out.join("2021/1/odd/index.html").is_file());

        write_file(&out.join("2020/12/gone/index.html"), "stale");
        config.no_output_cleanup = true;
        build_site(&config)?;
        assert!(out.join("2020/12/gone").exists());
        Ok(())
    }

    #[test]
    fn test_prune_missing_output_root() {
        let root = TempDir::new().unwrap();
        let registry = OutputRegistry::new();
        assert!(prune(&root.path().join("missing"), &registry).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_prune_failure_is_not_fatal() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let config = site_config(root.path());
        write_post(&config.posts_dir, "kept", &post_yaml("Kept", "2021-01-05"), "x\n");
        let locked = config.output_dir.join("2020/12");
        write_file(&locked.join("gone/index.html"), "stale");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read_dir(&locked).is_ok() {
            // Permissions aren't enforced for this user (e.g. root).
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return Ok(());
        }

        let result = build_site(&config);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let site = result?;
        assert_eq!(1, site.posts.len());
        assert!(config.output_dir.join(INDEX_FILE).is_file());
        assert!(config.output_dir.join(RSS_FILE).is_file());
        Ok(())
    }

    #[test]
    fn test_index_escapes_titles() -> Result<()> {
        let root = TempDir::new().unwrap();
        let config = site_config(root.path());
        write_post(
            &config.posts_dir,
            "amp",
            "title: \"Rust & <Go>\"\npublishDate: 2021-01-05\n",
            "x\n",
        );

        build_site(&config)?;
        let index = fs::read_to_string(config.output_dir.join(INDEX_FILE)).unwrap();
        assert!(index.contains(">Rust &amp; &lt;Go&gt;</a>"));
        assert!(index.contains("href=\"/blog/2021/01/rust-&amp;-%3Cgo%3E\""));
        assert!(!index.contains("<Go>"));
        Ok(())
    }

    #[test]
    fn test_rss_keeps_ten_newest() -> Result<()> {
        let root = TempDir::new().unwrap();
        let config = site_config(root.path());
        for day in 1..=12 {
            write_post(
                &config.posts_dir,
                &format!("post-{}", day),
                &post_yaml(&format!("Post {}", day), &format!("2021-01-{:02}", day)),
                "x\n",
            );
        }

        build_site(&config)?;
        let rss = fs::read(config.output_dir.join(RSS_FILE)).unwrap();
        let channel = Channel::read_from(&rss[..]).unwrap();
        let titles: Vec<&str> = channel.items().iter().filter_map(|item| item.title()).collect();
        let wanted: Vec<String> = (3..=12).rev().map(|day| format!("Post {}", day)).collect();
        assert_eq!(wanted, titles);
        assert_eq!("https://test.invalid/blog", channel.link());
        Ok(())
    }

    #[test]
    fn test_no_rss() -> Result<()> {
        let root = TempDir::new().unwrap();
        let mut config = site_config(root.path());
        config.no_rss = true;
        write_post(&config.posts_dir, "p", &post_yaml("P", "2021-01-05"), "x\n");

        build_site(&config)?;
        assert!(config.output_dir.join(INDEX_FILE).is_file());
        assert!(!config.output_dir.join(RSS_FILE).exists());
        Ok(())
    }

    #[test]
    fn test_missing_static_dir_is_fatal() {
        let root = TempDir::new().unwrap();
        let mut config = site_config(root.path());
        config.static_dir = root.path().join("missing");

        assert!(matches!(
            build_site(&config),
            Err(Error::StaticCopy { .. })
        ));
    }

    #[test]
    fn test_missing_templates_are_fatal() {
        let root = TempDir::new().unwrap();
        let mut config = site_config(root.path());
        config.template_dir = root.path().join("missing");

        assert!(matches!(build_site(&config), Err(Error::Template(_))));
    }

    #[test]
    fn test_empty_site() -> Result<()> {
        let root = TempDir::new().unwrap();
        let config = site_config(root.path());

        let site = build_site(&config)?;
        assert!(site.posts.is_empty());
        assert!(config.output_dir.join(INDEX_FILE).is_file());
        assert!(config.output_dir.join(RSS_FILE).is_file());
        Ok(())
    }
}
