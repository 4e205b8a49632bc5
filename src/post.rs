//! Defines the [`Post`] type and the per-post build: loading metadata,
//! gating on the publish date, rendering markdown, resolving the output
//! location, claiming it in the [`OutputRegistry`], copying resources, and
//! writing the post's page.
//!
//! A post is created bare by [`crate::discover`], built exactly once by one
//! worker ([`build_post`]), and read-only afterwards.

use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::markdown;
use crate::metadata::{self, PostMetadata};
use crate::registry::{Conflict, OutputRegistry};
use crate::template::{self, PageRenderer};
use crate::util::copy_dir;

/// The name of the page written into every post's output directory.
pub const INDEX_FILE: &str = "index.html";

/// Where a post is in its build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PostState {
    /// Found but not built yet.
    Discovered,

    /// Built and written to the output directory.
    Published,

    /// Dated in the future; left out of the output. Not an error.
    Skipped,

    /// The build failed; left out of the output.
    Failed,
}

/// A post and everything derived from it while building.
#[derive(Clone, Debug)]
pub struct Post {
    /// The post directory.
    pub source_dir: PathBuf,

    /// The markdown file with the post's content.
    pub content_file: PathBuf,

    /// The directory of static resources for the post, if it has one.
    pub resource_dir: Option<PathBuf>,

    pub metadata: Option<PostMetadata>,

    /// The post body without the title heading.
    pub content: String,

    /// The first paragraph of the post.
    pub preview: String,

    /// The inline content of the post's first heading.
    pub title_html: String,

    /// The final path segment of the post's URL and output directory.
    pub link_name: String,

    /// `{base_url_path}/{YYYY}/{MM}/{link_name}`.
    pub url_path: String,

    /// `{output_root}/{YYYY}/{MM}/{link_name}`.
    pub output_dir: PathBuf,

    pub state: PostState,
}

/// Everything a worker needs to build posts. Shared by reference between
/// workers except `pages`, which each worker owns.
pub struct BuildContext<'a> {
    pub config: &'a Config,
    pub output_root: &'a Path,
    pub registry: &'a OutputRegistry,
    pub pages: &'a PageRenderer,

    /// The build date: the default publish date and the cut-off for future
    /// posts.
    pub today: NaiveDate,
}

impl Post {
    pub fn new(source_dir: PathBuf, content_file: PathBuf, resource_dir: Option<PathBuf>) -> Post {
        Post {
            source_dir,
            content_file,
            resource_dir,
            metadata: None,
            content: String::new(),
            preview: String::new(),
            title_html: String::new(),
            link_name: String::new(),
            url_path: String::new(),
            output_dir: PathBuf::new(),
            state: PostState::Discovered,
        }
    }

    /// The title from the post's metadata; empty before metadata is loaded.
    pub fn title(&self) -> &str {
        self.metadata
            .as_ref()
            .map_or("", |metadata| metadata.title.as_str())
    }

    pub fn publish_date(&self) -> Option<NaiveDate> {
        self.metadata.as_ref().map(|metadata| metadata.publish_date)
    }

    pub fn tags(&self) -> &[String] {
        self.metadata
            .as_ref()
            .map(|metadata| metadata.tags())
            .unwrap_or_default()
    }

    pub fn is_published(&self) -> bool {
        self.state == PostState::Published
    }

    /// Builds the post, leaving it [`PostState::Published`] or
    /// [`PostState::Skipped`] on success. On error the post's state is left
    /// for the caller to settle; see [`build_post`].
    pub fn build(&mut self, ctx: &BuildContext) -> Result<PostState> {
        let metadata = metadata::parse_metadata(&self.source_dir, ctx.today)?;
        let publish_date = metadata.publish_date;
        let link_name = metadata.link_name.clone();
        self.metadata = Some(metadata);

        if publish_date > ctx.today && !ctx.config.future_posts {
            debug!(
                dir = %self.source_dir.display(),
                "skipping post dated {} until it's published",
                publish_date
            );
            self.state = PostState::Skipped;
            return Ok(self.state);
        }

        // Invalid UTF-8 becomes U+FFFD rather than failing the post.
        let source = fs::read(&self.content_file).map_err(|source| Error::Io {
            path: self.content_file.clone(),
            source,
        })?;
        let rendered = markdown::render_all(&String::from_utf8_lossy(&source));
        self.content = rendered.content;
        self.preview = rendered.preview;
        self.title_html = rendered.title;

        self.link_name = if link_name.is_empty() {
            metadata::derive_link_name(&rendered.title_text)
        } else {
            link_name
        };
        if self.link_name.is_empty() {
            return Err(Error::EmptyLinkName(self.source_dir.clone()));
        }

        let year = publish_date.format("%Y").to_string();
        let month = publish_date.format("%m").to_string();
        self.url_path = format!(
            "{}/{}/{}/{}",
            ctx.config.base_url_path, year, month, self.link_name
        );
        self.output_dir = ctx.output_root.join(&year).join(&month).join(&self.link_name);

        ctx.registry.claim(&self.output_dir, &self.source_dir)?;

        fs::create_dir_all(&self.output_dir).map_err(|source| Error::Io {
            path: self.output_dir.clone(),
            source,
        })?;

        if let Some(resource_dir) = &self.resource_dir {
            debug!(dir = %resource_dir.display(), "copying post resources");
            if let Err(err) = copy_dir(resource_dir, &self.output_dir) {
                warn!(
                    dir = %resource_dir.display(),
                    "failed to copy resources to `{}`: {}",
                    self.output_dir.display(),
                    err
                );
            }
        }

        let index_file = self.output_dir.join(INDEX_FILE);
        ctx.pages.write_post(self, &index_file)?;

        self.state = PostState::Published;
        Ok(self.state)
    }
}

/// Builds `post`, logging any failure against the post's source directory
/// and marking the post [`PostState::Failed`]. Failures never propagate: one
/// broken post doesn't stop the others.
pub fn build_post(post: &mut Post, ctx: &BuildContext) {
    if let Err(err) = post.build(ctx) {
        error!(dir = %post.source_dir.display(), "error building post: {}", err);
        post.state = PostState::Failed;
    }
}

/// The result of a fallible post-build operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure building a single post.
#[derive(Error, Debug)]
pub enum Error {
    /// Returned when the post's metadata can't be loaded.
    #[error(transparent)]
    Metadata(#[from] metadata::Error),

    /// Returned when neither the metadata nor the content yields a link
    /// name.
    #[error("no usable link name for the post in `{}`", .0.display())]
    EmptyLinkName(PathBuf),

    /// Returned when an earlier post already claimed the output directory.
    #[error(transparent)]
    DuplicateOutput(#[from] Conflict),

    /// Returned for I/O errors reading content or creating output.
    #[error("`{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Returned when the post's page can't be rendered or written.
    #[error(transparent)]
    Template(#[from] template::Error),
}
