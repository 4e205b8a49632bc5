//! Defines [`PostMetadata`] and the logic for loading it from the single
//! `metadata.{json,yaml,yml}` file in a post directory. Parsing validates the
//! record (a title is required, dates must be `YYYY-MM-DD`), derives the
//! post's link name, and sorts its tags so that output is deterministic.
//!
//! A post without a `publishDate` is dated on the day of the build. Such a
//! post moves through the archive from build to build until a real date is
//! supplied; this is a convenience for drafting, not an accident.

use chrono::NaiveDate;
use serde::Deserialize;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The textual format of `publishDate` values.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// The maximum number of characters in a link name derived from a title.
pub const LINK_NAME_MAX_LENGTH: usize = 50;

/// Characters that cause trouble in file names and URLs.
const LINK_NAME_UNSAFE: &[char] = &['/', '?', '.', ':', '=', '%', '#', '\t', '\n'];

const METADATA_STEM: &str = "metadata";

/// The decoder used for a metadata file, chosen by its extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Returns the format of a metadata file, or `None` if `file_name` isn't
    /// a metadata file. Extensions are matched case-insensitively.
    pub fn from_file_name(file_name: &str) -> Option<Format> {
        let (stem, extension) = file_name.rsplit_once('.')?;
        if stem != METADATA_STEM {
            return None;
        }
        match extension.to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }
}

/// Returns true if `file_name` names a metadata file.
pub fn is_metadata_file(file_name: &OsStr) -> bool {
    file_name
        .to_str()
        .and_then(Format::from_file_name)
        .is_some()
}

/// The validated, normalized metadata for a single post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostMetadata {
    /// The URL/file-system safe name of the post. Empty only when neither an
    /// explicit link name nor the title contained any usable characters.
    pub link_name: String,

    /// The title of the post.
    pub title: String,

    /// The day the post is published.
    pub publish_date: NaiveDate,

    /// The post's tags in ascending order. `None` when the metadata had no
    /// tags field at all.
    pub tags: Option<Vec<String>>,
}

impl PostMetadata {
    /// The post's tags; empty whether the field was absent or empty.
    pub fn tags(&self) -> &[String] {
        self.tags.as_deref().unwrap_or_default()
    }
}

/// The metadata as it appears on disk, before validation.
#[derive(Deserialize, Default, Debug)]
#[serde(rename_all = "camelCase")]
struct RawMetadata {
    #[serde(default, alias = "linkname", alias = "LinkName")]
    link_name: Option<String>,

    #[serde(default, alias = "publishdate", alias = "PublishDate")]
    publish_date: Option<String>,

    #[serde(default, alias = "Tags")]
    tags: Option<Vec<String>>,

    #[serde(default, alias = "Title")]
    title: Option<String>,
}

/// Finds the metadata file in `dir` and parses it into a [`PostMetadata`].
/// `today` is the publish date given to posts which don't declare one.
pub fn parse_metadata(dir: &Path, today: NaiveDate) -> Result<PostMetadata> {
    let (path, format) = find_metadata_file(dir)?;
    let data = fs::read_to_string(&path).map_err(|source| Error::Io {
        path: path.clone(),
        source,
    })?;

    let raw: RawMetadata = match format {
        Format::Json => serde_json::from_str(&data).map_err(|source| Error::Json {
            path: path.clone(),
            source,
        })?,
        Format::Yaml => serde_yaml::from_str(&data).map_err(|source| Error::Yaml {
            path: path.clone(),
            source,
        })?,
    };

    process_raw_metadata(&path, raw, today)
}

/// Locates the single metadata file in `dir`.
fn find_metadata_file(dir: &Path) -> Result<(PathBuf, Format)> {
    let mut found = Vec::new();
    let entries = fs::read_dir(dir).map_err(|source| Error::Io {
        path: dir.to_owned(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| Error::Io {
            path: dir.to_owned(),
            source,
        })?;
        let file_name = entry.file_name();
        if let Some(format) = file_name.to_str().and_then(Format::from_file_name) {
            found.push((entry.path(), format));
        }
    }

    match found.len() {
        0 => Err(Error::NotFound(dir.to_owned())),
        1 => Ok(found.remove(0)),
        _ => {
            let mut files: Vec<PathBuf> = found.into_iter().map(|(path, _)| path).collect();
            files.sort();
            Err(Error::Ambiguous {
                dir: dir.to_owned(),
                files,
            })
        }
    }
}

/// Validates a [`RawMetadata`] and converts it into a [`PostMetadata`].
fn process_raw_metadata(path: &Path, raw: RawMetadata, today: NaiveDate) -> Result<PostMetadata> {
    let title = match raw.title {
        // A title of only whitespace counts as missing.
        Some(title) if !title.trim().is_empty() => title,
        _ => {
            return Err(Error::InvalidMetadata {
                path: path.to_owned(),
                reason: String::from("no title given for post"),
            })
        }
    };

    let publish_date = match raw.publish_date.as_deref() {
        None | Some("") => today,
        Some(date) => parse_date(date)?,
    };

    let link_name = match raw.link_name.as_deref() {
        None | Some("") => derive_link_name(&title),
        Some(link_name) => normalize_link_name(link_name),
    };

    let tags = raw.tags.map(|mut tags| {
        tags.sort();
        tags
    });

    Ok(PostMetadata {
        link_name,
        title,
        publish_date,
        tags,
    })
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|source| Error::InvalidDate {
        date: date.to_owned(),
        source,
    })
}

/// Derives a link name from a title: unsafe characters are removed, the
/// result is truncated to [`LINK_NAME_MAX_LENGTH`] characters and then
/// normalized with [`normalize_link_name`].
pub fn derive_link_name(title: &str) -> String {
    let truncated: String = strip_unsafe(title)
        .chars()
        .take(LINK_NAME_MAX_LENGTH)
        .collect();
    normalize_link_name(&truncated)
}

/// Removes unsafe characters, converts spaces to dashes, and lowercases.
/// Normalizing a normalized link name returns it unchanged.
pub fn normalize_link_name(link_name: &str) -> String {
    strip_unsafe(link_name).replace(' ', "-").to_lowercase()
}

fn strip_unsafe(s: &str) -> String {
    s.chars().filter(|c| !LINK_NAME_UNSAFE.contains(c)).collect()
}

/// Represents the result of a metadata-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading a post's metadata.
#[derive(Error, Debug)]
pub enum Error {
    /// Returned when a directory has no metadata file.
    #[error("no metadata file found in `{}`", .0.display())]
    NotFound(PathBuf),

    /// Returned when a directory has more than one metadata file.
    #[error("found multiple metadata files in `{}`: {files:?}", dir.display())]
    Ambiguous { dir: PathBuf, files: Vec<PathBuf> },

    /// Returned when the metadata decodes but fails validation.
    #[error("invalid metadata in `{}`: {reason}", path.display())]
    InvalidMetadata { path: PathBuf, reason: String },

    /// Returned when `publishDate` isn't a `YYYY-MM-DD` date.
    #[error("could not parse publish date `{date}`: {source}")]
    InvalidDate {
        date: String,
        source: chrono::ParseError,
    },

    /// Returned when a JSON metadata file can't be decoded.
    #[error("parsing metadata `{}`: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Returned when a YAML metadata file can't be decoded.
    #[error("parsing metadata `{}`: {source}", path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// Returned for I/O errors reading the directory or file.
    #[error("reading `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}
