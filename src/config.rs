//! Defines the [`Config`] record read by every build stage. Values are
//! layered: built-in defaults, then an optional YAML config file, then
//! command-line flags ([`Layer`]), with later layers taking precedence.

use serde::Deserialize;
use std::fs::File;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The config file loaded when none is given explicitly. It's optional.
pub const DEFAULT_CONFIG_FILE: &str = ".quire.yaml";

/// All configuration for a build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// The path of the blog on the host it's served from, e.g. `/blog` for
    /// `http://example.com/blog/`. Empty when served from the root.
    pub base_url_path: String,

    pub blog_name: String,
    pub blog_description: String,

    /// Disables the RSS feed.
    pub no_rss: bool,

    /// The scheme and host the blog is served from. Combined with
    /// `base_url_path` to build the absolute links in the RSS feed.
    pub rss_link_url: String,

    pub output_dir: PathBuf,
    pub posts_dir: PathBuf,
    pub static_dir: PathBuf,
    pub template_dir: PathBuf,

    /// The maximum number of posts built in parallel.
    pub parallelism: usize,

    /// Publishes posts whose publish date is in the future.
    pub future_posts: bool,

    /// Keeps output directories of posts which no longer exist (or have
    /// moved because their title or date changed).
    pub no_output_cleanup: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url_path: String::new(),
            blog_name: String::from("My Blog"),
            blog_description: String::from("My musings about the world"),
            no_rss: false,
            rss_link_url: String::from("http://127.0.0.1"),
            output_dir: PathBuf::from("blog"),
            posts_dir: PathBuf::from("posts"),
            static_dir: PathBuf::from("static"),
            template_dir: PathBuf::from("templates"),
            parallelism: default_parallelism(),
            future_posts: false,
            no_output_cleanup: false,
        }
    }
}

/// A partial [`Config`]. Each `Some` field overrides the layer below it. The
/// config file deserializes into a [`Layer`] with camelCase keys.
#[derive(Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Layer {
    pub base_url_path: Option<String>,
    pub blog_name: Option<String>,
    pub blog_description: Option<String>,
    pub no_rss: Option<bool>,
    pub rss_link_url: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub posts_dir: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub template_dir: Option<PathBuf>,
    pub parallelism: Option<usize>,
    pub future_posts: Option<bool>,
    pub no_output_cleanup: Option<bool>,
}

impl Layer {
    /// Reads a layer from a YAML file.
    pub fn from_file(path: &Path) -> Result<Layer> {
        let file = File::open(path).map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })?;
        serde_yaml::from_reader(file).map_err(|source| Error::Yaml {
            path: path.to_owned(),
            source,
        })
    }
}

impl Config {
    /// Loads the configuration. `config_file` is read if given (it must
    /// exist); otherwise [`DEFAULT_CONFIG_FILE`] is read if it exists. `flags`
    /// is applied last. Directory paths are made absolute.
    pub fn load(config_file: Option<&Path>, flags: Layer) -> Result<Config> {
        let mut config = Config::default();

        let (path, explicit) = match config_file {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };
        if path.exists() {
            config.apply(Layer::from_file(path)?);
        } else if explicit {
            return Err(Error::MissingConfigFile(path.to_owned()));
        }

        config.apply(flags);
        config.make_absolute()?;
        Ok(config)
    }

    /// Overrides fields with the values set in `layer`. A parallelism of 0 is
    /// treated as unset.
    pub fn apply(&mut self, layer: Layer) {
        fn set<T>(field: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *field = value;
            }
        }

        set(&mut self.base_url_path, layer.base_url_path);
        set(&mut self.blog_name, layer.blog_name);
        set(&mut self.blog_description, layer.blog_description);
        set(&mut self.no_rss, layer.no_rss);
        set(&mut self.rss_link_url, layer.rss_link_url);
        set(&mut self.output_dir, layer.output_dir);
        set(&mut self.posts_dir, layer.posts_dir);
        set(&mut self.static_dir, layer.static_dir);
        set(&mut self.template_dir, layer.template_dir);
        set(
            &mut self.parallelism,
            layer.parallelism.filter(|parallelism| *parallelism > 0),
        );
        set(&mut self.future_posts, layer.future_posts);
        set(&mut self.no_output_cleanup, layer.no_output_cleanup);
    }

    fn make_absolute(&mut self) -> Result<()> {
        for dir in [
            &mut self.output_dir,
            &mut self.posts_dir,
            &mut self.static_dir,
            &mut self.template_dir,
        ] {
            let resolved = absolute(dir.as_path())?;
            *dir = resolved;
        }
        Ok(())
    }
}

/// The number of CPUs, or 1 if that can't be determined.
fn default_parallelism() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Converts `path` to an absolute path without requiring that it exists.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|source| Error::Resolve {
        path: path.to_owned(),
        source,
    })
}

/// The result of a fallible configuration operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading the configuration.
#[derive(Error, Debug)]
pub enum Error {
    /// Returned when an explicitly requested config file doesn't exist.
    #[error("config file `{}` doesn't exist", .0.display())]
    MissingConfigFile(PathBuf),

    /// Returned when the config file can't be read.
    #[error("reading config file `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Returned when the config file isn't valid YAML.
    #[error("parsing config file `{}`: {source}", path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// Returned when a path can't be made absolute.
    #[error("getting absolute path of `{}`: {source}", path.display())]
    Resolve {
        path: PathBuf,
        source: std::io::Error,
    },
}
