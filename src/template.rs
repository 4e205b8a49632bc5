//! Loads the site's templates and renders post and post-list pages with
//! them. A template directory looks like:
//!
//! ```text
//! templates/
//! ├── includes/
//! │   └── header.html.tmpl
//! ├── post.html.tmpl
//! └── post_list.html.tmpl
//! ```
//!
//! Every file in `includes/` is available to both page templates under its
//! file name, e.g. `{{template "header.html.tmpl" .}}`.
//!
//! [`Templates`] holds the template sources and is checked once when it's
//! loaded. Each thread that renders pages gets its own parsed
//! [`PageRenderer`] from [`Templates::renderer`], so no parsed template is
//! ever shared between threads.

use gtmpl::{Context, Template, Value};
use pulldown_cmark::escape::{escape_href, escape_html};
use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::post::Post;

/// The template for post pages.
pub const POST_TEMPLATE: &str = "post.html.tmpl";

/// The template for the list of posts on the main page.
pub const LIST_TEMPLATE: &str = "post_list.html.tmpl";

const INCLUDES_DIR: &str = "includes";
const TEMPLATE_EXTENSION: &str = ".html.tmpl";

/// The display format for publish dates, e.g. `17 Mar 2021`.
const DISPLAY_DATE_FORMAT: &str = "%-d %b %Y";

/// The sources of the page templates, each prefixed with the includes.
#[derive(Clone, Debug)]
pub struct Templates {
    post: String,
    list: String,
}

impl Templates {
    /// Reads the templates from `dir` and checks that they parse.
    pub fn load(dir: &Path) -> Result<Templates> {
        let includes = load_includes(&dir.join(INCLUDES_DIR))?;
        let templates = Templates {
            post: includes.clone() + &read_template(&dir.join(POST_TEMPLATE))?,
            list: includes + &read_template(&dir.join(LIST_TEMPLATE))?,
        };

        parse(POST_TEMPLATE, &templates.post)?;
        parse(LIST_TEMPLATE, &templates.list)?;
        Ok(templates)
    }

    /// Parses the templates into a [`PageRenderer`] for the current thread.
    pub fn renderer(&self, config: &Config) -> Result<PageRenderer> {
        Ok(PageRenderer {
            post: parse(POST_TEMPLATE, &self.post)?,
            list: parse(LIST_TEMPLATE, &self.list)?,
            base_url_path: config.base_url_path.clone(),
            blog_name: config.blog_name.clone(),
        })
    }
}

/// Concatenates every include, each wrapped in a `define` named after its
/// file. A missing includes directory means there are no includes.
fn load_includes(dir: &Path) -> Result<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
        Err(source) => {
            return Err(Error::Io {
                path: dir.to_owned(),
                source,
            })
        }
    };

    let mut files = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|source| Error::Io {
            path: dir.to_owned(),
            source,
        })?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if file_name.ends_with(TEMPLATE_EXTENSION) && entry.path().is_file() {
            files.insert(file_name);
        }
    }

    let mut includes = String::new();
    for file_name in files {
        let contents = read_template(&dir.join(&file_name))?;
        includes.push_str(&format!("{{{{define \"{}\"}}}}{}{{{{end}}}}", file_name, contents));
    }
    Ok(includes)
}

fn read_template(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_owned(),
        source,
    })
}

fn parse(name: &str, source: &str) -> Result<Template> {
    let mut template = Template::default();
    template.parse(source).map_err(|message| Error::Parse {
        name: name.to_owned(),
        message,
    })?;
    Ok(template)
}

/// Renders pages with parsed templates. Not shared between threads; see
/// [`Templates::renderer`].
pub struct PageRenderer {
    post: Template,
    list: Template,
    base_url_path: String,
    blog_name: String,
}

impl PageRenderer {
    /// Renders the page for a single post into `path`.
    pub fn write_post(&self, post: &Post, path: &Path) -> Result<()> {
        let value = object([
            ("common", self.common(post.title())),
            ("post", post_value(post)),
        ]);
        write_page(&self.post, POST_TEMPLATE, value, path)
    }

    /// Renders the list of `posts` into `path`. Posts appear in the order
    /// given. `all_tags` is the sorted union of every post's tags.
    pub fn write_index(&self, posts: &[Post], path: &Path) -> Result<()> {
        let all_tags: BTreeSet<&String> = posts.iter().flat_map(|post| post.tags()).collect();
        let value = object([
            ("common", self.common(&self.blog_name)),
            ("posts", Value::Array(posts.iter().map(post_value).collect())),
            (
                "all_tags",
                Value::Array(all_tags.into_iter().map(|tag| text(tag)).collect()),
            ),
        ]);
        write_page(&self.list, LIST_TEMPLATE, value, path)
    }

    fn common(&self, page_title: &str) -> Value {
        object([
            ("base_url_path", href(&self.base_url_path)),
            ("blog_name", text(&self.blog_name)),
            ("page_title", text(page_title)),
        ])
    }
}

/// Takes a template value, renders it, and writes the result to `path`.
fn write_page(template: &Template, name: &str, value: Value, path: &Path) -> Result<()> {
    debug!(path = %path.display(), "rendering {}", name);
    let render_error = |message: String| Error::Render {
        name: name.to_owned(),
        message,
    };
    let io_error = |source: std::io::Error| Error::Io {
        path: path.to_owned(),
        source,
    };

    let context = Context::from(value).map_err(render_error)?;
    let mut writer = BufWriter::new(File::create(path).map_err(io_error)?);
    template.execute(&mut writer, &context).map_err(render_error)?;
    writer.flush().map_err(io_error)
}

/// Converts a [`Post`] into the value templates see as a post. Rendered
/// markdown goes in as is; everything else is escaped.
fn post_value(post: &Post) -> Value {
    object([
        ("title", text(post.title())),
        ("title_html", html(&post.title_html)),
        ("content", html(&post.content)),
        ("preview", html(&post.preview)),
        (
            "publish_date",
            match post.publish_date() {
                Some(date) => text(&date.format(DISPLAY_DATE_FORMAT).to_string()),
                None => Value::Nil,
            },
        ),
        ("url", href(&post.url_path)),
        (
            "tags",
            Value::Array(post.tags().iter().map(|tag| text(tag)).collect()),
        ),
    ])
}

fn object<const N: usize>(fields: [(&str, Value); N]) -> Value {
    let map: HashMap<String, Value> = fields
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value))
        .collect();
    Value::Object(map)
}

/// Trusted HTML.
fn html(s: &str) -> Value {
    Value::String(s.to_owned())
}

/// Plain text, escaped for HTML.
fn text(s: &str) -> Value {
    let mut escaped = String::with_capacity(s.len());
    // Writing to a `String` can't fail.
    let _ = escape_html(&mut escaped, s);
    Value::String(escaped)
}

/// A URL or URL path, escaped for an `href` attribute.
fn href(s: &str) -> Value {
    let mut escaped = String::with_capacity(s.len());
    let _ = escape_href(&mut escaped, s);
    Value::String(escaped)
}

/// The result of a fallible templating operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading or rendering templates.
#[derive(Error, Debug)]
pub enum Error {
    /// Returned when a template file can't be read or an output page can't
    /// be written.
    #[error("`{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Returned when a template doesn't parse.
    #[error("parsing template `{name}`: {message}")]
    Parse { name: String, message: String },

    /// Returned when a template fails to render.
    #[error("rendering template `{name}`: {message}")]
    Render { name: String, message: String },
}
