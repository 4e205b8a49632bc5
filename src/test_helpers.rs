//! Shared fixtures for the unit tests: post directories, a minimal template
//! set, and a [`Config`] pointing at a temporary site layout.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;

/// Writes `contents` to `path`, creating parent directories as needed.
pub fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// Creates a post directory at `root/relative` with a YAML metadata file and
/// a `content.md`. Returns the post directory.
pub fn write_post(root: &Path, relative: &str, metadata: &str, content: &str) -> PathBuf {
    let dir = root.join(relative);
    write_file(&dir.join("metadata.yaml"), metadata);
    write_file(&dir.join("content.md"), content);
    dir
}

/// Writes a template directory with both page templates and one include.
pub fn write_templates(dir: &Path) {
    write_file(
        &dir.join("includes").join("header.html.tmpl"),
        "<title>{{.common.page_title}}</title>",
    );
    write_file(
        &dir.join("post.html.tmpl"),
        concat!(
            "{{template \"header.html.tmpl\" .}}",
            "<h1>{{.post.title}}</h1>",
            "<time>{{.post.publish_date}}</time>",
            "{{.post.content}}",
            "{{range .post.tags}}<span class=\"tag\">{{.}}</span>{{end}}",
        ),
    );
    write_file(
        &dir.join("post_list.html.tmpl"),
        concat!(
            "{{template \"header.html.tmpl\" .}}",
            "{{range .posts}}<a href=\"{{.url}}\">{{.title}}</a>{{.preview}}{{end}}",
            "{{range .all_tags}}<span class=\"tag\">{{.}}</span>{{end}}",
        ),
    );
}

/// A [`Config`] rooted at `root` with `posts`, `blog`, `static` and
/// `templates` directories. Templates and one static file are written.
pub fn site_config(root: &Path) -> Config {
    write_templates(&root.join("templates"));
    write_file(&root.join("static").join("style.css"), "body {}");
    Config {
        posts_dir: root.join("posts"),
        output_dir: root.join("blog"),
        static_dir: root.join("static"),
        template_dir: root.join("templates"),
        base_url_path: String::from("/blog"),
        rss_link_url: String::from("https://test.invalid"),
        parallelism: 4,
        ..Config::default()
    }
}
