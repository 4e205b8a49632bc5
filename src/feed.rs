//! Support for creating RSS feeds from a list of posts.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use rss::{ChannelBuilder, GuidBuilder, Item, ItemBuilder};
use std::io::Write;
use thiserror::Error;

use crate::post::Post;

/// The most posts a feed carries.
pub const MAX_ITEMS: usize = 10;

/// How long readers may cache the feed, in minutes.
const TTL_MINUTES: &str = "1800";

/// Bundled configuration for creating a feed.
pub struct FeedConfig {
    pub title: String,
    pub description: String,

    /// The URL of the blog's main page.
    pub link: String,

    /// The scheme and host prefixed to every post's URL path, e.g.
    /// `https://example.org`.
    pub link_base: String,
}

/// Creates a feed from a [`FeedConfig`] and the first [`MAX_ITEMS`] of
/// `posts`, which must be sorted newest first, and writes it to `w`. `now` is
/// the feed's publish time.
pub fn write_feed<W: Write>(
    config: &FeedConfig,
    posts: &[Post],
    now: DateTime<Utc>,
    w: W,
) -> Result<()> {
    let posts = &posts[..posts.len().min(MAX_ITEMS)];
    let last_build_date = posts
        .iter()
        .filter_map(Post::publish_date)
        .max()
        .map_or_else(|| now.to_rfc2822(), rfc2822);

    let channel = ChannelBuilder::default()
        .title(config.title.clone())
        .link(config.link.clone())
        .description(config.description.clone())
        .last_build_date(last_build_date)
        .pub_date(now.to_rfc2822())
        .ttl(TTL_MINUTES.to_owned())
        .items(posts.iter().map(|post| item(config, post)).collect::<Vec<_>>())
        .build();

    let mut w = channel.pretty_write_to(w, b' ', 2)?;
    w.flush()?;
    Ok(())
}

fn item(config: &FeedConfig, post: &Post) -> Item {
    let link = format!("{}{}", config.link_base, post.url_path);
    ItemBuilder::default()
        .title(post.title().to_owned())
        .link(link.clone())
        .description(strip_paragraph(&post.preview).to_owned())
        .guid(GuidBuilder::default().permalink(true).value(link).build())
        .pub_date(post.publish_date().map(rfc2822))
        .build()
}

/// Midnight UTC at the start of `date`.
fn rfc2822(date: NaiveDate) -> String {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
        .to_rfc2822()
}

/// Removes one leading `<p>` and one trailing `</p>` along with the
/// whitespace around them. Anything else is left alone.
fn strip_paragraph(html: &str) -> &str {
    let html = html.trim();
    let html = html.strip_prefix("<p>").unwrap_or(html);
    let html = html.strip_suffix("</p>").unwrap_or(html);
    html.trim()
}

pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem writing a feed.
#[derive(Error, Debug)]
pub enum Error {
    /// Returned when there is a generic I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Returned when the feed can't be serialized.
    #[error(transparent)]
    Rss(#[from] rss::Error),
}
