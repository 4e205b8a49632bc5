//! Converts a post's markdown into the three HTML fragments a post needs:
//!
//! * the body, which is everything except the first heading (the heading is
//!   the post's title and is rendered separately by the page template)
//! * the preview, which is the first paragraph including its `<p>` tags
//! * the title, which is the inline content of the first heading without
//!   the heading tags
//!
//! All three come out of a single walk over one parse so that the body and
//! the title always agree on which heading is "the" title. The walk is a pair
//! of small state machines ([`Capture`]) over the [`pulldown_cmark`] event
//! stream, one tracking the title heading and one tracking the preview
//! paragraph.

use pulldown_cmark::{html, Event, Options, Parser, Tag};

/// Selects one of the fragments produced by [`render_all`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// The full post without its title heading.
    Post,

    /// The first paragraph.
    Preview,

    /// The inline content of the first heading.
    Title,
}

/// The HTML fragments rendered from a post's markdown.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rendered {
    pub content: String,
    pub preview: String,
    pub title: String,

    /// The title as plain text, with inline markup dropped.
    pub title_text: String,
}

impl Rendered {
    /// Returns the fragment for `mode`.
    pub fn get(&self, mode: RenderMode) -> &str {
        match mode {
            RenderMode::Post => &self.content,
            RenderMode::Preview => &self.preview,
            RenderMode::Title => &self.title,
        }
    }
}

/// Renders a single fragment of `markdown`.
pub fn render(markdown: &str, mode: RenderMode) -> String {
    render_all(markdown).get(mode).to_owned()
}

/// Renders every fragment of `markdown` in one pass.
pub fn render_all(markdown: &str) -> Rendered {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut visitor = Visitor::default();
    for event in Parser::new_ext(markdown, options) {
        visitor.visit(event);
    }
    visitor.finish()
}

/// Progress of a [`Visitor`] through one element of interest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Capture {
    /// The element hasn't been entered yet.
    Seeking,

    /// Events belong to the element.
    Capturing,

    /// The element has been left; later matches are ordinary content.
    Done,
}

impl Default for Capture {
    fn default() -> Self {
        Capture::Seeking
    }
}

/// Sorts the event stream into body, preview, and title buckets.
#[derive(Default)]
struct Visitor<'a> {
    title: Capture,
    preview: Capture,
    content_events: Vec<Event<'a>>,
    preview_events: Vec<Event<'a>>,
    title_events: Vec<Event<'a>>,
    title_text: String,
}

impl<'a> Visitor<'a> {
    fn visit(&mut self, event: Event<'a>) {
        self.visit_preview(&event);
        self.visit_title(event);
    }

    /// The title heading's own tags are dropped; its children go to the
    /// title and everything outside it goes to the body.
    fn visit_title(&mut self, event: Event<'a>) {
        match (self.title, &event) {
            (Capture::Seeking, Event::Start(Tag::Heading(_))) => {
                self.title = Capture::Capturing;
            }
            (Capture::Capturing, Event::End(Tag::Heading(_))) => {
                self.title = Capture::Done;
            }
            (Capture::Capturing, _) => {
                match &event {
                    Event::Text(text) | Event::Code(text) => self.title_text.push_str(text),
                    Event::SoftBreak | Event::HardBreak => self.title_text.push(' '),
                    _ => {}
                }
                self.title_events.push(event);
            }
            _ => self.content_events.push(event),
        }
    }

    /// The first paragraph is copied whole, including its tags.
    fn visit_preview(&mut self, event: &Event<'a>) {
        match (self.preview, event) {
            (Capture::Seeking, Event::Start(Tag::Paragraph)) => {
                self.preview = Capture::Capturing;
                self.preview_events.push(event.clone());
            }
            (Capture::Capturing, Event::End(Tag::Paragraph)) => {
                self.preview = Capture::Done;
                self.preview_events.push(event.clone());
            }
            (Capture::Capturing, _) => self.preview_events.push(event.clone()),
            _ => {}
        }
    }

    fn finish(self) -> Rendered {
        fn to_html<'a>(events: Vec<Event<'a>>) -> String {
            let mut out = String::new();
            html::push_html(&mut out, events.into_iter());
            out
        }

        Rendered {
            content: to_html(self.content_events),
            preview: to_html(self.preview_events),
            title: to_html(self.title_events),
            title_text: self.title_text,
        }
    }
}
