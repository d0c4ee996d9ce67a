//! Converts markdown sources into HTML. On top of CommonMark (plus tables,
//! footnotes, strikethrough, task lists and smart punctuation) this module
//! rewrites link targets (see [`crate::url`]), gives headings `id`s,
//! highlights fenced code blocks (see [`crate::highlight`]) and extracts a
//! plain-text excerpt.

use crate::highlight;
use crate::htmlrenderer::{external_link_start, HtmlRenderer};
use crate::post::FOLD_TAG;
use crate::url::Converter as LinkConverter;
use pulldown_cmark::*;
use std::collections::HashSet;
use std::io;
use thiserror::Error;
use url::{ParseError as UrlParseError, Url};

/// The maximum length of an excerpt, in characters, not counting the
/// ellipsis.
pub const EXCERPT_LENGTH: usize = 140;

/// The output of [`to_html`].
#[derive(Debug, Default)]
pub struct Rendered {
    pub html: String,

    /// Plain text from the start of the document (up to the fold), at most
    /// [`EXCERPT_LENGTH`] characters plus an ellipsis if truncated.
    pub excerpt: String,
}

/// Converts markdown to HTML.
///
/// * [`site_url`] is the root URL of the site (e.g., https://example.org/).
///   This should end in a trailing slash.
/// * [`source_path`] is the relative path to the source file from its
///   content directory.
/// * [`markdown`] is the contents of the source file, less front matter.
/// * [`footnote_prefix`] is the prefix to prepend onto footnote links.
pub fn to_html(
    site_url: &Url,
    source_path: &str,
    markdown: &str,
    footnote_prefix: &str,
) -> Result<Rendered, Error> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let event_converter = EventConverter {
        link_converter: LinkConverter::new(site_url, source_path)?,
    };
    let events = Parser::new_ext(markdown, options)
        .map(|ev| event_converter.convert(ev))
        .collect::<Result<Vec<_>, _>>()?;
    let events = highlight_code_blocks(events);

    let mut rendered = Rendered {
        html: String::with_capacity(markdown.len() * 3 / 2),
        excerpt: excerpt(&events, EXCERPT_LENGTH),
    };
    let mut html_renderer =
        HtmlRenderer::with_footnote_prefix(footnote_prefix).with_heading_ids(heading_ids(&events));
    for ev in events {
        html_renderer.on_event(&mut rendered.html, ev)?;
    }
    Ok(rendered)
}

struct EventConverter<'a> {
    link_converter: LinkConverter<'a>,
}

impl<'a> EventConverter<'a> {
    fn convert<'b>(&self, ev: Event<'b>) -> Result<Event<'b>, UrlParseError> {
        Ok(match ev {
            // Internal links (links from posts and pages *to* posts, pages,
            // and assets) need to be converted from their input formats to
            // their output formats (e.g., a post linking to another post as
            // `foo.md` will need to be converted to `{site}/foo/`). Links to
            // other hosts open in a new tab.
            Event::Start(Tag::Link(
                link @ (LinkType::Inline
                | LinkType::Reference
                | LinkType::ReferenceUnknown
                | LinkType::Shortcut
                | LinkType::Autolink
                | LinkType::Collapsed
                | LinkType::CollapsedUnknown),
                url,
                title,
            )) => {
                let converted = self.link_converter.convert(&url)?;
                match converted.external {
                    true => Event::Html(CowStr::Boxed(
                        external_link_start(&converted.url, &title).into_boxed_str(),
                    )),
                    false => Event::Start(Tag::Link(
                        link,
                        CowStr::Boxed(converted.url.into_boxed_str()),
                        title,
                    )),
                }
            }

            // Images in post bundles are addressed relative to the bundle;
            // index pages need them absolute.
            Event::Start(Tag::Image(link, url, title)) => Event::Start(Tag::Image(
                link,
                CowStr::Boxed(self.link_converter.convert(&url)?.url.into_boxed_str()),
                title,
            )),
            _ => ev,
        })
    }
}

// Replaces fenced code blocks in a known language with pre-rendered,
// highlighted HTML. Other code blocks pass through untouched.
fn highlight_code_blocks(events: Vec<Event>) -> Vec<Event> {
    let mut out = Vec::with_capacity(events.len());
    let mut iter = events.into_iter();
    while let Some(ev) = iter.next() {
        let lang = match &ev {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                info.split(' ').next().unwrap_or("").to_owned()
            }
            _ => {
                out.push(ev);
                continue;
            }
        };
        if lang.is_empty() {
            out.push(ev);
            continue;
        }

        let mut block = vec![ev];
        let mut code = String::new();
        for inner in iter.by_ref() {
            let end = matches!(inner, Event::End(Tag::CodeBlock(_)));
            if let Event::Text(text) = &inner {
                code.push_str(text);
            }
            block.push(inner);
            if end {
                break;
            }
        }

        match highlight::highlight(&code, &lang) {
            Some(html) => out.push(Event::Html(CowStr::Boxed(html.into_boxed_str()))),
            None => out.extend(block),
        }
    }
    out
}

/// Computes an `id` for each heading from its text, in document order.
/// An id already taken gets the lowest free `-1`, `-2`, ... suffix.
fn heading_ids(events: &[Event]) -> Vec<String> {
    let mut ids = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut text: Option<String> = None;

    for ev in events {
        match ev {
            Event::Start(Tag::Heading(_)) => text = Some(String::new()),
            Event::Text(t) | Event::Code(t) => {
                if let Some(text) = &mut text {
                    text.push_str(t);
                }
            }
            Event::End(Tag::Heading(_)) => {
                let mut base = slug::slugify(text.take().unwrap_or_default());
                if base.is_empty() {
                    base = String::from("section");
                }
                let mut id = base.clone();
                let mut n = 0;
                while seen.contains(&id) {
                    n += 1;
                    id = format!("{}-{}", base, n);
                }
                seen.insert(id.clone());
                ids.push(id);
            }
            _ => {}
        }
    }
    ids
}

/// Extracts the plain text of a document up to the fold, skipping code
/// blocks, footnote definitions and image alt text, and truncates it at a
/// word boundary to at most `max` characters.
fn excerpt(events: &[Event], max: usize) -> String {
    let mut text = String::new();
    let mut skip_depth = 0usize;

    for ev in events {
        match ev {
            Event::Start(Tag::CodeBlock(_))
            | Event::Start(Tag::FootnoteDefinition(_))
            | Event::Start(Tag::Image(..)) => skip_depth += 1,
            Event::End(Tag::CodeBlock(_))
            | Event::End(Tag::FootnoteDefinition(_))
            | Event::End(Tag::Image(..)) => skip_depth = skip_depth.saturating_sub(1),
            Event::Html(html) if html.contains(FOLD_TAG) => break,
            Event::Text(t) | Event::Code(t) if skip_depth == 0 => text.push_str(t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            Event::End(Tag::Paragraph)
            | Event::End(Tag::Heading(_))
            | Event::End(Tag::Item)
            | Event::End(Tag::BlockQuote)
            | Event::End(Tag::TableCell) => text.push(' '),
            _ => {}
        }
    }

    truncate_words(&text, max)
}

fn truncate_words(text: &str, max: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let collapsed = words.join(" ");
    if collapsed.chars().count() <= max {
        return collapsed;
    }

    let mut out = String::new();
    let mut len = 0;
    for word in words {
        let word_len = word.chars().count();
        let sep = if out.is_empty() { 0 } else { 1 };
        if len + sep + word_len > max {
            break;
        }
        if sep == 1 {
            out.push(' ');
        }
        out.push_str(word);
        len += sep + word_len;
    }
    if out.is_empty() {
        // A single word longer than `max`.
        out = collapsed.chars().take(max).collect();
    }
    out.push('…');
    out
}

/// Represents an error converting markdown to HTML.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned for other I/O errors.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Returned when there is a problem parsing URLs.
    #[error(transparent)]
    UrlParse(#[from] UrlParseError),
}
