//! Defines the [`Post`] and [`Page`] types and their conversion into template
//! [`Value`]s. See [`crate::parser`] for how they are read from disk.

use crate::tag::Tag;
use crate::util::escape;
use chrono::NaiveDate;
use gtmpl::Value;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use url::Url;

/// Separates a post's summary from the rest of its body.
pub const FOLD_TAG: &str = "<!-- more -->";

/// The format dates are displayed in, e.g., `April 16, 2021`.
pub const DATE_FORMAT: &str = "%B %d, %Y";

/// A blog post: dated, tagged, and listed in the indices and the feed.
#[derive(Clone, Debug)]
pub struct Post {
    /// The file stem of the source file, or the directory name of a post
    /// bundle. Also the output directory of the post.
    pub slug: String,

    /// The output location on disk for the rendered post page.
    pub file_path: PathBuf,

    /// The URL of the rendered post page.
    pub url: Url,

    pub title: String,
    pub subtitle: Option<String>,
    pub date: NaiveDate,
    pub tags: HashSet<Tag>,

    /// The `summary` front-matter field. See [`Post::description`].
    pub summary: Option<String>,

    /// The resolved URL of the `hero` front-matter image.
    pub hero: Option<Url>,

    /// The rendered HTML body.
    pub body: String,

    /// A short plain-text extract of the body.
    pub excerpt: String,

    /// Estimated reading time in minutes; at least 1.
    pub reading_time: usize,
}

impl Post {
    /// Returns the HTML above the [`FOLD_TAG`] and `true`, or the whole body
    /// and `false` if the post has no fold.
    pub fn summary(&self) -> (&str, bool) {
        match self.body.find(FOLD_TAG) {
            Some(i) => (&self.body[..i], true),
            None => (&self.body, false),
        }
    }

    /// The plain-text description used for index listings, `<meta>` tags and
    /// the feed: the `summary` field if present, else the excerpt.
    pub fn description(&self) -> &str {
        match &self.summary {
            Some(summary) => summary,
            None => &self.excerpt,
        }
    }

    /// The post's tags sorted by name.
    pub fn sorted_tags(&self) -> Vec<&Tag> {
        let mut tags: Vec<&Tag> = self.tags.iter().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        tags
    }

    /// Converts the [`Post`] into the [`Value`] rendered by post pages. The
    /// result has the fields shared with [`Post::summarize`] plus `body`.
    pub fn to_value(&self) -> Value {
        let mut m = self.common_fields();
        m.insert("body".to_owned(), Value::String(self.body.clone()));
        Value::Object(m)
    }

    /// Converts the [`Post`] into the [`Value`] rendered for each entry of an
    /// index page. Instead of `body`, the result carries `summary` (the HTML
    /// above the fold) and `summarized` (whether there was a fold).
    pub fn summarize(&self) -> Value {
        let (summary, summarized) = self.summary();
        let mut m = self.common_fields();
        m.insert("summary".to_owned(), Value::String(summary.to_owned()));
        m.insert("summarized".to_owned(), Value::Bool(summarized));
        Value::Object(m)
    }

    fn common_fields(&self) -> HashMap<String, Value> {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("slug".to_owned(), Value::String(self.slug.clone()));
        m.insert("url".to_owned(), Value::String(self.url.to_string()));
        m.insert("title".to_owned(), Value::String(escape(&self.title)));
        m.insert("subtitle".to_owned(), optional_text(&self.subtitle));
        m.insert(
            "date".to_owned(),
            Value::String(self.date.format(DATE_FORMAT).to_string()),
        );
        m.insert(
            "date_iso".to_owned(),
            Value::String(self.date.format("%Y-%m-%d").to_string()),
        );
        m.insert(
            "tags".to_owned(),
            Value::Array(self.sorted_tags().into_iter().map(Value::from).collect()),
        );
        m.insert(
            "description".to_owned(),
            Value::String(escape(self.description())),
        );
        m.insert(
            "hero".to_owned(),
            match &self.hero {
                Some(url) => Value::String(url.to_string()),
                None => Value::Nil,
            },
        );
        m.insert(
            "reading_time".to_owned(),
            Value::from(self.reading_time as u64),
        );
        m
    }
}

/// A standalone page such as `about` or `404`. Pages are rendered with their
/// own template and are not listed in indices or the feed.
#[derive(Clone, Debug)]
pub struct Page {
    pub slug: String,
    pub file_path: PathBuf,
    pub url: Url,
    pub title: String,
    pub subtitle: Option<String>,
    pub summary: Option<String>,
    pub hero: Option<Url>,
    pub body: String,
    pub excerpt: String,
}

impl Page {
    /// See [`Post::description`].
    pub fn description(&self) -> &str {
        match &self.summary {
            Some(summary) => summary,
            None => &self.excerpt,
        }
    }

    /// Converts the [`Page`] into the [`Value`] rendered by the page
    /// template.
    pub fn to_value(&self) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("slug".to_owned(), Value::String(self.slug.clone()));
        m.insert("url".to_owned(), Value::String(self.url.to_string()));
        m.insert("title".to_owned(), Value::String(escape(&self.title)));
        m.insert("subtitle".to_owned(), optional_text(&self.subtitle));
        m.insert(
            "description".to_owned(),
            Value::String(escape(self.description())),
        );
        m.insert(
            "hero".to_owned(),
            match &self.hero {
                Some(url) => Value::String(url.to_string()),
                None => Value::Nil,
            },
        );
        m.insert("body".to_owned(), Value::String(self.body.clone()));
        Value::Object(m)
    }
}

// Absent and empty values both render as `Nil` so `{{if .subtitle}}` only
// fires for real content.
fn optional_text(text: &Option<String>) -> Value {
    match text {
        Some(text) if !text.trim().is_empty() => Value::String(escape(text)),
        _ => Value::Nil,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn post(body: &str) -> Post {
        Post {
            slug: String::from("hello"),
            file_path: PathBuf::from("/tmp/out/hello/index.html"),
            url: Url::parse("https://example.org/hello/").unwrap(),
            title: String::from("Types & Tests"),
            subtitle: None,
            date: NaiveDate::from_ymd_opt(2019, 3, 7).unwrap(),
            tags: HashSet::new(),
            summary: None,
            hero: None,
            body: body.to_owned(),
            excerpt: String::from("An excerpt"),
            reading_time: 3,
        }
    }

    fn field<'a>(value: &'a Value, key: &str) -> &'a Value {
        match value {
            Value::Object(m) => &m[key],
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_summary_with_fold() {
        let p = post("<p>intro</p><!-- more --><p>rest</p>");
        assert_eq!(("<p>intro</p>", true), p.summary());
    }

    #[test]
    fn test_summary_without_fold() {
        let p = post("<p>all</p>");
        assert_eq!(("<p>all</p>", false), p.summary());
    }

    #[test]
    fn test_description_prefers_front_matter() {
        let mut p = post("");
        assert_eq!("An excerpt", p.description());
        p.summary = Some(String::from("Hand written"));
        assert_eq!("Hand written", p.description());
    }

    #[test]
    fn test_to_value() {
        let v = post("<p>body</p>").to_value();
        assert!(matches!(field(&v, "title"), Value::String(s) if s == "Types &amp; Tests"));
        assert!(matches!(field(&v, "date"), Value::String(s) if s == "March 07, 2019"));
        assert!(matches!(field(&v, "date_iso"), Value::String(s) if s == "2019-03-07"));
        assert!(matches!(field(&v, "body"), Value::String(s) if s == "<p>body</p>"));
        assert!(matches!(field(&v, "subtitle"), Value::Nil));
        assert!(matches!(field(&v, "hero"), Value::Nil));
    }

    #[test]
    fn test_subtitle_presence() {
        let mut p = post("");
        p.subtitle = Some(String::from("  "));
        assert!(matches!(field(&p.to_value(), "subtitle"), Value::Nil));
        p.subtitle = Some(String::from("A second heading"));
        assert!(
            matches!(field(&p.to_value(), "subtitle"), Value::String(s) if s == "A second heading")
        );
    }

    #[test]
    fn test_summarize() {
        let v = post("<p>intro</p><!-- more --><p>rest</p>").summarize();
        assert!(matches!(field(&v, "summary"), Value::String(s) if s == "<p>intro</p>"));
        assert!(matches!(field(&v, "summarized"), Value::Bool(true)));
        match &v {
            Value::Object(m) => assert!(!m.contains_key("body")),
            _ => unreachable!(),
        }
    }
}
