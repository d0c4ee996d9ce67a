//! Support for creating Atom feeds from a list of posts.

use crate::config::Author;
use crate::post::Post;
use atom_syndication::{Category, Entry, Error as AtomError, Feed, Link, Person, Text};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use std::io::Write;
use thiserror::Error;
use url::Url;

/// Bundled configuration for creating a feed.
pub struct FeedConfig {
    pub title: String,
    pub id: String,
    pub author: Option<Author>,
    pub home_page: Url,

    /// Where the feed itself is published; becomes the `self` link.
    pub feed_url: Url,
}

/// Creates a feed from some configuration ([`FeedConfig`]) and a list of
/// [`Post`]s (newest first) and writes the result to a [`std::io::Write`].
/// This function takes ownership of the provided [`FeedConfig`].
pub fn write_feed<W: Write>(config: FeedConfig, posts: &[Post], w: W) -> Result<()> {
    feed(config, posts).write_to(w)?;
    Ok(())
}

fn feed(config: FeedConfig, posts: &[Post]) -> Feed {
    let mut feed = Feed::default();
    feed.set_entries(feed_entries(&config, posts));
    feed.set_title(config.title);
    feed.set_id(config.id);

    // The newest post keeps the feed stable across rebuilds of unchanged
    // content.
    feed.set_updated(match posts.iter().map(|p| p.date).max() {
        Some(date) => midnight_utc(date),
        None => Utc::now().into(),
    });
    feed.set_authors(author_to_people(config.author));
    feed.set_links(vec![
        link(config.home_page.as_str(), "alternate"),
        link(config.feed_url.as_str(), "self"),
    ]);
    feed
}

fn feed_entries(config: &FeedConfig, posts: &[Post]) -> Vec<Entry> {
    posts
        .iter()
        .map(|post| {
            let date = midnight_utc(post.date);
            let mut entry = Entry::default();
            entry.set_id(post.url.to_string());
            entry.set_title(post.title.as_str());
            entry.set_updated(date);
            entry.set_published(Some(date));
            entry.set_authors(author_to_people(config.author.clone()));
            entry.set_links(vec![link(post.url.as_str(), "alternate")]);
            entry.set_summary(Some(Text::plain(post.description())));
            entry.set_categories(
                post.sorted_tags()
                    .into_iter()
                    .map(|tag| {
                        let mut category = Category::default();
                        category.set_term(tag.name.as_str());
                        category
                    })
                    .collect::<Vec<_>>(),
            );
            entry
        })
        .collect()
}

fn midnight_utc(date: NaiveDate) -> DateTime<FixedOffset> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)).into()
}

fn link(href: &str, rel: &str) -> Link {
    let mut link = Link::default();
    link.set_href(href);
    link.set_rel(rel);
    link
}

fn author_to_people(author: Option<Author>) -> Vec<Person> {
    match author {
        Some(author) => vec![Person {
            name: author.name,
            email: author.email,
            uri: None,
        }],
        None => Vec::new(),
    }
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when there is a generic I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Returned when there is an Atom-related error.
    #[error(transparent)]
    Atom(#[from] AtomError),
}
