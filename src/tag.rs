//! Defines the [`Tag`] type, which represents a [`crate::post::Post`] tag.

use gtmpl::Value;
use std::hash::{Hash, Hasher};
use url::Url;

/// Represents a [`crate::post::Post`] tag. The `name` is slugified when the
/// post is parsed, and the `url` points at the tag's first index page
/// (`{site}/tags/{name}/`).
#[derive(Clone, Debug)]
pub struct Tag {
    /// The tag's name. This should be slugified so e.g., `macOS` and `MacOS`
    /// resolve to the same value, and also so the field can be dropped into a
    /// [`Url`].
    pub name: String,

    /// The URL for the tag's first index page.
    pub url: Url,
}

impl Tag {
    /// Creates a tag from a raw front-matter value. Returns `None` when the
    /// value slugifies to nothing (e.g., `"!!!"`).
    pub fn new(raw: &str, site_url: &Url) -> Option<Result<Tag, url::ParseError>> {
        let name = slug::slugify(raw);
        if name.is_empty() {
            return None;
        }
        Some(tag_url(site_url, &name).map(|url| Tag { name, url }))
    }
}

/// Returns the URL of the first index page for the tag `name`.
pub fn tag_url(site_url: &Url, name: &str) -> Result<Url, url::ParseError> {
    // The trailing slash matters; see `Url::join`.
    site_url.join(&format!("tags/{}/", name))
}

impl Hash for Tag {
    /// Implements [`Hash`] for [`Tag`] by delegating directly to the `name`
    /// field.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

impl PartialEq for Tag {
    /// Implements [`PartialEq`] and [`Eq`] for [`Tag`] by delegating directly
    /// to the `name` field.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Tag {}

impl From<&Tag> for Value {
    /// Converts [`Tag`]s into [`Value`]s for templating.
    fn from(t: &Tag) -> Value {
        use std::collections::HashMap;
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("tag".to_owned(), Value::String(t.name.clone()));
        m.insert("url".to_owned(), Value::String(t.url.to_string()));
        Value::Object(m)
    }
}
