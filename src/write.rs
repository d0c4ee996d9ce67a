//! Indexes, templates, and writes HTML pages to disk. Posts are rendered with
//! the posts template, standalone pages with the page template, and the
//! paginated main and per-tag indices with the index template.

use crate::config::Config;
use crate::highlight::CSS_PATH;
use crate::post::{Page as SourcePage, Post};
use crate::util::escape;
use chrono::Datelike;
use gtmpl::{Template, Value};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// The feed location relative to the site root.
pub const FEED_PATH: &str = "feed.atom";

/// Responsible for indexing, templating, and writing HTML pages to disk from
/// [`Post`] and [`SourcePage`] sources.
pub struct Writer<'a> {
    /// The template for post pages.
    pub posts_template: &'a Template,

    /// The template for index pages.
    pub index_template: &'a Template,

    /// The template for standalone pages.
    pub page_template: &'a Template,

    /// The root URL of the site. The main index lives here, tag indices
    /// under `{site_url}tags/{tag}/`, and later pages of an index under
    /// `{index_url}page/{n}/`.
    pub site_url: &'a Url,

    /// The root of the output tree. Index files are laid out beneath it the
    /// same way their URLs are laid out beneath `site_url`.
    pub output_directory: &'a Path,

    /// The number of posts per index page.
    pub index_page_size: usize,

    /// Values available to every template: `site`, `home_page`, `feed_url`
    /// and `syntax_css`. See [`globals`].
    pub globals: HashMap<String, Value>,
}

/// What [`Writer::write_posts`] produced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Written {
    pub posts: usize,
    pub index_pages: usize,
}

impl Writer<'_> {
    /// Takes a single [`Page`], templates it, and writes it to disk.
    fn write_page(&self, page: &Page) -> Result<()> {
        let mut m = self.globals.clone();
        if let Value::Object(fields) = page.to_value() {
            m.extend(fields);
        }

        let context = gtmpl::Context::from(Value::Object(m)).map_err(|e| Error::Template {
            path: page.file_path.clone(),
            err: format!("{}", e),
        })?;
        page.template
            .execute(&mut std::fs::File::create(&page.file_path)?, &context)
            .map_err(|e| Error::Template {
                path: page.file_path.clone(),
                err: format!("{}", e),
            })?;
        debug!(path = %page.file_path.display(), "wrote page");
        Ok(())
    }

    fn write_all<'p>(&self, pages: impl Iterator<Item = Page<'p>>) -> Result<usize> {
        let mut seen_dirs: HashSet<PathBuf> = HashSet::new();
        let mut count = 0;
        for page in pages {
            if let Some(dir) = page.file_path.parent() {
                if seen_dirs.insert(dir.to_owned()) {
                    std::fs::create_dir_all(dir)?;
                }
            }
            self.write_page(&page)?;
            count += 1;
        }
        Ok(count)
    }

    /// Takes a slice of [`Post`] (sorted newest first), indexes it by tag,
    /// and writes post and index pages to disk.
    pub fn write_posts(&self, posts: &[Post]) -> Result<Written> {
        let index_pages = index_posts(self.site_url, self.output_directory, posts)
            .iter()
            .map(|index| index.to_pages(self.index_page_size, self.index_template))
            .collect::<Result<Vec<_>>>()?;

        Ok(Written {
            index_pages: self.write_all(index_pages.into_iter().flatten())?,
            posts: self.write_all(post_pages(posts, self.posts_template))?,
        })
    }

    /// Writes each standalone page with the page template.
    pub fn write_pages(&self, pages: &[SourcePage]) -> Result<usize> {
        self.write_all(pages.iter().map(|page| Page {
            item: page.to_value(),
            file_path: page.file_path.clone(),
            prev: None,
            next: None,
            template: self.page_template,
            page_title: page.title.clone(),
            description: page.description().to_owned(),
            index: None,
        }))
    }
}

/// Builds the values shared by every template from the site configuration.
/// `site` carries `title`, `url`, `description`, `author`, `twitter`,
/// `github`, `linkedin`, `tracking_id` and `year`; absent values are `Nil`
/// so templates can test them with `{{if}}`.
pub fn globals(config: &Config) -> Result<HashMap<String, Value>> {
    let optional = |s: &Option<String>| match s {
        Some(s) if !s.is_empty() => Value::String(escape(s)),
        _ => Value::Nil,
    };

    let mut site: HashMap<String, Value> = HashMap::new();
    site.insert("title".to_owned(), Value::String(escape(&config.site.title)));
    site.insert("url".to_owned(), Value::String(config.site.url.to_string()));
    site.insert(
        "description".to_owned(),
        Value::String(escape(&config.site.description)),
    );
    site.insert(
        "author".to_owned(),
        optional(&config.site.author.as_ref().map(|a| a.name.clone())),
    );
    site.insert("twitter".to_owned(), optional(&config.social.twitter));
    site.insert("github".to_owned(), optional(&config.social.github));
    site.insert("linkedin".to_owned(), optional(&config.social.linkedin));
    site.insert("tracking_id".to_owned(), optional(&config.tracking_id));
    site.insert(
        "year".to_owned(),
        Value::from(i64::from(chrono::Utc::now().year())),
    );

    let mut m: HashMap<String, Value> = HashMap::new();
    m.insert("site".to_owned(), Value::Object(site));
    m.insert(
        "home_page".to_owned(),
        Value::String(config.site.url.to_string()),
    );
    m.insert(
        "feed_url".to_owned(),
        Value::String(config.site.url.join(FEED_PATH)?.to_string()),
    );
    m.insert(
        "syntax_css".to_owned(),
        Value::String(config.site.url.join(CSS_PATH)?.to_string()),
    );
    Ok(m)
}

/// Index-only template values.
struct IndexInfo {
    tag: String,
    page_number: usize,
    total_pages: usize,
}

/// An object representing an output HTML file. A [`Page`] can be converted to a
/// [`Value`] and thus rendered in a template via [`Page::to_value`].
struct Page<'a> {
    /// The main item for the page.
    item: Value,

    /// The target location on disk for the output file.
    file_path: PathBuf,

    /// The URL for the previous page, if any. For posts this is the newer
    /// post; for index pages, the preceding page of the same index.
    prev: Option<Url>,

    /// The URL for the next page, if any.
    next: Option<Url>,

    /// The template with which the page will be rendered.
    template: &'a Template,

    /// Unescaped; used for `<title>` and social metadata.
    page_title: String,
    description: String,

    index: Option<IndexInfo>,
}

impl Page<'_> {
    /// Converts a [`Page`] into a [`Value`]. The result is a [`Value::Object`]
    /// with fields `item`, `prev`, `next`, `page_title`, and `description`,
    /// plus `tag`, `page_number` and `total_pages` for index pages.
    fn to_value(&self) -> Value {
        let option_to_value = |opt: &Option<Url>| match opt {
            Some(url) => Value::String(url.to_string()),
            None => Value::Nil,
        };

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("item".to_owned(), self.item.clone());
        m.insert("prev".to_owned(), option_to_value(&self.prev));
        m.insert("next".to_owned(), option_to_value(&self.next));
        m.insert("page_title".to_owned(), Value::String(escape(&self.page_title)));
        m.insert(
            "description".to_owned(),
            Value::String(escape(&self.description)),
        );
        if let Some(index) = &self.index {
            m.insert("tag".to_owned(), Value::String(index.tag.clone()));
            m.insert(
                "page_number".to_owned(),
                Value::from(index.page_number as u64),
            );
            m.insert(
                "total_pages".to_owned(),
                Value::from(index.total_pages as u64),
            );
        }
        Value::Object(m)
    }
}

/// Creates all of the post [`Page`]s for a set of [`Post`]s. Takes the posts and
/// the post template as arguments.
fn post_pages<'a>(posts: &'a [Post], template: &'a Template) -> impl Iterator<Item = Page<'a>> {
    posts.iter().enumerate().map(move |(i, post)| Page {
        item: post.to_value(),
        file_path: post.file_path.clone(),
        prev: match i < 1 {
            true => None,
            false => Some(posts[i - 1].url.clone()),
        },
        next: posts.get(i + 1).map(|p| p.url.clone()),
        template,
        page_title: post.title.clone(),
        description: post.description().to_owned(),
        index: None,
    })
}

/// `Index` represents a collection of [`Post`]s associated with tag (including
/// the empty tag, which is the main index containing all posts).
struct Index<'a> {
    /// The tag name, or empty for the main index.
    tag: String,

    /// The URL of the index's first page.
    url: Url,

    /// The output directory of the index's first page.
    output_directory: PathBuf,

    /// The posts associated with the index.
    posts: Vec<&'a Post>,

    /// Passed through to the templates as `page_title` and `description`.
    title: String,
    description: String,
}

impl<'a> Index<'a> {
    /// Converts the index to a list of index pages. `index_page_size` and
    /// `index_template` represent the number of posts per page and the template
    /// to apply to the pages respectively. An index with no posts still gets
    /// one (empty) page.
    fn to_pages<'t>(
        &self,
        index_page_size: usize,
        index_template: &'t Template,
    ) -> Result<Vec<Page<'t>>> {
        let index_page_size = std::cmp::max(1, index_page_size);
        let chunks: Vec<&[&Post]> = match self.posts.is_empty() {
            true => vec![&self.posts[..]],
            false => self.posts.chunks(index_page_size).collect(),
        };
        let total_pages = chunks.len();
        let urls = (0..total_pages)
            .map(|i| self.page_url(i))
            .collect::<Result<Vec<Url>>>()?;

        Ok(chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| Page {
                item: Value::Array(chunk.iter().map(|p| p.summarize()).collect()),
                file_path: self.page_file(i),
                prev: match i {
                    0 => None,
                    _ => Some(urls[i - 1].clone()),
                },
                next: urls.get(i + 1).cloned(),
                template: index_template,
                page_title: match (i, self.title.is_empty()) {
                    (0, _) => self.title.clone(),
                    (_, true) => format!("Page {}", i + 1),
                    (_, false) => format!("{} (page {})", self.title, i + 1),
                },
                description: self.description.clone(),
                index: Some(IndexInfo {
                    tag: self.tag.clone(),
                    page_number: i + 1,
                    total_pages,
                }),
            })
            .collect())
    }

    // The first page is the index's own URL; page `n` (1-based) after that
    // is `{url}page/{n}/`.
    fn page_url(&self, i: usize) -> Result<Url> {
        Ok(match i {
            0 => self.url.clone(),
            _ => self.url.join(&format!("page/{}/", i + 1))?,
        })
    }

    fn page_file(&self, i: usize) -> PathBuf {
        match i {
            0 => self.output_directory.join("index.html"),
            _ => self
                .output_directory
                .join("page")
                .join((i + 1).to_string())
                .join("index.html"),
        }
    }
}

/// Indexes a list of [`Post`] objects: one main index with every post, and
/// one index per tag, sorted by tag name. The order of `posts` is preserved
/// within each index.
fn index_posts<'a>(site_url: &Url, output_directory: &Path, posts: &'a [Post]) -> Vec<Index<'a>> {
    let mut indices: HashMap<String, Index> = HashMap::new();

    for post in posts {
        for tag in post.tags.iter() {
            match indices.get_mut(&tag.name) {
                None => {
                    indices.insert(
                        tag.name.to_owned(),
                        Index {
                            tag: tag.name.to_owned(),
                            url: tag.url.clone(),
                            output_directory: output_directory.join("tags").join(&tag.name),
                            posts: vec![post],
                            title: format!("Posts tagged {}", tag.name),
                            description: format!("Posts tagged {}", tag.name),
                        },
                    );
                }
                Some(index) => {
                    index.posts.push(post);
                }
            }
        }
    }

    let mut tagged: Vec<Index> = indices.into_values().collect();
    tagged.sort_by(|a, b| a.tag.cmp(&b.tag));

    let mut all = Vec::with_capacity(tagged.len() + 1);
    all.push(Index {
        tag: String::new(),
        url: site_url.clone(),
        output_directory: output_directory.to_owned(),
        posts: posts.iter().collect(),
        title: String::new(),
        description: String::new(),
    });
    all.extend(tagged);
    all
}

/// The result of a fallible page-writing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a page-writing operation.
#[derive(Debug, Error)]
pub enum Error {
    /// An error during templating.
    #[error("rendering `{}`: {err}", .path.display())]
    Template { path: PathBuf, err: String },

    /// An error building a page URL.
    #[error(transparent)]
    UrlParse(#[from] url::ParseError),

    /// An error writing the output files.
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tag::Tag;
    use chrono::NaiveDate;

    fn site() -> Url {
        Url::parse("https://example.org/").unwrap()
    }

    fn post(slug: &str, day: u32, tags: &[&str]) -> Post {
        let site = site();
        Post {
            slug: slug.to_owned(),
            file_path: PathBuf::from("/out").join(slug).join("index.html"),
            url: site.join(&format!("{}/", slug)).unwrap(),
            title: slug.to_uppercase(),
            subtitle: None,
            date: NaiveDate::from_ymd_opt(2021, 1, day).unwrap(),
            tags: tags
                .iter()
                .map(|t| Tag::new(t, &site).unwrap().unwrap())
                .collect(),
            summary: None,
            hero: None,
            body: format!("<p>{}</p>", slug),
            excerpt: slug.to_owned(),
            reading_time: 1,
        }
    }

    fn template(source: &str) -> Template {
        let mut template = Template::default();
        template.parse(source).unwrap();
        template
    }

    #[test]
    fn test_index_pagination() -> Result<()> {
        let posts = vec![post("c", 3, &[]), post("b", 2, &[]), post("a", 1, &[])];
        let indices = index_posts(&site(), Path::new("/out"), &posts);
        assert_eq!(1, indices.len());

        let t = template("");
        let pages = indices[0].to_pages(2, &t)?;
        assert_eq!(2, pages.len());
        assert_eq!(PathBuf::from("/out/index.html"), pages[0].file_path);
        assert_eq!(PathBuf::from("/out/page/2/index.html"), pages[1].file_path);
        assert_eq!(None, pages[0].prev);
        assert_eq!(
            Some("https://example.org/page/2/"),
            pages[0].next.as_ref().map(Url::as_str)
        );
        assert_eq!(
            Some("https://example.org/"),
            pages[1].prev.as_ref().map(Url::as_str)
        );
        assert_eq!(None, pages[1].next);
        Ok(())
    }

    #[test]
    fn test_tag_indices() -> Result<()> {
        let posts = vec![
            post("c", 3, &["rust"]),
            post("b", 2, &["go", "rust"]),
            post("a", 1, &["rust"]),
        ];
        let indices = index_posts(&site(), Path::new("/out"), &posts);
        let tags: Vec<&str> = indices.iter().map(|i| i.tag.as_str()).collect();
        assert_eq!(vec!["", "go", "rust"], tags);

        let rust = &indices[2];
        assert_eq!("https://example.org/tags/rust/", rust.url.as_str());
        assert_eq!(
            vec!["c", "b", "a"],
            rust.posts.iter().map(|p| p.slug.as_str()).collect::<Vec<_>>()
        );

        let t = template("");
        let pages = rust.to_pages(2, &t)?;
        assert_eq!(
            PathBuf::from("/out/tags/rust/page/2/index.html"),
            pages[1].file_path
        );
        assert_eq!(
            Some("https://example.org/tags/rust/page/2/"),
            pages[0].next.as_ref().map(Url::as_str)
        );
        Ok(())
    }

    #[test]
    fn test_empty_index_has_one_page() -> Result<()> {
        let indices = index_posts(&site(), Path::new("/out"), &[]);
        let t = template("");
        let pages = indices[0].to_pages(10, &t)?;
        assert_eq!(1, pages.len());
        assert!(matches!(&pages[0].item, Value::Array(a) if a.is_empty()));
        Ok(())
    }

    #[test]
    fn test_post_neighbors() {
        let posts = vec![post("new", 3, &[]), post("mid", 2, &[]), post("old", 1, &[])];
        let t = template("");
        let pages: Vec<Page> = post_pages(&posts, &t).collect();
        assert_eq!(None, pages[0].prev);
        assert_eq!(
            Some("https://example.org/new/"),
            pages[1].prev.as_ref().map(Url::as_str)
        );
        assert_eq!(
            Some("https://example.org/old/"),
            pages[1].next.as_ref().map(Url::as_str)
        );
        assert_eq!(None, pages[2].next);
    }

    #[test]
    fn test_write_posts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let site = site();
        let mut posts = vec![post("b", 2, &["rust"]), post("a", 1, &[])];
        for p in posts.iter_mut() {
            p.file_path = dir.path().join(&p.slug).join("index.html");
        }

        let posts_template = template("{{.site_name}}{{.page_title}}|{{.item.body}}|{{if .next}}{{.next}}{{end}}");
        let index_template = template(
            "{{.tag}} {{.page_number}}/{{.total_pages}}:{{range .item}} {{.slug}}{{end}}",
        );
        let page_template = template("");
        let mut globals = HashMap::new();
        globals.insert("site_name".to_owned(), Value::String("S:".to_owned()));

        let writer = Writer {
            posts_template: &posts_template,
            index_template: &index_template,
            page_template: &page_template,
            site_url: &site,
            output_directory: dir.path(),
            index_page_size: 10,
            globals,
        };
        let written = writer.write_posts(&posts)?;
        assert_eq!(Written { posts: 2, index_pages: 2 }, written);

        let read = |p: &[&str]| {
            std::fs::read_to_string(p.iter().fold(dir.path().to_owned(), |acc, s| acc.join(s)))
                .unwrap()
        };
        assert_eq!(
            "S:B|<p>b</p>|https://example.org/a/",
            read(&["b", "index.html"])
        );
        assert_eq!(" 1/1: b a", read(&["index.html"]));
        assert_eq!("rust 1/1: b", read(&["tags", "rust", "index.html"]));
        Ok(())
    }
}
