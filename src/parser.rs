//! Defines the [`Parser`] and [`Error`] types: the logic for reading posts and
//! pages from the file system into memory. See [`Post::to_value`] and
//! [`Post::summarize`] for how posts are then converted into template values.

use std::{
    collections::HashSet,
    fs::{read_dir, DirEntry, File},
    io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
    markdown::{self, Rendered},
    post::{Page, Post},
    tag::Tag,
    url::{page_url, Converter as LinkConverter},
};

const MARKDOWN_EXTENSION: &str = ".md";
const BUNDLE_INDEX: &str = "index.md";
const FENCE: &str = "---";

/// Words per minute used to estimate reading time.
const READING_SPEED: usize = 200;

/// The slug of the page rendered as the site's "not found" page.
pub const NOT_FOUND_SLUG: &str = "404";

/// Parses [`Post`] and [`Page`] objects from source files.
pub struct Parser<'a> {
    /// `site_url` is the root URL of the site. Post and page URLs are
    /// `{site_url}/{slug}/`, and tag URLs are `{site_url}/tags/{tag}/`.
    site_url: &'a Url,

    /// `output_directory` is the directory in which pages will be rendered.
    output_directory: &'a Path,

    /// Whether to keep posts marked as drafts.
    drafts: bool,
}

/// Everything a post or page has in common once its source file is read.
struct Source {
    slug: String,
    frontmatter: Frontmatter,
    rendered: Rendered,
    hero: Option<Url>,
    reading_time: usize,
}

impl<'a> Parser<'a> {
    /// Constructs a new parser. See fields on [`Parser`] for argument
    /// descriptions.
    pub fn new(site_url: &'a Url, output_directory: &'a Path, drafts: bool) -> Parser<'a> {
        Parser {
            site_url,
            output_directory,
            drafts,
        }
    }

    /// Searches a provided `source_directory` for post files (extension =
    /// `.md`) and post bundles (directories containing an `index.md`) and
    /// returns a list of [`Post`] objects sorted by date (most recent first),
    /// along with the bundles' other files. A missing directory yields no
    /// posts. Each post file must be structured as follows:
    ///
    /// 1. Initial front matter fence (`---`)
    /// 2. YAML (or JSON) front matter with fields `title`, `date`, and
    ///    optionally `subtitle`, `tags`, `summary`, `hero`, `draft`
    /// 3. Terminal front matter fence (`---`)
    /// 4. Post body
    ///
    /// For example:
    ///
    /// ```md
    /// ---
    /// title: Hello, world!
    /// date: 2021-04-16
    /// tags: [greet]
    /// ---
    /// # Hello
    ///
    /// World
    /// ```
    pub fn parse_posts(&self, source_directory: &Path) -> Result<Posts> {
        let mut posts = Vec::new();
        let mut static_files = Vec::new();
        let mut slugs = HashSet::new();

        for entry in source_entries(source_directory)? {
            let relative = PathBuf::from(entry.file_name());
            let post = if is_bundle(&entry)? {
                self.parse_post_bundle(source_directory, &relative, &mut static_files)?
            } else if is_markdown(&entry)? {
                self.parse_post(source_directory, &relative)?
            } else {
                continue;
            };

            let post = match post {
                Some(post) => post,
                None => continue,
            };
            if !slugs.insert(post.slug.clone()) {
                return Err(Error::DuplicateSlug(post.slug));
            }
            posts.push(post);
        }

        posts.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.slug.cmp(&b.slug)));
        Ok((posts, static_files))
    }

    /// Parses every `.md` file in `source_directory` as a standalone
    /// [`Page`], sorted by slug. A missing directory yields no pages.
    pub fn parse_pages(&self, source_directory: &Path) -> Result<Vec<Page>> {
        let mut pages = Vec::new();
        for entry in source_entries(source_directory)? {
            if !is_markdown(&entry)? {
                continue;
            }
            let relative = PathBuf::from(entry.file_name());
            let source = annotate(&relative, self.parse_source(source_directory, &relative))?;
            let (file_path, url) = self.page_location(&source.slug)?;
            debug!(slug = %source.slug, "parsed page");
            pages.push(Page {
                file_path,
                url,
                title: source.frontmatter.title,
                subtitle: source.frontmatter.subtitle,
                summary: source.frontmatter.summary,
                hero: source.hero,
                body: source.rendered.html,
                excerpt: source.rendered.excerpt,
                slug: source.slug,
            });
        }
        pages.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(pages)
    }

    fn parse_post_bundle(
        &self,
        posts_source_directory: &Path,
        relative_path: &Path,
        static_files: &mut Vec<StaticFile>,
    ) -> Result<Option<Post>> {
        // We want to make sure we can parse a post before we mutate
        // `static_files`
        let post = match self.parse_post(posts_source_directory, &relative_path.join(BUNDLE_INDEX))?
        {
            Some(post) => post,
            None => return Ok(None),
        };

        // Mutate `static_files` only after we've confirmed that we've parsed a
        // valid post.
        use walkdir::WalkDir;
        let abs = posts_source_directory.join(relative_path);
        for result in WalkDir::new(&abs) {
            let entry = result?;
            if entry.file_type().is_file() && entry.path() != abs.join(BUNDLE_INDEX) {
                // strip_prefix can't fail since `abs` is always an ancestor
                // of the entry path
                let relative = entry.path().strip_prefix(&abs).unwrap_or(entry.path());
                static_files.push((
                    entry.path().to_owned(),
                    self.output_directory.join(&post.slug).join(relative),
                ));
            }
        }

        Ok(Some(post))
    }

    /// Parses a single [`Post`] from the file at `relative_path` under
    /// `posts_source_directory`. Returns `None` for drafts unless drafts
    /// are enabled.
    fn parse_post(&self, posts_source_directory: &Path, relative_path: &Path) -> Result<Option<Post>> {
        annotate(relative_path, self._parse_post(posts_source_directory, relative_path))
    }

    fn _parse_post(&self, posts_source_directory: &Path, relative_path: &Path) -> Result<Option<Post>> {
        let source = self.parse_source(posts_source_directory, relative_path)?;
        if source.frontmatter.draft && !self.drafts {
            debug!(slug = %source.slug, "skipping draft");
            return Ok(None);
        }

        let date = parse_date(source.frontmatter.date.as_deref().ok_or(Error::MissingDate)?)?;
        let tags = source
            .frontmatter
            .tags
            .iter()
            .filter_map(|t| Tag::new(t, self.site_url))
            .collect::<std::result::Result<HashSet<Tag>, url::ParseError>>()?;

        let url = self.site_url.join(&format!("{}/", source.slug))?;
        debug!(slug = %source.slug, %date, "parsed post");
        Ok(Some(Post {
            file_path: self.output_directory.join(&source.slug).join("index.html"),
            url,
            title: source.frontmatter.title,
            subtitle: source.frontmatter.subtitle,
            date,
            tags,
            summary: source.frontmatter.summary,
            hero: source.hero,
            body: source.rendered.html,
            excerpt: source.rendered.excerpt,
            reading_time: source.reading_time,
            slug: source.slug,
        }))
    }

    fn parse_source(&self, source_directory: &Path, relative_path: &Path) -> Result<Source> {
        use std::io::Read;
        let mut contents = String::new();
        File::open(source_directory.join(relative_path))?.read_to_string(&mut contents)?;

        let (yaml, body) = split_frontmatter(&contents)?;
        let frontmatter: Frontmatter = serde_yaml::from_str(yaml)?;

        let slug = slug_for(relative_path)?;
        let source_path = source_path_for(relative_path)?;
        let (_, url) = self.page_location(&slug)?;

        let hero = match &frontmatter.hero {
            Some(hero) if !hero.is_empty() => Some(Url::parse(
                &LinkConverter::new(self.site_url, &source_path)?
                    .convert(hero)?
                    .url,
            )?),
            _ => None,
        };

        let rendered = markdown::to_html(self.site_url, &source_path, body, url.as_str())?;
        Ok(Source {
            slug,
            frontmatter,
            rendered,
            hero,
            reading_time: reading_time(body),
        })
    }

    /// Returns the output file and URL for a page with `slug`, laid out as
    /// [`page_url`] describes.
    fn page_location(&self, slug: &str) -> Result<(PathBuf, Url)> {
        let file_path = match slug {
            NOT_FOUND_SLUG => self.output_directory.join("404.html"),
            _ => self.output_directory.join(slug).join("index.html"),
        };
        Ok((file_path, page_url(self.site_url, slug)?))
    }
}

/// Splits a source file into its front matter and its body. The front
/// matter is delimited by `---` lines, the first of which must be the first
/// line of the file.
fn split_frontmatter(input: &str) -> Result<(&str, &str)> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let mut lines = input.split_inclusive('\n');
    let first = lines.next().ok_or(Error::FrontmatterMissingStartFence)?;
    if first.trim_end() != FENCE {
        return Err(Error::FrontmatterMissingStartFence);
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        if line.trim_end() == FENCE {
            return Ok((&input[yaml_start..offset], &input[offset + line.len()..]));
        }
        offset += line.len();
    }
    Err(Error::FrontmatterMissingEndFence)
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_date(date: &str) -> Result<NaiveDate> {
    let date = date.trim();
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(date).map(|d| d.date_naive()))
        .map_err(|_| Error::InvalidDate(date.to_owned()))
}

fn reading_time(body: &str) -> usize {
    let words = body.split_whitespace().count();
    std::cmp::max(1, (words + READING_SPEED - 1) / READING_SPEED)
}

// `foo.md` => `foo`, `foo/index.md` => `foo`
fn slug_for(relative_path: &Path) -> Result<String> {
    let path = if relative_path.ends_with(BUNDLE_INDEX) {
        relative_path.parent().unwrap_or(relative_path)
    } else {
        relative_path
    };
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| Error::InvalidFileName(relative_path.to_owned()))
}

// The source path with `/` separators, as used to resolve relative links.
fn source_path_for(relative_path: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in relative_path.components() {
        parts.push(
            component
                .as_os_str()
                .to_str()
                .ok_or_else(|| Error::InvalidFileName(relative_path.to_owned()))?,
        );
    }
    Ok(parts.join("/"))
}

fn source_entries(dir: &Path) -> Result<Vec<DirEntry>> {
    let entries = match read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut entries = entries.collect::<io::Result<Vec<DirEntry>>>()?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

fn is_bundle(entry: &DirEntry) -> io::Result<bool> {
    Ok(entry.file_type()?.is_dir() && entry.path().join(BUNDLE_INDEX).is_file())
}

fn is_markdown(entry: &DirEntry) -> io::Result<bool> {
    Ok(entry.file_type()?.is_file()
        && entry.file_name().to_string_lossy().ends_with(MARKDOWN_EXTENSION))
}

fn annotate<T>(relative_path: &Path, result: Result<T>) -> Result<T> {
    result.map_err(|e| Error::Annotated(format!("parsing `{}`", relative_path.display()), Box::new(e)))
}

#[derive(Deserialize, Clone, Debug)]
struct Frontmatter {
    #[serde(alias = "Title")]
    title: String,

    #[serde(default, alias = "Subtitle")]
    subtitle: Option<String>,

    /// Required for posts, ignored for pages.
    #[serde(default, alias = "Date")]
    date: Option<String>,

    #[serde(default, alias = "Tags")]
    tags: Vec<String>,

    #[serde(default, alias = "Summary", alias = "description")]
    summary: Option<String>,

    #[serde(default, alias = "Hero", alias = "hero_image", alias = "heroImage")]
    hero: Option<String>,

    #[serde(default, alias = "Draft")]
    draft: bool,
}

pub type Posts = (Vec<Post>, Vec<StaticFile>);

/// A file to copy: source path and output path.
pub type StaticFile = (PathBuf, PathBuf);

/// Represents the result of a [`Post`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing a [`Post`] or [`Page`].
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when a source file is missing its starting front matter
    /// fence (`---`).
    #[error("source must begin with `---`")]
    FrontmatterMissingStartFence,

    /// Returned when a source file is missing its terminal front matter
    /// fence (`---` i.e., the starting fence was found but the ending one was
    /// missing).
    #[error("missing closing `---`")]
    FrontmatterMissingEndFence,

    /// Returned when there was an error parsing the front matter as YAML.
    #[error(transparent)]
    DeserializeYaml(#[from] serde_yaml::Error),

    /// Returned when a post has no `date`.
    #[error("missing field `date`")]
    MissingDate,

    /// Returned when a post's `date` isn't `YYYY-MM-DD` or RFC 3339.
    #[error("invalid date `{0}`; expected YYYY-MM-DD or RFC 3339")]
    InvalidDate(String),

    /// Returned when there is a problem parsing URLs.
    #[error(transparent)]
    UrlParse(#[from] url::ParseError),

    /// Returned for other I/O errors.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Returned for WalkDir I/O errors.
    #[error(transparent)]
    WalkDir(#[from] walkdir::Error),

    /// Returned when a source file name isn't valid UTF-8 or is empty.
    #[error("invalid file name: {0:?}")]
    InvalidFileName(PathBuf),

    /// Returned when two sources resolve to the same slug (e.g., `foo.md`
    /// and `foo/index.md`, or a post and a page both named `foo`).
    #[error("more than one post or page has the slug `{0}`")]
    DuplicateSlug(String),

    /// An error with an annotation.
    #[error("{0}: {1}")]
    Annotated(String, #[source] Box<Error>),
}

impl From<markdown::Error> for Error {
    fn from(err: markdown::Error) -> Error {
        match err {
            markdown::Error::Io(e) => Error::Io(e),
            markdown::Error::UrlParse(e) => Error::UrlParse(e),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    struct Fixture {
        dir: tempfile::TempDir,
        site_url: Url,
    }

    impl Fixture {
        fn new() -> Fixture {
            Fixture {
                dir: tempfile::tempdir().unwrap(),
                site_url: Url::parse("https://example.org/").unwrap(),
            }
        }

        fn write(&self, relative: &str, contents: &str) {
            let path = self.dir.path().join("posts").join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }

        fn parse(&self, drafts: bool) -> Result<Posts> {
            let output = self.dir.path().join("public");
            Parser::new(&self.site_url, &output, drafts).parse_posts(&self.dir.path().join("posts"))
        }
    }

    #[test]
    fn test_split_frontmatter() -> Result<()> {
        let (yaml, body) = split_frontmatter("---\ntitle: x\n---\nbody --- text\n")?;
        assert_eq!("title: x\n", yaml);
        assert_eq!("body --- text\n", body);
        Ok(())
    }

    #[test]
    fn test_split_frontmatter_crlf() -> Result<()> {
        let (yaml, body) = split_frontmatter("---\r\ntitle: x\r\n---\r\nbody")?;
        assert_eq!("title: x\r\n", yaml);
        assert_eq!("body", body);
        Ok(())
    }

    #[test]
    fn test_split_frontmatter_fences() {
        assert!(matches!(
            split_frontmatter("title: x\n---\n"),
            Err(Error::FrontmatterMissingStartFence)
        ));
        assert!(matches!(
            split_frontmatter("---\ntitle: x\n"),
            Err(Error::FrontmatterMissingEndFence)
        ));
    }

    #[test]
    fn test_parse_date() -> Result<()> {
        assert_eq!(NaiveDate::from_ymd_opt(2021, 4, 16).unwrap(), parse_date("2021-04-16")?);
        assert_eq!(
            NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
            parse_date("2023-01-02T10:00:00Z")?
        );
        assert!(matches!(parse_date("yesterday"), Err(Error::InvalidDate(_))));
        Ok(())
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(1, reading_time(""));
        assert_eq!(1, reading_time(&"word ".repeat(200)));
        assert_eq!(2, reading_time(&"word ".repeat(201)));
    }

    #[test]
    fn test_parse_posts() -> Result<()> {
        let fixture = Fixture::new();
        fixture.write(
            "simple.md",
            "---\nTitle: Simple\nDate: 2019-01-01\nTags: [Reason, OCaml]\n---\nToday is the first day.\n",
        );
        fixture.write(
            "newer.md",
            "---\n{\"title\": \"Newer\", \"date\": \"2020-05-01T00:00:00Z\", \"subtitle\": \"JSON front matter\"}\n---\nLater.\n",
        );
        fixture.write("notes.txt", "ignored");

        let (posts, static_files) = fixture.parse(false)?;
        assert!(static_files.is_empty());
        assert_eq!(
            vec!["newer", "simple"],
            posts.iter().map(|p| p.slug.as_str()).collect::<Vec<_>>()
        );

        let newer = &posts[0];
        assert_eq!("Newer", newer.title);
        assert_eq!(Some("JSON front matter"), newer.subtitle.as_deref());
        assert_eq!("https://example.org/newer/", newer.url.as_str());
        assert_eq!(
            fixture.dir.path().join("public").join("newer").join("index.html"),
            newer.file_path
        );

        let simple = &posts[1];
        assert_eq!("<p>Today is the first day.</p>", simple.body);
        assert_eq!("Today is the first day.", simple.excerpt);
        assert_eq!(1, simple.reading_time);
        let mut tags: Vec<&str> = simple.tags.iter().map(|t| t.name.as_str()).collect();
        tags.sort_unstable();
        assert_eq!(vec!["ocaml", "reason"], tags);
        Ok(())
    }

    #[test]
    fn test_parse_bundle() -> Result<()> {
        let fixture = Fixture::new();
        fixture.write(
            "trip/index.md",
            "---\ntitle: Trip\ndate: 2020-01-01\nhero: hero.jpg\n---\n![Beach](beach.jpg)\n",
        );
        fixture.write("trip/hero.jpg", "jpg");
        fixture.write("trip/beach.jpg", "jpg");

        let (posts, mut static_files) = fixture.parse(false)?;
        assert_eq!(1, posts.len());
        assert_eq!("trip", posts[0].slug);
        assert_eq!(
            Some("https://example.org/trip/hero.jpg"),
            posts[0].hero.as_ref().map(Url::as_str)
        );
        assert!(posts[0]
            .body
            .contains(r#"<img src="https://example.org/trip/beach.jpg" alt="Beach" />"#));

        static_files.sort();
        let output = fixture.dir.path().join("public").join("trip");
        assert_eq!(
            vec![output.join("beach.jpg"), output.join("hero.jpg")],
            static_files.into_iter().map(|(_, dst)| dst).collect::<Vec<_>>()
        );
        Ok(())
    }

    #[test]
    fn test_drafts() -> Result<()> {
        let fixture = Fixture::new();
        fixture.write("wip.md", "---\ntitle: WIP\ndate: 2020-01-01\ndraft: true\n---\n");
        assert!(fixture.parse(false)?.0.is_empty());
        assert_eq!(1, fixture.parse(true)?.0.len());
        Ok(())
    }

    #[test]
    fn test_duplicate_slug() {
        let fixture = Fixture::new();
        fixture.write("same.md", "---\ntitle: A\ndate: 2020-01-01\n---\n");
        fixture.write("same/index.md", "---\ntitle: B\ndate: 2020-01-02\n---\n");
        match fixture.parse(false) {
            Err(Error::DuplicateSlug(slug)) => assert_eq!("same", slug),
            other => panic!("unexpected result: {:?}", other.map(|(posts, _)| posts.len())),
        }
    }

    #[test]
    fn test_missing_date_is_annotated() {
        let fixture = Fixture::new();
        fixture.write("undated.md", "---\ntitle: Undated\n---\n");
        match fixture.parse(false) {
            Err(Error::Annotated(annotation, err)) => {
                assert_eq!("parsing `undated.md`", annotation);
                assert!(matches!(*err, Error::MissingDate));
            }
            other => panic!("unexpected result: {:?}", other.map(|(posts, _)| posts.len())),
        }
    }

    #[test]
    fn test_missing_directory() -> Result<()> {
        let fixture = Fixture::new();
        assert!(fixture.parse(false)?.0.is_empty());
        Ok(())
    }

    #[test]
    fn test_parse_pages() -> Result<()> {
        let fixture = Fixture::new();
        let pages_dir = fixture.dir.path().join("pages");
        fs::create_dir_all(&pages_dir).unwrap();
        fs::write(pages_dir.join("about.md"), "---\ntitle: About\n---\nHi.\n").unwrap();
        fs::write(pages_dir.join("404.md"), "---\ntitle: Not found\n---\nNope.\n").unwrap();

        let output = fixture.dir.path().join("public");
        let pages = Parser::new(&fixture.site_url, &output, false).parse_pages(&pages_dir)?;
        assert_eq!(2, pages.len());
        assert_eq!("404", pages[0].slug);
        assert_eq!(output.join("404.html"), pages[0].file_path);
        assert_eq!("https://example.org/404.html", pages[0].url.as_str());
        assert_eq!("about", pages[1].slug);
        assert_eq!("https://example.org/about/", pages[1].url.as_str());
        Ok(())
    }
}
