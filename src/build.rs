//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site: parsing posts and pages
//! ([`crate::parser`]), rendering post, index and standalone pages
//! ([`crate::write`]), copying bundle assets and the static source directory
//! into the output directory, and generating the syntax stylesheet and the
//! Atom feed.

use crate::config::Config;
use crate::feed::{write_feed, Error as FeedError, FeedConfig};
use crate::highlight::{self, Error as HighlightError};
use crate::parser::{Error as ParseError, Parser};
use crate::post::{Page, Post};
use crate::util::copy_dir;
use crate::write::{globals, Error as WriteError, Writer, FEED_PATH};
use gtmpl::Template;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Marks an output directory as created by basalt. Only directories carrying
/// it (or empty ones) are cleaned before a build.
pub const WATERMARK: &str = ".basalt";

/// Counts of what a build produced.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub posts: usize,
    pub pages: usize,
    pub index_pages: usize,

    /// Bundle assets plus files copied from the static directory.
    pub static_files: usize,
}

/// Builds the site from a [`Config`] object. This calls into
/// [`Parser::parse_posts`], [`Writer::write_posts`], and [`write_feed`] which
/// do the heavy-lifting. Nothing in the output directory is touched until
/// every source file and template has parsed.
pub fn build_site(config: &Config) -> Result<BuildReport> {
    let parser = Parser::new(&config.site.url, &config.output_directory, config.drafts);

    // collect all posts and pages
    let (posts, bundle_files) = parser.parse_posts(&config.posts_source_directory)?;
    let pages = parser.parse_pages(&config.pages_source_directory)?;
    check_collisions(&posts, &pages)?;
    debug!(posts = posts.len(), pages = pages.len(), "parsed sources");

    // Parse the template files.
    let index_template = parse_template(&config.index_template)?;
    let posts_template = parse_template(&config.posts_template)?;
    let page_template = parse_template(&config.page_template)?;

    clean(&config.output_directory)?;

    // copy static directory; generated pages overwrite same-named files
    let static_files = copy_dir(&config.static_source_directory, &config.output_directory)?;

    // write the post, index and standalone pages
    let writer = Writer {
        posts_template: &posts_template,
        index_template: &index_template,
        page_template: &page_template,
        site_url: &config.site.url,
        output_directory: &config.output_directory,
        index_page_size: config.posts_per_page,
        globals: globals(config)?,
    };
    let written = writer.write_posts(&posts)?;
    let pages_written = writer.write_pages(&pages)?;

    // copy bundle assets next to their posts
    for (src, dst) in &bundle_files {
        if let Some(dir) = dst.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::copy(src, dst)?;
    }

    highlight::write_css(
        &config.output_directory,
        &config.highlight.light_theme,
        &config.highlight.dark_theme,
    )?;

    // create the atom feed
    write_feed(
        FeedConfig {
            title: config.site.title.clone(),
            id: config.site.url.to_string(),
            author: config.site.author.clone(),
            home_page: config.site.url.clone(),
            feed_url: config.site.url.join(FEED_PATH).map_err(WriteError::from)?,
        },
        &posts,
        File::create(config.output_directory.join(FEED_PATH))?,
    )?;

    let report = BuildReport {
        posts: written.posts,
        pages: pages_written,
        index_pages: written.index_pages,
        static_files: bundle_files.len() + static_files,
    };
    info!(
        posts = report.posts,
        pages = report.pages,
        index_pages = report.index_pages,
        static_files = report.static_files,
        output = %config.output_directory.display(),
        "built site"
    );
    Ok(report)
}

// Posts and pages share the output tree, so a page may not land on a post's
// output file.
fn check_collisions(posts: &[Post], pages: &[Page]) -> Result<()> {
    let post_files: HashSet<&Path> = posts.iter().map(|p| p.file_path.as_path()).collect();
    match pages.iter().find(|p| post_files.contains(p.file_path.as_path())) {
        Some(page) => Err(ParseError::DuplicateSlug(page.slug.clone()).into()),
        None => Ok(()),
    }
}

// Loads the template files, concatenates their contents, and parses the
// result into a template. Later files can use `{{define}}` blocks from earlier
// ones.
fn parse_template(template_files: &[PathBuf]) -> Result<Template> {
    let mut contents = String::new();
    for template_file in template_files {
        use std::io::Read;
        File::open(template_file)
            .map_err(|e| Error::OpenTemplateFile {
                path: template_file.to_owned(),
                err: e,
            })?
            .read_to_string(&mut contents)?;
        contents.push(' ');
    }

    let mut template = Template::default();
    template.parse(&contents).map_err(|e| Error::ParseTemplate {
        files: template_files.to_vec(),
        err: format!("{}", e),
    })?;
    Ok(template)
}

/// Empties `dir` for a fresh build and stamps it with the [`WATERMARK`].
/// Refuses to clean a non-empty directory that lacks the watermark, since it
/// likely wasn't created by basalt.
fn clean(dir: &Path) -> Result<()> {
    let clean_err = |err: io::Error| Error::Clean {
        path: dir.to_owned(),
        err,
    };

    match fs::read_dir(dir) {
        Ok(mut entries) => {
            if entries.next().is_some() {
                if !dir.join(WATERMARK).is_file() {
                    return Err(Error::Unmanaged(dir.to_owned()));
                }
                debug!(dir = %dir.display(), "cleaning output directory");
                fs::remove_dir_all(dir).map_err(clean_err)?;
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(clean_err(e)),
    }

    fs::create_dir_all(dir).map_err(clean_err)?;
    File::create(dir.join(WATERMARK)).map_err(clean_err)?;
    Ok(())
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can be during parsing, writing,
/// cleaning output directories, parsing template files, and other I/O.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned for errors during parsing.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Returned for errors writing posts and pages to disk as HTML files.
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Returned for I/O problems while cleaning output directories.
    #[error("cleaning directory `{}`: {err}", .path.display())]
    Clean {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    /// Returned when the output directory has content but no watermark.
    #[error(
        "refusing to clean `{}`: it is not empty and was not created by basalt (no `{}` file)",
        .0.display(),
        WATERMARK
    )]
    Unmanaged(PathBuf),

    /// Returned for I/O problems while opening template files.
    #[error("opening template file `{}`: {err}", .path.display())]
    OpenTemplateFile {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    /// Returned for errors parsing template files.
    #[error("parsing template {files:?}: {err}")]
    ParseTemplate { files: Vec<PathBuf>, err: String },

    /// Returned for errors generating the syntax stylesheet.
    #[error(transparent)]
    Highlight(#[from] HighlightError),

    /// Returned for errors writing the feed.
    #[error(transparent)]
    Feed(#[from] FeedError),

    /// Returned for other I/O errors.
    #[error(transparent)]
    Io(#[from] io::Error),
}
