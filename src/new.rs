//! Scaffolds new post source files.

use chrono::NaiveDate;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Writes `{posts_directory}/{slug}.md` where the slug is derived from
/// `title`, with front matter for `title`, `date` and an empty tag list. The
/// posts directory is created if needed; an existing file is never
/// overwritten. Returns the path of the new file.
pub fn new_post(posts_directory: &Path, title: &str, date: NaiveDate) -> Result<PathBuf> {
    let slug = slug::slugify(title);
    if slug.is_empty() {
        return Err(Error::EmptySlug(title.to_owned()));
    }

    fs::create_dir_all(posts_directory)?;
    let path = posts_directory.join(format!("{}.md", slug));
    let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(Error::Exists(path)),
        Err(e) => return Err(e.into()),
    };
    file.write_all(frontmatter(title, date)?.as_bytes())?;

    info!(path = %path.display(), "created post");
    Ok(path)
}

fn frontmatter(title: &str, date: NaiveDate) -> Result<String> {
    // Quoting through serde_yaml keeps titles with `:` or `#` intact.
    let title = serde_yaml::to_string(title)?;
    let title = title.trim_start_matches("---").trim();
    Ok(format!(
        "---\ntitle: {}\ndate: {}\ntags: []\n---\n\nWrite something here.\n\n<!-- more -->\n",
        title,
        date.format("%Y-%m-%d"),
    ))
}

/// The result of scaffolding a post.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem scaffolding a post.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when a post with the same slug already exists.
    #[error("`{}` already exists", .0.display())]
    Exists(PathBuf),

    /// Returned when the title has no characters usable in a slug.
    #[error("can't derive a file name from title {0:?}")]
    EmptySlug(String),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::Parser;
    use url::Url;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
    }

    #[test]
    fn test_new_post() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let posts = dir.path().join("content").join("posts");
        let path = new_post(&posts, "Hello, World: Part 2", date())?;
        assert_eq!(posts.join("hello-world-part-2.md"), path);

        let contents = fs::read_to_string(&path)?;
        assert!(contents.starts_with("---\ntitle: "));
        assert!(contents.contains("date: 2024-02-29\n"));
        assert!(contents.contains("tags: []\n"));
        Ok(())
    }

    #[test]
    fn test_new_post_parses() -> Result<()> {
        let dir = tempfile::tempdir()?;
        new_post(dir.path(), "Hello, World: Part 2", date())?;

        let site = Url::parse("https://example.org/").unwrap();
        let output = dir.path().join("public");
        let (posts, _) = Parser::new(&site, &output, false)
            .parse_posts(dir.path())
            .unwrap();
        assert_eq!(1, posts.len());
        assert_eq!("Hello, World: Part 2", posts[0].title);
        assert_eq!(date(), posts[0].date);
        assert!(posts[0].tags.is_empty());
        Ok(())
    }

    #[test]
    fn test_refuses_to_overwrite() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = new_post(dir.path(), "Twice", date())?;
        fs::write(&path, "edited")?;
        match new_post(dir.path(), "Twice", date()) {
            Err(Error::Exists(existing)) => assert_eq!(path, existing),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!("edited", fs::read_to_string(&path)?);
        Ok(())
    }

    #[test]
    fn test_empty_slug() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(new_post(dir.path(), "!!!", date()), Err(Error::EmptySlug(_))));
    }
}
