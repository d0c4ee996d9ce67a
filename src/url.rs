//! Rewrites link targets found in markdown sources into output URLs.

use crate::parser::NOT_FOUND_SLUG;
use url::{ParseError, Url};

const MARKDOWN_EXTENSION: &str = ".md";
const BUNDLE_INDEX: &str = "/index.md";

/// Returns the URL of the rendered post or page with `slug`. The not-found
/// page is `404.html` at the site root so static hosts pick it up; everything
/// else gets its own directory.
pub fn page_url(site_url: &Url, slug: &str) -> std::result::Result<Url, ParseError> {
    match slug {
        NOT_FOUND_SLUG => site_url.join("404.html"),
        _ => site_url.join(&format!("{}/", slug)),
    }
}

/// A converted link target.
#[derive(Debug, PartialEq)]
pub struct Link {
    pub url: String,

    /// Whether the target lives on another host than the site.
    pub external: bool,
}

pub struct Converter<'a> {
    site_url: &'a Url,
    base: Url,
}

impl<'a> Converter<'a> {
    /// Constructs a new `Converter`
    ///
    /// # Arguments
    ///
    /// * `site_url` - the root URL of the site. Posts and pages are rendered
    ///   directly under it.
    /// * `base` - the path of the source file relative to its content
    ///   directory (e.g., `hello.md` or `bundle/index.md`), against which
    ///   relative targets are resolved.
    pub fn new(site_url: &'a Url, base: &str) -> Result<Converter<'a>> {
        Ok(Converter {
            site_url,
            base: site_url.join(base)?,
        })
    }

    // `bundle/index.md` => `bundle`, `post.md` => `post`
    fn source_slug(relative: &str) -> &str {
        let base = relative.trim_end_matches(BUNDLE_INDEX);
        if base != relative && !base.contains('/') {
            base
        } else {
            relative.trim_end_matches(MARKDOWN_EXTENSION)
        }
    }

    fn convert_absolute(&self, absolute: Url) -> Result<Url> {
        let mut bare = absolute.clone();
        bare.set_fragment(None);
        bare.set_query(None);

        if let Some(relative) = self.site_url.make_relative(&bare) {
            if !relative.starts_with("../") && relative.ends_with(MARKDOWN_EXTENSION) {
                let mut converted = page_url(self.site_url, Self::source_slug(&relative))?;
                converted.set_fragment(absolute.fragment());
                return Ok(converted);
            }
        }
        Ok(absolute)
    }

    fn convert_unknown(&self, url: &str) -> Result<Url> {
        match Url::parse(url) {
            Ok(absolute) => self.convert_absolute(absolute),
            Err(ParseError::RelativeUrlWithoutBase) => {
                self.convert_absolute(self.base.join(url)?)
            }
            Err(e) => Err(e),
        }
    }

    fn is_external(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
            && url.host_str() != self.site_url.host_str()
    }

    pub fn convert(&self, url: &str) -> Result<Link> {
        let converted = self.convert_unknown(url)?;
        Ok(Link {
            external: self.is_external(&converted),
            url: converted.to_string(),
        })
    }
}

type Result<T> = std::result::Result<T, ParseError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_convert_relative_post() -> Result<()> {
        fixture_basic("https://example.org/blog/relative/", "relative.md")
    }

    #[test]
    fn test_convert_relative_post_leading_dotslash() -> Result<()> {
        fixture_basic("https://example.org/blog/relative/", "./relative.md")
    }

    #[test]
    fn test_convert_relative_post_redundancies() -> Result<()> {
        fixture_basic("https://example.org/blog/relative/", "../blog/relative.md")
    }

    #[test]
    fn test_convert_relative_post_fragment() -> Result<()> {
        fixture_basic(
            "https://example.org/blog/relative/#usage",
            "relative.md#usage",
        )
    }

    #[test]
    fn test_convert_relative_asset() -> Result<()> {
        fixture_basic("https://example.org/blog/relative.jpg", "relative.jpg")
    }

    #[test]
    fn test_convert_relative_asset_leading_dotslash() -> Result<()> {
        fixture_basic("https://example.org/blog/relative.jpg", "./relative.jpg")
    }

    #[test]
    fn test_convert_relative_bundle() -> Result<()> {
        fixture_basic("https://example.org/blog/relative/", "relative/index.md")
    }

    #[test]
    fn test_convert_relative_bundle_asset() -> Result<()> {
        fixture(
            "relative/index.md",
            "https://example.org/blog/relative/image.jpg",
            "image.jpg",
        )
    }

    #[test]
    fn test_convert_relative_bundle_asset_leading_dotslash() -> Result<()> {
        fixture(
            "relative/index.md",
            "https://example.org/blog/relative/image.jpg",
            "./image.jpg",
        )
    }

    #[test]
    fn test_convert_from_bundle_to_post() -> Result<()> {
        fixture(
            "relative/index.md",
            "https://example.org/blog/other/",
            "../other.md",
        )
    }

    #[test]
    fn test_convert_not_found_page() -> Result<()> {
        fixture_basic("https://example.org/blog/404.html", "404.md")?;
        fixture_basic("https://example.org/blog/404.html#help", "./404.md#help")
    }

    #[test]
    fn test_page_url() -> Result<()> {
        let site = Url::parse("https://example.org/blog/")?;
        assert_eq!("https://example.org/blog/about/", page_url(&site, "about")?.as_str());
        assert_eq!("https://example.org/blog/404.html", page_url(&site, "404")?.as_str());
        Ok(())
    }

    #[test]
    fn test_convert_absolute_post() -> Result<()> {
        fixture_basic(
            "https://example.org/blog/absolute/",
            "https://example.org/blog/absolute.md",
        )
    }

    #[test]
    fn test_convert_absolute_asset_redundancies() -> Result<()> {
        fixture_basic(
            "https://example.org/blog/absolute.jpg",
            "https://example.org/blog/../blog/absolute.jpg",
        )
    }

    #[test]
    fn test_convert_remote_markdown() -> Result<()> {
        fixture_basic(
            "https://remote.org/absolute.md",
            "https://remote.org/absolute.md",
        )
    }

    #[test]
    fn test_convert_same_page_fragment() -> Result<()> {
        fixture_basic("https://example.org/blog/index/#fn1", "#fn1")
    }

    #[test]
    fn test_external() -> Result<()> {
        let site = Url::parse("https://example.org/blog/")?;
        let converter = Converter::new(&site, "index.md")?;
        assert!(converter.convert("https://remote.org/")?.external);
        assert!(!converter.convert("https://example.org/other/")?.external);
        assert!(!converter.convert("other.md")?.external);
        assert!(!converter.convert("mailto:someone@example.org")?.external);
        Ok(())
    }

    fn fixture_basic(wanted: &str, target: &str) -> Result<()> {
        fixture("index.md", wanted, target)
    }

    fn fixture(base: &str, wanted: &str, target: &str) -> Result<()> {
        assert_eq!(
            wanted,
            Converter::new(&Url::parse("https://example.org/blog/")?, base)?
                .convert(target)?
                .url,
        );
        Ok(())
    }
}
