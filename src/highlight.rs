//! Syntax highlighting for fenced code blocks. Code is annotated with CSS
//! classes rather than inline styles, so the colors come from a stylesheet
//! generated by [`write_css`] with a light theme and a dark theme.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use syntect::highlighting::ThemeSet;
use syntect::html::{css_for_theme_with_class_style, ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use thiserror::Error;

const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "hl-" };

/// The location of the stylesheet relative to the output directory.
pub const CSS_PATH: &str = "css/syntax.css";

static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
static THEME_SET: OnceLock<ThemeSet> = OnceLock::new();

fn syntax_set() -> &'static SyntaxSet {
    SYNTAX_SET.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn theme_set() -> &'static ThemeSet {
    THEME_SET.get_or_init(ThemeSet::load_defaults)
}

/// Highlights `code` written in `lang` (a fence token such as `rust` or an
/// extension such as `rs`). Returns `None` when the language is unknown so
/// the caller can fall back to a plain code block.
pub fn highlight(code: &str, lang: &str) -> Option<String> {
    let ss = syntax_set();
    let syntax = ss
        .find_syntax_by_token(lang)
        .or_else(|| ss.find_syntax_by_extension(lang))?;

    let mut generator = ClassedHTMLGenerator::new_with_class_style(syntax, ss, CLASS_STYLE);
    for line in LinesWithEndings::from(code) {
        if generator
            .parse_html_for_line_which_includes_newline(line)
            .is_err()
        {
            return None;
        }
    }

    Some(format!(
        r#"<pre class="highlight"><code class="language-{}">{}</code></pre>"#,
        lang,
        generator.finalize()
    ))
}

/// Writes the stylesheet for highlighted code into `output_directory` at
/// [`CSS_PATH`]: the `light` theme first, then the `dark` theme inside a
/// `prefers-color-scheme: dark` media query.
pub fn write_css(output_directory: &Path, light: &str, dark: &str) -> Result<PathBuf> {
    let path = output_directory.join(CSS_PATH);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(&path, stylesheet(light, dark)?)?;
    Ok(path)
}

fn stylesheet(light: &str, dark: &str) -> Result<String> {
    let mut css = theme_css(light)?;
    css.push_str("\n\n/* Dark theme */\n@media (prefers-color-scheme: dark) {\n");
    for line in theme_css(dark)?.lines() {
        if !line.trim().is_empty() {
            css.push_str("  ");
            css.push_str(line);
            css.push('\n');
        }
    }
    css.push_str("}\n");
    Ok(css)
}

fn theme_css(name: &str) -> Result<String> {
    let theme = theme_set()
        .themes
        .get(name)
        .ok_or_else(|| Error::UnknownTheme(name.to_owned()))?;
    css_for_theme_with_class_style(theme, CLASS_STYLE).map_err(|e| Error::Css(e.to_string()))
}

/// The result of a fallible stylesheet operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error generating the syntax stylesheet.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when the configured theme isn't one of syntect's defaults.
    #[error("unknown highlight theme `{0}`")]
    UnknownTheme(String),

    /// Returned when syntect can't render a theme as CSS.
    #[error("generating highlight CSS: {0}")]
    Css(String),

    /// Returned when the stylesheet can't be written.
    #[error(transparent)]
    Io(#[from] io::Error),
}
