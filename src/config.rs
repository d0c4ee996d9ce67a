//! Defines the [`Config`] type which is assembled from the project file
//! (`basalt.yaml`), the theme file (`theme/theme.yaml`) and command-line
//! [`Overrides`].

use serde::Deserialize;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// The name of the project file. [`Config::from_directory`] searches for it
/// in the given directory and then in each ancestor.
pub const PROJECT_FILE: &str = "basalt.yaml";

/// Overrides the tracking ID from the project file when set.
const TRACKING_ID_ENV: &str = "BASALT_TRACKING_ID";

#[derive(Deserialize)]
struct PageSize(usize);
impl Default for PageSize {
    fn default() -> Self {
        PageSize(10)
    }
}

#[derive(Deserialize)]
struct Project {
    site: Site,

    #[serde(default)]
    social: Social,

    #[serde(default)]
    analytics: Analytics,

    #[serde(default)]
    build: BuildSection,

    #[serde(default)]
    highlight: Highlight,
}

#[derive(Deserialize, Default)]
struct Analytics {
    #[serde(default)]
    tracking_id: Option<String>,
}

#[derive(Deserialize, Default)]
struct BuildSection {
    #[serde(default)]
    posts_per_page: PageSize,

    #[serde(default)]
    output_directory: Option<PathBuf>,
}

#[derive(Deserialize)]
struct Theme {
    index_template: Vec<PathBuf>,
    posts_template: Vec<PathBuf>,
    page_template: Vec<PathBuf>,
}

/// Site metadata. Rendered into every page and into the feed.
#[derive(Deserialize, Clone, Debug)]
pub struct Site {
    pub title: String,

    /// The root URL of the published site. Always ends in a slash once the
    /// configuration is loaded.
    pub url: Url,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub author: Option<Author>,
}

/// The site's author, used for the feed and the page metadata.
#[derive(Deserialize, Clone, Debug)]
pub struct Author {
    pub name: String,

    #[serde(default)]
    pub email: Option<String>,
}

/// Social handles. Each is optional; templates render only the ones present.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Social {
    #[serde(default)]
    pub twitter: Option<String>,

    #[serde(default)]
    pub github: Option<String>,

    #[serde(default)]
    pub linkedin: Option<String>,
}

/// Names of the syntect themes used to generate the syntax stylesheet.
#[derive(Deserialize, Clone, Debug)]
pub struct Highlight {
    #[serde(default = "Highlight::default_light")]
    pub light_theme: String,

    #[serde(default = "Highlight::default_dark")]
    pub dark_theme: String,
}

impl Highlight {
    fn default_light() -> String {
        String::from("InspiredGitHub")
    }

    fn default_dark() -> String {
        String::from("base16-ocean.dark")
    }
}

impl Default for Highlight {
    fn default() -> Self {
        Highlight {
            light_theme: Self::default_light(),
            dark_theme: Self::default_dark(),
        }
    }
}

/// Command-line settings that take precedence over the project file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    /// Replaces `build.output_directory`.
    pub output_directory: Option<PathBuf>,

    /// Replaces `site.url`. The development server points this at
    /// `localhost`.
    pub base_url: Option<Url>,

    /// Include posts marked `draft: true`.
    pub drafts: bool,
}

/// The fully resolved build configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub site: Site,
    pub social: Social,
    pub tracking_id: Option<String>,
    pub highlight: Highlight,

    /// The project file this configuration was loaded from.
    pub project_file: PathBuf,
    pub project_root: PathBuf,
    pub theme_directory: PathBuf,
    pub posts_source_directory: PathBuf,
    pub pages_source_directory: PathBuf,
    pub static_source_directory: PathBuf,
    pub output_directory: PathBuf,

    pub index_template: Vec<PathBuf>,
    pub posts_template: Vec<PathBuf>,
    pub page_template: Vec<PathBuf>,

    pub posts_per_page: usize,
    pub drafts: bool,
}

impl Config {
    /// Searches `dir` and its ancestors for [`PROJECT_FILE`] and loads the
    /// first one found. A relative `dir` is resolved against the current
    /// directory first, so the search reaches its real parents.
    pub fn from_directory(dir: &Path, overrides: Overrides) -> Result<Config> {
        let start = dir.canonicalize().map_err(|err| Error::Resolve {
            path: dir.to_owned(),
            err,
        })?;
        for ancestor in start.ancestors() {
            let path = ancestor.join(PROJECT_FILE);
            if path.is_file() {
                return Config::from_project_file(&path, overrides);
            }
        }
        Err(Error::NotFound(dir.to_owned()))
    }

    /// Loads the project file at `path` and the theme file in the `theme`
    /// directory next to it.
    pub fn from_project_file(path: &Path, overrides: Overrides) -> Result<Config> {
        let project: Project = load_yaml(path, "project")?;
        let project_root = match path.parent() {
            Some(parent) if parent.as_os_str().is_empty() => PathBuf::from("."),
            Some(parent) => parent.to_owned(),
            None => return Err(Error::NoParent(path.to_owned())),
        };

        let theme_directory = project_root.join("theme");
        let theme: Theme = load_yaml(&theme_directory.join("theme.yaml"), "theme")?;
        let in_theme = |files: &[PathBuf]| -> Vec<PathBuf> {
            files.iter().map(|f| theme_directory.join(f)).collect()
        };

        let mut site = project.site;
        if let Some(base_url) = overrides.base_url {
            site.url = base_url;
        }
        with_trailing_slash(&mut site.url);

        let output_directory = match overrides.output_directory {
            Some(dir) => dir,
            None => project_root.join(
                project
                    .build
                    .output_directory
                    .unwrap_or_else(|| PathBuf::from("public")),
            ),
        };

        let tracking_id = match std::env::var(TRACKING_ID_ENV) {
            Ok(id) if !id.is_empty() => Some(id),
            _ => project.analytics.tracking_id,
        };

        Ok(Config {
            site,
            social: project.social,
            tracking_id,
            highlight: project.highlight,
            project_file: path.to_owned(),
            posts_source_directory: project_root.join("content").join("posts"),
            pages_source_directory: project_root.join("content").join("pages"),
            static_source_directory: project_root.join("static"),
            output_directory,
            index_template: in_theme(&theme.index_template),
            posts_template: in_theme(&theme.posts_template),
            page_template: in_theme(&theme.page_template),
            theme_directory,
            project_root,
            posts_per_page: match project.build.posts_per_page.0 {
                0 => PageSize::default().0,
                n => n,
            },
            drafts: overrides.drafts,
        })
    }
}

// `Url::join` treats the last segment as a file name unless the path ends in
// a slash, so every join against the site URL depends on this.
fn with_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
}

fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path, kind: &'static str) -> Result<T> {
    let file = File::open(path).map_err(|err| Error::Open {
        kind,
        path: path.to_owned(),
        err,
    })?;
    serde_yaml::from_reader(file).map_err(|err| Error::Yaml {
        kind,
        path: path.to_owned(),
        err,
    })
}

/// The result of loading a [`Config`].
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a problem loading the configuration.
#[derive(Debug, Error)]
pub enum Error {
    /// Returned when no project file exists in the directory or its
    /// ancestors.
    #[error("could not find `{}` in `{}` or any parent directory", PROJECT_FILE, .0.display())]
    NotFound(PathBuf),

    /// Returned when the site directory doesn't exist or can't be resolved
    /// to an absolute path.
    #[error("resolving site directory `{}`: {err}", .path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    /// Returned when the project file path has no parent directory.
    #[error("can't get parent directory for project file `{}`", .0.display())]
    NoParent(PathBuf),

    /// Returned when a project or theme file can't be opened.
    #[error("opening {kind} file `{}`: {err}", .path.display())]
    Open {
        kind: &'static str,
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    /// Returned when a project or theme file isn't valid YAML or is missing
    /// required fields.
    #[error("loading {kind} file `{}`: {err}", .path.display())]
    Yaml {
        kind: &'static str,
        path: PathBuf,
        #[source]
        err: serde_yaml::Error,
    },
}
