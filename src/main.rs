use anyhow::{Context, Result};
use basalt::build::build_site;
use basalt::config::{Config, Overrides};
use basalt::new::new_post;
use basalt::serve::{serve, DEFAULT_PORT};
use clap::{crate_version, App, AppSettings, Arg, ArgMatches, SubCommand};
use std::path::{Path, PathBuf};
use url::Url;

fn site_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("site")
        .long("site")
        .short("s")
        .takes_value(true)
        .value_name("DIR")
        .help("Site directory; basalt.yaml is searched for here and in its parents [default: .]")
}

fn drafts_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("drafts")
        .long("drafts")
        .help("Include posts marked `draft: true`")
}

fn site_directory(matches: &ArgMatches) -> PathBuf {
    PathBuf::from(matches.value_of("site").unwrap_or("."))
}

fn build(matches: &ArgMatches) -> Result<()> {
    let config = Config::from_directory(
        &site_directory(matches),
        Overrides {
            output_directory: matches.value_of("output").map(PathBuf::from),
            base_url: match matches.value_of("base-url") {
                Some(url) => Some(Url::parse(url).with_context(|| format!("invalid URL `{}`", url))?),
                None => None,
            },
            drafts: matches.is_present("drafts"),
        },
    )?;
    let report = build_site(&config)
        .with_context(|| format!("building {}", config.project_file.display()))?;
    println!(
        "Built {} posts, {} pages and {} index pages into {}",
        report.posts,
        report.pages,
        report.index_pages,
        config.output_directory.display()
    );
    Ok(())
}

fn serve_site(matches: &ArgMatches) -> Result<()> {
    let port = match matches.value_of("port") {
        Some(port) => port
            .parse::<u16>()
            .with_context(|| format!("invalid port `{}`", port))?,
        None => DEFAULT_PORT,
    };
    serve(
        &site_directory(matches),
        Overrides {
            output_directory: None,
            base_url: None,
            drafts: matches.is_present("drafts"),
        },
        port,
    )?;
    Ok(())
}

fn new(matches: &ArgMatches) -> Result<()> {
    let title = matches.value_of("TITLE").unwrap_or_default();
    let config = Config::from_directory(&site_directory(matches), Overrides::default())?;
    let path = new_post(
        &config.posts_source_directory,
        title,
        chrono::Local::now().date_naive(),
    )?;
    println!("{}", relative_to(&path, &config.project_root).display());
    Ok(())
}

fn relative_to<'a>(path: &'a Path, root: &Path) -> &'a Path {
    path.strip_prefix(root).unwrap_or(path)
}

fn main() -> Result<()> {
    let matches = App::new("basalt")
        .version(crate_version!())
        .about("A static site generator for a personal blog")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("verbose")
                .long("verbose")
                .short("v")
                .global(true)
                .help("Log debug output"),
        )
        .subcommand(
            SubCommand::with_name("build")
                .about("Builds the site into the output directory")
                .arg(site_arg())
                .arg(
                    Arg::with_name("output")
                        .long("output")
                        .short("o")
                        .takes_value(true)
                        .value_name("DIR")
                        .help("Output directory [default: build.output_directory]"),
                )
                .arg(
                    Arg::with_name("base-url")
                        .long("base-url")
                        .takes_value(true)
                        .value_name("URL")
                        .help("Site URL to build against [default: site.url]"),
                )
                .arg(drafts_arg()),
        )
        .subcommand(
            SubCommand::with_name("serve")
                .about("Builds and serves the site locally, rebuilding on changes")
                .arg(site_arg())
                .arg(
                    Arg::with_name("port")
                        .long("port")
                        .short("p")
                        .takes_value(true)
                        .value_name("PORT")
                        .help("Port to listen on [default: 8080]"),
                )
                .arg(drafts_arg()),
        )
        .subcommand(
            SubCommand::with_name("new")
                .about("Creates a new post")
                .arg(
                    Arg::with_name("TITLE")
                        .required(true)
                        .index(1)
                        .help("The post title"),
                )
                .arg(site_arg()),
        )
        .get_matches();

    let (command, sub) = matches.subcommand();
    let sub = sub.context("no subcommand given")?;
    let verbose = matches.is_present("verbose") || sub.is_present("verbose");

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match command {
        "build" => build(sub),
        "serve" => serve_site(sub),
        "new" => new(sub),
        _ => unreachable!("clap only accepts known subcommands"),
    }
}
