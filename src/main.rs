use anyhow::{Context, Result};
use clap::Parser;
use quire::build::build_site;
use quire::config::{Config, Layer};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Builds a static blog from a directory of posts.
#[derive(Parser, Debug)]
#[command(name = "quire", version, about)]
struct Cli {
    /// YAML config file [default: .quire.yaml, if it exists]
    #[arg(long)]
    config_file: Option<PathBuf>,

    /// Name of the blog
    #[arg(long)]
    blog_name: Option<String>,

    /// Description of the blog, used in the RSS feed
    #[arg(long)]
    blog_description: Option<String>,

    /// URL path the blog is served under, e.g. /blog
    #[arg(long)]
    base_url_path: Option<String>,

    /// Don't generate an RSS feed; `--no-rss=false` overrides the config file
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    no_rss: Option<bool>,

    /// Scheme and host used for links in the RSS feed
    #[arg(long)]
    rss_link_url: Option<String>,

    /// Directory the blog is written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Directory searched for posts
    #[arg(long)]
    posts_dir: Option<PathBuf>,

    /// Directory of static files copied into the output directory
    #[arg(long)]
    static_dir: Option<PathBuf>,

    /// Directory of page templates
    #[arg(long)]
    template_dir: Option<PathBuf>,

    /// Maximum number of posts built in parallel [default: CPU count]
    #[arg(long)]
    parallelism: Option<usize>,

    /// Publish posts dated in the future
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    future_posts: Option<bool>,

    /// Keep output directories of posts that no longer exist
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    no_output_cleanup: Option<bool>,

    /// Log debug output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn layer(&self) -> Layer {
        Layer {
            base_url_path: self.base_url_path.clone(),
            blog_name: self.blog_name.clone(),
            blog_description: self.blog_description.clone(),
            no_rss: self.no_rss,
            rss_link_url: self.rss_link_url.clone(),
            output_dir: self.output_dir.clone(),
            posts_dir: self.posts_dir.clone(),
            static_dir: self.static_dir.clone(),
            template_dir: self.template_dir.clone(),
            parallelism: self.parallelism,
            future_posts: self.future_posts,
            no_output_cleanup: self.no_output_cleanup,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = run(&cli) {
        tracing::error!("{:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = Config::load(cli.config_file.as_deref(), cli.layer())
        .context("loading configuration")?;
    let site = build_site(&config).with_context(|| {
        format!(
            "building `{}` into `{}`",
            config.posts_dir.display(),
            config.output_dir.display()
        )
    })?;

    info!(
        published = site.posts.len(),
        skipped = site.skipped,
        failed = site.failed,
        "built blog in `{}`",
        config.output_dir.display()
    );
    Ok(())
}
