use clap::Parser;
use shelf_scout::config::ReportFormat;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "shelf-scout")]
#[command(about = "Scrapes product listings from shop sites and writes categorized reports")]
#[command(version)]
pub struct Args {
    /// JSON configuration file; defaults apply when omitted
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Replay saved pages from this directory instead of a browser
    #[arg(long)]
    pub snapshots: Option<PathBuf>,

    /// Only scrape the named site (repeatable)
    #[arg(short, long = "site")]
    pub sites: Vec<String>,

    /// Upper bound on pages visited per site
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Directory the reports are written to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Report format (repeatable); the configured formats when omitted
    #[arg(short, long = "format", value_enum)]
    pub formats: Vec<ReportFormat>,

    /// URL for the WebDriver instance, over WEBDRIVER_URL and the config
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Print the configured sites and exit
    #[arg(long)]
    pub list_sites: bool,
}
