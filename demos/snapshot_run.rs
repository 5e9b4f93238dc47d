//! Scrapes two saved best-seller pages without a browser and prints the report.
//!
//! `cargo run --example snapshot_run`

use shelf_scout::config::DelayRange;
use shelf_scout::report::{group_by_category, to_markdown};
use shelf_scout::{Categorizer, ScrapeConfig, ScrapeOrchestrator, SiteCatalog, SnapshotDriver};

const PAGE_1: &str = r#"<html><body>
<div id="gridItemRoot">
  <a class="a-link-normal" href="/dp/B0DEMO0001">
    <img class="p13n-product-image" src="/images/I/auriculares.jpg">
    <div class="_cDEzb_p13n-sc-css-line-clamp-3_g3dy1">Auriculares inalámbricos con cancelación de ruido</div>
  </a>
  <span class="a-icon-alt">4.9 de 5 estrellas</span>
  <span class="a-size-small">182.004</span>
  <span class="_cDEzb_p13n-sc-price_3mJ9Z">59,99 €</span>
</div>
<div id="gridItemRoot">
  <a class="a-link-normal" href="/dp/B0DEMO0002">
    <div class="_cDEzb_p13n-sc-css-line-clamp-3_g3dy1">Parches de alivio muscular</div>
  </a>
  <span class="a-icon-alt">4.3 de 5 estrellas</span>
  <span class="a-size-small">8.112</span>
  <span class="_cDEzb_p13n-sc-price_3mJ9Z">12,49 €</span>
</div>
<ul class="a-pagination"><li class="a-last"><a href="/gp/bestsellers?pg=2">Página siguiente</a></li></ul>
</body></html>"#;

const PAGE_2: &str = r#"<html><body>
<div id="gridItemRoot">
  <a class="a-link-normal" href="/dp/B0DEMO0003">
    <div class="_cDEzb_p13n-sc-css-line-clamp-3_g3dy1">Botella de agua de acero</div>
  </a>
  <span class="a-icon-alt">4.6 de 5 estrellas</span>
  <span class="a-size-small">23.410</span>
  <span class="_cDEzb_p13n-sc-price_3mJ9Z">15,90 €</span>
</div>
</body></html>"#;

#[tokio::main]
async fn main() -> shelf_scout::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let driver = SnapshotDriver::new()
        .with_page("https://www.amazon.es/gp/bestsellers", PAGE_1)
        .with_page("https://www.amazon.es/gp/bestsellers?pg=2", PAGE_2);
    let catalog = SiteCatalog::builtin().restrict_to(&["amazon-es-bestsellers".to_string()])?;
    let config = ScrapeConfig {
        page_delay_ms: DelayRange::fixed(0),
        site_delay_ms: 0,
        scroll_settle_ms: 0,
        ..ScrapeConfig::default()
    };

    let outcome = ScrapeOrchestrator::new(driver, catalog, config).run().await;

    let categorizer = Categorizer::default();
    let groups = group_by_category(&outcome.records, &categorizer);
    println!("{}", to_markdown(&groups, "Amazon.es best sellers"));
    Ok(())
}
