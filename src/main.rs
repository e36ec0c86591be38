use anyhow::{Context, Result};
use redirect_bench::{config, telemetry, LoadDriver, RedirectClient, RedirectScenario};
use config::Config;
use telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cfg = Config::load().context("loading configuration")?;

    if cfg.target.alias.is_none() {
        warn!(
            "URL_ALIAS is not set - requests will target the literal path /{}",
            redirect_bench::client::UNSET_ALIAS
        );
    }

    let url = cfg.request_url();
    let client = RedirectClient::new(cfg.target.timeout).context("building HTTP client")?;
    let scenario = RedirectScenario::new(client, url.clone());

    info!(
        %url,
        total_secs = cfg.load.stages.total_duration().as_secs(),
        "starting redirect benchmark"
    );

    let summary = LoadDriver::new(scenario, cfg.load.stages.clone(), cfg.driver_options())
        .run_until(telemetry::shutdown_signal())
        .await?;

    println!("{summary}");

    if let Some(path) = &cfg.summary.export_path {
        summary.export(path).await?;
        info!(path = %path.display(), "summary exported");
    }

    Ok(())
}
