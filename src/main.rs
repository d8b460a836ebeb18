/// Study Panel server binary
use std::sync::Arc;
use study_panel::{api, config::PanelConfig, jobs, server, AppContext, PanelResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> PanelResult<()> {
    api::health::mark_started();

    // Load configuration before logging so the level can come from it
    let config = PanelConfig::from_env()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("study_panel={},tower_http=info", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_banner();

    let ctx = Arc::new(AppContext::new(config).await?);

    let scheduler = Arc::new(jobs::JobScheduler::new(Arc::clone(&ctx)));
    scheduler.start();

    server::serve((*ctx).clone()).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
   _____ __             __         ____                  __
  / ___// /___  ______/ /_  __   / __ \____ _____  ___  / /
  \__ \/ __/ / / / __  / / / /  / /_/ / __ `/ __ \/ _ \/ /
 ___/ / /_/ /_/ / /_/ / /_/ /  / ____/ /_/ / / / /  __/ /
/____/\__/\__,_/\__,_/\__, /  /_/    \__,_/_/ /_/\___/_/
                     /____/
        Study Panel v{}
        "#,
        env!("CARGO_PKG_VERSION")
    );
}
