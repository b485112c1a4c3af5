use color_eyre::eyre::Result;

use dmxctl::{models::Config, session::Session};

use super::until_interrupted;

pub async fn run(config: Config) -> Result<()> {
    let mut session = Session::open(&config, &config.catalog()).await?;

    // Start from a known state
    session.universe_mut().blackout();

    until_interrupted(async {
        let mut status = session.status();
        let mut ticker = tokio::time::interval(config.scheduler.period() * 10);

        loop {
            ticker.tick().await;

            let current = session.status();
            if current != status {
                if current.is_degraded() {
                    warn!(status = %current, "link status changed");
                } else {
                    info!(status = %current, "link status changed");
                }

                status = current;
            }
        }
    })
    .await?;

    session.universe_mut().blackout();
    tokio::time::sleep(config.scheduler.period() * 2).await;

    session.close().await?;
    Ok(())
}
