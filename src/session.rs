//! A configured rig attached to a running link

use thiserror::Error;

use crate::{
    fixture::Fixture,
    link::{Link, LinkError},
    models::{Config, ConfigError, FixtureCatalog},
    scheduler::{LinkStatus, Scheduler, SchedulerError, SchedulerHandle, SchedulerStats},
    universe::{PatchError, Universe},
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error("link error: {0}")]
    Link(#[from] LinkError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Patched universe whose frames are being transmitted
///
/// Dropping the session stops transmission; [Session::close] also waits for the link to be
/// closed.
#[derive(Debug)]
pub struct Session {
    universe: Universe,
    scheduler: SchedulerHandle,
}

impl Session {
    #[instrument(skip_all)]
    pub async fn open(config: &Config, catalog: &FixtureCatalog) -> Result<Self, SessionError> {
        // Every placement is checked before the link is touched
        let mut universe = Universe::new();
        for fixture in config.rig(catalog)? {
            universe.patch(fixture)?;
        }

        let link = Link::new(config.link.clone()).await?;
        let scheduler = Scheduler::new(&config.scheduler, link, universe.subscribe()).spawn();

        info!(fixtures = %universe.fixtures().len(), "session open");

        Ok(Self {
            universe,
            scheduler,
        })
    }

    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    pub fn universe_mut(&mut self) -> &mut Universe {
        &mut self.universe
    }

    pub fn fixture(&self, name: &str) -> Option<&Fixture> {
        self.universe.fixture(name)
    }

    pub fn status(&self) -> LinkStatus {
        self.scheduler.status()
    }

    /// Stop transmission and close the link
    #[instrument(skip_all)]
    pub async fn close(self) -> Result<SchedulerStats, SessionError> {
        let stats = self.scheduler.stop().await?;
        info!(stats = %stats, "session closed");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{self, Capability, FixturePlacement};

    fn config(link: models::Link, placements: &[(&str, u16)]) -> Config {
        Config {
            link,
            fixtures: placements
                .iter()
                .map(|&(name, address)| FixturePlacement {
                    name: name.to_owned(),
                    model: "BBP93".to_owned(),
                    address,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn open_write_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.log");

        let config = config(
            models::File {
                path: path.to_string_lossy().into_owned(),
                format: models::PacketFormat::Levels,
                print_time_stamp: false,
            }
            .into(),
            &[("left", 1), ("right", 20)],
        );

        let mut session = Session::open(&config, &config.catalog()).await.unwrap();
        assert_eq!(session.universe().fixtures().len(), 2);

        let left = session.fixture("left").unwrap().clone();
        left.set_dimmer(session.universe_mut(), 255).unwrap();
        assert_eq!(session.universe().channel(left.dimmer().unwrap().channel_addr(1)), 255);

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let stats = session.close().await.unwrap();
        assert!(stats.frames_sent > 0);

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count() as u64, stats.frames_sent);
    }

    #[tokio::test]
    async fn bad_placement_fails_before_link_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-created.log");

        let config = config(
            models::File {
                path: path.to_string_lossy().into_owned(),
                format: Default::default(),
                print_time_stamp: false,
            }
            .into(),
            &[("far", 510)],
        );

        let result = Session::open(&config, &config.catalog()).await;
        assert!(matches!(
            result,
            Err(SessionError::Patch(PatchError::AddressOutOfRange { channel: 513, .. }))
        ));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn unknown_model_fails() {
        let mut config = config(Default::default(), &[("left", 1)]);
        config.fixtures[0].model = "NOPE".to_owned();

        let result = Session::open(&config, &config.catalog()).await;
        assert!(matches!(
            result,
            Err(SessionError::Config(ConfigError::UnknownModel { .. }))
        ));
    }

    #[tokio::test]
    async fn status_is_reported() {
        let config = config(Default::default(), &[("left", 1)]);
        let session = Session::open(&config, &config.catalog()).await.unwrap();

        assert_eq!(session.status(), LinkStatus::Healthy);
        assert!(session
            .fixture("left")
            .unwrap()
            .function(Capability::RedLight)
            .is_ok());

        session.close().await.unwrap();
    }
}
