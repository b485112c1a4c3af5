use color_eyre::eyre::{eyre, Result};
use strum::IntoEnumIterator;
use structopt::StructOpt;

use dmxctl::{
    fixture::Fixture,
    models::{Capability, Config},
    session::Session,
};

use super::until_interrupted;

#[derive(Debug, StructOpt)]
pub struct CheckOpts {
    /// Only check this fixture
    #[structopt(short, long)]
    fixture: Option<String>,
    /// Value increment between two frames of a sweep
    #[structopt(short, long, default_value = "5")]
    step: u8,
}

fn print_capabilities(fixture: &Fixture) {
    println!(
        "{} ({} {}) at {}",
        fixture.name(),
        fixture.spec().brand(),
        fixture.spec().model(),
        fixture.address()
    );

    for capability in Capability::iter() {
        match fixture.function(capability) {
            Ok(function) => println!(
                "  {:<24} channel {:>3}  {}..={}",
                <&'static str>::from(capability),
                fixture.address_of(function),
                function.start_value(),
                function.end_value()
            ),
            Err(_) => println!("  {:<24} -", <&'static str>::from(capability)),
        }
    }
}

/// Values of a sweep over `start..=end`, always ending on `end`
fn sweep(start: u8, end: u8, step: u8) -> impl Iterator<Item = u8> {
    let step = step.max(1) as usize;

    (start..=end)
        .step_by(step)
        .chain(std::iter::once(end))
        .scan(None, |last, value| {
            let repeated = *last == Some(value);
            *last = Some(value);
            Some(if repeated { None } else { Some(value) })
        })
        .flatten()
}

pub async fn run(config: Config, opts: CheckOpts) -> Result<()> {
    let mut session = Session::open(&config, &config.catalog()).await?;

    let fixtures: Vec<Fixture> = match &opts.fixture {
        Some(name) => vec![session
            .fixture(name)
            .cloned()
            .ok_or_else(|| eyre!("no fixture named {}", name))?],
        None => session.universe().fixtures().to_vec(),
    };

    let period = config.scheduler.period();

    until_interrupted(async {
        let mut ticker = tokio::time::interval(period);

        for fixture in &fixtures {
            print_capabilities(fixture);

            for function in fixture.spec().functions() {
                let channel = fixture.address_of(function);
                info!(
                    fixture = %fixture.name(),
                    capability = %function.capability(),
                    channel = %channel,
                    "sweeping"
                );

                for value in sweep(function.start_value(), function.end_value(), opts.step) {
                    ticker.tick().await;
                    session.universe_mut().set_channel(channel, value as i32);
                }

                session.universe_mut().set_channel(channel, 0);
            }
        }
    })
    .await?;

    session.universe_mut().blackout();
    tokio::time::sleep(period * 2).await;

    let stats = session.close().await?;
    info!(stats = %stats, "check done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_covers_range() {
        assert_eq!(sweep(0, 9, 5).collect::<Vec<_>>(), vec![0, 5, 9]);
        assert_eq!(sweep(0, 10, 5).collect::<Vec<_>>(), vec![0, 5, 10]);
        assert_eq!(sweep(251, 255, 0).collect::<Vec<_>>(), vec![251, 252, 253, 254, 255]);
        assert_eq!(sweep(7, 7, 3).collect::<Vec<_>>(), vec![7]);
    }
}
