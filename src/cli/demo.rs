use std::f64::consts::PI;

use color_eyre::eyre::Result;
use structopt::StructOpt;

use dmxctl::{
    dmx,
    models::{Color, Config},
    session::Session,
    universe::normalize,
};

use super::until_interrupted;

#[derive(Debug, StructOpt)]
pub struct DemoOpts {
    /// Duration of the demo, in seconds
    #[structopt(short, long, default_value = "255")]
    duration: f64,
}

/// Sine wave shifted to oscillate over the slot range
fn wave(t: f64, amplitude: f64, freq: f64, phi: f64, shift: f64) -> f64 {
    amplitude * (2. * PI * freq * t + phi).sin() + shift
}

/// Values of `channels` out-of-phase waves at time `t`
fn levels(channels: usize, t: f64) -> Vec<u8> {
    let freq = 1. / dmx::MAX_REFRESH_RATE;
    let amplitude = 256. / 2.;

    (0..channels)
        .map(|i| {
            let phi = i as f64 * 2.;
            // Slower waves on the later channels
            let freq_coef = 1. / (i as f64 + 3.);
            normalize(wave(t, amplitude, freq * freq_coef, phi, amplitude).round() as i32)
        })
        .collect()
}

pub async fn run(config: Config, opts: DemoOpts) -> Result<()> {
    let mut session = Session::open(&config, &config.catalog()).await?;
    let fixtures = session.universe().fixtures().to_vec();

    if fixtures.is_empty() {
        warn!("no fixtures in the configuration, nothing to show");
    }

    // Full brightness where there is a dimmer
    session.universe_mut().batched(|batch| {
        for fixture in &fixtures {
            if fixture.dimmer().is_ok() {
                fixture.set_dimmer(batch, 255)?;
            }
        }

        Ok::<_, dmxctl::fixture::FixtureError>(())
    })?;

    let period = config.scheduler.period();
    let steps = (opts.duration.max(0.) / period.as_secs_f64()) as u64;
    info!(duration = %opts.duration, "starting demo");

    until_interrupted(async {
        let mut ticker = tokio::time::interval(period);

        for step in 0..steps {
            ticker.tick().await;

            let t = step as f64 * period.as_secs_f64();
            let values = levels(3, t);
            let color = Color::new(values[0], values[1], values[2]);

            let mut batch = session.universe_mut().batch();
            for fixture in &fixtures {
                if let Err(error) = fixture.set_color(&mut batch, color) {
                    trace!(error = %error, "skipping fixture");
                }
            }
        }
    })
    .await?;

    session.universe_mut().blackout();
    tokio::time::sleep(period * 2).await;

    session.close().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waves_start_out_of_phase() {
        let values = levels(3, 0.);

        // 128 * sin(phi) + 128
        assert_eq!(values, vec![128, 244, 31]);
    }

    #[test]
    fn crest_is_clamped_to_full() {
        // First crest of the first wave
        assert_eq!(wave(33., 128., 1. / 44. / 3., 0., 128.).round(), 256.);
        assert_eq!(levels(1, 33.), vec![255]);
    }
}
