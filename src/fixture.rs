use std::{collections::BTreeSet, sync::Arc};

use thiserror::Error;

use crate::{
    dmx::MAX_CHANNEL,
    models::{Capability, Color, FixtureSpec, Function},
    universe::ChannelWriter,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixtureError {
    #[error("fixture {fixture}: {capability} not supported")]
    FunctionNotSupported {
        fixture: String,
        capability: Capability,
    },
    #[error("fixture {fixture}: channel {channel} is outside of the universe")]
    AddressOutOfRange { fixture: String, channel: u32 },
}

/// A fixture spec bound to a base address
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    name: String,
    address: u16,
    spec: Arc<FixtureSpec>,
}

impl Fixture {
    /// Bind `spec` to `address`. The address is checked against the universe
    /// bounds when the fixture is patched, not here.
    pub fn new(name: impl Into<String>, address: u16, spec: Arc<FixtureSpec>) -> Self {
        Self {
            name: name.into(),
            address,
            spec,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn spec(&self) -> &FixtureSpec {
        &self.spec
    }

    /// Absolute channel of `function`
    pub fn address_of(&self, function: &Function) -> u16 {
        function.channel_addr(self.address)
    }

    /// Sorted, deduplicated list of the absolute channels used by the fixture
    pub fn channels_in_use(&self) -> Vec<u16> {
        // Several functions may share a channel, split by value ranges
        self.spec
            .functions()
            .iter()
            .map(|f| self.address_of(f))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn function(&self, capability: Capability) -> Result<&Function, FixtureError> {
        self.spec
            .function(capability)
            .ok_or_else(|| FixtureError::FunctionNotSupported {
                fixture: self.name.clone(),
                capability,
            })
    }

    pub fn dimmer(&self) -> Result<&Function, FixtureError> {
        self.function(Capability::MasterDimmer)
    }

    /// Absolute channel of `function`, if it lies within the universe
    fn checked_address(&self, function: &Function) -> Result<u16, FixtureError> {
        let channel = self.address as u32 + function.channel() as u32;

        if (1..=MAX_CHANNEL as u32).contains(&channel) {
            Ok(channel as u16)
        } else {
            Err(FixtureError::AddressOutOfRange {
                fixture: self.name.clone(),
                channel,
            })
        }
    }

    /// Write `value`, kept within the range of the `capability` function
    pub fn set_value<W: ChannelWriter + ?Sized>(
        &self,
        out: &mut W,
        capability: Capability,
        value: i32,
    ) -> Result<(), FixtureError> {
        let function = self.function(capability)?;
        let channel = self.checked_address(function)?;
        let value = value.clamp(function.start_value() as i32, function.end_value() as i32);
        out.set_channel(channel, value);
        Ok(())
    }

    /// Write a level in `0.0..=1.0`, scaled to the range of the `capability` function
    pub fn set_level<W: ChannelWriter + ?Sized>(
        &self,
        out: &mut W,
        capability: Capability,
        level: f32,
    ) -> Result<(), FixtureError> {
        let function = self.function(capability)?;
        let channel = self.checked_address(function)?;
        out.set_channel(channel, function.value_at(level) as i32);
        Ok(())
    }

    pub fn set_dimmer<W: ChannelWriter + ?Sized>(
        &self,
        out: &mut W,
        value: i32,
    ) -> Result<(), FixtureError> {
        self.set_value(out, Capability::MasterDimmer, value)
    }

    /// Write the red, green and blue functions. Nothing is written unless all three exist and fit
    /// in the universe.
    pub fn set_color<W: ChannelWriter + ?Sized>(
        &self,
        out: &mut W,
        color: Color,
    ) -> Result<(), FixtureError> {
        let red = self.function(Capability::RedLight)?;
        let green = self.function(Capability::GreenLight)?;
        let blue = self.function(Capability::BlueLight)?;

        let channels = (
            self.checked_address(red)?,
            self.checked_address(green)?,
            self.checked_address(blue)?,
        );

        let (r, g, b) = color.into_components();
        out.set_channel(channels.0, red.value_at(r as f32 / 255.) as i32);
        out.set_channel(channels.1, green.value_at(g as f32 / 255.) as i32);
        out.set_channel(channels.2, blue.value_at(b as f32 / 255.) as i32);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::FixtureCatalog, universe::Universe};
    use Capability::*;

    fn spec(functions: &[(Capability, u16, u8, u8)]) -> Arc<FixtureSpec> {
        Arc::new(
            FixtureSpec::new(
                "test",
                "test",
                functions
                    .iter()
                    .map(|&(c, ch, s, e)| Function::new(c, ch, s, e).unwrap())
                    .collect(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn channels_in_use_are_absolute() {
        let fixture = Fixture::new(
            "test",
            10,
            spec(&[
                (NoFunction, 6, 0, 9),
                (StrobeSpeed, 6, 10, 255),
                (NoFunction, 7, 0, 50),
            ]),
        );

        assert_eq!(fixture.channels_in_use(), vec![16, 17]);
    }

    #[test]
    fn channels_in_use_are_sorted() {
        let fixture = Fixture::new(
            "test",
            100,
            spec(&[
                (NoFunction, 7, 0, 50),
                (NoFunction, 6, 0, 9),
                (NoFunction, 7, 51, 100),
                (StrobeSpeed, 6, 10, 255),
            ]),
        );

        assert_eq!(fixture.channels_in_use(), vec![106, 107]);
    }

    #[test]
    fn dimmer_is_found_when_supported() {
        let fixture = Fixture::new(
            "test",
            100,
            spec(&[
                (NoFunction, 6, 0, 9),
                (MasterDimmer, 7, 0, 50),
                (NoFunction, 7, 51, 100),
            ]),
        );

        let dimmer = fixture.dimmer().unwrap();
        assert_eq!(dimmer.capability(), MasterDimmer);
        assert_eq!(dimmer.channel(), 7);
        assert_eq!(dimmer.start_value(), 0);
        assert_eq!(dimmer.end_value(), 50);
    }

    #[test]
    fn dimmer_is_not_supported() {
        let fixture = Fixture::new("par", 1, spec(&[(RedLight, 1, 0, 255)]));

        assert_eq!(
            fixture.dimmer(),
            Err(FixtureError::FunctionNotSupported {
                fixture: "par".to_owned(),
                capability: MasterDimmer,
            })
        );
    }

    #[test]
    fn set_value_stays_in_function_range() {
        let fixture = Fixture::new(
            "test",
            1,
            spec(&[(NoFunction, 7, 0, 50), (ColorJumping, 7, 101, 150)]),
        );
        let mut universe = Universe::new();

        fixture.set_value(&mut universe, ColorJumping, 20).unwrap();
        assert_eq!(universe.channel(8), 101);

        fixture.set_level(&mut universe, ColorJumping, 1.).unwrap();
        assert_eq!(universe.channel(8), 150);
    }

    #[test]
    fn set_color_writes_rgb_channels() {
        let catalog = FixtureCatalog::builtin();
        let fixture = Fixture::new("uplight", 10, catalog.get("BBP93").unwrap());
        let mut universe = Universe::new();

        {
            let mut batch = universe.batch();
            fixture
                .set_color(&mut batch, Color::new(255, 128, 0))
                .unwrap();
            fixture.set_dimmer(&mut batch, 300).unwrap();
        }

        assert_eq!(universe.channel(11), 255);
        assert_eq!(universe.channel(12), 255);
        assert_eq!(universe.channel(13), 128);
        assert_eq!(universe.channel(14), 0);
    }

    #[test]
    fn set_color_writes_nothing_without_blue() {
        let fixture = Fixture::new(
            "rg",
            1,
            spec(&[(RedLight, 1, 0, 255), (GreenLight, 2, 0, 255)]),
        );
        let mut universe = Universe::new();

        assert!(fixture
            .set_color(&mut universe, Color::new(10, 20, 30))
            .is_err());
        assert_eq!(universe.channel(2), 0);
        assert_eq!(universe.generation(), 0);
    }

    #[test]
    fn writes_past_the_universe_are_rejected() {
        let catalog = FixtureCatalog::builtin();
        let fixture = Fixture::new("far", 510, catalog.get("BBP93").unwrap());
        let mut universe = Universe::new();

        assert!(universe.patch(fixture.clone()).is_err());

        assert_eq!(
            fixture.set_level(&mut universe, SoundActiveMode, 1.),
            Err(FixtureError::AddressOutOfRange {
                fixture: "far".to_owned(),
                channel: 517,
            })
        );
        fixture.set_dimmer(&mut universe, 255).unwrap();
        assert_eq!(universe.channel(511), 255);

        // Red fits on 512 but green lands on 513: nothing is written
        let mut batch = universe.batch();
        assert!(matches!(
            fixture.set_color(&mut batch, Color::new(1, 2, 3)),
            Err(FixtureError::AddressOutOfRange { channel: 513, .. })
        ));
        assert!(batch.is_empty());
        batch.discard();

        assert_eq!(universe.channel(512), 0);
    }
}
