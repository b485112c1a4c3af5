use std::{
    collections::{BTreeMap, BTreeSet},
    convert::TryFrom,
    ops::RangeInclusive,
    sync::Arc,
};

use serde_derive::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};
use thiserror::Error;

use crate::dmx::MAX_CHANNEL;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("[{brand} - {model}] channel {channel} has functions with overlapping values")]
    OverlappingValues {
        brand: String,
        model: String,
        channel: u16,
    },
    #[error("{capability} on channel {channel}: start value {start} is above end value {end}")]
    InvertedRange {
        capability: Capability,
        channel: u16,
        start: u8,
        end: u8,
    },
    #[error("{capability} on channel {channel}: span {start}-{end} is inverted")]
    InvertedSpan {
        capability: Capability,
        channel: u16,
        start: u8,
        end: u8,
    },
    #[error("{capability}: channel {channel} is not in 1..=512")]
    InvalidChannel { capability: Capability, channel: u16 },
    #[error("catalog entry {key} holds model {model}")]
    CatalogKeyMismatch { key: String, model: String },
}

/// Lighting capability a function controls
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Capability {
    MasterDimmer,
    RedLight,
    GreenLight,
    BlueLight,
    WhiteLight,
    NoFunction,
    StrobeSpeed,
    StaticColorSelection,
    ColorJumping,
    ColorGradualChange,
    ColorPulseChange,
    SoundActiveMode,
}

/// One capability mapped to a value range of a fixture channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFunction", into = "RawFunction")]
pub struct Function {
    capability: Capability,
    channel: u16,
    start_value: u8,
    end_value: u8,
    span: Option<(u8, u8)>,
}

impl Function {
    /// Create a function on `channel` (1-based, relative to the fixture) covering
    /// `start_value..=end_value`
    pub fn new(
        capability: Capability,
        channel: u16,
        start_value: u8,
        end_value: u8,
    ) -> Result<Self, SpecError> {
        if channel == 0 || channel > MAX_CHANNEL {
            return Err(SpecError::InvalidChannel {
                capability,
                channel,
            });
        }

        if start_value > end_value {
            return Err(SpecError::InvertedRange {
                capability,
                channel,
                start: start_value,
                end: end_value,
            });
        }

        Ok(Self {
            capability,
            channel,
            start_value,
            end_value,
            span: None,
        })
    }

    /// Attach a named sub-range, e.g. the speed band of a strobe channel
    pub fn with_span(mut self, start: u8, end: u8) -> Result<Self, SpecError> {
        if start > end {
            return Err(SpecError::InvertedSpan {
                capability: self.capability,
                channel: self.channel,
                start,
                end,
            });
        }

        self.span = Some((start, end));
        Ok(self)
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn channel(&self) -> u16 {
        self.channel
    }

    pub fn start_value(&self) -> u8 {
        self.start_value
    }

    pub fn end_value(&self) -> u8 {
        self.end_value
    }

    pub fn span(&self) -> Option<(u8, u8)> {
        self.span
    }

    pub fn range(&self) -> RangeInclusive<u8> {
        self.start_value..=self.end_value
    }

    pub fn contains(&self, value: u8) -> bool {
        self.range().contains(&value)
    }

    /// Absolute address of this function for a fixture at `fixture_addr`
    pub fn channel_addr(&self, fixture_addr: u16) -> u16 {
        fixture_addr.saturating_add(self.channel)
    }

    /// Map a level in `0.0..=1.0` onto the value range of this function
    pub fn value_at(&self, level: f32) -> u8 {
        let level = if level.is_nan() {
            0.
        } else {
            level.clamp(0., 1.)
        };

        let width = (self.end_value - self.start_value) as f32;
        self.start_value + (width * level).round() as u8
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawFunction {
    capability: Capability,
    channel: u16,
    start: u8,
    end: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    span: Option<(u8, u8)>,
}

impl TryFrom<RawFunction> for Function {
    type Error = SpecError;

    fn try_from(raw: RawFunction) -> Result<Self, Self::Error> {
        let function = Function::new(raw.capability, raw.channel, raw.start, raw.end)?;

        match raw.span {
            Some((start, end)) => function.with_span(start, end),
            None => Ok(function),
        }
    }
}

impl From<Function> for RawFunction {
    fn from(function: Function) -> Self {
        Self {
            capability: function.capability,
            channel: function.channel,
            start: function.start_value,
            end: function.end_value,
            span: function.span,
        }
    }
}

/// Channel layout of a fixture type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFixtureSpec", into = "RawFixtureSpec")]
pub struct FixtureSpec {
    brand: String,
    model: String,
    functions: Vec<Function>,
}

impl FixtureSpec {
    /// Build a spec, rejecting functions that claim the same value of a channel
    pub fn new(
        brand: impl Into<String>,
        model: impl Into<String>,
        functions: Vec<Function>,
    ) -> Result<Self, SpecError> {
        let spec = Self {
            brand: brand.into(),
            model: model.into(),
            functions,
        };

        spec.check_channel_values()?;
        Ok(spec)
    }

    pub fn brand(&self) -> &str {
        &self.brand
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Number of distinct channels the functions use
    pub fn channels(&self) -> usize {
        self.functions
            .iter()
            .map(Function::channel)
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Highest relative channel used by this spec
    pub fn max_channel(&self) -> Option<u16> {
        self.functions.iter().map(Function::channel).max()
    }

    pub fn channel_values_are_non_overlapping(&self) -> bool {
        self.check_channel_values().is_ok()
    }

    pub fn functions_on(&self, channel: u16) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(move |f| f.channel == channel)
    }

    /// The function selected by writing `value` to `channel`
    pub fn function_for(&self, channel: u16, value: u8) -> Option<&Function> {
        self.functions_on(channel).find(|f| f.contains(value))
    }

    /// First function providing `capability`
    pub fn function(&self, capability: Capability) -> Option<&Function> {
        self.functions.iter().find(|f| f.capability == capability)
    }

    fn check_channel_values(&self) -> Result<(), SpecError> {
        let mut occupied: BTreeMap<u16, [bool; 256]> = BTreeMap::new();

        for function in &self.functions {
            let slots = occupied.entry(function.channel).or_insert([false; 256]);

            for value in function.range() {
                let slot = &mut slots[value as usize];
                if *slot {
                    return Err(SpecError::OverlappingValues {
                        brand: self.brand.clone(),
                        model: self.model.clone(),
                        channel: function.channel,
                    });
                }

                *slot = true;
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawFixtureSpec {
    brand: String,
    model: String,
    #[serde(default)]
    functions: Vec<Function>,
}

impl TryFrom<RawFixtureSpec> for FixtureSpec {
    type Error = SpecError;

    fn try_from(raw: RawFixtureSpec) -> Result<Self, Self::Error> {
        FixtureSpec::new(raw.brand, raw.model, raw.functions)
    }
}

impl From<FixtureSpec> for RawFixtureSpec {
    fn from(spec: FixtureSpec) -> Self {
        Self {
            brand: spec.brand,
            model: spec.model,
            functions: spec.functions,
        }
    }
}

/// Fixture specs indexed by model name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, FixtureSpec>",
    into = "BTreeMap<String, Arc<FixtureSpec>>"
)]
pub struct FixtureCatalog {
    specs: BTreeMap<String, Arc<FixtureSpec>>,
}

impl TryFrom<BTreeMap<String, FixtureSpec>> for FixtureCatalog {
    type Error = SpecError;

    fn try_from(specs: BTreeMap<String, FixtureSpec>) -> Result<Self, Self::Error> {
        let mut catalog = Self::new();

        // Placements look specs up by model, so the table key must be the model name
        for (key, spec) in specs {
            if key != spec.model {
                return Err(SpecError::CatalogKeyMismatch {
                    key,
                    model: spec.model,
                });
            }

            catalog.insert(spec);
        }

        Ok(catalog)
    }
}

impl From<FixtureCatalog> for BTreeMap<String, Arc<FixtureSpec>> {
    fn from(catalog: FixtureCatalog) -> Self {
        catalog.specs
    }
}

impl FixtureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog of the fixture profiles shipped with dmxctl
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.insert(beamz_bbp93().expect("invalid BBP93 profile"));
        catalog
    }

    /// Register a spec under its model name, returning the spec it replaces
    pub fn insert(&mut self, spec: FixtureSpec) -> Option<Arc<FixtureSpec>> {
        self.specs.insert(spec.model.clone(), Arc::new(spec))
    }

    /// Add all specs of `other`, replacing those with the same model name
    pub fn extend(&mut self, other: FixtureCatalog) {
        self.specs.extend(other.specs);
    }

    pub fn get(&self, model: &str) -> Option<Arc<FixtureSpec>> {
        self.specs.get(model).cloned()
    }

    pub fn find(&self, brand: &str, model: &str) -> Option<Arc<FixtureSpec>> {
        self.specs
            .values()
            .find(|spec| spec.brand == brand && spec.model == model)
            .cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<FixtureSpec>)> {
        self.specs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// BeamZ BBP93 battery uplight, 7 channel mode
fn beamz_bbp93() -> Result<FixtureSpec, SpecError> {
    use Capability::*;

    FixtureSpec::new(
        "BeamZ",
        "BBP93",
        vec![
            Function::new(MasterDimmer, 1, 0, 255)?,
            Function::new(RedLight, 2, 0, 255)?,
            Function::new(GreenLight, 3, 0, 255)?,
            Function::new(BlueLight, 4, 0, 255)?,
            Function::new(WhiteLight, 5, 0, 255)?,
            Function::new(NoFunction, 6, 0, 9)?,
            Function::new(StrobeSpeed, 6, 10, 255)?.with_span(1, 22)?,
            Function::new(NoFunction, 7, 0, 50)?,
            Function::new(StaticColorSelection, 7, 51, 100)?,
            Function::new(ColorJumping, 7, 101, 150)?,
            Function::new(ColorGradualChange, 7, 151, 200)?,
            Function::new(ColorPulseChange, 7, 201, 250)?,
            Function::new(SoundActiveMode, 7, 251, 255)?,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use Capability::*;

    fn function(capability: Capability, channel: u16, start: u8, end: u8) -> Function {
        Function::new(capability, channel, start, end).unwrap()
    }

    #[test]
    fn empty_spec_has_no_channels() {
        let spec = FixtureSpec::new("test", "test", vec![]).unwrap();
        assert_eq!(spec.channels(), 0);
        assert_eq!(spec.max_channel(), None);
    }

    #[test]
    fn channels_are_counted_once() {
        let spec = FixtureSpec::new(
            "test",
            "test",
            vec![
                function(NoFunction, 6, 0, 9),
                function(StrobeSpeed, 6, 10, 255).with_span(1, 22).unwrap(),
                function(NoFunction, 7, 0, 50),
            ],
        )
        .unwrap();

        assert_eq!(spec.channels(), 2);
        assert_eq!(spec.max_channel(), Some(7));
    }

    #[test]
    fn overlapping_values_are_rejected() {
        let err = FixtureSpec::new(
            "test",
            "test",
            vec![function(NoFunction, 6, 0, 10), function(StrobeSpeed, 6, 10, 255)],
        )
        .unwrap_err();

        assert_eq!(
            err,
            SpecError::OverlappingValues {
                brand: "test".to_owned(),
                model: "test".to_owned(),
                channel: 6,
            }
        );
        assert!(err.to_string().contains("[test - test] channel 6"));
    }

    #[test]
    fn disjoint_values_are_accepted() {
        let spec = FixtureSpec::new(
            "test",
            "test",
            vec![function(NoFunction, 6, 0, 9), function(StrobeSpeed, 6, 10, 255)],
        )
        .unwrap();

        assert!(spec.channel_values_are_non_overlapping());
    }

    #[test]
    fn same_range_on_other_channels_is_fine() {
        let spec = FixtureSpec::new(
            "test",
            "test",
            vec![function(RedLight, 1, 0, 255), function(GreenLight, 2, 0, 255)],
        );

        assert!(spec.is_ok());
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert_eq!(
            Function::new(RedLight, 1, 10, 9),
            Err(SpecError::InvertedRange {
                capability: RedLight,
                channel: 1,
                start: 10,
                end: 9,
            })
        );
    }

    #[test]
    fn channel_zero_is_rejected() {
        assert!(matches!(
            Function::new(RedLight, 0, 0, 255),
            Err(SpecError::InvalidChannel { channel: 0, .. })
        ));
        assert!(Function::new(RedLight, 513, 0, 255).is_err());
    }

    #[test]
    fn value_at_maps_onto_range() {
        let strobe = function(StrobeSpeed, 6, 10, 255);
        assert_eq!(strobe.value_at(0.), 10);
        assert_eq!(strobe.value_at(1.), 255);
        assert_eq!(strobe.value_at(0.5), 133);
        assert_eq!(strobe.value_at(7.), 255);
        assert_eq!(strobe.value_at(f32::NAN), 10);
    }

    #[test]
    fn function_for_selects_by_value() {
        let spec = beamz_bbp93().unwrap();
        assert_eq!(
            spec.function_for(7, 120).map(Function::capability),
            Some(ColorJumping)
        );
        assert_eq!(
            spec.function_for(6, 3).map(Function::capability),
            Some(NoFunction)
        );
        assert!(spec.function_for(8, 0).is_none());
    }

    #[test]
    fn builtin_catalog_has_bbp93() {
        let catalog = FixtureCatalog::builtin();
        let spec = catalog.get("BBP93").unwrap();

        assert_eq!(spec.channels(), 7);
        assert!(spec.channel_values_are_non_overlapping());
        assert_eq!(catalog.find("BeamZ", "BBP93"), Some(spec));
        assert!(catalog.find("Generic", "BBP93").is_none());
    }

    #[test]
    fn capability_names_are_kebab_case() {
        assert_eq!(MasterDimmer.to_string(), "master-dimmer");
        assert_eq!(
            "sound-active-mode".parse::<Capability>().unwrap(),
            SoundActiveMode
        );
    }

    #[test]
    fn deserialize_spec_validates() {
        let ok: Result<FixtureSpec, _> = toml::from_str(
            r#"
            brand = "Generic"
            model = "PAR3"
            functions = [
                { capability = "red-light", channel = 1, start = 0, end = 255 },
                { capability = "strobe-speed", channel = 2, start = 10, end = 255, span = [1, 22] },
            ]
            "#,
        );
        let ok = ok.unwrap();
        assert_eq!(ok.functions()[1].span(), Some((1, 22)));

        let overlapping: Result<FixtureSpec, _> = toml::from_str(
            r#"
            brand = "Generic"
            model = "PAR3"
            functions = [
                { capability = "no-function", channel = 6, start = 0, end = 10 },
                { capability = "strobe-speed", channel = 6, start = 10, end = 255 },
            ]
            "#,
        );
        assert!(overlapping.is_err());
    }

    #[test]
    fn catalog_keys_must_match_models() {
        let mut specs = BTreeMap::new();
        specs.insert("BBP93".to_owned(), beamz_bbp93().unwrap());
        let catalog = FixtureCatalog::try_from(specs).unwrap();
        assert!(catalog.get("BBP93").is_some());

        let mut specs = BTreeMap::new();
        specs.insert("PAR3".to_owned(), beamz_bbp93().unwrap());
        assert_eq!(
            FixtureCatalog::try_from(specs),
            Err(SpecError::CatalogKeyMismatch {
                key: "PAR3".to_owned(),
                model: "BBP93".to_owned(),
            })
        );
    }
}
