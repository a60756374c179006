//! Parameter store and per-block settings snapshot
//!
//! The store is the only state shared between a control thread and the audio
//! thread. [`ParameterTree`] keeps one atomic cell per control so writers never
//! block the audio callback, and the audio thread turns the current values
//! into an immutable [`ChainSettings`] once per block.

use crossbeam::atomic::AtomicCell;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// The fixed set of controls the equalizer reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterId {
    LowCutFreq,
    HighCutFreq,
    PeakFreq,
    PeakGain,
    PeakQuality,
    LowCutSlope,
    HighCutSlope,
}

impl ParameterId {
    pub const COUNT: usize = 7;

    pub const ALL: [ParameterId; Self::COUNT] = [
        ParameterId::LowCutFreq,
        ParameterId::HighCutFreq,
        ParameterId::PeakFreq,
        ParameterId::PeakGain,
        ParameterId::PeakQuality,
        ParameterId::LowCutSlope,
        ParameterId::HighCutSlope,
    ];

    /// Host-facing parameter name
    pub fn name(self) -> &'static str {
        match self {
            ParameterId::LowCutFreq => "LowCut",
            ParameterId::HighCutFreq => "HighCut",
            ParameterId::PeakFreq => "Peak",
            ParameterId::PeakGain => "Peak Gain",
            ParameterId::PeakQuality => "Peak Quality",
            ParameterId::LowCutSlope => "LowCut Slope",
            ParameterId::HighCutSlope => "HighCut Slope",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.name() == name)
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Numeric range with step size and skew, mapped to and from `0..=1`
///
/// A skew below 1 spends more of the normalised range on the low end, which
/// is what frequency controls want.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub start: f32,
    pub end: f32,
    /// Step size; 0 means continuous
    pub interval: f32,
    pub skew: f32,
}

impl ParameterRange {
    pub const fn new(start: f32, end: f32, interval: f32, skew: f32) -> Self {
        Self {
            start,
            end,
            interval,
            skew,
        }
    }

    /// Clamp into `[start, end]`; NaN maps to `start`
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            return self.start;
        }
        value.clamp(self.start, self.end)
    }

    /// Snap to the nearest step, then clamp
    pub fn snap(&self, value: f32) -> f32 {
        let value = self.clamp(value);
        if self.interval > 0.0 {
            // Stepping in f64 keeps decimal steps such as 0.05 landing on the
            // nearest f32 instead of accumulating error.
            let start = f64::from(self.start);
            let interval = f64::from(self.interval);
            let steps = ((f64::from(value) - start) / interval + 0.5).floor();
            self.clamp((start + interval * steps) as f32)
        } else {
            value
        }
    }

    /// Map a normalised position to a legal value
    pub fn from_normalized(&self, proportion: f32) -> f32 {
        let mut proportion = if proportion.is_nan() {
            0.0
        } else {
            proportion.clamp(0.0, 1.0)
        };
        if self.skew != 1.0 && proportion > 0.0 {
            proportion = (proportion.ln() / self.skew).exp();
        }
        self.snap(self.start + (self.end - self.start) * proportion)
    }

    /// Map a value to its normalised position
    pub fn to_normalized(&self, value: f32) -> f32 {
        let proportion = (self.clamp(value) - self.start) / (self.end - self.start);
        if self.skew == 1.0 {
            proportion
        } else {
            proportion.powf(self.skew)
        }
    }
}

/// Cut filter steepness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum Slope {
    #[default]
    Db12,
    Db24,
    Db36,
    Db48,
}

/// Choice labels shared by both slope controls
pub const SLOPE_LABELS: [&str; 4] = ["12 dB/Oct", "24 dB/Oct", "36 dB/Oct", "48 dB/Oct"];

impl Slope {
    pub const ALL: [Slope; 4] = [Slope::Db12, Slope::Db24, Slope::Db36, Slope::Db48];

    /// Convert a raw choice value, saturating at both ends (NaN is choice 0)
    pub fn from_choice(value: f32) -> Self {
        Self::ALL[(value as usize).min(Self::ALL.len() - 1)]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Butterworth order: 2, 4, 6 or 8
    pub fn order(self) -> usize {
        2 * (self.index() + 1)
    }

    /// Number of active second-order sections
    pub fn sections(self) -> usize {
        self.order() / 2
    }

    pub fn db_per_octave(self) -> u32 {
        12 * (self.index() as u32 + 1)
    }

    pub fn label(self) -> &'static str {
        SLOPE_LABELS[self.index()]
    }
}

impl From<Slope> for u32 {
    fn from(slope: Slope) -> Self {
        slope.db_per_octave()
    }
}

impl TryFrom<u32> for Slope {
    type Error = String;

    fn try_from(db_per_octave: u32) -> std::result::Result<Self, Self::Error> {
        Slope::ALL
            .into_iter()
            .find(|s| s.db_per_octave() == db_per_octave)
            .ok_or_else(|| {
                format!("unsupported slope {db_per_octave} dB/Oct (expected 12, 24, 36 or 48)")
            })
    }
}

impl fmt::Display for Slope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Descriptor of one control
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSpec {
    pub id: ParameterId,
    pub range: ParameterRange,
    pub default: f32,
    /// Labels for choice parameters, empty for continuous ones
    pub choices: &'static [&'static str],
    pub unit: &'static str,
}

impl ParameterSpec {
    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    pub fn is_choice(&self) -> bool {
        !self.choices.is_empty()
    }

    /// Human-readable rendering of a value
    pub fn display(&self, value: f32) -> String {
        if self.is_choice() {
            let index = (value as usize).min(self.choices.len() - 1);
            return self.choices[index].to_string();
        }
        if self.unit.is_empty() {
            format!("{value:.2}")
        } else {
            format!("{value:.1} {}", self.unit)
        }
    }
}

const FREQUENCY_RANGE: ParameterRange = ParameterRange::new(20.0, 20000.0, 1.0, 0.25);
const SLOPE_RANGE: ParameterRange = ParameterRange::new(0.0, 3.0, 1.0, 1.0);

/// Parameter layout of the equalizer
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterLayout {
    specs: [ParameterSpec; ParameterId::COUNT],
}

impl Default for ParameterLayout {
    fn default() -> Self {
        Self::standard()
    }
}

impl ParameterLayout {
    /// Ranges and defaults of the seven controls
    pub fn standard() -> Self {
        let specs = ParameterId::ALL.map(|id| match id {
            ParameterId::LowCutFreq => ParameterSpec {
                id,
                range: FREQUENCY_RANGE,
                default: 20.0,
                choices: &[],
                unit: "Hz",
            },
            ParameterId::HighCutFreq => ParameterSpec {
                id,
                range: FREQUENCY_RANGE,
                default: 20000.0,
                choices: &[],
                unit: "Hz",
            },
            ParameterId::PeakFreq => ParameterSpec {
                id,
                range: FREQUENCY_RANGE,
                default: 750.0,
                choices: &[],
                unit: "Hz",
            },
            ParameterId::PeakGain => ParameterSpec {
                id,
                range: ParameterRange::new(-24.0, 24.0, 0.5, 1.0),
                default: 0.0,
                choices: &[],
                unit: "dB",
            },
            ParameterId::PeakQuality => ParameterSpec {
                id,
                range: ParameterRange::new(0.1, 10.0, 0.05, 1.0),
                default: 1.0,
                choices: &[],
                unit: "",
            },
            ParameterId::LowCutSlope | ParameterId::HighCutSlope => ParameterSpec {
                id,
                range: SLOPE_RANGE,
                default: 0.0,
                choices: &SLOPE_LABELS,
                unit: "",
            },
        });
        Self { specs }
    }

    pub fn spec(&self, id: ParameterId) -> &ParameterSpec {
        &self.specs[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterSpec> {
        self.specs.iter()
    }
}

/// Read access to live parameter values
///
/// Implementations must be cheap and non-blocking: the audio thread calls
/// [`value`](ParameterStore::value) once per control per block.
pub trait ParameterStore: Send + Sync {
    fn value(&self, id: ParameterId) -> f32;
}

impl<T: ParameterStore + ?Sized> ParameterStore for std::sync::Arc<T> {
    fn value(&self, id: ParameterId) -> f32 {
        (**self).value(id)
    }
}

/// Plain (non-atomic) set of raw parameter values
///
/// Used for configuration files and as a fixed store in tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterValues {
    pub low_cut_freq: f32,
    pub low_cut_slope: Slope,
    pub high_cut_freq: f32,
    pub high_cut_slope: Slope,
    pub peak_freq: f32,
    pub peak_gain_db: f32,
    pub peak_quality: f32,
}

impl Default for ParameterValues {
    fn default() -> Self {
        let layout = ParameterLayout::standard();
        let mut values = Self {
            low_cut_freq: 0.0,
            low_cut_slope: Slope::Db12,
            high_cut_freq: 0.0,
            high_cut_slope: Slope::Db12,
            peak_freq: 0.0,
            peak_gain_db: 0.0,
            peak_quality: 0.0,
        };
        for spec in layout.iter() {
            values.set(spec.id, spec.default);
        }
        values
    }
}

impl ParameterValues {
    /// Raw value of one control (slopes as choice index)
    pub fn get(&self, id: ParameterId) -> f32 {
        match id {
            ParameterId::LowCutFreq => self.low_cut_freq,
            ParameterId::HighCutFreq => self.high_cut_freq,
            ParameterId::PeakFreq => self.peak_freq,
            ParameterId::PeakGain => self.peak_gain_db,
            ParameterId::PeakQuality => self.peak_quality,
            ParameterId::LowCutSlope => self.low_cut_slope.index() as f32,
            ParameterId::HighCutSlope => self.high_cut_slope.index() as f32,
        }
    }

    /// Store a raw value without range checks (slopes saturate)
    pub fn set(&mut self, id: ParameterId, value: f32) {
        match id {
            ParameterId::LowCutFreq => self.low_cut_freq = value,
            ParameterId::HighCutFreq => self.high_cut_freq = value,
            ParameterId::PeakFreq => self.peak_freq = value,
            ParameterId::PeakGain => self.peak_gain_db = value,
            ParameterId::PeakQuality => self.peak_quality = value,
            ParameterId::LowCutSlope => self.low_cut_slope = Slope::from_choice(value),
            ParameterId::HighCutSlope => self.high_cut_slope = Slope::from_choice(value),
        }
    }
}

impl ParameterStore for ParameterValues {
    fn value(&self, id: ParameterId) -> f32 {
        self.get(id)
    }
}

/// Lock-free parameter store
///
/// Each control lives in its own atomic cell; writers clamp and snap values
/// to the layout before publishing them.
pub struct ParameterTree {
    layout: ParameterLayout,
    values: [AtomicCell<f32>; ParameterId::COUNT],
}

impl Default for ParameterTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ParameterTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterTree")
            .field("values", &self.snapshot())
            .finish()
    }
}

impl ParameterTree {
    /// Store holding the layout defaults
    pub fn new() -> Self {
        let layout = ParameterLayout::standard();
        let values = ParameterId::ALL.map(|id| AtomicCell::new(layout.spec(id).default));
        Self { layout, values }
    }

    /// Store initialised from a value set
    pub fn with_values(values: &ParameterValues) -> Self {
        let tree = Self::new();
        tree.load(values);
        tree
    }

    pub fn layout(&self) -> &ParameterLayout {
        &self.layout
    }

    pub fn get(&self, id: ParameterId) -> f32 {
        self.values[id.index()].load()
    }

    /// Publish a new value, clamped and snapped to the control's range
    ///
    /// Returns the value actually stored.
    pub fn set(&self, id: ParameterId, value: f32) -> f32 {
        let legal = self.layout.spec(id).range.snap(value);
        self.values[id.index()].store(legal);
        legal
    }

    /// Publish a value given as a normalised `0..=1` position
    pub fn set_normalized(&self, id: ParameterId, proportion: f32) -> f32 {
        let value = self.layout.spec(id).range.from_normalized(proportion);
        self.values[id.index()].store(value);
        value
    }

    pub fn normalized(&self, id: ParameterId) -> f32 {
        self.layout.spec(id).range.to_normalized(self.get(id))
    }

    /// Publish every control from a value set
    pub fn load(&self, values: &ParameterValues) {
        for id in ParameterId::ALL {
            self.set(id, values.get(id));
        }
        debug!(?values, "Parameter values loaded");
    }

    /// Copy of the current values
    pub fn snapshot(&self) -> ParameterValues {
        let mut values = ParameterValues::default();
        for id in ParameterId::ALL {
            values.set(id, self.get(id));
        }
        values
    }
}

impl ParameterStore for ParameterTree {
    fn value(&self, id: ParameterId) -> f32 {
        self.get(id)
    }
}

/// Immutable settings snapshot for one processing block
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChainSettings {
    pub peak_freq: f32,
    pub peak_gain_db: f32,
    pub peak_quality: f32,
    pub low_cut_freq: f32,
    pub high_cut_freq: f32,
    pub low_cut_slope: Slope,
    pub high_cut_slope: Slope,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self::resolve(&ParameterValues::default())
    }
}

impl ChainSettings {
    /// Read the current values of every control
    ///
    /// Pure read; slope choices saturate into the four legal values so any
    /// float the store holds is accepted.
    pub fn resolve<S: ParameterStore + ?Sized>(store: &S) -> Self {
        Self {
            peak_freq: store.value(ParameterId::PeakFreq),
            peak_gain_db: store.value(ParameterId::PeakGain),
            peak_quality: store.value(ParameterId::PeakQuality),
            low_cut_freq: store.value(ParameterId::LowCutFreq),
            high_cut_freq: store.value(ParameterId::HighCutFreq),
            low_cut_slope: Slope::from_choice(store.value(ParameterId::LowCutSlope)),
            high_cut_slope: Slope::from_choice(store.value(ParameterId::HighCutSlope)),
        }
    }
}
