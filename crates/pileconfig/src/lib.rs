use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_MIN_ALIVE_COUNT: usize = 10;
pub const DEFAULT_OVERSIZE: f32 = 1.2;
pub const DEFAULT_PLAYFIELD: (f32, f32) = (512.0, 384.0);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Easing applied to snapshot fades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FadeCurve {
    #[default]
    Linear,
    Smoothstep,
    EaseInOut,
}

/// Where snapshot proxies are built before the canvas is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrepareMode {
    /// Build proxies on the update thread while the scheduler is constructed.
    #[default]
    Inline,
    /// Build proxies on a worker thread; attach them on a later tick.
    Background,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PileConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub batching: Batching,
    #[serde(default)]
    pub transitions: Transitions,
    #[serde(default)]
    pub snapshot: SnapshotBounds,
    #[serde(default)]
    pub prepare: Prepare,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Batching {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_min_alive_count")]
    pub min_alive_count: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Transitions {
    #[serde(
        default = "default_reveal_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub reveal_duration: Duration,
    #[serde(
        default = "default_retire_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub retire_duration: Duration,
    #[serde(
        default = "default_retire_grace",
        deserialize_with = "deserialize_duration"
    )]
    pub retire_grace: Duration,
    #[serde(default)]
    pub curve: FadeCurve,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SnapshotBounds {
    #[serde(default = "default_oversize")]
    pub oversize: f32,
    #[serde(default = "default_playfield_width")]
    pub playfield_width: f32,
    #[serde(default = "default_playfield_height")]
    pub playfield_height: f32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Prepare {
    #[serde(default)]
    pub mode: PrepareMode,
}

impl Default for PileConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            batching: Batching::default(),
            transitions: Transitions::default(),
            snapshot: SnapshotBounds::default(),
            prepare: Prepare::default(),
        }
    }
}

impl Default for Batching {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            min_alive_count: default_min_alive_count(),
        }
    }
}

impl Default for Transitions {
    fn default() -> Self {
        Self {
            reveal_duration: default_reveal_duration(),
            retire_duration: default_retire_duration(),
            retire_grace: default_retire_grace(),
            curve: FadeCurve::default(),
        }
    }
}

impl Default for SnapshotBounds {
    fn default() -> Self {
        Self {
            oversize: default_oversize(),
            playfield_width: default_playfield_width(),
            playfield_height: default_playfield_height(),
        }
    }
}

impl Transitions {
    pub fn reveal_ms(&self) -> f64 {
        millis(self.reveal_duration)
    }

    pub fn retire_ms(&self) -> f64 {
        millis(self.retire_duration)
    }

    pub fn grace_ms(&self) -> f64 {
        millis(self.retire_grace)
    }
}

/// Converts a configured duration to the millisecond timeline used by playback.
pub fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

fn default_version() -> u32 {
    1
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_min_alive_count() -> usize {
    DEFAULT_MIN_ALIVE_COUNT
}

fn default_reveal_duration() -> Duration {
    Duration::from_millis(400)
}

fn default_retire_duration() -> Duration {
    Duration::from_millis(100)
}

fn default_retire_grace() -> Duration {
    Duration::from_millis(50)
}

fn default_oversize() -> f32 {
    DEFAULT_OVERSIZE
}

fn default_playfield_width() -> f32 {
    DEFAULT_PLAYFIELD.0
}

fn default_playfield_height() -> f32 {
    DEFAULT_PLAYFIELD.1
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl PileConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: PileConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        let Batching {
            batch_size,
            min_alive_count,
        } = self.batching;

        if batch_size == 0 {
            return Err(ConfigError::Invalid(
                "batching.batch_size must be greater than zero".into(),
            ));
        }

        if min_alive_count == 0 {
            return Err(ConfigError::Invalid(
                "batching.min_alive_count must be at least 1".into(),
            ));
        }

        if min_alive_count > batch_size {
            return Err(ConfigError::Invalid(format!(
                "batching.min_alive_count ({min_alive_count}) may not exceed batching.batch_size ({batch_size})"
            )));
        }

        if self.transitions.retire_duration.is_zero() {
            return Err(ConfigError::Invalid(
                "transitions.retire_duration must be greater than zero to avoid a hand-off pop"
                    .into(),
            ));
        }

        let oversize = self.snapshot.oversize;
        if !oversize.is_finite() || oversize < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "snapshot.oversize must be a finite value >= 1.0 (got {oversize})"
            )));
        }

        let (width, height) = (self.snapshot.playfield_width, self.snapshot.playfield_height);
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "snapshot playfield must have positive dimensions (got {width}x{height})"
            )));
        }

        Ok(())
    }
}
