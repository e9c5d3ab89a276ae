//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files.  Missing keys fall back
//! to their defaults, so a hand-written `settings.toml` may list only what
//! it changes.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::audio::{AudioFormat, SilenceConfig};
use crate::pitch::{VoiceProfile, DEFAULT_GAIN};

use super::AppPaths;

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Stream format and utterance detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz for both directions.
    pub sample_rate: u32,
    /// Samples per capture read.
    pub chunk_size: usize,
    /// Peak amplitude (0 – 32767) below which a chunk counts as silent.
    pub silence_threshold: u16,
    /// Seconds of continuous silence that end an utterance.
    pub silence_secs: f32,
    /// Captures shorter than this are discarded as "no input".  The default
    /// sits just above the silence tail alone (22 × 2048 samples at 44.1 kHz).
    pub min_utterance_secs: f32,
    /// Hard cap on one capture.
    pub max_utterance_secs: f32,
    /// Input device name; `None` means the system default.
    pub input_device: Option<String>,
    /// Output device name; `None` means the system default.
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            chunk_size: 2048,
            silence_threshold: 1000,
            silence_secs: 1.0,
            min_utterance_secs: 1.1,
            max_utterance_secs: 30.0,
            input_device: None,
            output_device: None,
        }
    }
}

// ---------------------------------------------------------------------------
// PitchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    /// Gain applied after shifting to make up for lost loudness.
    pub gain: f32,
    /// Overlap-add grain length in samples.
    pub grain_size: usize,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            gain: DEFAULT_GAIN,
            grain_size: 2048,
        }
    }
}

/// Shortest grain the overlap-add stretch is given.
const MIN_GRAIN_SIZE: usize = 64;

impl PitchConfig {
    /// `gain`, or [`DEFAULT_GAIN`] with a warning when it is not a positive
    /// finite number.
    pub fn effective_gain(&self) -> f32 {
        if self.gain.is_finite() && self.gain > 0.0 {
            return self.gain;
        }
        log::warn!(
            "config: pitch.gain {} is not a positive number, using {DEFAULT_GAIN}",
            self.gain
        );
        DEFAULT_GAIN
    }

    /// `grain_size` clamped to `[64, sample_rate]`, with a warning when it
    /// had to move.
    pub fn effective_grain_size(&self, sample_rate: u32) -> usize {
        let upper = (sample_rate as usize).max(MIN_GRAIN_SIZE);
        let grain = self.grain_size.clamp(MIN_GRAIN_SIZE, upper);
        if grain != self.grain_size {
            log::warn!(
                "config: pitch.grain_size {} out of range, using {grain}",
                self.grain_size
            );
        }
        grain
    }
}

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// How often the output is polled for "drained".
    pub drain_poll_ms: u64,
    /// Give up waiting for the output to drain after this long.
    pub drain_timeout_secs: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            drain_poll_ms: 100,
            drain_timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// Presentation-side settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Interval at which the event queue is drained.
    pub poll_interval_ms: u64,
    /// Control label while idle.
    pub start_label: String,
    /// Control label while cycling.
    pub stop_label: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            start_label: "Start".into(),
            stop_label: "Stop".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use voice_morph::config::AppConfig;
///
/// // Defaults when the file is missing
/// let mut config = AppConfig::load().unwrap();
/// config.active_profile = "bear".into();
/// config.save().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Name of the profile in `profiles` used for new cycles.
    pub active_profile: String,
    pub audio: AudioConfig,
    pub pitch: PitchConfig,
    pub playback: PlaybackConfig,
    pub ui: UiConfig,
    /// Selectable voice profiles.
    pub profiles: Vec<VoiceProfile>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            active_profile: "parrot".into(),
            audio: AudioConfig::default(),
            pitch: PitchConfig::default(),
            playback: PlaybackConfig::default(),
            ui: UiConfig::default(),
            profiles: vec![VoiceProfile::parrot(), VoiceProfile::bear()],
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Derived values
    // -----------------------------------------------------------------------

    pub fn format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.audio.sample_rate,
            chunk_size: self.audio.chunk_size,
        }
    }

    pub fn silence(&self) -> SilenceConfig {
        SilenceConfig::from_duration(
            self.audio.silence_threshold,
            self.audio.sample_rate,
            self.audio.chunk_size,
            self.audio.silence_secs,
        )
    }

    pub fn min_utterance_samples(&self) -> usize {
        self.secs_to_samples(self.audio.min_utterance_secs)
    }

    pub fn max_utterance_samples(&self) -> usize {
        self.secs_to_samples(self.audio.max_utterance_secs)
    }

    /// Look up a profile by name (case-insensitive).
    pub fn profile(&self, name: &str) -> Option<&VoiceProfile> {
        self.profiles
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// The profile named by `active_profile`, else the first valid listed
    /// one, else the built-in parrot profile.  Profiles with non-finite or
    /// out-of-range bounds are skipped.
    pub fn active_profile(&self) -> VoiceProfile {
        match self.profile(&self.active_profile) {
            Some(profile) if profile.is_valid() => return profile.clone(),
            Some(profile) => log::warn!(
                "config: profile '{}' has invalid bounds ({}, {})",
                profile.name,
                profile.min_factor,
                profile.max_factor
            ),
            None => log::warn!("config: unknown profile '{}'", self.active_profile),
        }
        let fallback = self
            .profiles
            .iter()
            .find(|p| p.is_valid())
            .cloned()
            .unwrap_or_else(VoiceProfile::parrot);
        log::warn!("config: using profile '{}'", fallback.name);
        fallback
    }

    fn secs_to_samples(&self, secs: f32) -> usize {
        (secs.max(0.0) as f64 * self.audio.sample_rate as f64).ceil() as usize
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.active_profile, loaded.active_profile);
        assert_eq!(original.profiles, loaded.profiles);
        assert_eq!(original.audio.sample_rate, loaded.audio.sample_rate);
        assert_eq!(original.audio.chunk_size, loaded.audio.chunk_size);
        assert_eq!(
            original.audio.silence_threshold,
            loaded.audio.silence_threshold
        );
        assert_eq!(original.audio.input_device, loaded.audio.input_device);
        assert_eq!(original.pitch.gain, loaded.pitch.gain);
        assert_eq!(original.playback.drain_poll_ms, loaded.playback.drain_poll_ms);
        assert_eq!(original.ui.stop_label, loaded.ui.stop_label);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");

        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.active_profile, "parrot");
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.format(), AudioFormat::default());
        assert_eq!(cfg.audio.silence_threshold, 1000);
        assert_eq!(cfg.audio.silence_secs, 1.0);
        assert_eq!(cfg.pitch.gain, 1.2);
        assert_eq!(cfg.playback.drain_poll_ms, 100);
        assert_eq!(cfg.ui.poll_interval_ms, 100);
        assert_eq!(cfg.ui.start_label, "Start");
        assert_eq!(cfg.ui.stop_label, "Stop");
        assert_eq!(cfg.profiles.len(), 2);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "active_profile = \"bear\"\n\n[audio]\nsilence_threshold = 500\n",
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).expect("load");

        assert_eq!(cfg.audio.silence_threshold, 500);
        assert_eq!(cfg.audio.sample_rate, 44_100);
        assert_eq!(cfg.ui.start_label, "Start");
        assert_eq!(cfg.active_profile().name, "bear");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "audio = 12").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn derived_silence_and_sample_counts() {
        let cfg = AppConfig::default();

        let silence = cfg.silence();
        assert_eq!(silence.threshold, 1000);
        assert_eq!(silence.debounce_chunks, 22);

        // The silence tail alone never reaches the minimum.
        assert!(silence.debounce_chunks * cfg.audio.chunk_size < cfg.min_utterance_samples());
        assert_eq!(cfg.max_utterance_samples(), 1_323_000);
    }

    #[test]
    fn unknown_active_profile_falls_back_to_first() {
        let mut cfg = AppConfig::default();
        cfg.active_profile = "robot".into();
        assert_eq!(cfg.active_profile().name, "parrot");

        cfg.profiles.clear();
        assert_eq!(cfg.active_profile(), VoiceProfile::parrot());
    }

    #[test]
    fn bad_pitch_settings_fall_back() {
        for gain in [0.0, -2.0, f32::NAN, f32::INFINITY] {
            let pitch = PitchConfig { gain, ..PitchConfig::default() };
            assert_eq!(pitch.effective_gain(), DEFAULT_GAIN, "gain {gain}");
        }
        let pitch = PitchConfig { gain: 3.5, ..PitchConfig::default() };
        assert_eq!(pitch.effective_gain(), 3.5);

        let grain = |grain_size| PitchConfig { grain_size, ..PitchConfig::default() };
        assert_eq!(grain(0).effective_grain_size(44_100), 64);
        assert_eq!(grain(1 << 30).effective_grain_size(44_100), 44_100);
        assert_eq!(grain(2048).effective_grain_size(44_100), 2048);
    }

    #[test]
    fn invalid_active_profile_falls_back_to_a_valid_one() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("inf.toml");
        std::fs::write(
            &path,
            "active_profile = \"squeak\"\n\n\
             [[profiles]]\nname = \"squeak\"\nmin_factor = 4.0\nmax_factor = inf\n\n\
             [[profiles]]\nname = \"bear\"\nmin_factor = -10.0\nmax_factor = -16.0\n",
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).expect("load");

        assert!(cfg.profile("squeak").is_some());
        assert_eq!(cfg.active_profile(), VoiceProfile::bear());
    }

    #[test]
    fn profile_lookup_ignores_case() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.profile("BEAR"), Some(&VoiceProfile::bear()));
        assert!(cfg.profile("owl").is_none());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("deeper").join("settings.toml");
        AppConfig::default().save_to(&path).expect("save");
        assert!(path.exists());
    }
}
