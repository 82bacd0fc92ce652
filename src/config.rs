//! Configuration types for the actor scheduler and session timer.

use crate::scheduler::TaskKind;
use crate::scheduler::dialogue_table::DialogueTable;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PomoConfig {
    /// Scheduler loop settings.
    pub scheduler: SchedulerConfig,
    /// Self-driving producer settings.
    pub producer: ProducerConfig,
    /// Task variant timings.
    pub tasks: TaskConfig,
    /// Focus/relax session settings.
    pub session: SessionConfig,
    /// Time-of-day dialogue lines.
    pub dialogue: DialogueTable,
}

/// Scheduler loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Default wall-clock ceiling for any single task.
    pub watchdog_secs: u64,
    /// How long the idle loop sleeps before re-checking an empty queue.
    ///
    /// Enqueues wake the loop immediately; this is only a fallback.
    pub idle_recheck_ms: u64,
    /// Put a fresh copy of a preempted task right behind the urgent task.
    pub requeue_preempted: bool,
    /// Per-kind watchdog ceilings that replace the default.
    pub watchdog_overrides: WatchdogOverrides,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            watchdog_secs: 7,
            idle_recheck_ms: 250,
            requeue_preempted: true,
            watchdog_overrides: WatchdogOverrides::default(),
        }
    }
}

impl SchedulerConfig {
    /// Watchdog ceiling for a given task kind.
    pub fn watchdog_for(&self, kind: TaskKind) -> Duration {
        let secs = match kind {
            TaskKind::Move => self.watchdog_overrides.r#move,
            TaskKind::Dialogue => self.watchdog_overrides.dialogue,
            TaskKind::IdleAction => self.watchdog_overrides.idle_action,
            TaskKind::Custom => None,
        }
        .unwrap_or(self.watchdog_secs);
        Duration::from_secs(secs)
    }
}

/// Optional per-kind watchdog ceilings, in seconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogOverrides {
    /// Ceiling for move tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#move: Option<u64>,
    /// Ceiling for dialogue tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialogue: Option<u64>,
    /// Ceiling for idle actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_action: Option<u64>,
}

/// Self-driving producer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Period between autonomous generation attempts.
    pub interval_ms: u64,
    /// Producer stops adding once the queue holds this many tasks.
    pub soft_capacity: usize,
    /// Probability that a generation attempt yields a move rather than dialogue.
    pub move_probability: f64,
    /// Minimum wander distance from the actor.
    pub min_radius: f32,
    /// Maximum wander distance from the actor.
    pub max_radius: f32,
    /// Rejection-sampling attempts before falling back to an idle action.
    pub max_destination_attempts: u32,
    /// Lower bound of the randomized idle-action interval.
    pub idle_action_min_secs: u64,
    /// Upper bound of the randomized idle-action interval.
    pub idle_action_max_secs: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            soft_capacity: 3,
            move_probability: 0.9,
            min_radius: 2.0,
            max_radius: 6.0,
            max_destination_attempts: 32,
            idle_action_min_secs: 20,
            idle_action_max_secs: 60,
        }
    }
}

/// Task variant timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    /// Delay between revealed dialogue characters.
    pub char_delay_ms: u64,
    /// How long the dialogue container stays open.
    pub dialogue_display_ms: u64,
    /// How long an idle action occupies the actor.
    pub idle_action_ms: u64,
    /// Arrival poll period for move tasks.
    pub move_poll_ms: u64,
    /// Animation parameter update period for move tasks.
    pub animation_frame_ms: u64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            char_delay_ms: 50,
            dialogue_display_ms: 4000,
            idle_action_ms: 2000,
            move_poll_ms: 100,
            animation_frame_ms: 33,
        }
    }
}

/// Focus/relax session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Length of one focus session.
    pub focus_minutes: u32,
    /// Length of one relax session.
    pub relax_minutes: u32,
    /// Total focus time a plan aims for.
    pub target_minutes: u32,
    /// Start the next session immediately after one completes.
    pub auto_start_next: bool,
    /// Persistence file override (defaults to the data directory).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            focus_minutes: 25,
            relax_minutes: 5,
            target_minutes: 100,
            auto_start_next: true,
            state_path: None,
        }
    }
}

impl SessionConfig {
    /// Resolved persistence file.
    pub fn state_path(&self) -> PathBuf {
        self.state_path
            .clone()
            .unwrap_or_else(crate::app_dirs::session_state_file)
    }
}

impl PomoConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| crate::error::PomoError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::PomoError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/pomo/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if std::env::var_os("POMO_CONFIG_DIR").is_some() {
            return crate::app_dirs::config_file();
        }
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("pomo").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("pomo")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/pomo-config/config.toml")
        }
    }

    /// Reject values the scheduler cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`PomoError::Config`](crate::PomoError::Config) naming the bad field.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::PomoError;

        let p = &self.producer;
        if !(0.0..=1.0).contains(&p.move_probability) {
            return Err(PomoError::Config(format!(
                "producer.move_probability must be within 0..=1, got {}",
                p.move_probability
            )));
        }
        if p.min_radius < 0.0 || p.max_radius < p.min_radius {
            return Err(PomoError::Config(format!(
                "producer radius range {}..{} is invalid",
                p.min_radius, p.max_radius
            )));
        }
        if p.idle_action_max_secs < p.idle_action_min_secs {
            return Err(PomoError::Config(format!(
                "producer idle action range {}..{}s is invalid",
                p.idle_action_min_secs, p.idle_action_max_secs
            )));
        }
        if self.scheduler.watchdog_secs == 0 {
            return Err(PomoError::Config(
                "scheduler.watchdog_secs must be positive".to_owned(),
            ));
        }
        if self.session.focus_minutes == 0 {
            return Err(PomoError::Config(
                "session.focus_minutes must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PomoConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.watchdog_secs, 7);
        assert_eq!(config.producer.soft_capacity, 3);
    }

    #[test]
    fn watchdog_override_replaces_default_for_that_kind_only() {
        let mut config = SchedulerConfig::default();
        config.watchdog_overrides.dialogue = Some(12);

        assert_eq!(
            config.watchdog_for(TaskKind::Dialogue),
            Duration::from_secs(12)
        );
        assert_eq!(config.watchdog_for(TaskKind::Move), Duration::from_secs(7));
        assert_eq!(
            config.watchdog_for(TaskKind::IdleAction),
            Duration::from_secs(7)
        );
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let toml_str = r#"
[scheduler]
watchdog_secs = 9

[scheduler.watchdog_overrides]
move = 15

[session]
focus_minutes = 50
"#;
        let config: PomoConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scheduler.watchdog_secs, 9);
        assert_eq!(
            config.scheduler.watchdog_for(TaskKind::Move),
            Duration::from_secs(15)
        );
        assert_eq!(config.session.focus_minutes, 50);
        assert_eq!(config.session.relax_minutes, 5);
        assert_eq!(config.producer.interval_ms, 1000);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = PomoConfig::from_file(std::path::Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();

        assert!(PomoConfig::from_file(&path).is_err());
    }

    #[test]
    fn from_file_rejects_inverted_radius() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[producer]\nmin_radius = 5.0\nmax_radius = 1.0\n").unwrap();

        let err = PomoConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("radius"));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = PomoConfig::default();
        config.session.relax_minutes = 10;
        config.scheduler.watchdog_overrides.idle_action = Some(3);
        config.save_to_file(&path).unwrap();

        let loaded = PomoConfig::from_file(&path).unwrap();
        assert_eq!(loaded.session.relax_minutes, 10);
        assert_eq!(loaded.scheduler.watchdog_overrides.idle_action, Some(3));
        assert_eq!(
            loaded.dialogue.lines(crate::scheduler::dialogue_table::DayPeriod::Night),
            config.dialogue.lines(crate::scheduler::dialogue_table::DayPeriod::Night)
        );
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = PomoConfig::default_config_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.ends_with("config.toml"));
        assert!(path_str.contains("pomo"));
    }
}
