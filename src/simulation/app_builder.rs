//! Headless App Builder
//!
//! Provides a reusable builder for creating headless Bevy apps hosting a quest.
//! Used by the simulation runner and the scenario tests.

use bevy::app::ScheduleRunnerPlugin;
use bevy::log::{Level, LogPlugin};
use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use std::time::Duration;

use crate::events::EventBus;
use crate::plugin::QuestPlugin;
use crate::quest::QuestConfig;

/// Builder for creating headless Bevy apps
pub struct HeadlessAppBuilder {
    config: QuestConfig,
    fps: f64,
    minimal_threads: bool,
    log_level: Option<Level>,
}

impl HeadlessAppBuilder {
    /// Create a new builder for the given quest
    pub fn new(config: QuestConfig) -> Self {
        Self {
            config,
            fps: 60.0,
            minimal_threads: false,
            log_level: None,
        }
    }

    /// Set the target FPS (default: 60)
    pub fn with_fps(mut self, fps: f64) -> Self {
        if fps > 0.0 {
            self.fps = fps;
        }
        self
    }

    /// Enable minimal thread mode (task pools = 1)
    ///
    /// Use this when running many apps in parallel to avoid hitting OS thread limits.
    pub fn with_minimal_threads(mut self) -> Self {
        self.minimal_threads = true;
        self
    }

    /// Route `bevy::log` output to stderr at `level`
    ///
    /// Installs the global subscriber, so only one app per process should use it.
    pub fn with_logging(mut self, level: Level) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Frame duration the clock advances by on each update
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }

    /// Build the app with minimal plugins and the quest plugin
    ///
    /// Time advances by exactly one frame per `app.update()`, so runs are
    /// deterministic regardless of wall-clock speed. The first update only
    /// initializes the clock.
    pub fn build(self) -> App {
        let frame = self.frame_duration();
        let mut app = App::new();

        if self.minimal_threads {
            app.add_plugins(
                MinimalPlugins
                    .set(ScheduleRunnerPlugin::run_loop(frame))
                    .set(TaskPoolPlugin {
                        task_pool_options: TaskPoolOptions::with_num_threads(1),
                    }),
            );
        } else {
            app.add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(frame)));
        }

        if let Some(level) = self.log_level {
            app.add_plugins(LogPlugin {
                level,
                ..default()
            });
        }

        app.insert_resource(TimeUpdateStrategy::ManualDuration(frame));
        app.insert_resource(EventBus::new());
        app.add_plugins(QuestPlugin::new(self.config));
        app
    }
}
