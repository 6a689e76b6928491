//! Bevy plugin hosting a quest in the frame loop
//!
//! Front ends write commands into [`QuestInput`] and read [`LiveRun`] to
//! render; the plugin's systems drive the simulation once per frame and push
//! quest events onto the [`EventBus`]. Assessment calls go straight to the
//! [`QuestSession`] resource.

use bevy::prelude::*;

use crate::driver::{LaunchParams, RunPhase, SimulationState, TickStatus};
use crate::events::{EventBus, update_event_bus_time};
use crate::quest::{Quest, QuestConfig};
use crate::target::ConstraintResult;
use crate::trials::Trial;

/// The quest owned by the app
#[derive(Resource)]
pub struct QuestSession {
    pub quest: Quest,
}

impl QuestSession {
    pub fn new(config: QuestConfig) -> Self {
        Self {
            quest: Quest::new(config),
        }
    }
}

/// Commands from the UI, consumed once per frame
#[derive(Resource, Default, Debug, Clone)]
pub struct QuestInput {
    pub launch: Option<LaunchParams>,
    pub stop: bool,
    pub reset: bool,
    pub new_round: bool,
}

/// Observable state of the current run, for renderers
#[derive(Resource, Default, Debug, Clone)]
pub struct LiveRun {
    pub run: Option<u64>,
    pub phase: RunPhase,
    pub state: Option<SimulationState>,
    pub feedback: Option<ConstraintResult>,
    /// Elapsed seconds readout, refreshed every display interval
    pub elapsed_display: Option<f64>,
    pub last_trial: Option<Trial>,
    /// Frames ticked in the current run
    pub frames: u32,
}

/// Installs the quest resources and the per-frame systems
pub struct QuestPlugin {
    pub config: QuestConfig,
}

impl QuestPlugin {
    pub fn new(config: QuestConfig) -> Self {
        Self { config }
    }
}

impl Plugin for QuestPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(QuestSession::new(self.config.clone()))
            .init_resource::<QuestInput>()
            .init_resource::<LiveRun>();
        if !app.world().contains_resource::<EventBus>() {
            app.insert_resource(EventBus::new());
        }
        // Order matters: time -> commands -> physics -> readout -> events
        app.add_systems(
            Update,
            (
                update_event_bus_time,
                apply_quest_input,
                drive_quest,
                update_elapsed_display,
                flush_quest_events,
            )
                .chain(),
        );
    }
}

/// Consume pending UI commands (stop before reset before new round before launch)
pub fn apply_quest_input(
    mut input: ResMut<QuestInput>,
    mut session: ResMut<QuestSession>,
    mut live: ResMut<LiveRun>,
    time: Res<Time>,
) {
    let now = time.elapsed_secs_f64();
    let quest = &mut session.quest;

    if std::mem::take(&mut input.stop) {
        if let Ok(trial) = quest.stop(now) {
            live.last_trial = Some(trial);
        }
    }
    if std::mem::take(&mut input.reset) && quest.reset().is_ok() {
        live.state = None;
        live.feedback = None;
        live.elapsed_display = None;
    }
    if std::mem::take(&mut input.new_round) {
        let _ = quest.new_round();
    }
    if let Some(params) = input.launch.take() {
        if let Ok(token) = quest.launch(params, now) {
            live.run = Some(token.generation());
            live.frames = 0;
            live.last_trial = None;
            live.elapsed_display = None;
        }
    }
    live.phase = quest.phase();
}

/// Tick the active run once per frame
pub fn drive_quest(mut session: ResMut<QuestSession>, mut live: ResMut<LiveRun>, time: Res<Time>) {
    let now = time.elapsed_secs_f64();
    let quest = &mut session.quest;
    match quest.frame(now) {
        TickStatus::Stale => {}
        TickStatus::Running(state) => {
            live.frames += 1;
            live.state = Some(state);
            live.feedback = quest.live_feedback();
        }
        TickStatus::Finished(outcome) => {
            live.frames += 1;
            live.state = Some(outcome.state);
            live.feedback = Some(outcome.evaluation);
            live.last_trial = quest.history().last().cloned();
        }
    }
    live.phase = quest.phase();
}

/// Refresh the elapsed readout on its own interval
pub fn update_elapsed_display(
    mut session: ResMut<QuestSession>,
    mut live: ResMut<LiveRun>,
    time: Res<Time>,
) {
    if let Some(elapsed) = session.quest.driver_mut().poll_display(time.elapsed_secs_f64()) {
        live.elapsed_display = Some(elapsed);
    }
}

/// Move queued quest events onto the bus
pub fn flush_quest_events(mut session: ResMut<QuestSession>, mut bus: ResMut<EventBus>) {
    bus.emit_all(session.quest.take_events());
}
