use std::time::Duration;

use chrono_tiles_core::{
    AgentColor, AgentSnapshot, AgentState, Command, Event, GameState, GridCoordinates,
    RecordState, RecordedAction, Recording, ReplayFault, SessionCommand,
};
use chrono_tiles_system_pathfinding::Pathfinder;
use chrono_tiles_system_session::{Config, GoalTiles, Rejection, Session};
use chrono_tiles_world::{self as world, attributes::Barrier, query, Level, World};

const TICK: Duration = Duration::from_millis(50);
const MAX_TICKS: usize = 400;

struct Harness {
    world: World,
    session: Session,
    pathfinder: Pathfinder,
    events: Vec<Event>,
}

impl Harness {
    fn new(level: &str) -> Self {
        let level = Level::from_toml_str(level).expect("valid level");
        let session = Session::new(
            Config::from_level(&level).with_completion_rule(Box::new(GoalTiles::from_level(&level))),
        )
        .expect("valid session");
        Self {
            world: World::from_level(&level),
            session,
            pathfinder: Pathfinder::new(),
            events: Vec::new(),
        }
    }

    fn input(&mut self, input: SessionCommand) -> Result<(), Rejection> {
        let mut commands = Vec::new();
        let result = self.session.handle_input(
            input,
            &self.world,
            &mut self.pathfinder,
            &mut commands,
        );
        self.apply(commands);
        result
    }

    fn accept(&mut self, input: SessionCommand) {
        self.input(input).expect("input accepted");
    }

    fn tick(&mut self, dt: Duration) {
        self.apply(vec![Command::Tick { dt }]);
        let mut commands = Vec::new();
        self.session
            .tick(dt, &self.world, &mut commands)
            .expect("session tick");
        self.apply(commands);
    }

    fn tick_until(&mut self, mut done: impl FnMut(&Self) -> bool) {
        for _ in 0..MAX_TICKS {
            if done(self) {
                return;
            }
            self.tick(TICK);
        }
        panic!("condition not reached within {MAX_TICKS} ticks");
    }

    fn apply(&mut self, commands: Vec<Command>) {
        for command in commands {
            world::apply(&mut self.world, command, &mut self.events).expect("command applies");
        }
    }

    fn agent(&self, color: AgentColor) -> AgentSnapshot {
        query::agent(&self.world, color).expect("agent exists")
    }

    fn select_and_play(&mut self, agent: AgentColor) {
        self.accept(SessionCommand::SelectAgent { agent });
        self.accept(SessionCommand::Play);
    }

    fn walk(&mut self, agent: AgentColor, target: GridCoordinates) {
        self.accept(SessionCommand::PickDestination { agent, target });
        self.tick_until(|harness| {
            let snapshot = harness.agent(agent);
            snapshot.position == target && snapshot.motion.is_none()
        });
    }

    fn world_recording(&self, agent: AgentColor) -> Option<Vec<RecordedAction>> {
        query::recording(&self.world, agent).map(|recording| recording.actions().to_vec())
    }
}

fn at(row: i32, column: i32) -> GridCoordinates {
    GridCoordinates::new(row, column, 0)
}

fn moves(tiles: &[GridCoordinates]) -> Vec<RecordedAction> {
    tiles
        .iter()
        .copied()
        .map(RecordedAction::TileMovement)
        .collect()
}

const OPEN_3X3: &str = r#"
time_limit_secs = 6.0
seconds_per_tile = 0.25

[[floors]]
rows = ["R.B", "...", "..."]
"#;

#[test]
fn recorded_path_replays_to_completion() {
    let mut harness = Harness::new(OPEN_3X3);
    harness.select_and_play(AgentColor::Red);
    for target in [at(1, 0), at(1, 1), at(2, 1)] {
        harness.walk(AgentColor::Red, target);
    }
    harness.accept(SessionCommand::Stop);

    let expected = moves(&[at(1, 0), at(1, 1), at(2, 1)]);
    assert_eq!(
        harness.world_recording(AgentColor::Red),
        Some(expected.clone())
    );
    assert_eq!(
        harness.session.recording(AgentColor::Red).map(Recording::actions),
        Some(expected.as_slice())
    );
    let red = harness.agent(AgentColor::Red);
    assert_eq!(red.position, at(0, 0), "stop returns agents to their spawners");
    assert_eq!(red.record_state, RecordState::Available);

    harness.select_and_play(AgentColor::Blue);
    harness.tick_until(|harness| {
        harness.agent(AgentColor::Red).record_state == RecordState::Completed
    });

    let red = harness.agent(AgentColor::Red);
    assert_eq!(red.position, at(2, 1));
    assert_eq!(red.state, AgentState::Recorded);
    assert!(!harness
        .events
        .iter()
        .any(|event| matches!(event, Event::ReplayHalted { .. })));
    assert_eq!(harness.session.game_state(), GameState::Play);
}

#[test]
fn idle_time_before_stop_is_recorded() {
    let mut harness = Harness::new(OPEN_3X3);
    harness.select_and_play(AgentColor::Red);
    for _ in 0..20 {
        harness.tick(Duration::from_millis(100));
    }
    harness.accept(SessionCommand::Stop);

    assert_eq!(
        harness.world_recording(AgentColor::Red),
        Some(vec![RecordedAction::IdleTime(Duration::from_secs(2))])
    );
}

#[test]
fn idle_between_walks_is_flushed_before_the_next_move() {
    let mut harness = Harness::new(OPEN_3X3);
    harness.select_and_play(AgentColor::Red);
    harness.walk(AgentColor::Red, at(0, 1));
    for _ in 0..4 {
        harness.tick(TICK);
    }
    harness.walk(AgentColor::Red, at(1, 1));
    harness.accept(SessionCommand::Stop);

    assert_eq!(
        harness.world_recording(AgentColor::Red),
        Some(vec![
            RecordedAction::TileMovement(at(0, 1)),
            RecordedAction::IdleTime(Duration::from_millis(200)),
            RecordedAction::TileMovement(at(1, 1)),
        ])
    );
}

#[test]
fn replay_halts_on_tile_blocked_since_recording() {
    let mut harness = Harness::new(OPEN_3X3);
    harness.select_and_play(AgentColor::Red);
    harness.walk(AgentColor::Red, at(1, 1));
    harness.walk(AgentColor::Red, at(2, 1));
    harness.accept(SessionCommand::Stop);

    let _ = harness
        .world
        .insert_attribute(at(2, 1), Box::new(Barrier))
        .expect("on grid");
    harness.select_and_play(AgentColor::Blue);
    harness.tick_until(|harness| {
        harness.agent(AgentColor::Red).record_state == RecordState::Error
    });

    let halted_at = harness.agent(AgentColor::Red).position;
    assert_eq!(halted_at, at(1, 1));
    assert!(harness.events.iter().any(|event| matches!(
        event,
        Event::ReplayHalted {
            agent: AgentColor::Red,
            action_index: 2,
            fault: ReplayFault::TargetBlocked,
            ..
        }
    )));

    for _ in 0..20 {
        harness.tick(TICK);
    }
    let red = harness.agent(AgentColor::Red);
    assert_eq!(red.position, halted_at);
    assert_eq!(red.record_state, RecordState::Error);
    assert!(red.motion.is_none());
}

#[test]
fn selection_is_locked_while_recording() {
    let mut harness = Harness::new(OPEN_3X3);
    harness.select_and_play(AgentColor::Red);

    assert_eq!(
        harness.input(SessionCommand::SelectAgent {
            agent: AgentColor::Blue
        }),
        Err(Rejection::SelectionLocked)
    );
    let status = harness.session.status();
    assert_eq!(status.selected, Some(AgentColor::Red));
    assert!(!status.pick_enabled);

    harness.accept(SessionCommand::Stop);
    harness.accept(SessionCommand::SelectAgent {
        agent: AgentColor::Blue,
    });
    assert_eq!(harness.session.status().selected, Some(AgentColor::Blue));
}

#[test]
fn second_agent_plays_next_to_first_recording() {
    let mut harness = Harness::new(
        r#"
time_limit_secs = 6.0
seconds_per_tile = 0.25

[[floors]]
rows = ["R..", "...", "..B"]
"#,
    );
    harness.select_and_play(AgentColor::Red);
    harness.walk(AgentColor::Red, at(0, 2));
    harness.accept(SessionCommand::Stop);
    assert_eq!(
        harness.world_recording(AgentColor::Red),
        Some(moves(&[at(0, 1), at(0, 2)]))
    );

    harness.select_and_play(AgentColor::Blue);
    let red = harness.agent(AgentColor::Red);
    let blue = harness.agent(AgentColor::Blue);
    assert_eq!(red.state, AgentState::Recorded);
    assert_eq!(red.record_state, RecordState::Play);
    assert_eq!(blue.state, AgentState::Idle);
    assert_eq!(blue.record_state, RecordState::None);

    harness.tick(TICK);
    assert_eq!(
        harness.agent(AgentColor::Red).motion.map(|motion| motion.to),
        Some(at(0, 1)),
        "red starts replaying on the first tick"
    );

    harness.walk(AgentColor::Blue, at(1, 2));
    harness.tick_until(|harness| {
        harness.agent(AgentColor::Red).record_state == RecordState::Completed
    });
    assert_eq!(harness.agent(AgentColor::Red).position, at(0, 2));
    assert_eq!(harness.agent(AgentColor::Blue).position, at(1, 2));
}

#[test]
fn countdown_expiry_stops_the_cycle() {
    let mut harness = Harness::new(
        r#"
time_limit_secs = 1.0
seconds_per_tile = 0.25

[[floors]]
rows = ["R.."]
"#,
    );
    harness.select_and_play(AgentColor::Red);
    for _ in 0..9 {
        harness.tick(Duration::from_millis(100));
    }
    assert_eq!(harness.session.game_state(), GameState::Play);
    assert_eq!(
        harness.session.status().remaining,
        Duration::from_millis(100)
    );

    harness.tick(Duration::from_millis(100));
    let status = harness.session.status();
    assert_eq!(status.game_state, GameState::Stop);
    assert_eq!(status.remaining, Duration::from_secs(1));
    assert!(status.pick_enabled);
    assert_eq!(
        harness.world_recording(AgentColor::Red),
        Some(vec![RecordedAction::IdleTime(Duration::from_secs(1))])
    );
    let red = harness.agent(AgentColor::Red);
    assert_eq!(red.state, AgentState::Inactive);
    assert_eq!(red.record_state, RecordState::Available);
}

#[test]
fn reset_discards_every_recording() {
    let mut harness = Harness::new(OPEN_3X3);
    harness.select_and_play(AgentColor::Red);
    harness.walk(AgentColor::Red, at(1, 0));
    harness.accept(SessionCommand::Stop);
    harness.select_and_play(AgentColor::Blue);
    harness.tick(TICK);

    harness.accept(SessionCommand::Reset);
    let status = harness.session.status();
    assert_eq!(status.game_state, GameState::Start);
    assert_eq!(status.selected, None);
    assert!(status.pick_enabled);
    assert!(harness.session.recording(AgentColor::Red).is_none());
    for agent in query::agent_view(&harness.world).iter() {
        assert_eq!(agent.position, agent.spawn);
        assert_eq!(agent.state, AgentState::Inactive);
        assert_eq!(agent.record_state, RecordState::None);
        assert!(!agent.has_recording);
    }
    assert_eq!(
        harness.input(SessionCommand::Play),
        Err(Rejection::NoSelection)
    );
}

#[test]
fn reaching_every_goal_completes_the_puzzle() {
    let mut harness = Harness::new(
        r#"
time_limit_secs = 6.0
seconds_per_tile = 0.25

[[floors]]
rows = ["R..", "..."]

[[goals]]
agent = "red"
row = 1
column = 2
"#,
    );
    harness.select_and_play(AgentColor::Red);
    harness.walk(AgentColor::Red, at(1, 2));

    assert_eq!(harness.session.game_state(), GameState::Completed);
    assert_eq!(harness.agent(AgentColor::Red).state, AgentState::Inactive);
    assert!(matches!(
        harness.input(SessionCommand::Play),
        Err(Rejection::WrongState {
            state: GameState::Completed,
            ..
        })
    ));

    harness.accept(SessionCommand::Reset);
    assert_eq!(harness.session.game_state(), GameState::Start);
}

#[test]
fn declared_completion_halts_replays() {
    let mut harness = Harness::new(OPEN_3X3);
    harness.select_and_play(AgentColor::Red);
    harness.walk(AgentColor::Red, at(2, 0));
    harness.accept(SessionCommand::Stop);
    harness.select_and_play(AgentColor::Blue);
    harness.tick(TICK);

    harness.accept(SessionCommand::DeclareCompleted);
    let red = harness.agent(AgentColor::Red);
    assert_eq!(red.state, AgentState::Inactive);
    assert_eq!(red.record_state, RecordState::Play);

    let frozen = red.position;
    for _ in 0..10 {
        harness.tick(TICK);
    }
    assert_eq!(harness.agent(AgentColor::Red).position, frozen);
}

#[test]
fn picks_are_validated_against_the_live_agent() {
    let mut harness = Harness::new(
        r####"
time_limit_secs = 6.0
seconds_per_tile = 0.25

[[floors]]
rows = ["R.#", "###", "..B"]
"####,
    );

    assert!(matches!(
        harness.input(SessionCommand::SelectAgent {
            agent: AgentColor::Cyan
        }),
        Err(Rejection::UnknownAgent(AgentColor::Cyan))
    ));
    harness.accept(SessionCommand::SelectAgent {
        agent: AgentColor::Red,
    });
    assert!(matches!(
        harness.input(SessionCommand::PickDestination {
            agent: AgentColor::Red,
            target: at(0, 1),
        }),
        Err(Rejection::WrongState {
            state: GameState::Start,
            ..
        })
    ));
    harness.accept(SessionCommand::Play);

    let rejected = [
        (AgentColor::Blue, at(0, 1), Rejection::NotSelected(AgentColor::Blue)),
        (AgentColor::Red, at(0, 0), Rejection::AlreadyThere(at(0, 0))),
        (AgentColor::Red, at(0, 2), Rejection::TargetBlocked(at(0, 2))),
        (AgentColor::Red, at(2, 0), Rejection::NoPath(at(2, 0))),
    ];
    for (agent, target, expected) in rejected {
        assert_eq!(
            harness.input(SessionCommand::PickDestination { agent, target }),
            Err(expected)
        );
    }

    harness.accept(SessionCommand::PickDestination {
        agent: AgentColor::Red,
        target: at(0, 1),
    });
    assert_eq!(
        harness.input(SessionCommand::PickDestination {
            agent: AgentColor::Red,
            target: at(2, 1),
        }),
        Err(Rejection::NoPath(at(2, 1)))
    );
    harness.tick_until(|harness| harness.agent(AgentColor::Red).position == at(0, 1));
}

#[test]
fn picks_during_a_step_start_from_the_committed_tile() {
    let mut harness = Harness::new(OPEN_3X3);
    harness.select_and_play(AgentColor::Red);
    harness.accept(SessionCommand::PickDestination {
        agent: AgentColor::Red,
        target: at(0, 2),
    });
    harness.tick(TICK);
    assert_eq!(
        harness.agent(AgentColor::Red).committed_position(),
        at(0, 1)
    );

    harness.walk(AgentColor::Red, at(1, 1));
    harness.accept(SessionCommand::Stop);
    assert_eq!(
        harness.world_recording(AgentColor::Red),
        Some(moves(&[at(0, 1), at(1, 1)]))
    );
}

#[test]
fn picks_from_a_blocked_tile_are_rejected() {
    let mut harness = Harness::new(OPEN_3X3);
    harness.select_and_play(AgentColor::Red);
    let _ = harness
        .world
        .insert_attribute(at(0, 0), Box::new(Barrier))
        .expect("tile on grid");

    assert_eq!(
        harness.input(SessionCommand::PickDestination {
            agent: AgentColor::Red,
            target: at(1, 0),
        }),
        Err(Rejection::CurrentBlocked(at(0, 0)))
    );
    for _ in 0..10 {
        harness.tick(TICK);
    }
    let red = harness.agent(AgentColor::Red);
    assert_eq!(red.position, at(0, 0));
    assert!(red.motion.is_none());
    assert!(harness
        .session
        .recording(AgentColor::Red)
        .map_or(true, |recording| recording
            .actions()
            .iter()
            .all(|action| matches!(action, RecordedAction::IdleTime(_)))));
}
