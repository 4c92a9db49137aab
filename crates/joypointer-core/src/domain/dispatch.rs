//! ActionDispatcher: turns parsed frames into pointer events.
//!
//! Movement is relative and applied on every frame.  Buttons are
//! *edge-triggered*: a `ButtonDown`/`ButtonUp` is emitted only when a switch
//! differs from the state last emitted for it.
//!
//! ```text
//! switch states:  0   0   1   1   0
//! events:         -   -   Down -  Up
//! ```
//!
//! The snapshot of last-emitted states lives for one connection.  A fresh
//! dispatcher is built on every reconnect, so the first frame of a new
//! connection is always compared against "all released".

use crate::domain::input::{ButtonRole, InputEvent};
use crate::protocol::frame::{FrameSchema, ParsedFrame, SwitchState};

/// Last-emitted state per switch index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonSnapshot {
    states: Vec<SwitchState>,
}

impl ButtonSnapshot {
    /// Creates a snapshot of `switch_count` released switches.
    pub fn released(switch_count: usize) -> Self {
        Self {
            states: vec![SwitchState::Released; switch_count],
        }
    }

    /// Returns the last-emitted state for `index`, or `Released` if the index
    /// is out of range.
    pub fn get(&self, index: usize) -> SwitchState {
        self.states.get(index).copied().unwrap_or_default()
    }

    fn set(&mut self, index: usize, state: SwitchState) {
        if let Some(slot) = self.states.get_mut(index) {
            *slot = state;
        }
    }

    fn reset(&mut self) {
        self.states.fill(SwitchState::Released);
    }
}

/// Edge-triggered frame → event converter for one connection.
#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    schema: FrameSchema,
    snapshot: ButtonSnapshot,
}

impl ActionDispatcher {
    /// Creates a dispatcher with every switch released.
    pub fn new(schema: FrameSchema) -> Self {
        Self {
            schema,
            snapshot: ButtonSnapshot::released(schema.switch_count()),
        }
    }

    pub fn schema(&self) -> FrameSchema {
        self.schema
    }

    pub fn snapshot(&self) -> &ButtonSnapshot {
        &self.snapshot
    }

    /// Converts one frame into events.
    ///
    /// Always starts with exactly one [`InputEvent::Move`] carrying the
    /// frame's axes, followed by one button event per switch that changed,
    /// in switch-index order.
    pub fn dispatch(&mut self, frame: &ParsedFrame) -> Vec<InputEvent> {
        let mut events = Vec::with_capacity(1 + frame.switches().len());
        events.push(InputEvent::Move {
            dx: frame.axis_x(),
            dy: frame.axis_y(),
        });

        let roles = self.schema.roles();
        for (index, (&state, &role)) in frame.switches().iter().zip(roles).enumerate() {
            if state == self.snapshot.get(index) {
                continue;
            }
            events.push(match state {
                SwitchState::Pressed => InputEvent::ButtonDown(role),
                SwitchState::Released => InputEvent::ButtonUp(role),
            });
            self.snapshot.set(index, state);
        }

        events
    }

    /// Emits `ButtonUp` for every role still held and marks it released.
    ///
    /// Called when a connection ends so a vanished device cannot leave a host
    /// button stuck down.
    pub fn release_all(&mut self) -> Vec<InputEvent> {
        let held: Vec<ButtonRole> = self
            .schema
            .roles()
            .iter()
            .enumerate()
            .filter(|(index, _)| self.snapshot.get(*index).is_pressed())
            .map(|(_, &role)| role)
            .collect();

        self.snapshot.reset();
        held.into_iter().map(InputEvent::ButtonUp).collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy(x: i32, y: i32, sw: SwitchState) -> ParsedFrame {
        ParsedFrame::new(FrameSchema::Legacy, x, y, vec![sw]).unwrap()
    }

    fn extended(x: i32, y: i32, sw: [u8; 3]) -> ParsedFrame {
        let switches = sw
            .iter()
            .map(|&v| SwitchState::from_value(i32::from(v)).unwrap())
            .collect();
        ParsedFrame::new(FrameSchema::Extended, x, y, switches).unwrap()
    }

    fn button_events(events: &[InputEvent]) -> Vec<InputEvent> {
        events
            .iter()
            .copied()
            .filter(|e| e.role().is_some())
            .collect()
    }

    // ── Movement ──────────────────────────────────────────────────────────────

    #[test]
    fn test_every_frame_yields_exactly_one_move_first() {
        // Arrange
        let mut dispatcher = ActionDispatcher::new(FrameSchema::Legacy);

        // Act
        let events = dispatcher.dispatch(&legacy(3, -7, SwitchState::Pressed));

        // Assert
        assert_eq!(events[0], InputEvent::Move { dx: 3, dy: -7 });
        assert_eq!(
            events.iter().filter(|e| matches!(e, InputEvent::Move { .. })).count(),
            1
        );
    }

    #[test]
    fn test_identical_moves_are_not_suppressed() {
        let mut dispatcher = ActionDispatcher::new(FrameSchema::Legacy);
        let frame = legacy(0, 0, SwitchState::Released);

        let first = dispatcher.dispatch(&frame);
        let second = dispatcher.dispatch(&frame);

        assert_eq!(first, vec![InputEvent::Move { dx: 0, dy: 0 }]);
        assert_eq!(second, vec![InputEvent::Move { dx: 0, dy: 0 }]);
    }

    // ── Edge triggering ───────────────────────────────────────────────────────

    #[test]
    fn test_switch_sequence_emits_one_down_and_one_up() {
        // Arrange
        let mut dispatcher = ActionDispatcher::new(FrameSchema::Legacy);
        let sequence = [0, 0, 1, 1, 0];

        // Act
        let buttons: Vec<InputEvent> = sequence
            .iter()
            .flat_map(|&v| {
                let sw = SwitchState::from_value(v).unwrap();
                button_events(&dispatcher.dispatch(&legacy(1, 1, sw)))
            })
            .collect();

        // Assert
        assert_eq!(
            buttons,
            vec![
                InputEvent::ButtonDown(ButtonRole::Primary),
                InputEvent::ButtonUp(ButtonRole::Primary),
            ]
        );
    }

    #[test]
    fn test_extended_switches_map_to_roles_by_index() {
        let mut dispatcher = ActionDispatcher::new(FrameSchema::Extended);

        let events = dispatcher.dispatch(&extended(0, 0, [1, 1, 1]));

        assert_eq!(
            button_events(&events),
            vec![
                InputEvent::ButtonDown(ButtonRole::Primary),
                InputEvent::ButtonDown(ButtonRole::Secondary),
                InputEvent::ButtonDown(ButtonRole::Tertiary),
            ]
        );
    }

    #[test]
    fn test_secondary_press_with_prior_release_emits_only_secondary_down() {
        let mut dispatcher = ActionDispatcher::new(FrameSchema::Extended);

        let events = dispatcher.dispatch(&extended(0, 0, [0, 1, 0]));

        assert_eq!(
            events,
            vec![
                InputEvent::Move { dx: 0, dy: 0 },
                InputEvent::ButtonDown(ButtonRole::Secondary),
            ]
        );
    }

    #[test]
    fn test_first_frame_all_released_emits_no_button_events() {
        let mut dispatcher = ActionDispatcher::new(FrameSchema::Extended);
        let events = dispatcher.dispatch(&extended(2, 2, [0, 0, 0]));
        assert!(button_events(&events).is_empty());
    }

    #[test]
    fn test_switches_change_independently() {
        let mut dispatcher = ActionDispatcher::new(FrameSchema::Extended);
        dispatcher.dispatch(&extended(0, 0, [1, 0, 1]));

        let events = dispatcher.dispatch(&extended(0, 0, [1, 1, 0]));

        assert_eq!(
            button_events(&events),
            vec![
                InputEvent::ButtonDown(ButtonRole::Secondary),
                InputEvent::ButtonUp(ButtonRole::Tertiary),
            ]
        );
    }

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    #[test]
    fn test_release_all_emits_up_for_held_roles_only() {
        // Arrange
        let mut dispatcher = ActionDispatcher::new(FrameSchema::Extended);
        dispatcher.dispatch(&extended(0, 0, [1, 0, 1]));

        // Act
        let released = dispatcher.release_all();

        // Assert
        assert_eq!(
            released,
            vec![
                InputEvent::ButtonUp(ButtonRole::Primary),
                InputEvent::ButtonUp(ButtonRole::Tertiary),
            ]
        );
        assert_eq!(dispatcher.snapshot(), &ButtonSnapshot::released(3));
    }

    #[test]
    fn test_release_all_with_nothing_held_is_empty() {
        let mut dispatcher = ActionDispatcher::new(FrameSchema::Legacy);
        assert!(dispatcher.release_all().is_empty());
    }

    #[test]
    fn test_release_all_makes_next_press_emit_again() {
        let mut dispatcher = ActionDispatcher::new(FrameSchema::Legacy);
        dispatcher.dispatch(&legacy(0, 0, SwitchState::Pressed));

        dispatcher.release_all();
        let events = dispatcher.dispatch(&legacy(0, 0, SwitchState::Pressed));

        assert_eq!(
            button_events(&events),
            vec![InputEvent::ButtonDown(ButtonRole::Primary)]
        );
    }

    #[test]
    fn test_snapshot_out_of_range_index_reads_released() {
        let snapshot = ButtonSnapshot::released(1);
        assert_eq!(snapshot.get(5), SwitchState::Released);
    }
}
