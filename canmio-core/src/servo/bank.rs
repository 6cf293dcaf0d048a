//! The servo bank
//!
//! Owns the 16 channel records and exposes the operations the firmware
//! drives: the 5 ms scheduling pass, the 20 ms motion tick, commands and
//! startup restore.

use canmio_protocol::Action;

use crate::config::{ChannelConfig, ModuleConfig, NUM_IO};

use super::channel::{Channel, ServoState};
use super::command::{plan, ServoCommand};
use super::milestone::MilestoneSink;
use super::scheduler::{BlockPass, ChannelScheduler, PulseSink};

/// All servo lines of the module
pub struct ServoBank {
    channels: [Channel; NUM_IO],
    scheduler: ChannelScheduler,
    positions_dirty: bool,
}

impl ServoBank {
    /// Create the bank with every line parked at its home position
    pub fn new(config: &ModuleConfig) -> Self {
        let home = config.home_positions();
        Self {
            channels: core::array::from_fn(|i| {
                Channel::new(i as u8, config.channels[i], home[i])
            }),
            scheduler: ChannelScheduler::new(),
            positions_dirty: false,
        }
    }

    /// Restore last known positions and park every line
    pub fn initialize(&mut self, positions: &[u8; NUM_IO]) {
        for (channel, &position) in self.channels.iter_mut().zip(positions.iter()) {
            channel.current_pos = position;
            channel.park();
        }
        self.positions_dirty = false;
    }

    /// Serve the next block of lines (5 ms cadence)
    pub fn start_scheduling<S: PulseSink>(&mut self, sink: &mut S) -> BlockPass {
        self.scheduler.start_scheduling(&mut self.channels, sink)
    }

    /// Advance every servo line by one motion tick (20 ms cadence)
    ///
    /// Returns the number of lines that arrived on this tick.
    pub fn advance_motion<S: MilestoneSink>(&mut self, now_ms: u32, sink: &mut S) -> usize {
        let mut arrived = 0;
        for channel in self.channels.iter_mut() {
            if channel.config.is_servo_family() && channel.advance(now_ms, sink) {
                arrived += 1;
            }
        }
        if arrived > 0 {
            self.positions_dirty = true;
        }
        arrived
    }

    /// Apply a motion command to line `channel`
    ///
    /// Returns false when the command does not apply to the line; the line
    /// is left untouched.
    pub fn issue_command(&mut self, channel: usize, command: ServoCommand) -> bool {
        let Some(ch) = self.channels.get_mut(channel) else {
            return false;
        };
        let Some(motion) = plan(&ch.config, command) else {
            return false;
        };

        ch.target_pos = motion.target;
        ch.speed = motion.speed;
        ch.flags = motion.flags;
        ch.multi_target = motion.multi_target;
        ch.state = ServoState::Moving;
        true
    }

    /// Apply a consumed action from the event table
    ///
    /// Produced actions and actions for non-servo lines are ignored.
    pub fn apply_action(&mut self, action: Action) -> bool {
        let Action::Consumed { io, selector } = action else {
            return false;
        };
        let Some(ch) = self.channels.get(io as usize) else {
            return false;
        };
        match ServoCommand::from_consumed(ch.config.io_type(), selector) {
            Some(command) => self.issue_command(io as usize, command),
            None => false,
        }
    }

    /// Change the configuration of line `channel`
    ///
    /// The line is parked. If it was pulsing, its slot is released on the
    /// next pass over its block.
    pub fn reconfigure(&mut self, channel: usize, config: ChannelConfig) {
        if let Some(ch) = self.channels.get_mut(channel) {
            ch.config = config;
            ch.park();
        }
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn channels(&self) -> &[Channel; NUM_IO] {
        &self.channels
    }

    /// Current position of every line
    pub fn positions(&self) -> [u8; NUM_IO] {
        core::array::from_fn(|i| self.channels[i].current_pos)
    }

    /// Positions to persist, if any line arrived since the last call
    pub fn take_positions_dirty(&mut self) -> Option<[u8; NUM_IO]> {
        if core::mem::take(&mut self.positions_dirty) {
            Some(self.positions())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MultiConfig, ServoConfig};
    use crate::servo::command::MultiPosition;
    use crate::servo::milestone::{Milestone, MilestoneKind, MAX_MILESTONES_PER_TICK};
    use crate::servo::motion::{MOTION_PERIOD_MS, SCHEDULE_PERIOD_MS, STOPPED_TIMEOUT_MS};
    use crate::servo::pulse::PulseEngine;
    use crate::testing::{sim_pins, SimPin, SimTimers};
    use canmio_hal::{OutputPin, TIMER_SLOTS};
    use canmio_protocol::{action::consumer, Polarity};
    use heapless::Vec;
    use proptest::prelude::*;

    fn module(channels: &[(usize, ChannelConfig)]) -> ModuleConfig {
        let mut config = ModuleConfig::new();
        for &(io, channel) in channels {
            config.channels[io] = channel;
        }
        config
    }

    fn servo(start_pos: u8, end_pos: u8, speed: u8) -> ChannelConfig {
        ChannelConfig::Servo(ServoConfig {
            start_pos,
            end_pos,
            on_speed: speed,
            off_speed: speed,
        })
    }

    fn engine() -> PulseEngine<SimTimers, SimPin> {
        PulseEngine::new(SimTimers::mixed_layout(), sim_pins())
    }

    #[test]
    fn test_move_to_end_scenario() {
        let mut bank = ServoBank::new(&module(&[(0, servo(0, 200, 5))]));
        bank.initialize(&[0; NUM_IO]);
        assert!(bank.issue_command(0, ServoCommand::MoveToEnd));

        let mut seen: Vec<(u32, Milestone), 8> = Vec::new();
        for tick in 1..=40u32 {
            bank.advance_motion(tick * MOTION_PERIOD_MS, &mut |m: Milestone| {
                seen.push((tick, m)).unwrap()
            });
        }

        let ch = bank.channel(0).unwrap();
        assert_eq!(ch.current_pos(), 200);
        assert_eq!(ch.state(), ServoState::Stopped);
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, 20);
        assert_eq!(seen[0].1.kind, MilestoneKind::Mid);
        assert_eq!(seen[1].0, 40);
        assert_eq!(seen[1].1.kind, MilestoneKind::On);
        assert_eq!(seen[1].1.polarity, Polarity::On);
    }

    #[test]
    fn test_fast_sweep_of_every_line_in_one_tick() {
        let lines: [(usize, ChannelConfig); NUM_IO] =
            core::array::from_fn(|io| (io, servo(20, 220, 255)));
        let mut bank = ServoBank::new(&module(&lines));
        bank.initialize(&[20; NUM_IO]);
        for io in 0..NUM_IO {
            assert!(bank.issue_command(io, ServoCommand::MoveToEnd));
        }

        let mut seen: Vec<Milestone, MAX_MILESTONES_PER_TICK> = Vec::new();
        let arrived = bank.advance_motion(0, &mut |m: Milestone| seen.push(m).unwrap());

        assert_eq!(arrived, NUM_IO);
        assert_eq!(seen.len(), MAX_MILESTONES_PER_TICK);
        for io in 0..NUM_IO as u8 {
            let kinds: Vec<MilestoneKind, 2> = seen
                .iter()
                .filter(|m| m.channel == io)
                .map(|m| m.kind)
                .collect();
            assert_eq!(kinds.as_slice(), &[MilestoneKind::Mid, MilestoneKind::On]);
        }
    }

    #[test]
    fn test_multi_position_beyond_count_is_noop() {
        let multi = ChannelConfig::Multi(MultiConfig::new(&[40, 90], 3).unwrap());
        let mut bank = ServoBank::new(&module(&[(5, multi)]));
        bank.initialize(&[40; NUM_IO]);

        assert!(!bank.issue_command(5, ServoCommand::MoveToPosition(MultiPosition::Three)));
        let ch = bank.channel(5).unwrap();
        assert_eq!(ch.state(), ServoState::Off);
        assert_eq!(ch.target_pos(), 40);

        assert!(bank.issue_command(5, ServoCommand::MoveToPosition(MultiPosition::Two)));
        assert_eq!(bank.channel(5).unwrap().target_pos(), 90);
    }

    #[test]
    fn test_stopped_timeout_boundary() {
        let mut bank = ServoBank::new(&module(&[(2, servo(0, 10, 10))]));
        bank.initialize(&[0; NUM_IO]);
        bank.issue_command(2, ServoCommand::MoveToEnd);
        let mut ignore = |_: Milestone| {};

        let arrival = 5_000;
        assert_eq!(bank.advance_motion(arrival, &mut ignore), 1);

        bank.advance_motion(arrival + STOPPED_TIMEOUT_MS - 1, &mut ignore);
        assert_eq!(bank.channel(2).unwrap().state(), ServoState::Stopped);

        bank.advance_motion(arrival + STOPPED_TIMEOUT_MS, &mut ignore);
        assert_eq!(bank.channel(2).unwrap().state(), ServoState::Off);
    }

    #[test]
    fn test_new_command_while_stopped() {
        let mut bank = ServoBank::new(&module(&[(0, servo(0, 10, 10))]));
        let mut ignore = |_: Milestone| {};
        bank.issue_command(0, ServoCommand::MoveToEnd);
        bank.advance_motion(0, &mut ignore);
        assert_eq!(bank.channel(0).unwrap().state(), ServoState::Stopped);

        assert!(bank.issue_command(0, ServoCommand::MoveToStart));
        assert_eq!(bank.channel(0).unwrap().state(), ServoState::Moving);
        assert_eq!(bank.channel(0).unwrap().target_pos(), 0);
    }

    #[test]
    fn test_repeated_command_is_idempotent() {
        let mut bank = ServoBank::new(&module(&[(0, servo(0, 200, 5))]));
        let mut ignore = |_: Milestone| {};
        bank.issue_command(0, ServoCommand::MoveToEnd);
        bank.advance_motion(0, &mut ignore);
        bank.advance_motion(20, &mut ignore);
        let before = bank.channel(0).unwrap().clone();

        bank.issue_command(0, ServoCommand::MoveToEnd);
        let after = bank.channel(0).unwrap();
        assert_eq!(after.current_pos(), before.current_pos());
        assert_eq!(after.target_pos(), before.target_pos());
        assert_eq!(after.speed(), before.speed());
        assert_eq!(after.state(), ServoState::Moving);
    }

    #[test]
    fn test_apply_consumed_action() {
        let mut bank = ServoBank::new(&module(&[(3, servo(10, 100, 5))]));

        let on = Action::consumed(3, consumer::SERVO_ON).unwrap();
        assert!(bank.apply_action(on));
        assert_eq!(bank.channel(3).unwrap().target_pos(), 100);

        // Line 4 is an input
        let other = Action::consumed(4, consumer::SERVO_ON).unwrap();
        assert!(!bank.apply_action(other));

        let produced = Action::produced(3, consumer::SERVO_OFF).unwrap();
        assert!(!bank.apply_action(produced));
    }

    #[test]
    fn test_commands_ignored_for_non_servo_lines() {
        let mut bank = ServoBank::new(&module(&[(1, ChannelConfig::Output)]));
        assert!(!bank.issue_command(1, ServoCommand::MoveToEnd));
        assert!(!bank.issue_command(99, ServoCommand::MoveToEnd));
    }

    #[test]
    fn test_initialize_restores_positions() {
        let mut bank = ServoBank::new(&module(&[(0, servo(30, 200, 5))]));
        assert_eq!(bank.channel(0).unwrap().current_pos(), 30);

        let mut saved = [0u8; NUM_IO];
        saved[0] = 123;
        bank.initialize(&saved);
        let ch = bank.channel(0).unwrap();
        assert_eq!(ch.current_pos(), 123);
        assert_eq!(ch.target_pos(), 123);
        assert_eq!(ch.state(), ServoState::Off);
    }

    #[test]
    fn test_positions_dirty_after_arrival() {
        let mut bank = ServoBank::new(&module(&[(0, servo(0, 10, 10))]));
        let mut ignore = |_: Milestone| {};
        assert_eq!(bank.take_positions_dirty(), None);

        bank.issue_command(0, ServoCommand::MoveToEnd);
        bank.advance_motion(0, &mut ignore);
        let positions = bank.take_positions_dirty().unwrap();
        assert_eq!(positions[0], 10);
        assert_eq!(bank.take_positions_dirty(), None);
    }

    #[test]
    fn test_reconfigure_releases_slot() {
        let mut bank = ServoBank::new(&module(&[(6, servo(0, 200, 5))]));
        let mut engine = engine();
        bank.issue_command(6, ServoCommand::MoveToEnd);

        // Line 6 is block 1, slot 2 (a narrow slot)
        bank.start_scheduling(&mut engine);
        bank.start_scheduling(&mut engine);
        assert_eq!(engine.binding(2).map(|b| b.token.channel), Some(6));
        assert!(engine.pins()[6].is_set_high());

        bank.reconfigure(6, ChannelConfig::Input);
        assert_eq!(bank.channel(6).unwrap().state(), ServoState::Off);
        for _ in 0..4 {
            bank.start_scheduling(&mut engine);
        }
        assert!(engine.binding(2).is_none());
        assert!(engine.pins()[6].is_set_low());
        assert!(!bank.issue_command(6, ServoCommand::MoveToEnd));
    }

    #[test]
    fn test_full_sweep_pulses_every_active_line() {
        let config = module(&[
            (0, servo(0, 255, 1)),
            (5, servo(0, 255, 1)),
            (10, servo(0, 255, 1)),
            (15, servo(0, 255, 1)),
        ]);
        let mut bank = ServoBank::new(&config);
        let mut engine = engine();
        for io in [0, 5, 10, 15] {
            bank.issue_command(io, ServoCommand::MoveToEnd);
        }

        // 4 passes of 5 ms make one 20 ms frame
        for _ in 0..(MOTION_PERIOD_MS / SCHEDULE_PERIOD_MS) {
            bank.start_scheduling(&mut engine);
            for slot in 0..TIMER_SLOTS as u8 {
                while engine.binding(slot).is_some() {
                    engine.on_expired(slot);
                }
            }
        }
        for io in [0, 5, 10, 15] {
            assert_eq!(engine.pins()[io].rising_edges, 1);
        }
        assert_eq!(engine.pins()[1].rising_edges, 0);
    }

    fn servo_config() -> impl Strategy<Value = ChannelConfig> {
        prop_oneof![
            Just(ChannelConfig::Input),
            Just(ChannelConfig::Output),
            (any::<u8>(), any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(s, e, on, off)| {
                ChannelConfig::Servo(ServoConfig {
                    start_pos: s,
                    end_pos: e,
                    on_speed: on,
                    off_speed: off,
                })
            }),
            (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(s, e, speed)| {
                ChannelConfig::Bounce(ServoConfig {
                    start_pos: s,
                    end_pos: e,
                    on_speed: speed,
                    off_speed: speed,
                })
            }),
            (proptest::collection::vec(any::<u8>(), 2..=4), any::<u8>())
                .prop_map(|(p, speed)| ChannelConfig::Multi(MultiConfig::new(&p, speed).unwrap())),
        ]
    }

    proptest! {
        #[test]
        fn prop_step_never_overshoots(
            start in any::<u8>(),
            end in any::<u8>(),
            from in any::<u8>(),
            speed in 1u8..=255,
            to_end in any::<bool>(),
        ) {
            let mut bank = ServoBank::new(&module(&[(0, servo(start, end, speed))]));
            let mut saved = [0u8; NUM_IO];
            saved[0] = from;
            bank.initialize(&saved);
            let command = if to_end { ServoCommand::MoveToEnd } else { ServoCommand::MoveToStart };
            bank.issue_command(0, command);
            let target = if to_end { end } else { start };
            let mut ignore = |_: Milestone| {};

            let mut previous = from;
            for tick in 0..300u32 {
                bank.advance_motion(tick * MOTION_PERIOD_MS, &mut ignore);
                let pos = bank.channel(0).unwrap().current_pos();
                if from <= target {
                    prop_assert!(pos <= target && pos >= previous);
                } else {
                    prop_assert!(pos >= target && pos <= previous);
                }
                previous = pos;
            }
            prop_assert_eq!(previous, target);
        }

        #[test]
        fn prop_single_mid_per_episode(
            speed in prop_oneof![Just(1u8), Just(255u8), 1u8..=255],
            to_end in any::<bool>(),
        ) {
            let (start, end) = (20u8, 220u8);
            let mut bank = ServoBank::new(&module(&[(0, servo(start, end, speed))]));
            let mut saved = [0u8; NUM_IO];
            saved[0] = if to_end { start } else { end };
            bank.initialize(&saved);
            bank.issue_command(0, if to_end { ServoCommand::MoveToEnd } else { ServoCommand::MoveToStart });

            let mut mids = 0;
            let mut arrivals: Vec<MilestoneKind, 4> = Vec::new();
            for tick in 0..300u32 {
                bank.advance_motion(tick * MOTION_PERIOD_MS, &mut |m: Milestone| match m.kind {
                    MilestoneKind::Mid => mids += 1,
                    kind => arrivals.push(kind).unwrap(),
                });
            }
            prop_assert_eq!(mids, 1);
            let expected = if to_end { MilestoneKind::On } else { MilestoneKind::Off };
            prop_assert_eq!(arrivals.as_slice(), &[expected]);
        }

        #[test]
        fn prop_at_most_four_slots_armed(
            configs in proptest::collection::vec(servo_config(), NUM_IO),
            commands in proptest::collection::vec(0u8..6, NUM_IO),
            passes in 1usize..12,
        ) {
            let mut config = ModuleConfig::new();
            for (io, c) in configs.iter().enumerate() {
                config.channels[io] = *c;
            }
            let mut bank = ServoBank::new(&config);
            for (io, &c) in commands.iter().enumerate() {
                let command = match c {
                    0 => ServoCommand::MoveToEnd,
                    1 => ServoCommand::MoveToStart,
                    n => ServoCommand::MoveToPosition(MultiPosition::from_number(n - 1).unwrap()),
                };
                bank.issue_command(io, command);
            }

            let mut engine = engine();
            let mut ignore = |_: Milestone| {};
            for pass in 0..passes {
                let result = bank.start_scheduling(&mut engine);
                prop_assert!(result.armed as usize <= TIMER_SLOTS);
                prop_assert!(engine.armed_count() <= TIMER_SLOTS);
                prop_assert!(engine.timers().running_count() <= TIMER_SLOTS);
                for slot in 0..TIMER_SLOTS as u8 {
                    if let Some(binding) = engine.binding(slot) {
                        let ch = bank.channel(binding.token.channel as usize).unwrap();
                        prop_assert!(ch.state() != ServoState::Off);
                        prop_assert_eq!(binding.token.channel as usize % TIMER_SLOTS, slot as usize);
                    }
                }
                if pass % 4 == 3 {
                    bank.advance_motion(pass as u32 * SCHEDULE_PERIOD_MS, &mut ignore);
                }
            }
        }
    }
}
