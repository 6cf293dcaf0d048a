//! Servo task
//!
//! Owns the servo bank and drives its two cadences:
//! - every 5 ms: arm the next block of pulses
//! - every 20 ms: advance motion and report milestones
//!
//! Requests from the event task are applied between ticks, so only this
//! task ever changes motion state. Requests that arrive during the startup
//! hold wait in the queue until the cadences start.

use defmt::*;
use embassy_futures::select::{select3, Either3};
use embassy_time::{Duration, Instant, Ticker, Timer};

use canmio_core::servo::{Milestone, ServoBank, ServoState, MOTION_PERIOD_MS, SCHEDULE_PERIOD_MS};

use super::pulse::{SharedEngine, SharedSink};
use crate::channels::{ServoRequest, MILESTONES, POSITIONS, SERVO_REQUESTS, START_OF_DAY};

/// Servo task
///
/// `hold_ms` lets the rest of the bus settle after power up.
#[embassy_executor::task]
pub async fn servo_task(mut bank: ServoBank, engine: &'static SharedEngine, hold_ms: u32) {
    info!("Servo task started, waiting {} ms", hold_ms);
    Timer::after_millis(hold_ms as u64).await;
    START_OF_DAY.signal(());

    let mut schedule = Ticker::every(Duration::from_millis(SCHEDULE_PERIOD_MS as u64));
    let mut motion = Ticker::every(Duration::from_millis(MOTION_PERIOD_MS as u64));
    let start = Instant::now();

    info!("Servo cadences running");

    loop {
        match select3(schedule.next(), motion.next(), SERVO_REQUESTS.receive()).await {
            Either3::First(()) => {
                let pass = bank.start_scheduling(&mut SharedSink(engine));
                trace!("Block {}: {} pulses", pass.block, pass.armed);
            }
            Either3::Second(()) => {
                let now_ms = start.elapsed().as_millis() as u32;
                motion_tick(&mut bank, now_ms);
            }
            Either3::Third(request) => apply_request(&mut bank, request),
        }
    }
}

fn motion_tick(bank: &mut ServoBank, now_ms: u32) {
    let moving_before = active_mask(bank);

    let mut report = |milestone: Milestone| {
        debug!("Milestone: {:?}", milestone);
        if MILESTONES.try_send(milestone).is_err() {
            warn!("Milestone queue full, dropping {:?}", milestone);
        }
    };
    let arrived = bank.advance_motion(now_ms, &mut report);

    let timed_out = moving_before & !active_mask(bank);
    if timed_out != 0 {
        debug!("Lines parked after timeout: {=u16:016b}", timed_out);
    }

    if arrived > 0 {
        if let Some(positions) = bank.take_positions_dirty() {
            POSITIONS.signal(positions);
        }
    }
}

/// Bit per line that is not OFF
fn active_mask(bank: &ServoBank) -> u16 {
    bank.channels()
        .iter()
        .enumerate()
        .filter(|(_, ch)| ch.state() != ServoState::Off)
        .fold(0, |mask, (io, _)| mask | (1 << io))
}

fn apply_request(bank: &mut ServoBank, request: ServoRequest) {
    match request {
        ServoRequest::Action(action) => {
            if bank.apply_action(action) {
                debug!("Line {} moving for {:?}", action.io(), action);
            } else {
                trace!("Action {:?} ignored", action);
            }
        }
        ServoRequest::Reconfigure(line) => {
            info!("Line {} reconfigured: {:?}", line.io, line.config);
            bank.reconfigure(line.io as usize, line.config);
        }
    }
}
