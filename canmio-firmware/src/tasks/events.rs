//! Event task
//!
//! Translates between bus events and the servo engine through the event
//! teaching table:
//! - received accessory events become consumed actions for the servo task
//! - milestones become producer actions, announced if an event is taught
//! - node variable writes reconfigure a line and re-seed its defaults
//! - the end of the startup hold announces the start of day event

use defmt::*;
use embassy_futures::select::{select4, Either4};

use canmio_core::config::ModuleConfig;
use canmio_core::servo::Milestone;
use canmio_protocol::action::consumer;
use canmio_protocol::{AccessoryEvent, EventTable, Polarity};

use crate::channels::{
    LineConfig, ServoRequest, BUS_RX, BUS_TX, CONFIG_CHANGED, LINE_CONFIG, MILESTONES,
    SERVO_REQUESTS, START_OF_DAY,
};

/// Event task
#[embassy_executor::task]
pub async fn events_task(node: u16, mut config: ModuleConfig, mut table: EventTable) {
    info!("Event task started, node {}", node);

    loop {
        match select4(
            BUS_RX.receive(),
            MILESTONES.receive(),
            LINE_CONFIG.receive(),
            START_OF_DAY.wait(),
        )
        .await
        {
            Either4::First(event) => consume(&table, &config, event).await,
            Either4::Second(milestone) => produce(&table, &config, node, milestone),
            Either4::Third(line) => reconfigure(&mut table, &mut config, node, line).await,
            Either4::Fourth(()) => start_of_day(&table, &config, node),
        }
    }
}

async fn consume(table: &EventTable, config: &ModuleConfig, event: AccessoryEvent) {
    trace!("Received {:?}", event);

    for action in table.consumed_actions(event.id()) {
        let Some(io_type) = config.channel(action.io() as usize).map(|c| c.io_type()) else {
            continue;
        };
        if consumer::trigger_polarity(io_type, action.selector()) == Some(event.polarity()) {
            SERVO_REQUESTS.send(ServoRequest::Action(action)).await;
        }
    }
}

fn produce(table: &EventTable, config: &ModuleConfig, node: u16, milestone: Milestone) {
    let Some(io_type) = config
        .channel(milestone.channel as usize)
        .map(|c| c.io_type())
    else {
        return;
    };
    let Some(action) = milestone.producer_action(io_type) else {
        trace!("No producer action for {:?}", milestone);
        return;
    };
    let Some(id) = table.produced_event(action) else {
        trace!("No event taught for {:?}", action);
        return;
    };

    send(AccessoryEvent::new(id, milestone.polarity, node));
}

fn start_of_day(table: &EventTable, config: &ModuleConfig, node: u16) {
    if !config.sends_start_of_day() {
        return;
    }
    match table.start_of_day_event() {
        Some(id) => {
            info!("Start of day");
            send(AccessoryEvent::new(id, Polarity::On, node));
        }
        None => debug!("No event taught for start of day"),
    }
}

fn send(event: AccessoryEvent) {
    debug!("Sending {:?}", event);
    if BUS_TX.try_send(event).is_err() {
        warn!("Bus TX queue full, dropping {:?}", event);
    }
}

async fn reconfigure(table: &mut EventTable, config: &mut ModuleConfig, node: u16, line: LineConfig) {
    let io = line.io as usize;
    let Some(previous) = config.channel(io).copied() else {
        warn!("Node variable write for unknown line {}", line.io);
        return;
    };

    if previous.io_type() != line.config.io_type() {
        if let Err(e) = table.apply_defaults(node, line.io, line.config.io_type()) {
            warn!("Could not seed default events for line {}: {:?}", line.io, e);
        }
    }

    config.channels[io] = line.config;
    SERVO_REQUESTS.send(ServoRequest::Reconfigure(line)).await;
    CONFIG_CHANGED.signal(config.clone());
}
