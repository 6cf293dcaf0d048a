//! CANMIO - 16 channel CBUS I/O module firmware
//!
//! Main firmware binary for RP2040-based CANMIO boards. Sixteen I/O lines,
//! any of which can drive a hobby servo. Servo pulses are multiplexed onto
//! four PIO one-shot timers; motion milestones are reported as CBUS
//! accessory events.

#![no_std]
#![no_main]

use core::cell::RefCell;

use defmt::*;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::bind_interrupts;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio::Pio;
use embassy_sync::blocking_mutex::Mutex;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use canmio_core::config::{parse_config, ModuleConfig, NUM_IO};
use canmio_core::servo::{PulseEngine, ServoBank};
use canmio_hal::HalPin;
use canmio_hal_rp2040::{PioPulseTimers, Rp2040FlashStorage};
use canmio_protocol::EventTable;

use crate::config::{load_positions, log_config_summary, ConfigPersistence};
use crate::tasks::{PulseIrqs, SharedEngine};

mod channels;
mod config;
mod tasks;

/// Embedded default configuration (compiled into firmware)
/// Edit module.toml and rebuild to customize
const EMBEDDED_CONFIG: &str = include_str!("../module.toml");

/// Node number used for default events until one is allocated
const DEFAULT_NODE_NUMBER: u16 = 256;

bind_interrupts!(struct Irqs {
    PIO0_IRQ_0 => embassy_rp::pio::InterruptHandler<PIO0>;
});

/// Executor for the pulse completion handler, above the main executor
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    EXECUTOR_HIGH.on_interrupt()
}

static ENGINE: StaticCell<SharedEngine> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("CANMIO firmware starting...");

    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // Configuration and last known positions
    let flash_storage = Rp2040FlashStorage::new(p.FLASH, p.DMA_CH0);
    let mut persistence = ConfigPersistence::new(flash_storage);

    let config = match persistence.load().await {
        Ok(config) => config,
        Err(_) => {
            info!("No valid configuration in flash, using embedded defaults");
            create_default_config()
        }
    };

    let positions = load_positions(persistence.storage(), config.home_positions()).await;

    let mut bank = ServoBank::new(&config);
    bank.initialize(&positions);
    info!("Servo bank ready: {} servo lines", config.servo_count());

    // Default events for the module and every line
    let mut table = EventTable::new();
    if let Err(e) = table.apply_module_defaults(DEFAULT_NODE_NUMBER) {
        warn!("Could not seed start of day event: {:?}", e);
    }
    for (io, channel) in config.channels.iter().enumerate() {
        if let Err(e) = table.apply_defaults(DEFAULT_NODE_NUMBER, io as u8, channel.io_type()) {
            warn!("Could not seed default events for line {}: {:?}", io, e);
        }
    }

    // PIO0 state machines as the four pulse timers
    let Pio {
        mut common,
        irq0,
        irq1,
        irq2,
        irq3,
        sm0,
        sm1,
        sm2,
        sm3,
        ..
    } = Pio::new(p.PIO0, Irqs);

    let timers = PioPulseTimers::new(&mut common, sm0, sm1, sm2, sm3);
    let irqs = PulseIrqs {
        irq0,
        irq1,
        irq2,
        irq3,
    };

    // Servo signal lines: io N on GPIO N + 2
    let pins: [HalPin<Output<'static>>; NUM_IO] = [
        HalPin::new(Output::new(p.PIN_2, Level::Low)),
        HalPin::new(Output::new(p.PIN_3, Level::Low)),
        HalPin::new(Output::new(p.PIN_4, Level::Low)),
        HalPin::new(Output::new(p.PIN_5, Level::Low)),
        HalPin::new(Output::new(p.PIN_6, Level::Low)),
        HalPin::new(Output::new(p.PIN_7, Level::Low)),
        HalPin::new(Output::new(p.PIN_8, Level::Low)),
        HalPin::new(Output::new(p.PIN_9, Level::Low)),
        HalPin::new(Output::new(p.PIN_10, Level::Low)),
        HalPin::new(Output::new(p.PIN_11, Level::Low)),
        HalPin::new(Output::new(p.PIN_12, Level::Low)),
        HalPin::new(Output::new(p.PIN_13, Level::Low)),
        HalPin::new(Output::new(p.PIN_14, Level::Low)),
        HalPin::new(Output::new(p.PIN_15, Level::Low)),
        HalPin::new(Output::new(p.PIN_16, Level::Low)),
        HalPin::new(Output::new(p.PIN_17, Level::Low)),
    ];

    let engine: &'static SharedEngine =
        ENGINE.init(Mutex::new(RefCell::new(PulseEngine::new(timers, pins))));
    info!("PIO pulse timers initialized");

    // Completion handler runs above every other task
    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let high_spawner = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);
    high_spawner.spawn(tasks::pulse_task(engine, irqs)).unwrap();

    let hold_ms = config.startup_hold_ms();
    spawner.spawn(tasks::servo_task(bank, engine, hold_ms)).unwrap();
    spawner
        .spawn(tasks::events_task(DEFAULT_NODE_NUMBER, config, table))
        .unwrap();
    spawner
        .spawn(tasks::persist_task(persistence.into_storage()))
        .unwrap();

    info!("All tasks spawned, firmware running");

    // `common` owns the loaded PIO program and must outlive the timers
    loop {
        embassy_time::Timer::after_secs(60).await;
        trace!("Main loop heartbeat");
    }
}

/// Create the embedded default configuration
///
/// Parses the module.toml file that was embedded at compile time.
/// This is used as a fallback when no flash config exists.
fn create_default_config() -> ModuleConfig {
    match parse_config(EMBEDDED_CONFIG) {
        Ok(config) => {
            info!("Parsed embedded configuration successfully");
            log_config_summary(&config);
            config
        }
        Err(e) => {
            // Only reachable if module.toml slipped past build.rs validation
            error!("Failed to parse embedded config: {:?}", e);
            error!("All lines left as inputs");
            ModuleConfig::new()
        }
    }
}
