//! Pulse completion task
//!
//! Runs on the high priority interrupt executor. Each PIO state machine
//! raises its IRQ flag when its count expires; the task ends the pulse on
//! the bound output pin, or restarts the counter while a narrow slot still
//! has extension periods left.

use core::cell::RefCell;

use defmt::*;
use embassy_futures::select::{select4, Either4};
use embassy_rp::gpio::Output;
use embassy_rp::peripherals::PIO0;
use embassy_rp::pio::Irq;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use canmio_core::servo::{PulseEngine, PulseSink, PulseToken};
use canmio_hal::{HalPin, TimerSlotId};
use canmio_hal_rp2040::PioPulseTimers;

/// Pulse engine on PIO0 driving the sixteen servo pins
pub type Engine = PulseEngine<PioPulseTimers<'static, PIO0>, HalPin<Output<'static>>>;

/// Engine shared between the servo task and the completion handler
pub type SharedEngine = Mutex<CriticalSectionRawMutex, RefCell<Engine>>;

/// Completion interrupts of the four state machines
pub struct PulseIrqs {
    pub irq0: Irq<'static, PIO0, 0>,
    pub irq1: Irq<'static, PIO0, 1>,
    pub irq2: Irq<'static, PIO0, 2>,
    pub irq3: Irq<'static, PIO0, 3>,
}

/// Lock-holding view of the shared engine for one scheduling pass
pub struct SharedSink<'a>(pub &'a SharedEngine);

impl PulseSink for SharedSink<'_> {
    fn arm(&mut self, token: PulseToken) {
        self.0.lock(|engine| engine.borrow_mut().arm(token));
    }

    fn release(&mut self, slot: TimerSlotId) -> Option<PulseToken> {
        self.0.lock(|engine| engine.borrow_mut().release(slot))
    }
}

/// Pulse completion task
#[embassy_executor::task]
pub async fn pulse_task(engine: &'static SharedEngine, mut irqs: PulseIrqs) {
    info!("Pulse task started");

    loop {
        let slot: TimerSlotId = match select4(
            irqs.irq0.wait(),
            irqs.irq1.wait(),
            irqs.irq2.wait(),
            irqs.irq3.wait(),
        )
        .await
        {
            Either4::First(()) => 0,
            Either4::Second(()) => 1,
            Either4::Third(()) => 2,
            Either4::Fourth(()) => 3,
        };

        let ended = engine.lock(|engine| engine.borrow_mut().on_expired(slot));
        if let Some(token) = ended {
            trace!("Pulse ended: slot {} line {}", slot, token.channel);
        }
    }
}
