//! PIO-based one-shot pulse timers
//!
//! Uses RP2040's Programmable I/O as four independent one-shot counters,
//! one state machine per timer slot. The CPU pushes a tick count, the
//! state machine counts it down and raises its relative IRQ flag, which
//! the firmware awaits as the slot's completion interrupt.
//!
//! # Architecture
//!
//! All four state machines of one PIO block run the same program, loaded
//! once. Each is clocked at 4 MHz so one loop iteration is one timer tick
//! (0.25 µs). The x scratch register is 32 bits wide, so every slot
//! covers the longest servo pulse in a single shot.
//!
//! The output pins are driven by the pulse engine, not by PIO. Sixteen
//! lines share four machines, so a machine would need its pin mapping
//! rewritten for every pulse; the CPU sets the edges instead and the
//! pulse width carries the completion handling latency on top of the
//! count.

use canmio_hal::{CounterWidth, OneShotTimers, TimerSlotId};
use embassy_rp::pio::{instr, Common, Config, Instance, StateMachine};
use fixed::types::U24F8;

/// System clock frequency (RP2040 default)
pub const SYS_CLK_HZ: u32 = 125_000_000;

/// Counter tick frequency
pub const TICK_HZ: u32 = 4_000_000;

/// Cycles the program spends outside the countdown loop
///
/// `pull` and `mov` before the loop, `irq` after it, plus the extra pass
/// of `jmp x--` on zero.
pub const PROGRAM_OVERHEAD_TICKS: u32 = 4;

/// Clock divider for `tick_hz` as U24F8 bits
///
/// 125 MHz / 4 MHz = 31.25, i.e. 0x1F40.
pub const fn clock_divider_bits(sys_clk_hz: u32, tick_hz: u32) -> u32 {
    ((sys_clk_hz as u64 * 256) / tick_hz as u64) as u32
}

/// Value to push for a pulse of `ticks`
pub const fn counter_load(ticks: u32) -> u32 {
    ticks.saturating_sub(PROGRAM_OVERHEAD_TICKS)
}

/// Four one-shot timers on the state machines of one PIO block
pub struct PioPulseTimers<'d, PIO: Instance> {
    sm0: StateMachine<'d, PIO, 0>,
    sm1: StateMachine<'d, PIO, 1>,
    sm2: StateMachine<'d, PIO, 2>,
    sm3: StateMachine<'d, PIO, 3>,
    /// Program start, the state a stopped machine is returned to
    origin: u8,
}

impl<'d, PIO: Instance> PioPulseTimers<'d, PIO> {
    /// Load the counter program and start all four state machines
    ///
    /// Each machine then blocks on its TX FIFO until a pulse is started.
    pub fn new(
        common: &mut Common<'d, PIO>,
        mut sm0: StateMachine<'d, PIO, 0>,
        mut sm1: StateMachine<'d, PIO, 1>,
        mut sm2: StateMachine<'d, PIO, 2>,
        mut sm3: StateMachine<'d, PIO, 3>,
    ) -> Self {
        let prg = pio::pio_asm!(
            ".wrap_target",
            "pull block", // Wait for a tick count
            "mov x, osr",
            "count:",
            "jmp x-- count", // One tick per iteration
            "irq 0 rel", // Completion: IRQ flag = SM index
            ".wrap"
        );

        let installed = common.load_program(&prg.program);

        let mut cfg = Config::default();
        cfg.use_program(&installed, &[]);
        cfg.clock_divider = U24F8::from_bits(clock_divider_bits(SYS_CLK_HZ, TICK_HZ));

        sm0.set_config(&cfg);
        sm1.set_config(&cfg);
        sm2.set_config(&cfg);
        sm3.set_config(&cfg);

        sm0.set_enable(true);
        sm1.set_enable(true);
        sm2.set_enable(true);
        sm3.set_enable(true);

        Self {
            sm0,
            sm1,
            sm2,
            sm3,
            origin: installed.origin,
        }
    }
}

fn start_sm<PIO: Instance, const SM: usize>(sm: &mut StateMachine<'_, PIO, SM>, ticks: u32) {
    // The FIFO is empty unless a previous start was never consumed; a
    // dropped start shows up as a missing completion, never a long pulse
    let _ = sm.tx().try_push(counter_load(ticks));
}

fn stop_sm<PIO: Instance, const SM: usize>(sm: &mut StateMachine<'_, PIO, SM>, origin: u8) {
    sm.set_enable(false);
    sm.clear_fifos();
    sm.restart();
    // SAFETY: the machine is disabled and `origin` is the start of the
    // program loaded for it in `new`
    unsafe {
        instr::exec_jmp(sm, origin);
    }
    sm.set_enable(true);
}

impl<'d, PIO: Instance> OneShotTimers for PioPulseTimers<'d, PIO> {
    fn width(&self, _slot: TimerSlotId) -> CounterWidth {
        CounterWidth::Wide
    }

    fn start(&mut self, slot: TimerSlotId, ticks: u32) {
        match slot {
            0 => start_sm(&mut self.sm0, ticks),
            1 => start_sm(&mut self.sm1, ticks),
            2 => start_sm(&mut self.sm2, ticks),
            3 => start_sm(&mut self.sm3, ticks),
            _ => {}
        }
    }

    fn stop(&mut self, slot: TimerSlotId) {
        let origin = self.origin;
        match slot {
            0 => stop_sm(&mut self.sm0, origin),
            1 => stop_sm(&mut self.sm1, origin),
            2 => stop_sm(&mut self.sm2, origin),
            3 => stop_sm(&mut self.sm3, origin),
            _ => {}
        }
    }
}
