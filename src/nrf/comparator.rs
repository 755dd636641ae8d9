//! Capacitive pad sampler: COMP + TIMER1 chained through PPI.
//!
//! The comparator's 10 µA source current charges the selected pad while
//! COMP watches it against a VDD-referenced hysteresis band. Two PPI
//! channel groups turn the comparator's CROSS events into a stopwatch:
//!
//! ```text
//!   group 0 (armed by measure):  CROSS -> TIMER1.START
//!                                CROSS -> disable group 0
//!                                CROSS -> enable group 1
//!   group 1:                     CROSS -> TIMER1.CAPTURE[0]
//!                                CROSS -> TIMER1.STOP
//!                                CROSS -> disable group 1
//!                                CROSS -> COMP.STOP
//! ```
//!
//! CC[0] then holds the ticks between the two crossings. CC[1] is an
//! overrun guard that clears and stops the timer. The SoftDevice owns the
//! PPI peripheral, so channels and groups go through the `sd_ppi_*` calls.

use core::ffi::c_void;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use capkeys::config::{
    COMP_THRESHOLD_DOWN, COMP_THRESHOLD_UP, SENSE_EDGE_TIMEOUT_MS, SENSE_OVERRUN_TICKS,
};
use capkeys::error::{Error, SamplerError};
use capkeys::sense::{AnalogInput, HardwareSampler};
use defmt::{info, warn};
use embassy_nrf::interrupt::{self, typelevel, InterruptExt, Priority};
use embassy_nrf::{pac, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{with_deadline, Duration, Instant};
use nrf_softdevice::{raw, Softdevice};

// COMP register values.
const COMP_ENABLE: u32 = 2;
const COMP_REFSEL_VDD: u32 = 4;
const COMP_MODE_SE_HIGH_SPEED: u32 = 2;
const COMP_ISOURCE_10UA: u32 = 3;
const COMP_INT_CROSS: u32 = 1 << 3;

// TIMER register values.
const TIMER_MODE_TIMER: u32 = 0;
const TIMER_BITMODE_16: u32 = 0;
const TIMER_PRESCALER_16MHZ: u32 = 0;
const TIMER_SHORT_COMPARE1_CLEAR: u32 = 1 << 1;
const TIMER_SHORT_COMPARE1_STOP: u32 = 1 << 9;
const TIMER_INT_COMPARE1: u32 = 1 << 17;

const FIRST_GROUP: u8 = 0;
const SECOND_GROUP: u8 = 1;

static CROSSINGS: AtomicU8 = AtomicU8::new(0);
static OVERRUN: AtomicBool = AtomicBool::new(false);
static CROSSED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// COMP_LPCOMP interrupt: counts crossings.
pub struct CompInterruptHandler;

impl typelevel::Handler<typelevel::COMP_LPCOMP> for CompInterruptHandler {
    unsafe fn on_interrupt() {
        let comp = pac::COMP;
        if comp.events_cross().read() != 0 {
            comp.events_cross().write_value(0);
            CROSSINGS.fetch_add(1, Ordering::AcqRel);
            CROSSED.signal(());
        }
    }
}

/// TIMER1 interrupt: the overrun guard fired.
pub struct TimerInterruptHandler;

impl typelevel::Handler<typelevel::TIMER1> for TimerInterruptHandler {
    unsafe fn on_interrupt() {
        let timer = pac::TIMER1;
        if timer.events_compare(1).read() != 0 {
            timer.events_compare(1).write_value(0);
            OVERRUN.store(true, Ordering::Release);
            CROSSED.signal(());
        }
    }
}

fn check(ret: u32) -> Result<(), Error> {
    if ret == raw::NRF_SUCCESS {
        Ok(())
    } else {
        warn!("sd_ppi call failed: {}", ret);
        Err(Error::PeripheralNotReady)
    }
}

fn endpoint<T>(reg: *mut T) -> *const c_void {
    reg as *const c_void
}

/// Pad sampler owning COMP and TIMER1.
pub struct CompSampler {
    _comp: peripherals::COMP,
    _timer: peripherals::TIMER1,
}

impl CompSampler {
    /// Configure COMP, TIMER1 and the PPI chain.
    ///
    /// Takes the SoftDevice to make sure it is enabled first: the PPI calls
    /// below go through it.
    pub fn new(
        _sd: &Softdevice,
        comp: peripherals::COMP,
        timer: peripherals::TIMER1,
        _irqs: impl interrupt::typelevel::Binding<typelevel::COMP_LPCOMP, CompInterruptHandler>
            + interrupt::typelevel::Binding<typelevel::TIMER1, TimerInterruptHandler>
            + 'static,
    ) -> Result<Self, Error> {
        let c = pac::COMP;
        c.enable().write(|w| w.0 = COMP_ENABLE);
        c.refsel().write(|w| w.0 = COMP_REFSEL_VDD);
        c.th()
            .write(|w| w.0 = ((COMP_THRESHOLD_UP as u32) << 8) | COMP_THRESHOLD_DOWN as u32);
        c.mode().write(|w| w.0 = COMP_MODE_SE_HIGH_SPEED);
        c.isource().write(|w| w.0 = COMP_ISOURCE_10UA);
        c.events_cross().write_value(0);
        c.intenset().write(|w| w.0 = COMP_INT_CROSS);

        let t = pac::TIMER1;
        t.tasks_stop().write_value(1);
        t.mode().write(|w| w.0 = TIMER_MODE_TIMER);
        t.bitmode().write(|w| w.0 = TIMER_BITMODE_16);
        t.prescaler().write(|w| w.0 = TIMER_PRESCALER_16MHZ);
        t.cc(1).write_value(SENSE_OVERRUN_TICKS);
        t.shorts()
            .write(|w| w.0 = TIMER_SHORT_COMPARE1_CLEAR | TIMER_SHORT_COMPARE1_STOP);
        t.events_compare(1).write_value(0);
        t.intenset().write(|w| w.0 = TIMER_INT_COMPARE1);
        t.tasks_clear().write_value(1);

        let cross = endpoint(c.events_cross().as_ptr());
        let ppi = pac::PPI;
        let chain: [(u8, *const c_void); 7] = [
            (0, endpoint(t.tasks_start().as_ptr())),
            (1, endpoint(ppi.tasks_chg(FIRST_GROUP as usize).dis().as_ptr())),
            (2, endpoint(ppi.tasks_chg(SECOND_GROUP as usize).en().as_ptr())),
            (3, endpoint(t.tasks_capture(0).as_ptr())),
            (4, endpoint(t.tasks_stop().as_ptr())),
            (5, endpoint(ppi.tasks_chg(SECOND_GROUP as usize).dis().as_ptr())),
            (6, endpoint(c.tasks_stop().as_ptr())),
        ];

        // SAFETY: every endpoint is a valid event/task register address and
        // channels 0..=6, groups 0..=1 are free for the application.
        unsafe {
            for (ch, task) in chain {
                check(raw::sd_ppi_channel_assign(ch, cross as _, task as _))?;
            }
            check(raw::sd_ppi_group_assign(FIRST_GROUP, 0b000_0111))?;
            check(raw::sd_ppi_group_assign(SECOND_GROUP, 0b111_1000))?;
            check(raw::sd_ppi_group_task_disable(FIRST_GROUP))?;
            check(raw::sd_ppi_group_task_disable(SECOND_GROUP))?;
        }

        interrupt::COMP_LPCOMP.set_priority(Priority::P3);
        interrupt::TIMER1.set_priority(Priority::P3);
        interrupt::COMP_LPCOMP.unpend();
        interrupt::TIMER1.unpend();
        // SAFETY: both handlers are bound through `_irqs`.
        unsafe {
            interrupt::COMP_LPCOMP.enable();
            interrupt::TIMER1.enable();
        }

        info!("pad sampler ready");
        Ok(Self {
            _comp: comp,
            _timer: timer,
        })
    }

    /// Stop everything a measurement may have left running.
    fn abort(&mut self) {
        // SAFETY: group numbers were assigned in `new`.
        unsafe {
            raw::sd_ppi_group_task_disable(FIRST_GROUP);
            raw::sd_ppi_group_task_disable(SECOND_GROUP);
        }
        pac::COMP.tasks_stop().write_value(1);
        let t = pac::TIMER1;
        t.tasks_stop().write_value(1);
        t.tasks_clear().write_value(1);
    }

    /// Wait until `target` crossings were counted or the edge timeout runs
    /// out. Overrun counts as a miss.
    async fn wait_crossings(target: u8) -> bool {
        let deadline = Instant::now() + Duration::from_millis(SENSE_EDGE_TIMEOUT_MS);
        loop {
            if OVERRUN.load(Ordering::Acquire) {
                return false;
            }
            if CROSSINGS.load(Ordering::Acquire) >= target {
                return true;
            }
            if with_deadline(deadline, CROSSED.wait()).await.is_err() {
                return !OVERRUN.load(Ordering::Acquire)
                    && CROSSINGS.load(Ordering::Acquire) >= target;
            }
        }
    }
}

impl HardwareSampler for CompSampler {
    async fn measure(&mut self, input: AnalogInput) -> Result<u32, SamplerError> {
        CROSSINGS.store(0, Ordering::Release);
        OVERRUN.store(false, Ordering::Release);
        CROSSED.reset();

        let c = pac::COMP;
        let t = pac::TIMER1;
        c.psel().write(|w| w.0 = input.index() as u32);
        t.tasks_clear().write_value(1);
        t.events_compare(1).write_value(0);

        // SAFETY: group assigned in `new`.
        let armed = unsafe { raw::sd_ppi_group_task_enable(FIRST_GROUP) };
        if armed != raw::NRF_SUCCESS {
            return Err(SamplerError::FirstEdgeTimeout { input });
        }
        c.tasks_start().write_value(1);

        if !Self::wait_crossings(1).await {
            self.abort();
            return Err(SamplerError::FirstEdgeTimeout { input });
        }
        if !Self::wait_crossings(2).await {
            self.abort();
            return Err(SamplerError::SecondEdgeTimeout { input });
        }

        Ok(t.cc(0).read())
    }
}
