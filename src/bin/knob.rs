#![no_std]
#![no_main]

extern crate alloc;

use alloc::boxed::Box;

use esp_backtrace as _;
use esp_hal::{
    clock::CpuClock,
    delay::Delay,
    gpio::{Level, Output},
    i2c::{self, master::I2c},
    mcpwm::{operator::PwmPinConfig, timer::PwmWorkingMode, McPwm, PeripheralClockConfig},
    system::{CpuControl, Stack},
    time::RateExtU32,
    xtensa_lx_rt::entry,
};
use knob::{
    knob::{dispatch_pulses, PulseQueue},
    motor::ThreePhasePwm,
    sensor::As5600,
    util::{Clock, Instant},
    Knob, KnobConfig, KnobMode, KnobShared, Motor, MotorConfig, Pulse,
};
use log::{error, info};
use static_cell::StaticCell;
use tap::Pipe;

const POLE_PAIRS: u8 = 7;

static SHARED: KnobShared = KnobShared::new();
static PULSES: StaticCell<PulseQueue> = StaticCell::new();

struct EspClock;

impl Clock for EspClock {
    fn now(&self) -> Instant {
        let micros = esp_hal::time::Instant::now()
            .duration_since_epoch()
            .as_micros();
        Instant::from_ticks(micros)
    }
}

#[entry]
fn main() -> ! {
    esp_println::logger::init_logger_from_env();
    esp_alloc::heap_allocator!(72 * 1024);

    let stack = Box::leak(Box::new(Stack::<8096>::new()));
    let peripherals: esp_hal::peripherals::Peripherals =
        esp_hal::init(esp_hal::Config::default().with_cpu_clock(CpuClock::max()));

    let (producer, mut consumer) = PULSES.init(PulseQueue::new()).split();

    let en = Output::new(peripherals.GPIO3, Level::Low);
    let in1 = peripherals.GPIO10;
    let in2 = peripherals.GPIO9;
    let in3 = peripherals.GPIO46;

    let clock_cfg = PeripheralClockConfig::with_frequency(32.MHz()).unwrap();
    let mut mcpwm = McPwm::new(peripherals.MCPWM0, clock_cfg);

    let a = mcpwm
        .operator0
        .with_pin_a(in1, PwmPinConfig::UP_ACTIVE_HIGH);
    let b = mcpwm
        .operator1
        .with_pin_a(in2, PwmPinConfig::UP_ACTIVE_HIGH);
    let c = mcpwm
        .operator2
        .with_pin_a(in3, PwmPinConfig::UP_ACTIVE_HIGH);

    let timer_clock_cfg = clock_cfg
        .timer_clock_with_frequency(99, PwmWorkingMode::Increase, 20.kHz())
        .unwrap();
    mcpwm.timer0.start(timer_clock_cfg);

    let sensor = I2c::new(peripherals.I2C0, i2c::master::Config::default())
        .unwrap()
        .with_scl(peripherals.GPIO18)
        .with_sda(peripherals.GPIO17)
        .pipe(As5600::new);
    let inverter = ThreePhasePwm::new(a, b, c).with_enable(en);

    let mut ctrl = CpuControl::new(peripherals.CPU_CTRL);
    let _guard = ctrl
        .start_app_core(stack, move || {
            let mut delay = Delay::new();
            let motor = Motor::<_, _, _, POLE_PAIRS>::new(
                sensor,
                inverter,
                EspClock,
                &mut delay,
                MotorConfig::new(),
            )
            .unwrap();

            let mut knob = Knob::new(motor, KnobConfig::new(), producer);
            match knob.calibrate(&mut delay) {
                Ok(cal) => info!("Calibrated: {cal:?}"),
                Err(e) => error!("Calibration failed: {e}"),
            }
            knob.set_mode(KnobMode::Encoder);
            knob.set_encoder_report(true);
            knob.run(&SHARED, &mut delay)
        })
        .unwrap();

    let delay = Delay::new();
    let handle = SHARED.handle();
    let mut position = 0i32;
    let mut idle = 0u32;

    loop {
        let sent = dispatch_pulses(&mut consumer, &mut |pulse: Pulse| {
            position += pulse.value();
            info!("{pulse:?} -> {position}");
        });

        idle = if sent == 0 { idle + 1 } else { 0 };
        if idle == 1000 {
            if let Some(status) = handle.status() {
                info!("{status:?}");
            }
        }
        delay.delay_millis(1);
    }
}
