// TiltGrid - Firmware Entry Point
//
// Start-up:
//   1. Bring up the I2C bus (every transaction bounded by a tick timeout).
//   2. Walk the eight mux channels, initialise and calibrate both MPU6050s on
//      each. Sensors that do not answer are logged and left out.
//   3. Spawn the stop-button watcher.
//   4. Run the poll loop on the main thread until the button is held for
//      3 seconds, then close the display and return.

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use embedded_hal::i2c::{self, ErrorKind, ErrorType, NoAcknowledgeSource, Operation};
use esp_idf_hal::gpio::{AnyInputPin, Input, InputPin, PinDriver};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::prelude::*;
use esp_idf_sys::{EspError, ESP_ERR_TIMEOUT, ESP_FAIL};

use tiltgrid::array::SensorArray;
use tiltgrid::config::*;
use tiltgrid::counters::CounterBank;
use tiltgrid::display::LogDisplay;
use tiltgrid::tasks::poll::{poll_task, CancelToken, PollConfig};

fn main() -> anyhow::Result<()> {
    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("TiltGrid firmware starting");

    let peripherals = Peripherals::take()?;

    // ---- I2C bus (mux + all sixteen sensors) ------------------------------
    let i2c_config = I2cConfig::new()
        .baudrate(I2C_BAUDRATE_KHZ.kHz().into())
        .timeout(Duration::from_millis(I2C_TIMEOUT_MS).into());
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio6, // SDA
        peripherals.pins.gpio7, // SCL
        &i2c_config,
    )?;
    let bus = Mutex::new(TimedI2c {
        driver: i2c,
        timeout: I2C_TIMEOUT_TICKS,
    });

    let mut array = SensorArray::on_shared_bus(&bus)?;
    let mut bank = CounterBank::new();
    let mut display = LogDisplay;

    // ---- Stop button ------------------------------------------------------
    let button: PinDriver<'static, AnyInputPin, Input> =
        PinDriver::input(peripherals.pins.gpio3.downgrade_input())?;
    configure_pullup(&button);

    let cancel = CancelToken::new();
    let stop = cancel.clone();
    thread::Builder::new()
        .name("stop-button".into())
        .stack_size(STACK_STOP_BUTTON)
        .spawn(move || stop_button_task(button, stop))?;

    // ---- Poll loop --------------------------------------------------------
    let stats = poll_task(
        &mut array,
        &mut bank,
        &mut display,
        &cancel,
        &PollConfig::default(),
    )?;

    log::info!(
        "TiltGrid stopped: {} cycles, {} dropped",
        stats.cycles,
        stats.failed_cycles
    );
    Ok(())
}

/// `I2cDriver` behind the `embedded_hal` trait, with every transaction bounded
/// by a tick timeout instead of blocking forever.
struct TimedI2c<'d> {
    driver: I2cDriver<'d>,
    timeout: u32,
}

#[derive(Debug)]
struct BusError(EspError);

impl i2c::Error for BusError {
    fn kind(&self) -> ErrorKind {
        match self.0.code() {
            ESP_FAIL => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            _ => ErrorKind::Other,
        }
    }
}

impl ErrorType for TimedI2c<'_> {
    type Error = BusError;
}

impl i2c::I2c for TimedI2c<'_> {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.driver
            .transaction(address, operations, self.timeout)
            .map_err(|e| {
                if e.code() == ESP_ERR_TIMEOUT as i32 {
                    log::warn!("I2C transaction to {:#04x} timed out", address);
                }
                BusError(e)
            })
    }
}

/// Cancel the poll loop once the button has been held for [`STOP_HOLD_MS`].
fn stop_button_task(button: PinDriver<'static, AnyInputPin, Input>, cancel: CancelToken) {
    let poll = Duration::from_millis(BUTTON_POLL_INTERVAL_MS);
    let mut pressed_since: Option<Instant> = None;

    while !cancel.is_cancelled() {
        if button.is_low() {
            // Active LOW with pull-up.
            let since = *pressed_since.get_or_insert_with(Instant::now);
            if since.elapsed() >= Duration::from_millis(STOP_HOLD_MS) {
                log::info!("Stop button held, shutting down");
                cancel.cancel();
                return;
            }
        } else {
            pressed_since = None;
        }

        thread::sleep(poll);
    }
}

/// Enable the internal pull-up. The downgraded pin type has no `set_pull`,
/// so go through the raw API.
fn configure_pullup(_pin: &PinDriver<'_, AnyInputPin, Input>) {
    unsafe {
        esp_idf_sys::gpio_set_pull_mode(
            PIN_BUTTON,
            esp_idf_sys::gpio_pull_mode_t_GPIO_PULLUP_ONLY,
        );
    }
}
