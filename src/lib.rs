// TiltGrid - Tilt Sensor Grid
//
// Sixteen MPU6050 accelerometers behind a TCA9548A I2C multiplexer. Each
// sensor's tilt from its start-up orientation feeds a small debounce counter,
// and the 4x4 grid of counters is published to a display once per second.
//
// Data flow per cycle:
//   SensorArray::poll_all -> TiltFrame -> CounterBank -> CounterSnapshot
//   -> CounterDisplay

pub mod array;
pub mod config;
pub mod counters;
pub mod display;
pub mod drivers;
pub mod error;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod tasks;

pub use error::{Error, Result};
