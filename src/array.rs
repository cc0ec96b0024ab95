// TiltGrid - Sensor Array
//
// Sixteen MPU6050s behind one TCA9548A: two per channel, at the same two
// addresses on every channel. The mux is re-selected before each channel's
// transactions, so no read ever depends on where a previous call left it.

use core::fmt;
use std::sync::Mutex;

use embedded_hal::i2c::I2c;
use embedded_hal_bus::i2c::MutexDevice;

use crate::config::*;
use crate::drivers::imu::Mpu6050;
use crate::drivers::mux::Tca9548a;
use crate::error::{Error, Result};

/// Which of the two sensors on a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// AD0 low, 0x68.
    A,
    /// AD0 high, 0x69.
    B,
}

impl Slot {
    pub const ALL: [Slot; SENSORS_PER_CHANNEL] = [Slot::A, Slot::B];

    pub fn address(self) -> u8 {
        match self {
            Slot::A => I2C_ADDR_MPU6050_A,
            Slot::B => I2C_ADDR_MPU6050_B,
        }
    }
}

/// Where one physical sensor lives: mux channel plus slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorBinding {
    channel: u8,
    slot: Slot,
}

impl SensorBinding {
    pub fn new(channel: u8, slot: Slot) -> Result<Self> {
        if channel >= MUX_CHANNEL_COUNT {
            return Err(Error::InvalidChannel(channel));
        }
        Ok(Self { channel, slot })
    }

    /// Every binding in counter-bank order (channel-major, A before B).
    pub fn all() -> impl Iterator<Item = SensorBinding> {
        (0..MUX_CHANNEL_COUNT).flat_map(|channel| {
            Slot::ALL
                .into_iter()
                .map(move |slot| SensorBinding { channel, slot })
        })
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn address(&self) -> u8 {
        self.slot.address()
    }

    /// Position in the counter bank: `channel * 2 + slot`.
    pub fn index(&self) -> usize {
        self.channel as usize * SENSORS_PER_CHANNEL
            + match self.slot {
                Slot::A => 0,
                Slot::B => 1,
            }
    }
}

impl fmt::Display for SensorBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = match self.slot {
            Slot::A => 1,
            Slot::B => 2,
        };
        write!(f, "MPU-{}-{}", self.channel, n)
    }
}

/// One poll cycle's tilt magnitudes, in binding order. `None` marks a sensor
/// that is not part of the array.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TiltFrame([Option<f32>; SENSOR_COUNT]);

impl TiltFrame {
    pub fn readings(&self) -> &[Option<f32>; SENSOR_COUNT] {
        &self.0
    }

    pub fn get(&self, binding: SensorBinding) -> Option<f32> {
        self.0[binding.index()]
    }

    /// All sixteen values, if every sensor reported.
    pub fn complete(&self) -> Option<[f32; SENSOR_COUNT]> {
        let mut tilts = [0.0; SENSOR_COUNT];
        for (tilt, reading) in tilts.iter_mut().zip(self.0) {
            *tilt = reading?;
        }
        Some(tilts)
    }
}

impl From<[Option<f32>; SENSOR_COUNT]> for TiltFrame {
    fn from(readings: [Option<f32>; SENSOR_COUNT]) -> Self {
        Self(readings)
    }
}

/// Anything that can produce one frame of tilt readings per call.
pub trait TiltSource {
    fn poll_all(&mut self) -> Result<TiltFrame>;
}

pub struct SensorArray<I2C> {
    mux: Tca9548a<I2C>,
    sensors: [Option<Mpu6050<I2C>>; SENSOR_COUNT],
}

impl<'a, T: I2c> SensorArray<MutexDevice<'a, T>> {
    /// Bring up the array with every device sharing `bus`.
    pub fn on_shared_bus(bus: &'a Mutex<T>) -> Result<Self> {
        Self::new(MutexDevice::new(bus), || MutexDevice::new(bus))
    }
}

impl<I2C: I2c> SensorArray<I2C> {
    /// Select each channel in turn and initialise + calibrate both sensors on
    /// it. Sensors that do not answer are logged and left out; a failure to
    /// drive the mux itself aborts.
    pub fn new(mux_i2c: I2C, mut sensor_i2c: impl FnMut() -> I2C) -> Result<Self> {
        let mut mux = Tca9548a::new(mux_i2c);
        let mut sensors: [Option<Mpu6050<I2C>>; SENSOR_COUNT] = core::array::from_fn(|_| None);

        for channel in 0..MUX_CHANNEL_COUNT {
            mux.select_channel(channel)?;
            for slot in Slot::ALL {
                let binding = SensorBinding { channel, slot };
                sensors[binding.index()] = bring_up(binding, sensor_i2c());
            }
        }

        let online = sensors.iter().filter(|s| s.is_some()).count();
        if online == 0 {
            return Err(Error::NoSensors);
        }
        log::info!("Sensor array ready: {}/{} sensors online", online, SENSOR_COUNT);

        Ok(Self { mux, sensors })
    }

    pub fn is_online(&self, binding: SensorBinding) -> bool {
        self.sensors[binding.index()].is_some()
    }

    pub fn online_count(&self) -> usize {
        self.sensors.iter().filter(|s| s.is_some()).count()
    }
}

impl<I2C: I2c> TiltSource for SensorArray<I2C> {
    /// Channel by channel in ascending order: select, then read A and B.
    fn poll_all(&mut self) -> Result<TiltFrame> {
        let mut frame = TiltFrame::default();

        for (channel, pair) in self.sensors.chunks_mut(SENSORS_PER_CHANNEL).enumerate() {
            if pair.iter().all(Option::is_none) {
                continue;
            }
            self.mux.select_channel(channel as u8)?;

            for (offset, sensor) in pair.iter_mut().enumerate() {
                if let Some(sensor) = sensor {
                    let index = channel * SENSORS_PER_CHANNEL + offset;
                    frame.0[index] = Some(sensor.compute_tilt_angle()?);
                }
            }
        }

        Ok(frame)
    }
}

fn bring_up<I2C: I2c>(binding: SensorBinding, i2c: I2C) -> Option<Mpu6050<I2C>> {
    let mut imu = Mpu6050::new(i2c, binding.address());
    if let Err(e) = imu.initialize().and_then(|()| imu.calibrate()) {
        log::warn!("{} setup failure: {}, leaving it out of the array", binding, e);
        return None;
    }

    match imu.who_am_i() {
        Ok(WHO_AM_I_EXPECTED) => {}
        Ok(id) => log::warn!(
            "{} reports WHO_AM_I {:#04x}, expected {:#04x}",
            binding,
            id,
            WHO_AM_I_EXPECTED
        ),
        Err(e) => log::warn!("{} WHO_AM_I read failed: {}", binding, e),
    }

    let calibration = imu.calibration();
    log::info!(
        "{} online (level at {:.1}°, {:.1}°)",
        binding,
        calibration.offset_x,
        calibration.offset_y
    );
    Some(imu)
}
