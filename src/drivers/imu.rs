// TiltGrid - MPU6050 IMU Driver
//
// Register-level driver over a shared I2C handle. Only the accelerometer is
// used: each reading is turned into a two-axis tilt relative to the
// orientation captured at start-up.

use embedded_hal::i2c::I2c;

use crate::config::*;
use crate::error::{Error, Result};

/// One accelerometer sample in g.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Acceleration {
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
}

impl Acceleration {
    /// Pitch/roll style angles in degrees, `(angle_x, angle_y)`.
    ///
    /// A zero vector yields `(0.0, 0.0)` since `atan2(0, 0) == 0`.
    pub fn angles(&self) -> (f32, f32) {
        let angle_x = self.ax.atan2((self.ay * self.ay + self.az * self.az).sqrt());
        let angle_y = self.ay.atan2((self.ax * self.ax + self.az * self.az).sqrt());
        (angle_x.to_degrees(), angle_y.to_degrees())
    }
}

/// The "level" reference of one mounted sensor, in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Calibration {
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Calibration {
    pub fn from_sample(sample: Acceleration) -> Self {
        let (offset_x, offset_y) = sample.angles();
        Self { offset_x, offset_y }
    }

    /// Distance of `sample` from the reference orientation, never negative.
    pub fn tilt(&self, sample: Acceleration) -> f32 {
        let (angle_x, angle_y) = sample.angles();
        (angle_x - self.offset_x).hypot(angle_y - self.offset_y)
    }
}

/// Combine a big-endian register pair into a two's-complement value.
pub fn decode_axis(high: u8, low: u8) -> i16 {
    i16::from_be_bytes([high, low])
}

pub struct Mpu6050<I2C> {
    i2c: I2C,
    address: u8,
    calibration: Calibration,
}

impl<I2C: I2c> Mpu6050<I2C> {
    /// Uncalibrated driver; no bus traffic.
    pub fn new(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            calibration: Calibration::default(),
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    /// Contents of WHO_AM_I. Genuine parts answer 0x68; compatible clones
    /// often report something else and work the same.
    pub fn who_am_i(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[REG_WHO_AM_I], &mut buf)
            .map_err(Error::io)?;
        Ok(buf[0])
    }

    /// Wake the sensor and configure sample rate, DLPF, gyro ±2000 °/s and
    /// accel ±2 g.
    pub fn initialize(&mut self) -> Result<()> {
        self.write_register(REG_PWR_MGMT_1, PWR_MGMT_1_WAKE)?;
        self.write_register(REG_SMPLRT_DIV, SMPLRT_DIV_VALUE)?;
        self.write_register(REG_CONFIG, CONFIG_DLPF_VALUE)?;
        self.write_register(REG_GYRO_CONFIG, GYRO_CONFIG_VALUE)?;
        self.write_register(REG_ACCEL_CONFIG, ACCEL_CONFIG_VALUE)?;

        log::debug!("MPU6050 @ {:#04x} initialised (±2g, ±2000°/s)", self.address);
        Ok(())
    }

    /// Read the signed 16-bit value held in `register` (high) and
    /// `register + 1` (low).
    pub fn read_axis_pair(&mut self, register: u8) -> Result<i16> {
        let mut raw = [0u8; 2];
        self.i2c
            .write_read(self.address, &[register], &mut raw)
            .map_err(Error::io)?;
        Ok(decode_axis(raw[0], raw[1]))
    }

    pub fn read_acceleration(&mut self) -> Result<Acceleration> {
        let x = self.read_axis_pair(REG_ACCEL_XOUT_H)?;
        let y = self.read_axis_pair(REG_ACCEL_XOUT_H + 2)?;
        let z = self.read_axis_pair(REG_ACCEL_XOUT_H + 4)?;

        Ok(Acceleration {
            ax: x as f32 / ACCEL_SCALE_2G,
            ay: y as f32 / ACCEL_SCALE_2G,
            az: z as f32 / ACCEL_SCALE_2G,
        })
    }

    /// Take one sample and report how far it is from the calibrated level.
    pub fn compute_tilt_angle(&mut self) -> Result<f32> {
        let sample = self.read_acceleration()?;
        Ok(self.calibration.tilt(sample))
    }

    /// Store the current orientation as this sensor's level reference. Only
    /// array bring-up calls this, once per sensor.
    pub(crate) fn calibrate(&mut self) -> Result<()> {
        let sample = self.read_acceleration()?;
        self.calibration = Calibration::from_sample(sample);

        log::debug!(
            "MPU6050 @ {:#04x} calibrated: offset_x {:.2}°, offset_y {:.2}°",
            self.address,
            self.calibration.offset_x,
            self.calibration.offset_y
        );
        Ok(())
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<()> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(Error::io)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
    use embedded_hal_bus::i2c::MutexDevice;

    use super::*;
    use crate::sim::SimulatedBus;

    fn routed_bus(address: u8) -> SimulatedBus {
        let mut bus = SimulatedBus::new();
        bus.attach_imu(0, address);
        bus.write(I2C_ADDR_TCA9548A, &[1]).unwrap();
        bus.clear_writes();
        bus
    }

    fn calibrated<I: I2c>(i2c: I, address: u8) -> Mpu6050<I> {
        let mut imu = Mpu6050::new(i2c, address);
        imu.initialize().unwrap();
        imu.calibrate().unwrap();
        imu
    }

    #[test]
    fn two_complement_boundaries() {
        assert_eq!(decode_axis(0x80, 0x00), -32768);
        assert_eq!(decode_axis(0x7F, 0xFF), 32767);
        assert_eq!(decode_axis(0x00, 0x00), 0);
        assert_eq!(decode_axis(0xFF, 0xFF), -1);
    }

    #[test]
    fn initialize_writes_the_startup_sequence() {
        let mut imu = Mpu6050::new(routed_bus(I2C_ADDR_MPU6050_A), I2C_ADDR_MPU6050_A);
        imu.initialize().unwrap();

        let bus = imu.release();
        assert_eq!(
            bus.writes_to(I2C_ADDR_MPU6050_A),
            vec![
                vec![REG_PWR_MGMT_1, 0],
                vec![REG_SMPLRT_DIV, 7],
                vec![REG_CONFIG, 0],
                vec![REG_GYRO_CONFIG, 24],
                vec![REG_ACCEL_CONFIG, 0],
            ]
        );
        assert_eq!(bus.register(0, I2C_ADDR_MPU6050_A, REG_PWR_MGMT_1), Some(0));
    }

    #[test]
    fn initialize_on_absent_device_is_io() {
        let mut imu = Mpu6050::new(routed_bus(I2C_ADDR_MPU6050_A), I2C_ADDR_MPU6050_B);
        assert_eq!(
            imu.initialize(),
            Err(Error::Io(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)))
        );
        assert_eq!(
            imu.who_am_i(),
            Err(Error::Io(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)))
        );
    }

    #[test]
    fn read_acceleration_scales_to_g() {
        let mut bus = routed_bus(I2C_ADDR_MPU6050_B);
        bus.set_raw_accel(0, I2C_ADDR_MPU6050_B, [16384, -8192, i16::MIN]);
        let mut imu = Mpu6050::new(bus, I2C_ADDR_MPU6050_B);

        assert_eq!(imu.who_am_i().unwrap(), WHO_AM_I_EXPECTED);
        assert_eq!(imu.read_axis_pair(REG_ACCEL_XOUT_H + 4).unwrap(), -32768);
        assert_eq!(
            imu.read_acceleration().unwrap(),
            Acceleration { ax: 1.0, ay: -0.5, az: -2.0 }
        );
    }

    #[test]
    fn tilt_is_zero_at_the_calibrated_orientation() {
        let mut bus = routed_bus(I2C_ADDR_MPU6050_A);
        bus.set_raw_accel(0, I2C_ADDR_MPU6050_A, [3000, -1200, 15000]);
        let mut imu = calibrated(bus, I2C_ADDR_MPU6050_A);

        assert_ne!(imu.calibration(), Calibration::default());
        assert_eq!(imu.compute_tilt_angle().unwrap(), 0.0);
    }

    #[test]
    fn tilt_measures_distance_from_level() {
        let bus = Mutex::new(routed_bus(I2C_ADDR_MPU6050_A));
        // Mounted 30° about Y: x picks up sin(30°).
        bus.lock().unwrap().set_accel_g(0, I2C_ADDR_MPU6050_A, [0.5, 0.0, 0.866_025_4]);
        let mut imu = calibrated(MutexDevice::new(&bus), I2C_ADDR_MPU6050_A);
        assert!((imu.calibration().offset_x - 30.0).abs() < 0.05);

        bus.lock().unwrap().set_accel_g(0, I2C_ADDR_MPU6050_A, [0.0, 0.0, 1.0]);
        let tilt = imu.compute_tilt_angle().unwrap();
        assert!((tilt - 30.0).abs() < 0.05, "tilt was {tilt}");
    }

    #[test]
    fn angles_of_zero_vector_are_zero() {
        assert_eq!(Acceleration::default().angles(), (0.0, 0.0));
        assert_eq!(Calibration::default().tilt(Acceleration::default()), 0.0);
    }

    #[test]
    fn tilt_combines_both_axes() {
        let calibration = Calibration { offset_x: 3.0, offset_y: -4.0 };
        // Flat sample: both angles 0, so the distance is |(-3, 4)|.
        let flat = Acceleration { ax: 0.0, ay: 0.0, az: 1.0 };
        assert!((calibration.tilt(flat) - 5.0).abs() < 1e-5);
    }
}
