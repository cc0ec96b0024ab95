// TiltGrid - Hardware & System Configuration
// Target: ESP32 running ESP-IDF (std), host builds use the simulated bus.

use std::time::Duration;

// ---------------------------------------------------------------------------
// GPIO Pin Definitions
// ---------------------------------------------------------------------------
pub const PIN_BUTTON: i32 = 3;  // User button (INPUT_PULLUP, active LOW), hold to stop
pub const PIN_I2C_SDA: i32 = 6; // I2C data line
pub const PIN_I2C_SCL: i32 = 7; // I2C clock line

// ---------------------------------------------------------------------------
// I2C Bus
// ---------------------------------------------------------------------------
pub const I2C_BAUDRATE_KHZ: u32 = 100;
pub const I2C_TIMEOUT_MS: u64 = 50;     // Hardware SCL stretch limit
pub const I2C_TIMEOUT_TICKS: u32 = 100; // FreeRTOS ticks, bound on one whole transaction

pub const I2C_ADDR_TCA9548A: u8 = 0x70;
pub const MUX_CHANNEL_COUNT: u8 = 8;

/// MPU6050 with AD0 low / AD0 high. Every mux channel carries one of each.
pub const I2C_ADDR_MPU6050_A: u8 = 0x68;
pub const I2C_ADDR_MPU6050_B: u8 = 0x69;
pub const SENSORS_PER_CHANNEL: usize = 2;
pub const SENSOR_COUNT: usize = MUX_CHANNEL_COUNT as usize * SENSORS_PER_CHANNEL; // 16

// ---------------------------------------------------------------------------
// MPU6050 Registers & Start-up Values
// ---------------------------------------------------------------------------
pub const REG_SMPLRT_DIV: u8 = 0x19;
pub const REG_CONFIG: u8 = 0x1A;
pub const REG_GYRO_CONFIG: u8 = 0x1B;
pub const REG_ACCEL_CONFIG: u8 = 0x1C;
pub const REG_ACCEL_XOUT_H: u8 = 0x3B; // X/Y/Z at +0/+2/+4
pub const REG_PWR_MGMT_1: u8 = 0x6B;
pub const REG_WHO_AM_I: u8 = 0x75;
pub const WHO_AM_I_EXPECTED: u8 = 0x68;

pub const PWR_MGMT_1_WAKE: u8 = 0;
pub const SMPLRT_DIV_VALUE: u8 = 7;
pub const CONFIG_DLPF_VALUE: u8 = 0;
pub const GYRO_CONFIG_VALUE: u8 = 24; // ±2000 °/s
pub const ACCEL_CONFIG_VALUE: u8 = 0; // ±2 g

pub const ACCEL_SCALE_2G: f32 = 16384.0; // LSB/g at ±2 g

// ---------------------------------------------------------------------------
// Debounce Counters
// ---------------------------------------------------------------------------
pub const TILT_THRESHOLD_DEG: f32 = 10.0; // Above this a sensor counts as tilted
pub const COUNTER_WRAP: u8 = 4;           // A counter never rests at this value

// ---------------------------------------------------------------------------
// Display Grid
// ---------------------------------------------------------------------------
pub const GRID_ROWS: usize = 4;
pub const GRID_COLS: usize = 4;
pub const GRID_CELL_PX: u32 = 16;

// ---------------------------------------------------------------------------
// Task Stack Sizes (bytes)
// ---------------------------------------------------------------------------
pub const STACK_STOP_BUTTON: usize = 4096;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const CANCEL_CHECK_SLICE: Duration = Duration::from_millis(50);
pub const STOP_HOLD_MS: u64 = 3000;       // Button hold that stops the loop
pub const BUTTON_POLL_INTERVAL_MS: u64 = 10;
