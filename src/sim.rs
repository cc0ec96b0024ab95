// TiltGrid - Simulated I2C Bus
//
// In-memory stand-in for the physical bus: one TCA9548A at 0x70 and any
// number of MPU6050 register files hanging off its channels. Sensors are only
// reachable while exactly their channel is selected, registers auto-increment
// like the real part, and faults can be injected per device address.

use std::collections::HashMap;

use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use crate::config::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    /// Nobody answered at the address on the currently routed channel.
    NoAcknowledge,
    /// Failure queued with `fail_next_writes_to` / `fail_next_reads_from`.
    Injected,
}

impl i2c::Error for SimError {
    fn kind(&self) -> ErrorKind {
        match self {
            SimError::NoAcknowledge => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            SimError::Injected => ErrorKind::Other,
        }
    }
}

/// A write-only transaction that reached a device, in bus order. Register
/// pointer writes that prefix a read are not logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusWrite {
    pub address: u8,
    /// Routed mux channel for sensor writes, `None` for the mux itself.
    pub channel: Option<u8>,
    pub bytes: Vec<u8>,
}

struct SimImu {
    registers: [u8; 256],
    pointer: u8,
}

impl SimImu {
    fn new() -> Self {
        let mut registers = [0u8; 256];
        registers[REG_WHO_AM_I as usize] = WHO_AM_I_EXPECTED;
        registers[REG_PWR_MGMT_1 as usize] = 0x40; // SLEEP set after power-on
        Self { registers, pointer: 0 }
    }

    fn set_raw_accel(&mut self, raw: [i16; 3]) {
        for (axis, value) in raw.iter().enumerate() {
            let reg = REG_ACCEL_XOUT_H as usize + axis * 2;
            self.registers[reg..reg + 2].copy_from_slice(&value.to_be_bytes());
        }
    }

    fn write(&mut self, bytes: &[u8]) {
        let Some((&reg, data)) = bytes.split_first() else {
            return;
        };
        self.pointer = reg;
        for &byte in data {
            self.registers[self.pointer as usize] = byte;
            self.pointer = self.pointer.wrapping_add(1);
        }
    }

    fn read(&mut self, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte = self.registers[self.pointer as usize];
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}

#[derive(Default)]
pub struct SimulatedBus {
    selected: u8,
    imus: HashMap<(u8, u8), SimImu>,
    writes: Vec<BusWrite>,
    write_faults: HashMap<u8, usize>,
    read_faults: HashMap<u8, usize>,
}

impl SimulatedBus {
    /// Bus with the multiplexer only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus with both sensors populated on all eight channels, each reporting
    /// `accel_g` (x, y, z in g).
    pub fn full_array(accel_g: [f32; 3]) -> Self {
        let mut bus = Self::new();
        for channel in 0..MUX_CHANNEL_COUNT {
            for address in [I2C_ADDR_MPU6050_A, I2C_ADDR_MPU6050_B] {
                bus.attach_imu(channel, address);
                bus.set_accel_g(channel, address, accel_g);
            }
        }
        bus
    }

    pub fn attach_imu(&mut self, channel: u8, address: u8) {
        self.imus.insert((channel, address), SimImu::new());
    }

    pub fn detach_imu(&mut self, channel: u8, address: u8) {
        self.imus.remove(&(channel, address));
    }

    pub fn set_raw_accel(&mut self, channel: u8, address: u8, raw: [i16; 3]) {
        if let Some(imu) = self.imus.get_mut(&(channel, address)) {
            imu.set_raw_accel(raw);
        }
    }

    pub fn set_accel_g(&mut self, channel: u8, address: u8, accel_g: [f32; 3]) {
        let raw = accel_g.map(|g| {
            (g * ACCEL_SCALE_2G)
                .round()
                .clamp(i16::MIN as f32, i16::MAX as f32) as i16
        });
        self.set_raw_accel(channel, address, raw);
    }

    /// Overwrite one register of an attached sensor without any bus traffic.
    pub fn set_register(&mut self, channel: u8, address: u8, reg: u8, value: u8) {
        if let Some(imu) = self.imus.get_mut(&(channel, address)) {
            imu.registers[reg as usize] = value;
        }
    }

    /// Register contents of one sensor, `None` if it is not attached.
    pub fn register(&self, channel: u8, address: u8, reg: u8) -> Option<u8> {
        self.imus
            .get(&(channel, address))
            .map(|imu| imu.registers[reg as usize])
    }

    pub fn selected_mask(&self) -> u8 {
        self.selected
    }

    pub fn writes(&self) -> &[BusWrite] {
        &self.writes
    }

    /// Payloads of every successful write addressed to `address`.
    pub fn writes_to(&self, address: u8) -> Vec<Vec<u8>> {
        self.writes
            .iter()
            .filter(|w| w.address == address)
            .map(|w| w.bytes.clone())
            .collect()
    }

    pub fn writes_to_sensor(&self, channel: u8, address: u8) -> Vec<Vec<u8>> {
        self.writes
            .iter()
            .filter(|w| w.address == address && w.channel == Some(channel))
            .map(|w| w.bytes.clone())
            .collect()
    }

    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }

    /// Make the next `count` write-only transactions to `address` fail.
    pub fn fail_next_writes_to(&mut self, address: u8, count: usize) {
        *self.write_faults.entry(address).or_default() += count;
    }

    /// Make the next `count` read transactions from `address` fail.
    pub fn fail_next_reads_from(&mut self, address: u8, count: usize) {
        *self.read_faults.entry(address).or_default() += count;
    }

    fn take_fault(faults: &mut HashMap<u8, usize>, address: u8) -> bool {
        match faults.get_mut(&address) {
            Some(pending) if *pending > 0 => {
                *pending -= 1;
                true
            }
            _ => false,
        }
    }

    fn routed_channel(&self) -> Option<u8> {
        (self.selected.count_ones() == 1).then(|| self.selected.trailing_zeros() as u8)
    }
}

impl ErrorType for SimulatedBus {
    type Error = SimError;
}

impl I2c for SimulatedBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let writes = operations.iter().any(|op| matches!(op, Operation::Write(_)));
        let reads = operations.iter().any(|op| matches!(op, Operation::Read(_)));
        if writes && !reads && Self::take_fault(&mut self.write_faults, address) {
            return Err(SimError::Injected);
        }
        if reads && Self::take_fault(&mut self.read_faults, address) {
            return Err(SimError::Injected);
        }

        if address == I2C_ADDR_TCA9548A {
            for op in operations.iter_mut() {
                match op {
                    Operation::Write(bytes) => {
                        if let Some(&mask) = bytes.last() {
                            self.selected = mask;
                        }
                        if !reads {
                            self.writes.push(BusWrite {
                                address,
                                channel: None,
                                bytes: bytes.to_vec(),
                            });
                        }
                    }
                    Operation::Read(buf) => buf.fill(self.selected),
                }
            }
            return Ok(());
        }

        let channel = self.routed_channel().ok_or(SimError::NoAcknowledge)?;
        let imu = self
            .imus
            .get_mut(&(channel, address))
            .ok_or(SimError::NoAcknowledge)?;

        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    imu.write(bytes);
                    if !reads {
                        self.writes.push(BusWrite {
                            address,
                            channel: Some(channel),
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                Operation::Read(buf) => imu.read(buf),
            }
        }
        Ok(())
    }
}
