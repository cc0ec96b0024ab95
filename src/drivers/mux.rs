// TiltGrid - TCA9548A I2C Multiplexer
//
// Eight downstream sub-buses behind one control register. Writing a single
// byte selects the active channels; we only ever enable one at a time.

use embedded_hal::i2c::I2c;

use crate::config::*;
use crate::error::{Error, Result};

pub struct Tca9548a<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> Tca9548a<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    /// Route the bus to `channel` and detach all others.
    ///
    /// Nothing is cached: callers must select before every group of sensor
    /// transactions, since all channels alias the same sensor addresses.
    pub fn select_channel(&mut self, channel: u8) -> Result<()> {
        let mask = channel_mask(channel)?;
        self.i2c
            .write(I2C_ADDR_TCA9548A, &[mask])
            .map_err(Error::io)
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

/// Control-register bitmask that enables exactly `channel`.
pub fn channel_mask(channel: u8) -> Result<u8> {
    if channel >= MUX_CHANNEL_COUNT {
        return Err(Error::InvalidChannel(channel));
    }
    Ok(1 << channel)
}

#[cfg(test)]
mod tests {
    use embedded_hal::i2c::ErrorKind;

    use super::*;
    use crate::sim::SimulatedBus;

    #[test]
    fn every_channel_is_one_write_with_its_bit() {
        let mut mux = Tca9548a::new(SimulatedBus::new());
        for channel in 0..8u8 {
            mux.select_channel(channel).unwrap();
        }

        let bus = mux.release();
        let expected: Vec<Vec<u8>> = (0..8).map(|c| vec![1u8 << c]).collect();
        assert_eq!(bus.writes_to(I2C_ADDR_TCA9548A), expected);
        assert_eq!(bus.selected_mask(), 0b1000_0000);
    }

    #[test]
    fn out_of_range_channel_never_touches_the_bus() {
        let mut mux = Tca9548a::new(SimulatedBus::new());

        assert_eq!(mux.select_channel(8), Err(Error::InvalidChannel(8)));
        assert_eq!(mux.select_channel(255), Err(Error::InvalidChannel(255)));
        assert!(mux.release().writes_to(I2C_ADDR_TCA9548A).is_empty());
    }

    #[test]
    fn failed_write_on_valid_channel_is_io() {
        let mut bus = SimulatedBus::new();
        bus.fail_next_writes_to(I2C_ADDR_TCA9548A, 1);
        let mut mux = Tca9548a::new(bus);

        assert!(matches!(mux.select_channel(3), Err(Error::Io(ErrorKind::Other))));
        // The fault was transient.
        assert_eq!(mux.select_channel(3), Ok(()));
    }
}
