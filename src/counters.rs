// TiltGrid - Debounce Counter Bank
//
// One small counter per sensor. Each cycle a sensor that sits within
// TILT_THRESHOLD_DEG of level counts up, a tilted sensor clears its count,
// and a count that would reach COUNTER_WRAP fires and restarts at 0.
//
//   0 --small--> 1 --small--> 2 --small--> 3 --small--> 0
//   any --large--> 0

use crate::array::TiltFrame;
use crate::config::*;

/// Immutable copy of the bank handed to the display once per cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot([u8; SENSOR_COUNT]);

impl CounterSnapshot {
    pub fn values(&self) -> &[u8; SENSOR_COUNT] {
        &self.0
    }

    /// Row-major 4x4 view: row `r` holds sensors `4r..4r+4`.
    pub fn grid(&self) -> [[u8; GRID_COLS]; GRID_ROWS] {
        let mut grid = [[0u8; GRID_COLS]; GRID_ROWS];
        for (i, &value) in self.0.iter().enumerate() {
            grid[i / GRID_COLS][i % GRID_COLS] = value;
        }
        grid
    }
}

impl From<[u8; SENSOR_COUNT]> for CounterSnapshot {
    fn from(values: [u8; SENSOR_COUNT]) -> Self {
        Self(values)
    }
}

#[derive(Debug, Default)]
pub struct CounterBank {
    counters: [u8; SENSOR_COUNT],
}

impl CounterBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance every counter with this cycle's readings.
    pub fn update(&mut self, tilts: &[f32; SENSOR_COUNT]) {
        for (counter, &tilt) in self.counters.iter_mut().zip(tilts) {
            step(counter, tilt);
        }
    }

    /// Like `update`, but sensors without a reading keep their count.
    pub fn update_partial(&mut self, frame: &TiltFrame) {
        for (counter, tilt) in self.counters.iter_mut().zip(frame.readings()) {
            if let Some(tilt) = *tilt {
                step(counter, tilt);
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.counters.get(index).copied()
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot(self.counters)
    }
}

fn step(counter: &mut u8, tilt: f32) {
    if tilt > TILT_THRESHOLD_DEG {
        *counter = 0;
    } else if (0.0..=TILT_THRESHOLD_DEG).contains(&tilt) {
        *counter += 1;
    }
    if *counter >= COUNTER_WRAP {
        *counter = 0;
    }
}
