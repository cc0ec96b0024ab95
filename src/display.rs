// TiltGrid - Counter Display
//
// The poll loop hands a fresh CounterSnapshot to a CounterDisplay once per
// cycle. Two implementations: a serial/log view and an embedded-graphics
// painter for any DrawTarget.

use core::fmt::Debug;

use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::{Rgb565, RgbColor};
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};

use crate::config::*;
use crate::counters::CounterSnapshot;

pub trait CounterDisplay {
    fn show(&mut self, snapshot: &CounterSnapshot) -> anyhow::Result<()>;

    /// Release the display; called once when the poll loop stops.
    fn shutdown(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Prints the grid to the log, one row per line.
#[derive(Debug, Default)]
pub struct LogDisplay;

impl CounterDisplay for LogDisplay {
    fn show(&mut self, snapshot: &CounterSnapshot) -> anyhow::Result<()> {
        for (row, cells) in snapshot.grid().iter().enumerate() {
            log::info!(
                "grid[{}] {} {} {} {}",
                row,
                cells[0],
                cells[1],
                cells[2],
                cells[3]
            );
        }
        Ok(())
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        log::info!("Grid display closed");
        Ok(())
    }
}

/// Cell colour per counter value plus the colour of the digit drawn on top.
#[derive(Debug, Clone, Copy)]
pub struct GridPalette<C> {
    pub cells: [C; COUNTER_WRAP as usize],
    pub text: C,
    pub background: C,
}

impl GridPalette<Rgb565> {
    /// 0 blue, 1 green, 2 yellow, 3 red.
    pub const HEATMAP: Self = Self {
        cells: [Rgb565::BLUE, Rgb565::GREEN, Rgb565::YELLOW, Rgb565::RED],
        text: Rgb565::BLACK,
        background: Rgb565::BLACK,
    };
}

/// Paints the 4x4 counter grid onto a draw target, `GRID_CELL_PX` per cell.
pub struct GridDisplay<D: DrawTarget> {
    target: D,
    palette: GridPalette<D::Color>,
}

impl<D> GridDisplay<D>
where
    D: DrawTarget,
    D::Error: Debug,
{
    pub fn new(target: D, palette: GridPalette<D::Color>) -> Self {
        Self { target, palette }
    }

    pub fn into_inner(self) -> D {
        self.target
    }

    fn draw_cell(&mut self, row: usize, col: usize, value: u8) -> Result<(), D::Error> {
        let origin = Point::new(
            (col as u32 * GRID_CELL_PX) as i32,
            (row as u32 * GRID_CELL_PX) as i32,
        );
        let fill = self.palette.cells[(value as usize).min(self.palette.cells.len() - 1)];

        Rectangle::new(origin, Size::new_equal(GRID_CELL_PX))
            .into_styled(PrimitiveStyle::with_fill(fill))
            .draw(&mut self.target)?;

        let mut buf = [0u8; 4];
        let digit = char::from(b'0' + value.min(9)).encode_utf8(&mut buf);
        let center = origin + Size::new_equal(GRID_CELL_PX / 2);
        let text_style = TextStyleBuilder::new()
            .alignment(Alignment::Center)
            .baseline(Baseline::Middle)
            .build();
        Text::with_text_style(
            digit,
            center,
            MonoTextStyle::new(&FONT_6X10, self.palette.text),
            text_style,
        )
        .draw(&mut self.target)?;

        Ok(())
    }
}

impl<D> CounterDisplay for GridDisplay<D>
where
    D: DrawTarget,
    D::Error: Debug,
{
    fn show(&mut self, snapshot: &CounterSnapshot) -> anyhow::Result<()> {
        for (row, cells) in snapshot.grid().iter().enumerate() {
            for (col, &value) in cells.iter().enumerate() {
                self.draw_cell(row, col, value)
                    .map_err(|e| anyhow::anyhow!("grid draw failed: {:?}", e))?;
            }
        }
        Ok(())
    }

    fn shutdown(&mut self) -> anyhow::Result<()> {
        self.target
            .clear(self.palette.background)
            .map_err(|e| anyhow::anyhow!("grid clear failed: {:?}", e))
    }
}

#[cfg(test)]
mod tests {
    use embedded_graphics::mock_display::MockDisplay;

    use super::*;

    fn mock() -> MockDisplay<Rgb565> {
        let mut display = MockDisplay::new();
        display.set_allow_overdraw(true);
        display
    }

    fn cell_corner(row: i32, col: i32) -> Point {
        Point::new(col * GRID_CELL_PX as i32 + 1, row * GRID_CELL_PX as i32 + 1)
    }

    #[test]
    fn cells_take_the_colour_of_their_counter() {
        let mut values = [0u8; SENSOR_COUNT];
        values[1] = 1;
        values[6] = 2;
        values[15] = 3;

        let mut grid = GridDisplay::new(mock(), GridPalette::HEATMAP);
        grid.show(&CounterSnapshot::from(values)).unwrap();
        let display = grid.into_inner();

        assert_eq!(display.get_pixel(cell_corner(0, 0)), Some(Rgb565::BLUE));
        assert_eq!(display.get_pixel(cell_corner(0, 1)), Some(Rgb565::GREEN));
        assert_eq!(display.get_pixel(cell_corner(1, 2)), Some(Rgb565::YELLOW));
        assert_eq!(display.get_pixel(cell_corner(3, 3)), Some(Rgb565::RED));
    }

    #[test]
    fn every_cell_carries_a_digit() {
        let mut grid = GridDisplay::new(mock(), GridPalette::HEATMAP);
        grid.show(&CounterSnapshot::default()).unwrap();
        let display = grid.into_inner();

        for row in 0..GRID_ROWS as i32 {
            for col in 0..GRID_COLS as i32 {
                let x0 = col * GRID_CELL_PX as i32;
                let y0 = row * GRID_CELL_PX as i32;
                let text_pixels = (x0..x0 + GRID_CELL_PX as i32)
                    .flat_map(|x| (y0..y0 + GRID_CELL_PX as i32).map(move |y| Point::new(x, y)))
                    .filter(|&p| display.get_pixel(p) == Some(Rgb565::BLACK))
                    .count();
                assert!(text_pixels > 0, "cell ({row}, {col}) has no digit");
            }
        }
    }

    #[test]
    fn shutdown_blanks_the_panel() {
        let mut grid = GridDisplay::new(mock(), GridPalette::HEATMAP);
        grid.show(&CounterSnapshot::from([3; SENSOR_COUNT])).unwrap();
        grid.shutdown().unwrap();

        let display = grid.into_inner();
        assert_eq!(display.get_pixel(cell_corner(2, 2)), Some(Rgb565::BLACK));
    }
}
