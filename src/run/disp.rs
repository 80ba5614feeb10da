use super::{
    interp::{DISPLAY_HEIGHT, DISPLAY_WIDTH},
    quirk::RomKind,
};

use tui::{buffer::Buffer, layout::Rect, style::Color, widgets::Widget};

const OFF_COLOR: Color = Color::Rgb(0x8F, 0x91, 0x85);
const ON_COLOR: Color = Color::Rgb(0x11, 0x1D, 0x2B);

// Each u64 represents a row of the display with each bit representing whether that pixel should be on or not
// NOTE: The left-most pixel on the row corresponds to the most significant bit
pub type DisplayBuffer = [u64; DISPLAY_HEIGHT as usize];

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Display {
    pub buffer: DisplayBuffer,
}

impl Display {
    pub fn dimensions() -> (u16, u16) {
        (DISPLAY_WIDTH as u16, DISPLAY_HEIGHT as u16)
    }

    pub fn window_dimensions() -> (u16, u16) {
        let (width, height) = Self::dimensions();
        (width + 2, height / 2 + 2)
    }

    fn mask(x: u8) -> u64 {
        1 << (DISPLAY_WIDTH - 1 - x % DISPLAY_WIDTH)
    }

    pub fn get(&self, x: u8, y: u8) -> bool {
        self.buffer[(y % DISPLAY_HEIGHT) as usize] & Self::mask(x) != 0
    }

    pub fn toggle(&mut self, x: u8, y: u8) {
        self.buffer[(y % DISPLAY_HEIGHT) as usize] ^= Self::mask(x);
    }

    pub fn clear(&mut self) {
        self.buffer = [0; DISPLAY_HEIGHT as usize];
    }

    pub fn lit(&self) -> u32 {
        self.buffer.iter().map(|row| row.count_ones()).sum()
    }
}

impl std::fmt::Display for Display {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in self.buffer.iter() {
            for shift in (0..DISPLAY_WIDTH).rev() {
                write!(f, "{}", if *row >> shift & 1 == 1 { '█' } else { '.' })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

pub struct DisplayWidget<'a, 'b> {
    pub display: &'a Display,
    pub tone: bool,
    pub rom_name: &'b str,
    pub rom_kind: RomKind,
    pub execution_frequency: u32,
}

impl DisplayWidget<'_, '_> {
    pub fn title(&self) -> String {
        format!(
            " {} Virtual Machine ({}) {}Hz {}",
            self.rom_kind,
            self.rom_name,
            self.execution_frequency,
            if self.tone { "♪ " } else { "" }
        )
    }

    fn pixel_stream(
        buffer: &DisplayBuffer,
        width: usize,
        height: usize,
    ) -> impl Iterator<Item = bool> + '_ {
        buffer
            .iter()
            .take(height)
            .flat_map(move |row| (0..width).map(move |shift| *row >> (63 - shift) & 1 == 1))
    }
}

impl Widget for DisplayWidget<'_, '_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (display_width, display_height) = Display::dimensions();

        // terminal pixel height is twice the width but there is a unicode bottom-half block (▄)
        // so for each cell we use the background color for the upper pixel and the foreground color for the lower one
        // so for each row of the terminal we can fit 2 rows of the display

        let rendered_display_width = area.width.min(display_width) as usize;
        let rendered_display_height = area.height.saturating_mul(2).min(display_height) as usize;

        let pixels = DisplayWidget::pixel_stream(
            &self.display.buffer,
            rendered_display_width,
            rendered_display_height,
        );

        for (i, on) in pixels.enumerate() {
            let color = if on { ON_COLOR } else { OFF_COLOR };

            let x = i % rendered_display_width;
            let y = i / rendered_display_width;

            let cell = buf.get_mut(area.left() + x as u16, area.top() + y as u16 / 2);

            if y % 2 == 0 {
                cell.set_bg(color);
            } else {
                cell.set_fg(color).set_symbol("▄");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_wraps_coordinates() {
        let mut display = Display::default();
        display.toggle(64 + 1, 32 + 2);
        assert!(display.get(1, 2));
        assert_eq!(display.buffer[2], 1 << 62);

        display.toggle(1, 2);
        assert_eq!(display.lit(), 0);
    }

    #[test]
    fn left_most_pixel_is_most_significant_bit() {
        let mut display = Display::default();
        display.toggle(0, 0);
        display.toggle(63, 31);
        assert_eq!(display.buffer[0], 1 << 63);
        assert_eq!(display.buffer[31], 1);
    }

    #[test]
    fn renders_as_text() {
        let mut display = Display::default();
        display.toggle(0, 0);
        let text = display.to_string();
        let first_row = text.lines().next().unwrap_or_default();
        assert!(first_row.starts_with("█."));
        assert_eq!(text.lines().count(), 32);
    }
}
