use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};

use crate::{Frame, FRAME_HEIGHT, FRAME_WIDTH};

const LINE_HEIGHT: i32 = 12;

/// Lines beyond this don't fit in the frame height
pub const MAX_SPLASH_LINES: usize = FRAME_HEIGHT / LINE_HEIGHT as usize;

/// Clear `frame` and draw `lines` centered on it
pub fn draw_splash(frame: &mut Frame, lines: &[&str]) {
    frame.clear(false);

    let lines = &lines[..lines.len().min(MAX_SPLASH_LINES)];
    let character_style = MonoTextStyle::new(&FONT_6X10, BinaryColor::On);
    let text_style = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(Baseline::Middle)
        .build();

    let block_height = lines.len() as i32 * LINE_HEIGHT;
    let top = (FRAME_HEIGHT as i32 - block_height) / 2 + LINE_HEIGHT / 2;

    for (i, line) in lines.iter().enumerate() {
        let position = Point::new(FRAME_WIDTH as i32 / 2, top + i as i32 * LINE_HEIGHT);
        Text::with_text_style(line, position, character_style, text_style)
            .draw(frame)
            .ok();
    }
}
