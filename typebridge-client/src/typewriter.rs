//! Printing session on top of a bridge connection
//!
//! Puts the typewriter online when created and back offline when dropped,
//! and tracks where the print head is so text and absolute moves can be
//! laid out in steps.

use std::io::{Read, Write};

use tracing::{debug, warn};

use crate::client::BridgeClient;
use crate::commands::{Direction, Feed, TypewriterCommand, MAX_DISTANCE, OFFLINE, ONLINE};
use crate::error::{ClientError, Result};
use crate::image::{DotImage, MAX_IMAGE_HEIGHT};

/// Step between printed dots, horizontal and vertical
const DOT_PITCH: (i32, i32) = (3, 2);
/// Weight of a printed dot
const DOT_WEIGHT: u8 = 15;

pub struct Typewriter<S: Read + Write> {
    client: BridgeClient<S>,
    online: bool,
    /// Head position in steps, x to the right and y down from the start
    pos: (i32, i32),
    char_width: u8,
    /// Column a carriage return goes back to
    pub line_start: i32,
    pub line_height: u16,
    pub print_weight: u8,
    pub feed_direction: Option<Feed>,
}

impl<S: Read + Write> Typewriter<S> {
    /// Take over `client` and put the typewriter online
    pub fn new(mut client: BridgeClient<S>) -> Result<Self> {
        client.send_all(&ONLINE)?;
        debug!("typewriter online");
        Ok(Self {
            client,
            online: true,
            pos: (0, 0),
            char_width: 12,
            line_start: 0,
            line_height: 16,
            print_weight: 20,
            feed_direction: Some(Feed::Right),
        })
    }

    pub fn client(&mut self) -> &mut BridgeClient<S> {
        &mut self.client
    }

    pub fn position(&self) -> (i32, i32) {
        self.pos
    }

    pub fn char_width(&self) -> u8 {
        self.char_width
    }

    pub fn set_char_width(&mut self, width: u8) -> Result<()> {
        self.client
            .execute(&TypewriterCommand::SetCharWidth(width))?;
        self.char_width = width;
        Ok(())
    }

    pub fn print_char(&mut self, c: char) -> Result<()> {
        let command = TypewriterCommand::print_with(c, self.print_weight, self.feed_direction);
        self.client.execute(&command)?;
        self.pos.0 += match self.feed_direction {
            Some(Feed::Right) => i32::from(self.char_width),
            Some(Feed::Left) => -i32::from(self.char_width),
            None => 0,
        };
        Ok(())
    }

    pub fn space(&mut self) -> Result<()> {
        self.client.execute(&TypewriterCommand::Space(0))?;
        self.pos.0 += i32::from(self.char_width);
        Ok(())
    }

    /// Move down one line
    pub fn newline(&mut self) -> Result<()> {
        self.move_head(0, i32::from(self.line_height))
    }

    /// Move back to `line_start`
    pub fn carriage_return(&mut self) -> Result<()> {
        self.move_head(self.line_start - self.pos.0, 0)
    }

    /// Print text; `'\n'` starts a new line and `' '` advances one space
    pub fn print_str(&mut self, text: &str) -> Result<()> {
        for c in text.chars() {
            match c {
                '\n' => {
                    self.newline()?;
                    self.carriage_return()?;
                }
                ' ' => self.space()?,
                _ => self.print_char(c)?,
            }
        }
        Ok(())
    }

    /// Move the head by `dx` steps right and `dy` steps down
    ///
    /// Distances beyond a single move's range are split.
    pub fn move_head(&mut self, dx: i32, dy: i32) -> Result<()> {
        let horizontal = if dx < 0 {
            Direction::Left
        } else {
            Direction::Right
        };
        let vertical = if dy < 0 { Direction::Up } else { Direction::Down };

        self.move_steps(horizontal, dx.unsigned_abs())?;
        self.pos.0 += dx;
        self.move_steps(vertical, dy.unsigned_abs())?;
        self.pos.1 += dy;
        Ok(())
    }

    /// Move the head to absolute position `(x, y)`
    pub fn move_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.move_head(x - self.pos.0, y - self.pos.1)
    }

    /// Print the dark pixels of `image` as dots, starting at the head
    ///
    /// Call [`DotImage::dither`] first for photographs. Feed direction and
    /// print weight are restored afterwards, and the head is left on the
    /// last dot.
    pub fn print_image(&mut self, image: &DotImage) -> Result<()> {
        if image.height() > MAX_IMAGE_HEIGHT {
            return Err(ClientError::ImageTooTall(image.height()));
        }
        let origin = self.pos;
        let feed_direction = self.feed_direction.take();
        let print_weight = core::mem::replace(&mut self.print_weight, DOT_WEIGHT);

        let result = image.dots().try_for_each(|(x, y)| {
            let x = origin.0 + DOT_PITCH.0 * x as i32;
            let y = origin.1 + DOT_PITCH.1 * y as i32;
            self.move_to(x, y)?;
            self.print_char('.')
        });

        self.feed_direction = feed_direction;
        self.print_weight = print_weight;
        result?;
        debug!(dots = image.dots().count(), "image printed");
        Ok(())
    }

    fn move_steps(&mut self, direction: Direction, mut distance: u32) -> Result<()> {
        while distance > 0 {
            let step = distance.min(u32::from(MAX_DISTANCE));
            // step <= MAX_DISTANCE fits in u16
            self.client
                .execute(&TypewriterCommand::move_by(direction, step as u16))?;
            distance -= step;
        }
        Ok(())
    }

    /// Put the typewriter offline and end the session
    pub fn finish(mut self) -> Result<()> {
        self.go_offline()
    }

    fn go_offline(&mut self) -> Result<()> {
        if !self.online {
            return Ok(());
        }
        self.online = false;
        self.client.send_all(&OFFLINE)?;
        debug!("typewriter offline");
        Ok(())
    }
}

impl<S: Read + Write> Drop for Typewriter<S> {
    fn drop(&mut self) {
        if let Err(e) = self.go_offline() {
            warn!(error = %e, "failed to put typewriter offline");
        }
    }
}
