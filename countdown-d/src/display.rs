// Copyright Christmas Countdown Developers. All Rights Reserved.
// SPDX-License-Identifier: GPL-2.0-only

//! Four digit seven segment display.

use std::fmt;
use std::io::Write;

use tracing::debug;

/// Largest number the four digits can show.
pub const MAX_NUMBER: u16 = 9999;

/// What the display can be asked to show.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DisplayValue {
    /// A countdown value, 0 to 9999.
    Number(u16),
    /// No network could be joined.
    Error,
    /// The clock has never been synchronized.
    Placeholder,
    Blank,
    /// All segments lit, shown at power on.
    TestPattern,
    /// Battery critically low, about to suspend.
    Critical,
    /// A single digit in the leftmost position, stepped while waiting for a network.
    Progress(u8),
}

impl DisplayValue {
    /// Build a Number, clamped to what the display can show.
    pub fn number(value: i32) -> DisplayValue {
        let clamped = value.clamp(0, MAX_NUMBER as i32);
        DisplayValue::Number(clamped as u16)
    }
}

impl fmt::Display for DisplayValue {
    /// Four characters, right aligned like the hardware does it.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayValue::Number(n) => write!(f, "{:>4}", n),
            DisplayValue::Error => f.write_str("  -1"),
            DisplayValue::Placeholder => f.write_str("----"),
            DisplayValue::Blank => f.write_str("    "),
            DisplayValue::TestPattern => f.write_str("8888"),
            DisplayValue::Critical => f.write_str("LobA"),
            DisplayValue::Progress(step) => write!(f, "{}   ", step % 10),
        }
    }
}

#[cfg_attr(any(test, feature = "test"), mockall::automock)]
pub trait SegmentDisplay: Send {
    /// Initialize the display at the given I2C address. Fails if no display answers.
    fn begin(&mut self, address: u8) -> anyhow::Result<()>;

    /// Set the brightness, 0 (dimmest) to 15.
    fn set_brightness(&mut self, level: u8);

    fn show(&mut self, value: DisplayValue, colon_on: bool);
}

/// Render four characters and a colon between the second and third digit, as the panel does.
pub fn render(value: DisplayValue, colon_on: bool) -> String {
    let digits = value.to_string();
    let (left, right) = digits.split_at(2);
    format!("[{}{}{}]", left, if colon_on { ':' } else { ' ' }, right)
}

/// Display stand-in for hosts, printing the panel content on a writer whenever it changes.
#[derive(Debug)]
pub struct ConsoleDisplay<W: Write + Send> {
    out: W,
    shown: Option<(DisplayValue, bool)>,
    brightness: u8,
}

impl ConsoleDisplay<std::io::Stdout> {
    pub fn stdout() -> Self {
        ConsoleDisplay::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleDisplay<W> {
    pub fn new(out: W) -> Self {
        ConsoleDisplay {
            out,
            shown: None,
            brightness: 15,
        }
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> SegmentDisplay for ConsoleDisplay<W> {
    fn begin(&mut self, address: u8) -> anyhow::Result<()> {
        debug!("Console display standing in for I2C address {:#04x}", address);
        self.shown = None;
        Ok(())
    }

    fn set_brightness(&mut self, level: u8) {
        self.brightness = level.min(15);
    }

    fn show(&mut self, value: DisplayValue, colon_on: bool) {
        if self.shown == Some((value, colon_on)) {
            return;
        }
        self.shown = Some((value, colon_on));
        if let Err(e) = writeln!(self.out, "{}", render(value, colon_on)) {
            debug!(error = ?e, "Failed to write display content");
        }
    }
}
