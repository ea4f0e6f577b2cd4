//! HD44780 16x2 character LCD behind a PCF8574 I2C backpack.
//!
//! Backpack wiring: P0=RS, P1=RW, P2=EN, P3=backlight, P4..P7=D4..D7.
//! The controller runs in 4-bit mode, so every byte is two nibble strobes.

use esp_idf_hal::delay::{Ets, FreeRtos};
use esp_idf_hal::i2c::I2cDriver;
use log::{info, warn};

use crate::error::DisplayError;
use crate::hal::CharDisplay;

const LCD_ADDR: u8 = 0x27;
const LCD_ADDR_ALT: u8 = 0x3F;
const I2C_TIMEOUT_TICKS: u32 = 100;

pub const COLUMNS: usize = 16;
pub const ROWS: usize = 2;

const ROW_OFFSETS: [u8; ROWS] = [0x00, 0x40];

// Backpack bits
const RS: u8 = 0x01;
const EN: u8 = 0x04;
const BACKLIGHT: u8 = 0x08;

// Controller commands
const CMD_CLEAR: u8 = 0x01;
const CMD_ENTRY_MODE_INC: u8 = 0x06;
const CMD_DISPLAY_ON: u8 = 0x0C;
const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
const CMD_SET_DDRAM: u8 = 0x80;

fn bus_err(e: esp_idf_sys::EspError) -> DisplayError {
    DisplayError::Bus(e.to_string())
}

pub struct Lcd1602 {
    i2c: I2cDriver<'static>,
    addr: u8,
}

impl Lcd1602 {
    /// Probe both common backpack addresses and run the 4-bit init sequence.
    pub fn init(mut i2c: I2cDriver<'static>) -> Result<Self, DisplayError> {
        let addr = [LCD_ADDR, LCD_ADDR_ALT]
            .into_iter()
            .find(|&addr| i2c.write(addr, &[BACKLIGHT], I2C_TIMEOUT_TICKS).is_ok())
            .ok_or_else(|| {
                warn!("LCD backpack not found at 0x27 or 0x3F");
                DisplayError::Bus("no LCD backpack on the I2C bus".into())
            })?;
        info!("LCD backpack found at 0x{:02X}", addr);

        let mut lcd = Self { i2c, addr };
        // Power-on wait, then force 8-bit mode three times before switching
        // to 4-bit. The controller may start in either mode.
        FreeRtos::delay_ms(50);
        for _ in 0..3 {
            lcd.write_nibble(0x03 << 4, 0)?;
            FreeRtos::delay_ms(5);
        }
        lcd.write_nibble(0x02 << 4, 0)?;

        lcd.command(CMD_FUNCTION_4BIT_2LINE)?;
        lcd.command(CMD_DISPLAY_ON)?;
        lcd.command(CMD_CLEAR)?;
        FreeRtos::delay_ms(2);
        lcd.command(CMD_ENTRY_MODE_INC)?;
        Ok(lcd)
    }

    fn expander_write(&mut self, bits: u8) -> Result<(), DisplayError> {
        self.i2c
            .write(self.addr, &[bits | BACKLIGHT], I2C_TIMEOUT_TICKS)
            .map_err(bus_err)
    }

    fn write_nibble(&mut self, high_nibble: u8, mode: u8) -> Result<(), DisplayError> {
        let bits = (high_nibble & 0xF0) | mode;
        self.expander_write(bits | EN)?;
        Ets::delay_us(1);
        self.expander_write(bits)?;
        Ets::delay_us(50);
        Ok(())
    }

    fn send(&mut self, byte: u8, mode: u8) -> Result<(), DisplayError> {
        self.write_nibble(byte & 0xF0, mode)?;
        self.write_nibble(byte << 4, mode)
    }

    fn command(&mut self, cmd: u8) -> Result<(), DisplayError> {
        self.send(cmd, 0)
    }
}

impl CharDisplay for Lcd1602 {
    fn columns(&self) -> usize {
        COLUMNS
    }

    fn rows(&self) -> usize {
        ROWS
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        self.command(CMD_CLEAR)?;
        FreeRtos::delay_ms(2);
        Ok(())
    }

    fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), DisplayError> {
        if col as usize >= COLUMNS || row as usize >= ROWS {
            return Err(DisplayError::CursorOutOfRange { col, row });
        }
        self.command(CMD_SET_DDRAM | (ROW_OFFSETS[row as usize] + col))
    }

    fn write(&mut self, text: &str) -> Result<(), DisplayError> {
        for ch in text.chars() {
            // The character ROM only matches ASCII in the printable range.
            let byte = if ch.is_ascii() && !ch.is_ascii_control() {
                ch as u8
            } else {
                b'?'
            };
            self.send(byte, RS)?;
        }
        Ok(())
    }
}
