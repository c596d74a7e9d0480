//! Baud-rate divisor table and frame format.
//!
//! Divisors are taken from a fixed table instead of being computed, so a
//! combination that would produce a large timing error is simply absent.
//! Unsupported combinations fail when the line is configured, or at compile
//! time when the divisor is looked up in a `const` context:
//!
//! ```
//! use usartkit_line::baud::divisor_or_panic;
//!
//! const UBRR: u16 = divisor_or_panic(16_000_000, 115_200, true);
//! assert_eq!(UBRR, 16);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LineError, Result};
use crate::regs::ucsrc;

/// Default CPU clock: 16 MHz.
pub const DEFAULT_CLOCK_HZ: u32 = 16_000_000;

/// Default line speed.
pub const DEFAULT_BAUD: u32 = 9600;

/// One row of the divisor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaudEntry {
    pub clock_hz: u32,
    pub baud: u32,
    /// UBRR value with the double-speed (U2X) bit set.
    pub ubrr_double: u16,
    /// UBRR value in normal-speed mode.
    pub ubrr_normal: u16,
}

impl BaudEntry {
    /// Divisor for the requested speed mode.
    pub const fn ubrr(&self, double_speed: bool) -> u16 {
        if double_speed {
            self.ubrr_double
        } else {
            self.ubrr_normal
        }
    }
}

/// Supported clock/baud combinations.
pub const BAUD_TABLE: &[BaudEntry] = &[
    BaudEntry {
        clock_hz: 1_000_000,
        baud: 9600,
        ubrr_double: 12,
        ubrr_normal: 6,
    },
    BaudEntry {
        clock_hz: 8_000_000,
        baud: 9600,
        ubrr_double: 103,
        ubrr_normal: 51,
    },
    BaudEntry {
        clock_hz: 8_000_000,
        baud: 115_200,
        ubrr_double: 8,
        ubrr_normal: 3,
    },
    BaudEntry {
        clock_hz: 16_000_000,
        baud: 9600,
        ubrr_double: 207,
        ubrr_normal: 103,
    },
    BaudEntry {
        clock_hz: 16_000_000,
        baud: 115_200,
        ubrr_double: 16,
        ubrr_normal: 8,
    },
];

/// Look up the UBRR divisor for a clock/baud combination.
pub const fn divisor(clock_hz: u32, baud: u32, double_speed: bool) -> Option<u16> {
    let mut i = 0;
    while i < BAUD_TABLE.len() {
        let entry = &BAUD_TABLE[i];
        if entry.clock_hz == clock_hz && entry.baud == baud {
            return Some(entry.ubrr(double_speed));
        }
        i += 1;
    }
    None
}

/// Like [`divisor`], but fails const evaluation for unsupported combinations.
pub const fn divisor_or_panic(clock_hz: u32, baud: u32, double_speed: bool) -> u16 {
    match divisor(clock_hz, baud, double_speed) {
        Some(ubrr) => ubrr,
        None => panic!("clock/baud combination not in the divisor table"),
    }
}

/// The baud rate a divisor actually produces.
pub fn actual_baud(clock_hz: u32, ubrr: u16, double_speed: bool) -> f64 {
    let prescale = if double_speed { 8.0 } else { 16.0 };
    f64::from(clock_hz) / (prescale * (f64::from(ubrr) + 1.0))
}

/// Relative timing error of a divisor, in percent.
pub fn error_percent(clock_hz: u32, baud: u32, ubrr: u16, double_speed: bool) -> f64 {
    (actual_baud(clock_hz, ubrr, double_speed) / f64::from(baud) - 1.0) * 100.0
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    #[default]
    Eight,
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> u8 {
        match bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(format!("data bits must be 5-8, got {other}")),
        }
    }
}

/// Parity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum StopBits {
    #[default]
    One,
    Two,
}

impl From<StopBits> for u8 {
    fn from(bits: StopBits) -> u8 {
        match bits {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

impl TryFrom<u8> for StopBits {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            other => Err(format!("stop bits must be 1 or 2, got {other}")),
        }
    }
}

/// Character frame format, e.g. 8N1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameFormat {
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
}

impl FrameFormat {
    /// 8 data bits, no parity, 1 stop bit.
    pub const EIGHT_N_ONE: FrameFormat = FrameFormat {
        data_bits: DataBits::Eight,
        parity: Parity::None,
        stop_bits: StopBits::One,
    };

    /// Encode into a UCSRC register image (asynchronous mode).
    pub fn ucsrc(&self) -> u8 {
        let size = match self.data_bits {
            DataBits::Five => 0,
            DataBits::Six => ucsrc::UCSZ0,
            DataBits::Seven => ucsrc::UCSZ1,
            DataBits::Eight => ucsrc::UCSZ1 | ucsrc::UCSZ0,
        };
        let parity = match self.parity {
            Parity::None => 0,
            Parity::Even => ucsrc::UPM1,
            Parity::Odd => ucsrc::UPM1 | ucsrc::UPM0,
        };
        let stop = match self.stop_bits {
            StopBits::One => 0,
            StopBits::Two => ucsrc::USBS,
        };
        size | parity | stop
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        };
        write!(
            f,
            "{}{}{}",
            u8::from(self.data_bits),
            parity,
            u8::from(self.stop_bits)
        )
    }
}

impl FromStr for FrameFormat {
    type Err = LineError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || LineError::UnsupportedFormat(s.to_string());
        let chars: Vec<char> = s.trim().chars().collect();
        if chars.len() != 3 {
            return Err(invalid());
        }

        let data_bits = chars[0]
            .to_digit(10)
            .and_then(|d| DataBits::try_from(d as u8).ok())
            .ok_or_else(invalid)?;
        let parity = match chars[1].to_ascii_uppercase() {
            'N' => Parity::None,
            'E' => Parity::Even,
            'O' => Parity::Odd,
            _ => return Err(invalid()),
        };
        let stop_bits = chars[2]
            .to_digit(10)
            .and_then(|d| StopBits::try_from(d as u8).ok())
            .ok_or_else(invalid)?;

        Ok(Self {
            data_bits,
            parity,
            stop_bits,
        })
    }
}

/// Line configuration applied by [`LineDriver::configure`](crate::LineDriver::configure).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    /// CPU clock feeding the baud generator.
    pub clock_hz: u32,
    /// Requested line speed.
    pub baud: u32,
    /// Use the double-speed (U2X) prescaler.
    pub double_speed: bool,
    /// Character frame format.
    pub format: FrameFormat,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            clock_hz: DEFAULT_CLOCK_HZ,
            baud: DEFAULT_BAUD,
            double_speed: true,
            format: FrameFormat::EIGHT_N_ONE,
        }
    }
}

impl LineConfig {
    /// Resolve the UBRR divisor, failing for combinations outside the table.
    pub fn divisor(&self) -> Result<u16> {
        divisor(self.clock_hz, self.baud, self.double_speed).ok_or(LineError::UnsupportedBaud {
            clock_hz: self.clock_hz,
            baud: self.baud,
            double_speed: self.double_speed,
        })
    }

    /// Validate the configuration without touching any hardware.
    pub fn validate(&self) -> Result<()> {
        self.divisor().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lookup_matches_both_speed_modes() {
        assert_eq!(divisor(1_000_000, 9600, true), Some(12));
        assert_eq!(divisor(1_000_000, 9600, false), Some(6));
        assert_eq!(divisor(8_000_000, 115_200, true), Some(8));
        assert_eq!(divisor(8_000_000, 115_200, false), Some(3));
        assert_eq!(divisor(16_000_000, 9600, true), Some(207));
        assert_eq!(divisor(16_000_000, 9600, false), Some(103));
    }

    #[test]
    fn unsupported_combination_is_rejected() {
        assert_eq!(divisor(1_000_000, 115_200, true), None);
        assert_eq!(divisor(20_000_000, 9600, true), None);

        let config = LineConfig {
            clock_hz: 1_000_000,
            baud: 115_200,
            ..LineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            LineError::UnsupportedBaud {
                clock_hz: 1_000_000,
                baud: 115_200,
                double_speed: true
            }
        ));
    }

    #[test]
    fn const_lookup_in_const_context() {
        const UBRR: u16 = divisor_or_panic(8_000_000, 9600, false);
        assert_eq!(UBRR, 51);
    }

    #[test]
    fn table_entries_have_bounded_timing_error() {
        for entry in BAUD_TABLE {
            for double_speed in [true, false] {
                let err = error_percent(
                    entry.clock_hz,
                    entry.baud,
                    entry.ubrr(double_speed),
                    double_speed,
                )
                .abs();
                assert!(err < 8.6, "{entry:?} double_speed={double_speed} err={err}");
            }
        }
        let err = error_percent(16_000_000, 9600, 207, true);
        assert!(err.abs() < 0.2);
    }

    #[test]
    fn default_config_is_16mhz_9600_8n1() {
        let config = LineConfig::default();
        assert_eq!(config.divisor().unwrap(), 207);
        assert_eq!(config.format.to_string(), "8N1");
    }

    #[test]
    fn frame_format_register_bits() {
        assert_eq!(FrameFormat::EIGHT_N_ONE.ucsrc(), ucsrc::UCSZ1 | ucsrc::UCSZ0);

        let seven_e_two: FrameFormat = "7E2".parse().unwrap();
        assert_eq!(
            seven_e_two.ucsrc(),
            ucsrc::UCSZ1 | ucsrc::UPM1 | ucsrc::USBS
        );

        let five_o_one: FrameFormat = "5o1".parse().unwrap();
        assert_eq!(five_o_one.ucsrc(), ucsrc::UPM1 | ucsrc::UPM0);
    }

    #[test]
    fn frame_format_rejects_garbage() {
        assert!("9N1".parse::<FrameFormat>().is_err());
        assert!("8X1".parse::<FrameFormat>().is_err());
        assert!("8N3".parse::<FrameFormat>().is_err());
        assert!("8N".parse::<FrameFormat>().is_err());
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: LineConfig =
            serde_json::from_str(r#"{"baud":115200,"format":{"parity":"even"}}"#).unwrap();
        assert_eq!(config.clock_hz, DEFAULT_CLOCK_HZ);
        assert_eq!(config.baud, 115_200);
        assert_eq!(config.format.parity, Parity::Even);
        assert_eq!(config.format.data_bits, DataBits::Eight);
        assert_eq!(config.divisor().unwrap(), 16);
    }

    #[test]
    fn data_bits_serialize_as_numbers() {
        let json = serde_json::to_string(&FrameFormat::EIGHT_N_ONE).unwrap();
        assert_eq!(json, r#"{"data_bits":8,"parity":"none","stop_bits":1}"#);
        assert!(serde_json::from_str::<FrameFormat>(r#"{"data_bits":4}"#).is_err());
    }
}
