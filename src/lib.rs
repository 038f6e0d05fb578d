//! Driver for the Analog Devices AD57x4R family of quad channel 12/14/16 bit
//! voltage output DACs (AD5724R, AD5734R, AD5754R).
//!
//! Up to four chips can be daisy chained behind a single ~SYNC line. Channels
//! are addressed by a global index `chip * 4 + offset`, so a chain of three
//! chips exposes channels `0..12`.
//!
//! ```ignore
//! let mut dac = Ad57x4r::new(spi);
//! dac.configure(Resolution::Ad5754r, 2)?;
//! dac.set_output_range_all(OutputRange::Bipolar10V)?;
//! dac.write_value(5, -12000)?;
//! ```
//!
//! # Features
//! - **`defmt`**: `defmt::Format` on the public types and trace logging of
//!   every bus transaction.

#![deny(unsafe_code, missing_docs)]
#![no_std]

use core::convert::Infallible;

use embedded_hal::digital::{self, ErrorType, OutputPin};

pub mod ad57x4r;
pub mod datagram;
pub mod registers;

pub use datagram::{Address, Datagram, DecodeError, Direction, Register, DATAGRAM_SIZE};
pub use registers::{ControlConfig, PowerStatus};

/// SPI mode expected by the AD57x4R (CPOL = 1, CPHA = 0).
pub const MODE: embedded_hal::spi::Mode = embedded_hal::spi::MODE_2;

/// Maximum serial clock frequency supported by the chip family.
pub const MAX_SCLK_HZ: u32 = 30_000_000;

/// Number of DAC channels on each chip.
pub const CHANNELS_PER_CHIP: usize = 4;

/// Smallest supported daisy chain.
pub const CHIP_COUNT_MIN: u8 = 1;

/// Largest supported daisy chain.
pub const CHIP_COUNT_MAX: u8 = 4;

/// AD57x4R DAC chain on an SPI device.
///
/// The ~SYNC line is the chip select of `DEV`, so every bus transaction is
/// framed by the [`SpiDevice`](embedded_hal::spi::SpiDevice) implementation.
/// ~LDAC and ~CLR are optional; without them the [`NoPin`] placeholder is used.
pub struct Ad57x4r<DEV, LDAC = NoPin, CLR = NoPin> {
    spi: DEV,
    ldac: LDAC,
    clr: CLR,
    cfg: DeviceConfig,
}

/// Errors for this crate
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// SPI communication error
    Spi(E),
    /// Driving the ~LDAC or ~CLR pin failed
    Pin(digital::ErrorKind),
    /// Channel index is not below [`DeviceConfig::channel_count`]
    ChannelOutOfRange,
    /// Chip index is not below [`DeviceConfig::chip_count`]
    ChipOutOfRange,
}

/// Resolution variant of the chips in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resolution {
    /// 12 bit, AD5724R
    Ad5724r,
    /// 14 bit, AD5734R
    Ad5734r,
    /// 16 bit, AD5754R
    Ad5754r,
}

impl Resolution {
    /// Native bit width of the DAC.
    pub const fn bits(self) -> u8 {
        match self {
            Self::Ad5724r => 12,
            Self::Ad5734r => 14,
            Self::Ad5754r => 16,
        }
    }

    /// Left shift that aligns a native value to the 16 bit payload field.
    pub const fn shift(self) -> u8 {
        16 - self.bits()
    }
}

/// Output voltage polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// 0V to +full scale
    Unipolar,
    /// -full scale to +full scale, two's complement coding
    Bipolar,
}

/// Available output ranges for the DAC channels.
/// These values are valid with a reference input of 2.5V, if the reference
/// voltage is different, consult the datasheet for the gains associated with
/// these settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum OutputRange {
    /// Gain = 2, 0V to +5V when Vref = 2.5V
    Unipolar5V = 0b000,
    /// Gain = 4, 0V to +10V when Vref = 2.5V
    Unipolar10V = 0b001,
    /// Gain = 4.32, 0V to +10.8V when Vref = 2.5V
    Unipolar10_8V = 0b010,
    /// Gain = 4, -5V to +5V when Vref = 2.5V
    Bipolar5V = 0b011,
    /// Gain = 8, -10V to +10V when Vref = 2.5V
    Bipolar10V = 0b100,
    /// Gain = 8.64, -10.8 to +10.8V when Vref = 2.5V
    Bipolar10_8V = 0b101,
}

impl OutputRange {
    /// Polarity the channel operates in with this range.
    pub const fn polarity(self) -> Polarity {
        match self {
            Self::Unipolar5V | Self::Unipolar10V | Self::Unipolar10_8V => Polarity::Unipolar,
            Self::Bipolar5V | Self::Bipolar10V | Self::Bipolar10_8V => Polarity::Bipolar,
        }
    }
}

/// Unknown codes read back from the range register map to `Unipolar5V`.
impl From<u16> for OutputRange {
    fn from(value: u16) -> Self {
        match value & 0b111 {
            0b001 => Self::Unipolar10V,
            0b010 => Self::Unipolar10_8V,
            0b011 => Self::Bipolar5V,
            0b100 => Self::Bipolar10V,
            0b101 => Self::Bipolar10_8V,
            _ => Self::Unipolar5V,
        }
    }
}

/// DAC channel of a single chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Channel {
    /// DAC Channel A
    A = 0,
    /// DAC Channel B
    B = 1,
    /// DAC Channel C
    C = 2,
    /// DAC Channel D
    D = 3,
}

impl Channel {
    /// Channel for a chip-local offset, taken modulo four.
    pub const fn from_offset(offset: usize) -> Self {
        match offset % CHANNELS_PER_CHIP {
            0 => Self::A,
            1 => Self::B,
            2 => Self::C,
            _ => Self::D,
        }
    }
}

/// Destination of a channel addressed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Target {
    /// One channel of one chip
    Single {
        /// Position of the chip in the daisy chain
        chip: u8,
        /// Channel on that chip
        channel: Channel,
    },
    /// Every channel of every chip
    All,
}

impl Target {
    /// Map a global channel index to its chip and channel.
    ///
    /// The index is not checked against the chain length, see
    /// [`DeviceConfig::target`] for the checked version.
    pub const fn from_channel(channel: usize) -> Self {
        Self::Single {
            chip: (channel / CHANNELS_PER_CHIP) as u8,
            channel: Channel::from_offset(channel),
        }
    }

    /// Chips touched by this target.
    pub const fn chips(self) -> Chips {
        match self {
            Self::Single { chip, .. } => Chips::One(chip),
            Self::All => Chips::All,
        }
    }

    /// Value of the address field for DAC and range register commands.
    pub const fn address(self) -> Address {
        match self {
            Self::Single { channel, .. } => Address::channel(channel),
            Self::All => Address::ALL_CHANNELS,
        }
    }
}

/// Destination of a chip level command (power, control).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Chips {
    /// A single chip of the chain
    One(u8),
    /// Every chip of the chain
    All,
}

impl Chips {
    fn contains(self, chip: u8) -> bool {
        match self {
            Self::One(c) => c == chip,
            Self::All => true,
        }
    }
}

/// Configuration of a DAC chain, owned by its [`Ad57x4r`] instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceConfig {
    chip_count: u8,
    resolution: Resolution,
    polarity: Polarity,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self::new(Resolution::Ad5754r, CHIP_COUNT_MIN)
    }
}

impl DeviceConfig {
    /// Unipolar configuration; a chip count outside `1..=4` falls back to one chip.
    pub const fn new(resolution: Resolution, chip_count: u8) -> Self {
        let chip_count = if chip_count >= CHIP_COUNT_MIN && chip_count <= CHIP_COUNT_MAX {
            chip_count
        } else {
            CHIP_COUNT_MIN
        };
        Self {
            chip_count,
            resolution,
            polarity: Polarity::Unipolar,
        }
    }

    /// Number of chips in the daisy chain.
    pub const fn chip_count(&self) -> u8 {
        self.chip_count
    }

    /// Number of addressable channels.
    pub const fn channel_count(&self) -> usize {
        self.chip_count as usize * CHANNELS_PER_CHIP
    }

    /// Resolution variant of the chips.
    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Polarity of the most recently selected output range.
    pub const fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub(crate) fn set_polarity(&mut self, polarity: Polarity) {
        self.polarity = polarity;
    }

    /// Lowest value accepted by [`Ad57x4r::write_value`].
    pub const fn min_value(&self) -> i32 {
        match (self.polarity, self.resolution) {
            (Polarity::Unipolar, _) => 0,
            (Polarity::Bipolar, Resolution::Ad5724r) => -2048,
            (Polarity::Bipolar, Resolution::Ad5734r) => -8192,
            (Polarity::Bipolar, Resolution::Ad5754r) => -32768,
        }
    }

    /// Highest value accepted by [`Ad57x4r::write_value`].
    ///
    /// The unipolar AD5754R reports 65536, one past what the 16 bit payload
    /// can carry; writing it wraps to zero.
    pub const fn max_value(&self) -> i32 {
        match (self.polarity, self.resolution) {
            (Polarity::Unipolar, Resolution::Ad5724r) => 4095,
            (Polarity::Unipolar, Resolution::Ad5734r) => 16383,
            (Polarity::Unipolar, Resolution::Ad5754r) => 65536,
            (Polarity::Bipolar, Resolution::Ad5724r) => 2047,
            (Polarity::Bipolar, Resolution::Ad5734r) => 8191,
            (Polarity::Bipolar, Resolution::Ad5754r) => 32767,
        }
    }

    /// Left align a native DAC value in the 16 bit payload field.
    pub const fn scale(&self, value: i32) -> u16 {
        (value << self.resolution.shift()) as u16
    }

    /// Checked mapping of a global channel index to its chip and channel.
    pub fn target(&self, channel: usize) -> Option<Target> {
        (channel < self.channel_count()).then(|| Target::from_channel(channel))
    }

    /// `true` when `chip` is part of the chain.
    pub const fn has_chip(&self, chip: u8) -> bool {
        chip < self.chip_count
    }
}

/// Placeholder for an unconnected ~LDAC or ~CLR pin.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPin;

impl ErrorType for NoPin {
    type Error = Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
