//! Input shift register command word.
//!
//! Every command is a 24 bit word shifted MSB first:
//!
//! | 23  | 22 | 21..19   | 18..16  | 15..0   |
//! |-----|----|----------|---------|---------|
//! | R/W | 0  | register | address | payload |
//!
//! The payload is always 16 bits wide, devices with a smaller resolution use
//! a left-aligned data format.

use bitfield_struct::bitfield;

/// Number of bytes shifted per datagram
pub const DATAGRAM_SIZE: usize = 3;

#[bitfield(u32)]
struct Word {
    data: u16,
    #[bits(3)]
    addr: u8,
    #[bits(3)]
    reg: u8,
    #[bits(1)]
    _zero: bool,
    #[bits(1)]
    rw: bool,
    #[bits(8)]
    _unused: u8,
}

/// Read/write flag of a datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Write the payload to the register
    Write,
    /// Request the register contents on the next frame
    Read,
}

/// Register selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Register {
    /// DAC value register
    DacValue = 0b000,
    /// Output range select register
    OutputRange = 0b001,
    /// Power control register
    PowerControl = 0b010,
    /// Control register
    Control = 0b011,
}

impl TryFrom<u8> for Register {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0b000 => Ok(Self::DacValue),
            0b001 => Ok(Self::OutputRange),
            0b010 => Ok(Self::PowerControl),
            0b011 => Ok(Self::Control),
            other => Err(DecodeError::UnknownRegister(other)),
        }
    }
}

/// Errors decoding a received datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Register field holds one of the unassigned codes `0b100..=0b111`
    UnknownRegister(u8),
}

/// Three bit address field. Its meaning depends on the register: a DAC
/// channel for the value and range registers, a function for the control
/// register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Address(u8);

impl Address {
    /// DAC channel A
    pub const DAC_A: Self = Self(0b000);
    /// DAC channel B
    pub const DAC_B: Self = Self(0b001);
    /// DAC channel C
    pub const DAC_C: Self = Self(0b010);
    /// DAC channel D
    pub const DAC_D: Self = Self(0b011);
    /// All DAC channels of the chip
    pub const ALL_CHANNELS: Self = Self(0b100);
    /// Only address of the power control register
    pub const POWER_CONTROL: Self = Self(0b000);
    /// Control register: no operation, used to clock out readback data
    pub const NOP: Self = Self(0b000);
    /// Control register: write the configuration bits
    pub const CONFIG: Self = Self(0b001);
    /// Control register: set all DAC registers to the clear code
    pub const CLEAR: Self = Self(0b100);
    /// Control register: update all outputs from their DAC registers
    pub const LOAD: Self = Self(0b101);

    /// Address from a raw value, only the low three bits are kept.
    pub const fn new(raw: u8) -> Self {
        Self(raw & 0b111)
    }

    /// Address of a single DAC channel.
    pub const fn channel(channel: crate::Channel) -> Self {
        Self(channel as u8)
    }

    /// Raw three bit value.
    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// A single command word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Datagram {
    /// Read/write flag
    pub direction: Direction,
    /// Target register
    pub register: Register,
    /// Channel or function address
    pub address: Address,
    /// Register data, ignored by the device for reads
    pub payload: u16,
}

impl Datagram {
    /// Control register no-operation.
    pub const NOP: Self = Self::write(Register::Control, Address::NOP, 0);

    /// Write `payload` to `register`.
    pub const fn write(register: Register, address: Address, payload: u16) -> Self {
        Self {
            direction: Direction::Write,
            register,
            address,
            payload,
        }
    }

    /// Read request for `register`, the contents arrive during the next frame.
    pub const fn read(register: Register, address: Address) -> Self {
        Self {
            direction: Direction::Read,
            register,
            address,
            payload: 0,
        }
    }

    /// The packed command word.
    pub fn word(&self) -> u32 {
        Word::new()
            .with_rw(self.direction == Direction::Read)
            .with_reg(self.register as u8)
            .with_addr(self.address.bits())
            .with_data(self.payload)
            .into()
    }

    /// Bytes in the order they are shifted out.
    pub fn encode(&self) -> [u8; DATAGRAM_SIZE] {
        let [_, high, mid, low] = self.word().to_be_bytes();
        [high, mid, low]
    }

    /// Inverse of [`Datagram::encode`].
    pub fn decode(bytes: [u8; DATAGRAM_SIZE]) -> Result<Self, DecodeError> {
        let word = Word::from(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]));
        Ok(Self {
            direction: if word.rw() {
                Direction::Read
            } else {
                Direction::Write
            },
            register: Register::try_from(word.reg())?,
            address: Address::new(word.addr()),
            payload: word.data(),
        })
    }
}

/// Payload of a received datagram, whatever its header says.
pub fn payload(bytes: &[u8; DATAGRAM_SIZE]) -> u16 {
    u16::from_be_bytes([bytes[1], bytes[2]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_positions() {
        let dg = |direction, register, address, payload| Datagram {
            direction,
            register,
            address,
            payload,
        };
        assert_eq!(
            dg(Direction::Read, Register::DacValue, Address::DAC_A, 0).word(),
            1 << 23
        );
        assert_eq!(
            dg(Direction::Write, Register::Control, Address::DAC_A, 0).word(),
            0b011 << 19
        );
        assert_eq!(
            dg(Direction::Write, Register::DacValue, Address::LOAD, 0).word(),
            0b101 << 16
        );
        assert_eq!(
            dg(Direction::Write, Register::DacValue, Address::DAC_A, 0xFFFF).word(),
            0xFFFF
        );
        // Bit 22 and the top byte are never set.
        assert_eq!(
            dg(Direction::Read, Register::Control, Address::new(0xFF), 0xFFFF).word(),
            0x009F_FFFF
        );
    }

    #[test]
    fn encode_is_msb_first() {
        assert_eq!(Datagram::NOP.encode(), [0x18, 0x00, 0x00]);
        assert_eq!(
            Datagram::write(Register::PowerControl, Address::POWER_CONTROL, 0x001F).encode(),
            [0x10, 0x00, 0x1F]
        );
        assert_eq!(
            Datagram::read(Register::PowerControl, Address::POWER_CONTROL).encode(),
            [0x90, 0x00, 0x00]
        );
        assert_eq!(
            Datagram::write(Register::DacValue, Address::DAC_B, 0xF00F).encode(),
            [0x01, 0xF0, 0x0F]
        );
    }

    #[test]
    fn decode_inverts_encode() {
        let registers = [
            Register::DacValue,
            Register::OutputRange,
            Register::PowerControl,
            Register::Control,
        ];
        for direction in [Direction::Write, Direction::Read] {
            for register in registers {
                for address in 0..8 {
                    for payload in [0x0000, 0x0001, 0x1234, 0x8000, 0xFFFF] {
                        let dg = Datagram {
                            direction,
                            register,
                            address: Address::new(address),
                            payload,
                        };
                        assert_eq!(Datagram::decode(dg.encode()), Ok(dg));
                    }
                }
            }
        }
    }

    #[test]
    fn unknown_register_is_rejected() {
        assert_eq!(
            Datagram::decode([0x20, 0x00, 0x00]),
            Err(DecodeError::UnknownRegister(0b100))
        );
        assert_eq!(payload(&[0x20, 0xAB, 0xCD]), 0xABCD);
    }
}
