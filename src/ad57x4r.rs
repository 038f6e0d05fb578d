//! Daisy chain controller
use embedded_hal::digital::{Error as _, OutputPin};
use embedded_hal::spi::{SpiBus, SpiDevice};
use embedded_hal_bus::spi::{ExclusiveDevice, NoDelay};

use crate::datagram::{self, Address, Datagram, Register, DATAGRAM_SIZE};
use crate::registers::{ControlConfig, PowerStatus};
use crate::{
    Ad57x4r, Chips, DeviceConfig, Error, NoPin, OutputRange, Polarity, Resolution, Target,
    CHIP_COUNT_MAX,
};

const FRAME_MAX: usize = DATAGRAM_SIZE * CHIP_COUNT_MAX as usize;

/// One datagram per chip, the datagram for the last chip of the chain first.
struct Frame {
    buf: [u8; FRAME_MAX],
    len: usize,
}

impl Frame {
    fn new(chip_count: u8, chips: Chips, dg: Datagram) -> Self {
        let mut buf = [0u8; FRAME_MAX];
        for chip in 0..chip_count {
            let slot = Self::slot(chip_count, chip);
            let dg = if chips.contains(chip) { dg } else { Datagram::NOP };
            buf[slot].copy_from_slice(&dg.encode());
        }
        Self {
            buf,
            len: chip_count as usize * DATAGRAM_SIZE,
        }
    }

    fn slot(chip_count: u8, chip: u8) -> core::ops::Range<usize> {
        let start = (chip_count - 1 - chip) as usize * DATAGRAM_SIZE;
        start..start + DATAGRAM_SIZE
    }

    fn bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl<DEV, E> Ad57x4r<DEV>
where
    DEV: SpiDevice<Error = E>,
{
    /// Create a driver for a single AD5754R, call [`Ad57x4r::configure`]
    /// before use.
    pub fn new(spi: DEV) -> Self {
        Self {
            spi,
            ldac: NoPin,
            clr: NoPin,
            cfg: DeviceConfig::default(),
        }
    }
}

impl<BUS, CS> Ad57x4r<ExclusiveDevice<BUS, CS, NoDelay>>
where
    BUS: SpiBus,
    CS: OutputPin,
{
    /// Create a driver that owns the whole bus, with `sync` as chip select.
    pub fn from_bus(bus: BUS, sync: CS) -> Self {
        Self {
            spi: ExclusiveDevice::new(bus, sync, NoDelay),
            ldac: NoPin,
            clr: NoPin,
            cfg: DeviceConfig::default(),
        }
    }
}

impl<DEV, LDAC, CLR, E> Ad57x4r<DEV, LDAC, CLR>
where
    DEV: SpiDevice<Error = E>,
    LDAC: OutputPin,
    CLR: OutputPin,
{
    /// Attach the ~LDAC pin. It is held low so every DAC register write
    /// updates its output on the rising edge of ~SYNC.
    pub fn with_load_pin<P: OutputPin>(
        self,
        mut ldac: P,
    ) -> Result<Ad57x4r<DEV, P, CLR>, Error<E>> {
        ldac.set_low().map_err(|e| Error::Pin(e.kind()))?;
        Ok(Ad57x4r {
            spi: self.spi,
            ldac,
            clr: self.clr,
            cfg: self.cfg,
        })
    }

    /// Attach the ~CLR pin. It is held high until [`Ad57x4r::pulse_clear`].
    pub fn with_clear_pin<P: OutputPin>(
        self,
        mut clr: P,
    ) -> Result<Ad57x4r<DEV, LDAC, P>, Error<E>> {
        clr.set_high().map_err(|e| Error::Pin(e.kind()))?;
        Ok(Ad57x4r {
            spi: self.spi,
            ldac: self.ldac,
            clr,
            cfg: self.cfg,
        })
    }

    /// Give back the SPI device and pins.
    pub fn release(self) -> (DEV, LDAC, CLR) {
        (self.spi, self.ldac, self.clr)
    }

    /// Set the chip variant and chain length, then power up all channels and
    /// the internal reference of every chip.
    ///
    /// A `chip_count` outside `1..=4` falls back to a single chip. The output
    /// polarity is reset to unipolar.
    pub fn configure(&mut self, resolution: Resolution, chip_count: u8) -> Result<(), Error<E>> {
        self.cfg = DeviceConfig::new(resolution, chip_count);
        #[cfg(feature = "defmt")]
        defmt::debug!("ad57x4r: configured {}", self.cfg);
        self.write(
            Chips::All,
            Datagram::write(
                Register::PowerControl,
                Address::POWER_CONTROL,
                PowerStatus::all_up().into(),
            ),
        )
    }

    /// Current configuration
    pub fn config(&self) -> &DeviceConfig {
        &self.cfg
    }

    /// Number of chips in the chain
    pub fn chip_count(&self) -> u8 {
        self.cfg.chip_count()
    }

    /// Number of addressable channels
    pub fn channel_count(&self) -> usize {
        self.cfg.channel_count()
    }

    /// Resolution variant
    pub fn resolution(&self) -> Resolution {
        self.cfg.resolution()
    }

    /// Polarity of the last selected output range
    pub fn polarity(&self) -> Polarity {
        self.cfg.polarity()
    }

    /// Lowest value for [`Ad57x4r::write_value`] in the current polarity
    pub fn min_value(&self) -> i32 {
        self.cfg.min_value()
    }

    /// Highest value for [`Ad57x4r::write_value`] in the current polarity
    pub fn max_value(&self) -> i32 {
        self.cfg.max_value()
    }

    /// Set the output range of one channel.
    ///
    /// The driver keeps a single polarity for the whole chain, so this also
    /// changes the bounds reported for every other channel.
    pub fn set_output_range(&mut self, channel: usize, range: OutputRange) -> Result<(), Error<E>> {
        let target = self.target(channel)?;
        self.set_output_range_to(target, range)
    }

    /// Set the output range of every channel of every chip
    pub fn set_output_range_all(&mut self, range: OutputRange) -> Result<(), Error<E>> {
        self.set_output_range_to(Target::All, range)
    }

    /// Set the output range of `target`
    pub fn set_output_range_to(
        &mut self,
        target: Target,
        range: OutputRange,
    ) -> Result<(), Error<E>> {
        self.check(target.chips())?;
        self.write(
            target.chips(),
            Datagram::write(Register::OutputRange, target.address(), range as u16),
        )?;
        self.cfg.set_polarity(range.polarity());
        Ok(())
    }

    /// Read back the output range of one channel
    pub fn output_range(&mut self, channel: usize) -> Result<OutputRange, Error<E>> {
        let (chip, channel) = self.locate(channel)?;
        let data = self.read_register(chip, Register::OutputRange, Address::channel(channel))?;
        Ok(OutputRange::from(data))
    }

    /// Write a native resolution value to one channel and load it.
    ///
    /// Bipolar values are given as signed numbers and sent in two's
    /// complement, which requires the BIN/~2sCOMP pin tied low. Values outside
    /// [`min_value`](Self::min_value)..=[`max_value`](Self::max_value) are
    /// truncated to the payload width.
    /// ```ignore
    /// dac.write_value(0, dac.max_value() / 2)?;
    /// ```
    pub fn write_value(&mut self, channel: usize, value: i32) -> Result<(), Error<E>> {
        let target = self.target(channel)?;
        self.write_value_to(target, value)
    }

    /// Write the same value to every channel of every chip and load it
    pub fn write_value_all(&mut self, value: i32) -> Result<(), Error<E>> {
        self.write_value_to(Target::All, value)
    }

    /// Write a native resolution value to `target` and load it
    pub fn write_value_to(&mut self, target: Target, value: i32) -> Result<(), Error<E>> {
        self.check(target.chips())?;
        let data = self.cfg.scale(value);
        self.write(
            target.chips(),
            Datagram::write(Register::DacValue, target.address(), data),
        )?;
        self.load(target.chips())
    }

    /// This function updates the DAC outputs from the DAC registers.
    pub fn load(&mut self, chips: Chips) -> Result<(), Error<E>> {
        self.control_function(chips, Address::LOAD)
    }

    /// This function sets the DAC registers to the clear code and updates the outputs.
    pub fn clear_outputs(&mut self, chips: Chips) -> Result<(), Error<E>> {
        self.control_function(chips, Address::CLEAR)
    }

    /// Clear all outputs through the ~CLR pin. Does nothing without one.
    pub fn pulse_clear(&mut self) -> Result<(), Error<E>> {
        self.clr.set_low().map_err(|e| Error::Pin(e.kind()))?;
        self.clr.set_high().map_err(|e| Error::Pin(e.kind()))
    }

    /// Set the device configuration
    pub fn set_control(&mut self, chips: Chips, cfg: ControlConfig) -> Result<(), Error<E>> {
        self.check(chips)?;
        self.write(
            chips,
            Datagram::write(Register::Control, Address::CONFIG, cfg.into()),
        )
    }

    /// Get the device configuration
    pub fn control(&mut self, chip: u8) -> Result<ControlConfig, Error<E>> {
        self.check(Chips::One(chip))?;
        let data = self.read_register(chip, Register::Control, Address::CONFIG)?;
        Ok(ControlConfig::from(data))
    }

    /// Power up or down a single channel
    /// After power up a timeout of 10us is required before loading the corresponding DAC register
    pub fn set_channel_power(&mut self, channel: usize, on: bool) -> Result<(), Error<E>> {
        let (chip, channel) = self.locate(channel)?;
        let status = self.power_status(chip)?.with_powered(channel, on);
        self.write(
            Chips::One(chip),
            Datagram::write(
                Register::PowerControl,
                Address::POWER_CONTROL,
                u16::from(status) & PowerStatus::WRITABLE,
            ),
        )
    }

    /// Read the power control register of one chip
    pub fn power_status(&mut self, chip: u8) -> Result<PowerStatus, Error<E>> {
        self.check(Chips::One(chip))?;
        let data = self.read_register(chip, Register::PowerControl, Address::POWER_CONTROL)?;
        Ok(PowerStatus::from(data))
    }

    /// `true` when the channel is powered up
    pub fn channel_powered_up(&mut self, channel: usize) -> Result<bool, Error<E>> {
        let (chip, channel) = self.locate(channel)?;
        Ok(self.power_status(chip)?.powered_up(channel))
    }

    /// `true` when the internal reference of the chip is powered up
    pub fn reference_powered_up(&mut self, chip: u8) -> Result<bool, Error<E>> {
        Ok(self.power_status(chip)?.pu_ref())
    }

    /// `true` when the chip has shut down on overtemperature
    pub fn thermal_shutdown(&mut self, chip: u8) -> Result<bool, Error<E>> {
        Ok(self.power_status(chip)?.tsd())
    }

    /// `true` when the channel has raised an overcurrent alert
    pub fn channel_over_current(&mut self, channel: usize) -> Result<bool, Error<E>> {
        let (chip, channel) = self.locate(channel)?;
        Ok(self.power_status(chip)?.over_current(channel))
    }

    fn target(&self, channel: usize) -> Result<Target, Error<E>> {
        self.cfg.target(channel).ok_or(Error::ChannelOutOfRange)
    }

    fn locate(&self, channel: usize) -> Result<(u8, crate::Channel), Error<E>> {
        match self.target(channel)? {
            Target::Single { chip, channel } => Ok((chip, channel)),
            Target::All => Err(Error::ChannelOutOfRange),
        }
    }

    fn check(&self, chips: Chips) -> Result<(), Error<E>> {
        match chips {
            Chips::One(chip) if !self.cfg.has_chip(chip) => Err(Error::ChipOutOfRange),
            _ => Ok(()),
        }
    }

    fn control_function(&mut self, chips: Chips, function: Address) -> Result<(), Error<E>> {
        self.check(chips)?;
        self.write(chips, Datagram::write(Register::Control, function, 0))
    }

    /// One ~SYNC framed transaction, NOPs for the chips not addressed.
    fn write(&mut self, chips: Chips, dg: Datagram) -> Result<(), Error<E>> {
        let frame = Frame::new(self.cfg.chip_count(), chips, dg);
        #[cfg(feature = "defmt")]
        defmt::trace!("ad57x4r: {} -> {}: {=[u8]:x}", dg, chips, frame.bytes());
        self.spi.write(frame.bytes()).map_err(Error::Spi)
    }

    /// Two phase register read.
    ///
    /// The device only shifts out register contents in the frame following
    /// the read request, so the request is written first and a NOP frame is
    /// then clocked through to capture the reply.
    fn read_register(
        &mut self,
        chip: u8,
        register: Register,
        address: Address,
    ) -> Result<u16, Error<E>> {
        self.write(Chips::One(chip), Datagram::read(register, address))?;

        let chip_count = self.cfg.chip_count();
        let nop = Frame::new(chip_count, Chips::All, Datagram::NOP);
        let mut rx = [0u8; FRAME_MAX];
        let rx = &mut rx[..nop.len];
        self.spi.transfer(rx, nop.bytes()).map_err(Error::Spi)?;

        let mut reply = [0u8; DATAGRAM_SIZE];
        reply.copy_from_slice(&rx[Frame::slot(chip_count, chip)]);
        #[cfg(feature = "defmt")]
        defmt::trace!("ad57x4r: chip {} {} <- {=[u8]:x}", chip, register, &reply[..]);
        Ok(datagram::payload(&reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::spi::{ErrorKind, ErrorType, Operation};

    /// Bus whose every transaction fails.
    struct DeadBus;

    impl ErrorType for DeadBus {
        type Error = ErrorKind;
    }

    impl SpiDevice for DeadBus {
        fn transaction(&mut self, _: &mut [Operation<'_, u8>]) -> Result<(), ErrorKind> {
            Err(ErrorKind::Other)
        }
    }

    #[test]
    fn failed_range_write_keeps_polarity() {
        let mut dac = Ad57x4r::new(DeadBus);
        assert!(matches!(
            dac.set_output_range_all(OutputRange::Bipolar10V),
            Err(Error::Spi(ErrorKind::Other))
        ));
        assert_eq!(dac.polarity(), Polarity::Unipolar);
        assert_eq!(dac.min_value(), 0);
    }

    #[test]
    fn frame_places_last_chip_first() {
        let dg = Datagram::write(Register::DacValue, Address::DAC_B, 0x1234);
        let frame = Frame::new(3, Chips::One(0), dg);
        assert_eq!(
            frame.bytes(),
            &[0x18, 0x00, 0x00, 0x18, 0x00, 0x00, 0x01, 0x12, 0x34]
        );
        let frame = Frame::new(2, Chips::One(1), dg);
        assert_eq!(frame.bytes(), &[0x01, 0x12, 0x34, 0x18, 0x00, 0x00]);
    }

    #[test]
    fn broadcast_frame_repeats_datagram() {
        let frame = Frame::new(4, Chips::All, Datagram::NOP);
        assert_eq!(frame.bytes().len(), 12);
        assert!(frame.bytes().chunks(3).all(|dg| dg == [0x18, 0x00, 0x00]));
    }
}
