//! Power control and control register contents
use bitfield_struct::bitfield;

use crate::Channel;

/// Definition of the power control register.
///
/// The power-up bits are read/write, the thermal shutdown and overcurrent
/// alert bits are read only.
#[bitfield(u16)]
pub struct PowerStatus {
    /// Channel A powered up
    pub pu_a: bool,
    /// Channel B powered up
    pub pu_b: bool,
    /// Channel C powered up
    pub pu_c: bool,
    /// Channel D powered up
    pub pu_d: bool,
    /// Internal reference powered up
    pub pu_ref: bool,
    /// Thermal shutdown alert
    pub tsd: bool,
    #[bits(1)]
    _unused: bool,
    /// Channel A overcurrent alert
    pub oc_a: bool,
    /// Channel B overcurrent alert
    pub oc_b: bool,
    /// Channel C overcurrent alert
    pub oc_c: bool,
    /// Channel D overcurrent alert
    pub oc_d: bool,
    #[bits(5)]
    _unused: u8,
}

impl PowerStatus {
    /// Mask of the bits that are written back to the device.
    pub const WRITABLE: u16 = 0b1_1111;

    /// All four channels and the internal reference powered up.
    pub fn all_up() -> Self {
        Self::new()
            .with_pu_a(true)
            .with_pu_b(true)
            .with_pu_c(true)
            .with_pu_d(true)
            .with_pu_ref(true)
    }

    /// Power-up bit of `channel`.
    pub fn powered_up(&self, channel: Channel) -> bool {
        match channel {
            Channel::A => self.pu_a(),
            Channel::B => self.pu_b(),
            Channel::C => self.pu_c(),
            Channel::D => self.pu_d(),
        }
    }

    /// Overcurrent alert bit of `channel`.
    pub fn over_current(&self, channel: Channel) -> bool {
        match channel {
            Channel::A => self.oc_a(),
            Channel::B => self.oc_b(),
            Channel::C => self.oc_c(),
            Channel::D => self.oc_d(),
        }
    }

    /// Copy with the power-up bit of `channel` changed.
    pub fn with_powered(self, channel: Channel, on: bool) -> Self {
        match channel {
            Channel::A => self.with_pu_a(on),
            Channel::B => self.with_pu_b(on),
            Channel::C => self.with_pu_c(on),
            Channel::D => self.with_pu_d(on),
        }
    }
}

/// Definition of the configuration in the Control Register
#[bitfield(u16)]
pub struct ControlConfig {
    /// Set by the user to disable the SDO output. Cleared by the user to
    /// enable the SDO output (default). A daisy chain needs SDO enabled.
    #[bits(default = false)]
    pub sdo_disable: bool,

    /// Sets the output voltage after a clear operation.
    /// | CLR_Select | Unipolar | Bipolar Operation   |
    /// |------------|----------|---------------------|
    /// | 0          | 0V       | 0V                  |
    /// | 1          | Midscale | Negative Full Scale |
    #[bits(default = false)]
    pub clr_select: bool,
    /// Set by the user to enable the current-limit clamp. The channel does not
    /// power down upon detection of an overcurrent; the current is clamped at
    /// 20 mA (default).
    #[bits(default = true)]
    pub clamp_enable: bool,
    /// Set by the user to enable the thermal shutdown feature. Cleared by the
    /// user to disable the thermal shutdown feature (default).
    #[bits(default = false)]
    pub tsd_enable: bool,
    /// Rest of the bits are unused during config operation
    #[bits(12)]
    _unused: u16,
}
