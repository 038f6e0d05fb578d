#![no_main]
#![no_std]

// Setting up entry vector/panic handler and logging
use cortex_m_rt::entry;
use defmt_rtt as _;
use panic_probe as _;
// Hal imports
use hal::prelude::*;
use hal::spi::{Mode, Spi};
use stm32f4xx_hal as hal;

use ad57x4r::{Ad57x4r, OutputRange, Resolution};

#[entry]
fn main() -> ! {
    // Take peripherals and set up the clocks.
    let p = hal::pac::Peripherals::take().unwrap();
    let pc = cortex_m::Peripherals::take().unwrap();
    let rcc = p.RCC.constrain();
    let ccdr = rcc.cfgr.freeze();
    // Create a SysTick based delay
    let mut delay = cortex_m::delay::Delay::new(pc.SYST, ccdr.sysclk().raw());
    // Setup the DAC's SPI bus
    let gpioc = p.GPIOC.split();
    let spi3_sclk = gpioc.pc10.into_alternate();
    let spi3_miso = gpioc.pc11.into_alternate();
    let spi3_mosi = gpioc.pc12.into_alternate();
    // Two AD5754R share ~SYNC, SDO of the first chip feeds SDIN of the second
    // and SDO of the second is read back on MISO.
    let gpioa = p.GPIOA.split();
    let sync = gpioa
        .pa15
        .into_push_pull_output_in_state(hal::gpio::PinState::High);
    let ldac = gpioa.pa8.into_push_pull_output();
    let clr = gpioa.pa9.into_push_pull_output();
    // SPI Instance initialization in MODE 2
    let spi3 = Spi::new(
        p.SPI3,
        (spi3_sclk, spi3_miso, spi3_mosi),
        Mode {
            phase: hal::spi::Phase::CaptureOnFirstTransition,
            polarity: hal::spi::Polarity::IdleHigh,
        },
        1.MHz(),
        &ccdr,
    );

    let mut dac = Ad57x4r::from_bus(spi3, sync)
        .with_load_pin(ldac)
        .unwrap()
        .with_clear_pin(clr)
        .unwrap();
    dac.configure(Resolution::Ad5754r, 2).unwrap();
    // Power up settles in 10us
    delay.delay_us(10);
    dac.set_output_range_all(OutputRange::Bipolar10V).unwrap();

    for chip in 0..dac.chip_count() {
        defmt::info!(
            "chip {}: reference {}, thermal shutdown {}",
            chip,
            dac.reference_powered_up(chip).unwrap(),
            dac.thermal_shutdown(chip).unwrap()
        );
    }

    let (min, max) = (dac.min_value(), dac.max_value());
    let mut val = min;
    loop {
        // Output a stepped voltage on every channel
        delay.delay_ms(250);
        for channel in 0..dac.channel_count() {
            dac.write_value(channel, val).unwrap();
            if dac.channel_over_current(channel).unwrap() {
                defmt::warn!("channel {} over current", channel);
            }
        }
        val = if val + 0x1000 > max { min } else { val + 0x1000 };
    }
}
