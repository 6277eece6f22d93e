#![no_std]
#![no_main]

use defmt::*;
use defmt_rtt as _;
use embassy_stm32::time::Hertz;
use embassy_time::{Duration, Instant};
use feed_board::board;
use feed_board::board_config::plan::GpioPlan;
use feed_board::clocks::CLOCKS;
use feed_board::hal::PacGpio;
#[cfg(not(feature = "debug"))]
use panic_reset as _;
#[cfg(feature = "debug")]
use panic_probe as _;
use portable_atomic::AtomicUsize;

static CNT: AtomicUsize = AtomicUsize::new(0);

defmt::timestamp! {"{}", CNT.fetch_add(1, portable_atomic::Ordering::Relaxed) }

//  _______________________________
// /\                              \
// \_| PINS                        |
//   | ----                        |
//   | PB6: I2C1 SCL               |
//   | PB9: I2C1 SDA               |
//   | PA5: SPI1 SCK               |
//   | PA6: SPI1 MISO              |
//   | PA7: SPI1 MOSI              |
//   |   __________________________|_
//    \_/____________________________/

fn rcc_config() -> embassy_stm32::Config {
    use embassy_stm32::rcc::*;

    let mut config = embassy_stm32::Config::default();
    config.rcc.hse = Some(Hse {
        freq: Hertz(25_000_000),
        mode: HseMode::Oscillator,
    });
    config.rcc.pll_src = PllSource::HSE;
    config.rcc.pll = Some(Pll {
        prediv: PllPreDiv::DIV25,
        mul: PllMul::MUL336,
        divp: Some(PllPDiv::DIV4), // 84 MHz
        divq: Some(PllQDiv::DIV7), // 48 MHz
        divr: None,
    });
    config.rcc.ahb_pre = AHBPrescaler::DIV1;
    config.rcc.apb1_pre = APBPrescaler::DIV2;
    config.rcc.apb2_pre = APBPrescaler::DIV1;
    config.rcc.sys = Sysclk::PLL1_P;
    config
}

#[cortex_m_rt::entry]
fn main() -> ! {
    info!(
        "feed-board on {}, description version {:#x}",
        board::DEVICE.name,
        board::VERSION
    );

    let _p = embassy_stm32::init(rcc_config());

    // nothing else has touched the GPIO ports yet
    let mut gpio = unsafe { PacGpio::steal() };
    GpioPlan::for_board(&board::BOARD).apply(&mut gpio);

    for peripheral in board::BOARD.peripherals {
        info!(
            "{}: {} pins, mode {}",
            peripheral.instance,
            peripheral.pins.len(),
            peripheral.mode
        );
        if let Err(e) = CLOCKS.check(peripheral) {
            warn!("{}", e);
        }
    }

    loop {
        embassy_time::block_for(Duration::from_secs(1));
        debug!("up {}s", Instant::now().as_secs());
    }
}
