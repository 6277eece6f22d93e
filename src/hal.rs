//! GPIO register access through the embassy-stm32 PAC.

use board_config::pin::Port;
use board_config::plan::{Field, GpioBank, Register};
use embassy_stm32::pac;
use embassy_stm32::pac::gpio::Gpio;

// Ports every supported part has. The device profiles bond nothing else.
fn regs(port: Port) -> Option<Gpio> {
    match port {
        Port::A => Some(pac::GPIOA),
        Port::B => Some(pac::GPIOB),
        Port::C => Some(pac::GPIOC),
        Port::D => Some(pac::GPIOD),
        Port::E => Some(pac::GPIOE),
        Port::H => Some(pac::GPIOH),
        _ => None,
    }
}

/// Writes straight to the GPIO registers. The port clocks have to be
/// running already, which `embassy_stm32::init` sees to.
pub struct PacGpio {
    _private: (),
}

impl PacGpio {
    /// # Safety
    ///
    /// Whatever plan this gets applied with must only touch pins nothing else
    /// is driving.
    pub unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

impl GpioBank for PacGpio {
    fn modify(&mut self, port: Port, register: Register, field: Field) {
        let Some(gpio) = regs(port) else {
            defmt::warn!("no {} on this part, skipping {}", port, register);
            return;
        };
        match register {
            Register::Moder => gpio.moder().modify(|w| w.0 = field.apply(w.0)),
            Register::Otyper => gpio.otyper().modify(|w| w.0 = field.apply(w.0)),
            Register::Ospeedr => gpio.ospeedr().modify(|w| w.0 = field.apply(w.0)),
            Register::Pupdr => gpio.pupdr().modify(|w| w.0 = field.apply(w.0)),
            Register::Afrl => gpio.afr(0).modify(|w| w.0 = field.apply(w.0)),
            Register::Afrh => gpio.afr(1).modify(|w| w.0 = field.apply(w.0)),
        }
    }
}
