//! Board descriptions for STM32F4 boards, loaded from the `MX_Device.h`
//! parameter header STM32CubeMX generates.
//!
//! A description is [parsed](parse::BoardDescription::parse), [checked
//! against a device](validate::check) and turned into [register
//! writes](plan::GpioPlan) for whatever ends up initialising the pins.
//! Everything here is `no_std` and allocation free so the same code serves
//! a build script on the host and firmware on the target.

#![cfg_attr(not(test), no_std)]

// must go first so the other modules see its macros
mod fmt;

pub mod device;
pub mod parse;
pub mod peripheral;
pub mod pin;
pub mod plan;
pub mod validate;

pub use device::Device;
pub use parse::BoardDescription;
pub use peripheral::{Board, Instance, PeripheralConfig};
pub use pin::{PinConfig, PinId, Port};
