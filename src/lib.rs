//! Board support for the feed USB audio board.
//!
//! The pin and peripheral table in [`board`] is generated at build time from
//! the CubeMX description in `board/MX_Device.h`.

#![no_std]

pub mod board;
pub mod clocks;
#[cfg(feature = "firmware")]
pub mod hal;

pub use board_config;
