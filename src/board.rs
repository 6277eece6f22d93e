//! The board, as described by `board/MX_Device.h` (or whatever
//! `FEED_BOARD_DESCRIPTION` pointed at when this was built).
//!
//! One `PinConfig` constant per pin (`I2C1_SCL`), one `PeripheralConfig`
//! per peripheral instance (`SPI1`), and the whole thing as [`BOARD`].

include!(concat!(env!("OUT_DIR"), "/board.rs"));
