//! Protocol module - PL81-Pro wire format definitions.

pub mod cct;
pub mod constants;
pub mod frame;

pub use cct::{StatusReport, byte_to_kelvin, kelvin_to_byte, power_frame, set_cct_frame};
pub use constants::*;
pub use frame::{ChecksumWidth, Frame, FrameError, checksum, encode, with_checksum};
