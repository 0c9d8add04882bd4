//! CCT temperature mapping and the stable command subset.
//!
//! The panel exposes one bi-color axis: a temperature code `0x00..=0x12`
//! spread linearly across 2900 K–7000 K. Brightness rides along in the same
//! CCT frame as a percentage.

use super::constants::{
    FRAME_PREFIX, MAX_BRIGHTNESS, MODE_CCT, POWER_OFF, POWER_ON, STATUS_FRAME_LEN, TAG_CCT,
    TAG_POWER, TEMP_MAX_K, TEMP_MIN_K, TEMP_STEPS,
};
use super::frame::{ChecksumWidth, Frame, FrameError, with_checksum};

/// Map a Kelvin value onto the panel's temperature code, clamping
/// out-of-range inputs to the nearest boundary.
pub fn kelvin_to_byte(kelvin: u16) -> u8 {
    let kelvin = kelvin.clamp(TEMP_MIN_K, TEMP_MAX_K);
    let span = (TEMP_MAX_K - TEMP_MIN_K) as f32;
    (((kelvin - TEMP_MIN_K) as f32) * TEMP_STEPS as f32 / span).round() as u8
}

/// Map a temperature code back to Kelvin. Codes above the top step clamp to
/// the cool end, matching what the panel itself does.
pub fn byte_to_kelvin(code: u8) -> u16 {
    let code = code.min(TEMP_STEPS);
    let span = (TEMP_MAX_K - TEMP_MIN_K) as f32;
    (TEMP_MIN_K as f32 + code as f32 * span / TEMP_STEPS as f32).round() as u16
}

/// Build a CCT command: mode selector, brightness percent, temperature code.
/// Commands to the panel carry the 16-bit big-endian sum.
pub fn set_cct_frame(brightness: u8, temp_code: u8) -> Vec<u8> {
    let brightness = brightness.min(MAX_BRIGHTNESS);
    with_checksum(
        &[FRAME_PREFIX, TAG_CCT, 3, MODE_CCT, brightness, temp_code],
        ChecksumWidth::WideBigEndian,
    )
}

/// Build a bare power command.
pub fn power_frame(on: bool) -> Vec<u8> {
    let state = if on { POWER_ON } else { POWER_OFF };
    with_checksum(
        &[FRAME_PREFIX, TAG_POWER, 1, state],
        ChecksumWidth::WideBigEndian,
    )
}

/// Parsed 8-byte status report from the panel.
///
/// The panel seals status frames with the single-byte sum even though
/// commands to it carry the 16-bit variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub mode: u8,
    pub brightness: u8,
    pub temp_code: u8,
    pub kelvin: u16,
    pub checksum_valid: bool,
}

impl StatusReport {
    /// Parse the fixed `3A 02 03 <mode> <brightness> <temp> 00 <sum>` layout.
    pub fn parse(raw: &[u8]) -> Result<StatusReport, FrameError> {
        if raw.len() < STATUS_FRAME_LEN {
            return Err(FrameError::TooShort {
                min: STATUS_FRAME_LEN,
                actual: raw.len(),
            });
        }
        let frame = Frame::decode(&raw[..STATUS_FRAME_LEN], ChecksumWidth::Single)?;
        if frame.prefix != FRAME_PREFIX {
            return Err(FrameError::BadPrefix {
                expected: FRAME_PREFIX,
                actual: frame.prefix,
            });
        }
        if frame.tag != TAG_CCT {
            return Err(FrameError::UnexpectedTag {
                expected: TAG_CCT,
                actual: frame.tag,
            });
        }
        Ok(StatusReport {
            mode: frame.payload[0],
            brightness: frame.payload[1],
            temp_code: frame.payload[2],
            kelvin: byte_to_kelvin(frame.payload[2]),
            checksum_valid: frame.checksum_valid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::TEMP_MAX_CODE;

    #[test]
    fn test_kelvin_endpoints_and_clamping() {
        assert_eq!(kelvin_to_byte(2900), 0x00);
        assert_eq!(kelvin_to_byte(7000), TEMP_MAX_CODE);
        assert_eq!(kelvin_to_byte(4950), 0x09);
        // Out-of-range Kelvin clamps to the nearest boundary.
        assert_eq!(kelvin_to_byte(1000), 0x00);
        assert_eq!(kelvin_to_byte(9999), TEMP_MAX_CODE);

        assert_eq!(byte_to_kelvin(0x00), 2900);
        assert_eq!(byte_to_kelvin(TEMP_MAX_CODE), 7000);
        assert_eq!(byte_to_kelvin(0x09), 4950);
        // Codes past the top step clamp at the cool end.
        assert_eq!(byte_to_kelvin(0x30), 7000);
    }

    #[test]
    fn test_kelvin_roundtrip_within_one_step() {
        // One step is 4100/18 ≈ 228 K; rounding can be off by half of that.
        let half_step = (TEMP_MAX_K - TEMP_MIN_K) / (2 * TEMP_STEPS as u16) + 1;
        for kelvin in (TEMP_MIN_K..=TEMP_MAX_K).step_by(37) {
            let back = byte_to_kelvin(kelvin_to_byte(kelvin));
            assert!(
                back.abs_diff(kelvin) <= half_step,
                "{kelvin}K came back as {back}K"
            );
        }
    }

    #[test]
    fn test_cct_command_bytes() {
        assert_eq!(
            set_cct_frame(100, 0x09),
            vec![0x3A, 0x02, 0x03, 0x01, 0x64, 0x09, 0x00, 0xE3]
        );
        // Brightness clamps to 100%.
        assert_eq!(set_cct_frame(250, 0x09)[4], 100);
    }

    #[test]
    fn test_power_command_bytes() {
        assert_eq!(power_frame(true), vec![0x3A, 0x06, 0x01, 0x01, 0x00, 0x42]);
        assert_eq!(power_frame(false), vec![0x3A, 0x06, 0x01, 0x02, 0x00, 0x43]);
    }

    #[test]
    fn test_status_parse() {
        let raw = with_checksum(
            &[0x3A, 0x02, 0x03, 0x01, 0x32, 0x12, 0x00],
            ChecksumWidth::Single,
        );
        let status = StatusReport::parse(&raw).unwrap();
        assert_eq!(status.mode, 0x01);
        assert_eq!(status.brightness, 50);
        assert_eq!(status.temp_code, 0x12);
        assert_eq!(status.kelvin, 7000);
        assert!(status.checksum_valid);
    }

    #[test]
    fn test_status_parse_rejects_wrong_shape() {
        assert!(matches!(
            StatusReport::parse(&[0x3A, 0x02, 0x03]),
            Err(FrameError::TooShort { .. })
        ));
        let wrong_tag = with_checksum(
            &[0x3A, 0x06, 0x03, 0x01, 0x32, 0x12, 0x00],
            ChecksumWidth::Single,
        );
        assert!(matches!(
            StatusReport::parse(&wrong_tag),
            Err(FrameError::UnexpectedTag { .. })
        ));
        let wrong_prefix = with_checksum(
            &[0x78, 0x02, 0x03, 0x01, 0x32, 0x12, 0x00],
            ChecksumWidth::Single,
        );
        assert!(matches!(
            StatusReport::parse(&wrong_prefix),
            Err(FrameError::BadPrefix { .. })
        ));
    }

    #[test]
    fn test_status_parse_surfaces_bad_checksum() {
        let mut raw = with_checksum(
            &[0x3A, 0x02, 0x03, 0x01, 0x32, 0x12, 0x00],
            ChecksumWidth::Single,
        );
        raw[7] ^= 0xFF;
        let status = StatusReport::parse(&raw).unwrap();
        assert!(!status.checksum_valid);
        assert_eq!(status.brightness, 50);
    }
}
