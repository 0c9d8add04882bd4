//! Wire constants for the PL81-Pro serial protocol.
//!
//! Decoded from the vendor application binary and confirmed against
//! captured traffic. Only the CCT/power subset is stable; the panel is
//! bi-color (CCT-only), so there are no RGB/HSI tags here.

// ============================================================================
// Device Identification
// ============================================================================

/// WCH vendor ID of the panel's CH340 USB-serial bridge.
pub const WCH_VENDOR_ID: u16 = 0x1A86;
/// CH340 product ID.
pub const CH340_PRODUCT_ID: u16 = 0x7523;

/// Serial settings the vendor app uses: 115200, 8 data bits, no parity,
/// 1 stop bit.
pub const DEFAULT_BAUD: u32 = 115_200;

// ============================================================================
// Frame Layout
// ============================================================================

/// Marker byte opening every frame in this device family.
pub const FRAME_PREFIX: u8 = 0x3A;

/// Tag for CCT set (host → panel) and status reports (panel → host).
pub const TAG_CCT: u8 = 0x02;
/// Tag for power on/off.
pub const TAG_POWER: u8 = 0x06;

/// First payload byte of a CCT command: fixed mode selector.
pub const MODE_CCT: u8 = 0x01;
/// Power payload: turn the panel on.
pub const POWER_ON: u8 = 0x01;
/// Power payload: turn the panel off.
pub const POWER_OFF: u8 = 0x02;

/// Status frames from the panel are always 8 bytes:
/// `3A 02 03 <mode> <brightness> <temp> 00 <sum>`.
pub const STATUS_FRAME_LEN: usize = 8;

/// Brightness is a percentage.
pub const MAX_BRIGHTNESS: u8 = 100;

// ============================================================================
// Temperature Mapping
// ============================================================================

/// Warm end of the panel's CCT range.
pub const TEMP_MIN_K: u16 = 2900;
/// Cool end. The panel clamps codes above [`TEMP_MAX_CODE`] here.
pub const TEMP_MAX_K: u16 = 7000;
/// 19 codes, `0x00..=0x12`, spread linearly across the range.
pub const TEMP_STEPS: u8 = 18;
/// Highest meaningful temperature code.
pub const TEMP_MAX_CODE: u8 = 0x12;
/// Midpoint the vendor app uses when no temperature is given.
pub const DEFAULT_TEMP_K: u16 = 4950;

// ============================================================================
// Relay Sizing
// ============================================================================

/// Largest chunk the relay reads from either endpoint in one pass.
pub const READ_CHUNK_SIZE: usize = 4096;
