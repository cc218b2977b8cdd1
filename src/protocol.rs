//! V5 controller wire protocol.
//!
//! Mode switches are fixed 14-byte command frames written over USB serial at
//! 115200 baud. The trailing two bytes are a CRC over the preceding twelve,
//! but the three frames never vary at runtime so they are kept as precomputed
//! constants rather than computed per write.

use crate::profile::MatchMode;

pub const FRAME_LEN: usize = 14;

/// USB vendor id the discovery filter matches on (0x2888, VEX Robotics).
pub const USB_VENDOR_ID: u16 = 10376;

pub const BAUD_RATE: u32 = 115200;

/// Reply length the device advertises for a mode-change command. The reply is
/// intentionally never read or validated; the physical controller depends on
/// the write being fire-and-forget.
pub const REPLY_LEN: usize = 65535;

const FRAME_AUTONOMOUS: [u8; FRAME_LEN] =
    [201, 54, 184, 71, 88, 193, 5, 10, 0, 0, 0, 0, 146, 124];
const FRAME_DRIVER: [u8; FRAME_LEN] = [201, 54, 184, 71, 88, 193, 5, 8, 0, 0, 0, 0, 214, 255];
const FRAME_DISABLED: [u8; FRAME_LEN] = [201, 54, 184, 71, 88, 193, 5, 11, 0, 0, 0, 0, 56, 45];

/// The command frame that puts a controller into `mode`.
pub fn mode_frame(mode: MatchMode) -> [u8; FRAME_LEN] {
    match mode {
        MatchMode::Autonomous => FRAME_AUTONOMOUS,
        MatchMode::Driver => FRAME_DRIVER,
        MatchMode::Disabled => FRAME_DISABLED,
    }
}
