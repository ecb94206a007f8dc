// SPDX-License-Identifier: MIT
// © 2025–2026 Christopher Liu

//! Application frames exchanged on the fleet CAN bus.
//!
//! Every application frame starts with the sender's signature byte. Multi-byte values are
//! little-endian (low byte first).

use bxcan::{Frame, Id, StandardId};

use crate::acquisition::Averages;
use crate::state::{AppState, ErrorFlags};

// Node signatures
pub const SIGNATURE_MDE22: u8 = 210;
pub const SIGNATURE_MIC19: u8 = 250;

/// Signature stamped on every frame this node sends.
pub const SIGNATURE_SELF: u8 = SIGNATURE_MDE22;
/// Only frames carrying this signature are dispatched.
pub const SIGNATURE_PEER: u8 = SIGNATURE_MIC19;

// Message IDs
pub const MSG_MIC19_STATE_ID: u16 = 32;
pub const MSG_MDE22_STATE_ID: u16 = 40;
pub const MSG_MDE22_MEASUREMENTS_ID: u16 = 41;

// Generic state layout, shared by every node's state frame
pub const SIGNATURE_BYTE: usize = 0;
pub const STATE_BYTE: usize = 1;
pub const ERROR_BYTE: usize = 2;

pub const MDE22_STATE_LENGTH: usize = 3;

// Measurements layout
pub const BATVOLTAGE_L_BYTE: usize = 1;
pub const BATVOLTAGE_H_BYTE: usize = 2;
pub const POSITION_L_BYTE: usize = 3;
pub const POSITION_H_BYTE: usize = 4;
pub const BATCURRENT_L_BYTE: usize = 5;
pub const BATCURRENT_H_BYTE: usize = 6;

pub const MDE22_MEASUREMENTS_LENGTH: usize = 7;

const fn std_id(raw: u16) -> StandardId {
    match StandardId::new(raw) {
        Some(id) => id,
        None => panic!("CAN identifier does not fit in 11 bits"),
    }
}

pub const MDE22_STATE_ID: StandardId = std_id(MSG_MDE22_STATE_ID);
pub const MDE22_MEASUREMENTS_ID: StandardId = std_id(MSG_MDE22_MEASUREMENTS_ID);
pub const MIC19_STATE_ID: StandardId = std_id(MSG_MIC19_STATE_ID);

/// Why a received frame could not be interpreted.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Remote transmission request, carries no payload.
    Remote,
    /// Data frame with zero length.
    Empty,
    /// Signature byte belongs to another node.
    WrongSignature(u8),
    /// Payload shorter than the message layout requires.
    TooShort(usize),
}

/// Payload of a data frame.
fn payload(frame: &Frame) -> Result<&[u8], FrameError> {
    let data: &[u8] = frame.data().ok_or(FrameError::Remote)?;
    if data.is_empty() {
        return Err(FrameError::Empty);
    }
    Ok(data)
}

/// Signature byte of an application frame.
pub fn signature(frame: &Frame) -> Result<u8, FrameError> {
    Ok(payload(frame)?[SIGNATURE_BYTE])
}

/// Raw 11-bit identifier, `None` for extended frames.
pub fn standard_id(frame: &Frame) -> Option<u16> {
    match frame.id() {
        Id::Standard(id) => Some(id.as_raw()),
        Id::Extended(_) => None,
    }
}

/// State frame: `[signature, state, error flags]`.
pub fn state_frame(state: AppState, flags: ErrorFlags) -> Frame {
    let mut data = [0u8; MDE22_STATE_LENGTH];
    data[SIGNATURE_BYTE] = SIGNATURE_SELF;
    data[STATE_BYTE] = state.as_u8();
    data[ERROR_BYTE] = flags.bits();

    Frame::new_data(MDE22_STATE_ID, data)
}

/// Measurements frame: signature followed by voltage, position and current averages.
pub fn measurements_frame(averages: &Averages) -> Frame {
    let [v_lo, v_hi] = averages.battery_voltage.to_le_bytes();
    let [p_lo, p_hi] = averages.position.to_le_bytes();
    let [i_lo, i_hi] = averages.battery_current.to_le_bytes();

    let mut data = [0u8; MDE22_MEASUREMENTS_LENGTH];
    data[SIGNATURE_BYTE] = SIGNATURE_SELF;
    data[BATVOLTAGE_L_BYTE] = v_lo;
    data[BATVOLTAGE_H_BYTE] = v_hi;
    data[POSITION_L_BYTE] = p_lo;
    data[POSITION_H_BYTE] = p_hi;
    data[BATCURRENT_L_BYTE] = i_lo;
    data[BATCURRENT_H_BYTE] = i_hi;

    Frame::new_data(MDE22_MEASUREMENTS_ID, data)
}

/// Peer controller state as carried in its state frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PeerState {
    pub state: u8,
    pub error_flags: u8,
}

impl PeerState {
    pub fn parse(frame: &Frame) -> Result<Self, FrameError> {
        let data = payload(frame)?;

        let sig = data[SIGNATURE_BYTE];
        if sig != SIGNATURE_PEER {
            return Err(FrameError::WrongSignature(sig));
        }
        if data.len() <= ERROR_BYTE {
            return Err(FrameError::TooShort(data.len()));
        }

        Ok(Self {
            state: data[STATE_BYTE],
            error_flags: data[ERROR_BYTE],
        })
    }

    #[inline]
    pub fn has_error(&self) -> bool {
        self.error_flags != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bxcan::ExtendedId;

    fn peer_frame(data: &[u8]) -> Frame {
        Frame::new_data(MIC19_STATE_ID, bxcan::Data::new(data).unwrap())
    }

    #[test]
    fn state_frame_layout() {
        let frame = state_frame(AppState::Running, ErrorFlags::NO_CANBUS);
        assert_eq!(standard_id(&frame), Some(MSG_MDE22_STATE_ID));
        assert!(!frame.is_remote_frame());
        assert_eq!(frame.dlc(), 3);
        assert_eq!(&frame.data().unwrap()[..], &[SIGNATURE_SELF, 0x02, 0x01]);
    }

    #[test]
    fn measurements_frame_layout() {
        let averages = Averages {
            battery_voltage: 300,
            position: 512,
            battery_current: 10,
        };
        let frame = measurements_frame(&averages);
        assert_eq!(standard_id(&frame), Some(MSG_MDE22_MEASUREMENTS_ID));
        assert_eq!(frame.dlc(), 7);
        assert_eq!(
            &frame.data().unwrap()[..],
            &[SIGNATURE_SELF, 0x2C, 0x01, 0x00, 0x02, 0x0A, 0x00]
        );
    }

    #[test]
    fn parses_peer_state() {
        let frame = peer_frame(&[SIGNATURE_MIC19, 2, 0x08]);
        let peer = PeerState::parse(&frame).unwrap();
        assert_eq!(
            peer,
            PeerState {
                state: 2,
                error_flags: 0x08,
            }
        );
        assert!(peer.has_error());
    }

    #[test]
    fn rejects_foreign_signature() {
        let frame = peer_frame(&[SIGNATURE_MDE22, 2, 0x08]);
        assert_eq!(
            PeerState::parse(&frame),
            Err(FrameError::WrongSignature(SIGNATURE_MDE22))
        );
    }

    #[test]
    fn rejects_short_and_empty_frames() {
        let short = peer_frame(&[SIGNATURE_MIC19, 1]);
        assert_eq!(PeerState::parse(&short), Err(FrameError::TooShort(2)));

        let empty = peer_frame(&[]);
        assert_eq!(signature(&empty), Err(FrameError::Empty));

        let remote = Frame::new_remote(MIC19_STATE_ID, 3);
        assert_eq!(signature(&remote), Err(FrameError::Remote));
    }

    #[test]
    fn extended_ids_have_no_standard_id() {
        let id = ExtendedId::new(MSG_MIC19_STATE_ID as u32).unwrap();
        let frame = Frame::new_data(id, [SIGNATURE_MIC19]);
        assert_eq!(standard_id(&frame), None);
        assert_eq!(signature(&frame), Ok(SIGNATURE_MIC19));
    }
}
