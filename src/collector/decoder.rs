//! Raw-input packet decoding.
//!
//! A raw-input notification only carries an opaque handle. The packet behind
//! it is fetched with a two-step query (size, then fill) and decoded from
//! explicit `RAWINPUT` byte layouts into an [`InputSample`].

use crate::collector::types::{InputSample, KeyboardSample, PointerSample};
use crate::platform::RawInputHandle;
use std::fmt;
use thiserror::Error;

/// `RAWINPUTHEADER.dwType` for mouse packets.
pub const RIM_TYPEMOUSE: u32 = 0;
/// `RAWINPUTHEADER.dwType` for keyboard packets.
pub const RIM_TYPEKEYBOARD: u32 = 1;
/// `RAWINPUTHEADER.dwType` for other HID packets.
pub const RIM_TYPEHID: u32 = 2;

/// `RAWKEYBOARD.Flags` bit set on key release.
const RI_KEY_BREAK: u16 = 0x01;

/// Size of `RAWKEYBOARD`.
pub const RAW_KEYBOARD_SIZE: usize = 16;
/// Size of `RAWMOUSE` (the button union is 4-byte aligned).
pub const RAW_MOUSE_SIZE: usize = 24;

/// OS error code reported by a failed query (`GetLastError`).
pub type OsErrorCode = u32;

/// The two-step raw-input query offered by the platform.
pub trait RawInputQuery {
    /// Number of bytes needed to hold the packet.
    fn required_size(&self, handle: RawInputHandle) -> Result<usize, OsErrorCode>;

    /// Copy the packet into `buffer`, returning the number of bytes written.
    fn fill(&self, handle: RawInputHandle, buffer: &mut [u8]) -> Result<usize, OsErrorCode>;
}

/// Which half of the two-step query failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    Size,
    Fill,
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryStage::Size => write!(f, "size"),
            QueryStage::Fill => write!(f, "fill"),
        }
    }
}

/// Errors that can occur while decoding a raw-input packet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("raw input {stage} query failed (os error {os_error})")]
    Query {
        stage: QueryStage,
        os_error: OsErrorCode,
    },

    #[error("raw input packet truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("unsupported raw input device type {0}")]
    UnsupportedDevice(u32),
}

/// Byte layout of `RAWINPUT`, parameterized by pointer width.
///
/// `RAWINPUTHEADER` is `{dwType: u32, dwSize: u32, hDevice: HANDLE, wParam: WPARAM}`
/// so its size depends on whether handles are 4 or 8 bytes wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInputLayout {
    pub handle_size: usize,
}

impl RawInputLayout {
    /// Layout of the running process.
    pub const NATIVE: RawInputLayout = RawInputLayout {
        handle_size: std::mem::size_of::<usize>(),
    };

    pub const fn header_size(&self) -> usize {
        8 + 2 * self.handle_size
    }

    pub const fn keyboard_packet_size(&self) -> usize {
        self.header_size() + RAW_KEYBOARD_SIZE
    }

    pub const fn mouse_packet_size(&self) -> usize {
        self.header_size() + RAW_MOUSE_SIZE
    }
}

/// Decodes raw-input handles into typed samples.
#[derive(Debug, Clone, Copy)]
pub struct RawInputDecoder {
    layout: RawInputLayout,
}

impl Default for RawInputDecoder {
    fn default() -> Self {
        Self::new(RawInputLayout::NATIVE)
    }
}

impl RawInputDecoder {
    pub fn new(layout: RawInputLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> RawInputLayout {
        self.layout
    }

    /// Fetch and decode the packet behind `handle`.
    ///
    /// `message_time` is the 32-bit time of the notification that delivered
    /// the handle; it becomes the keyboard sample timestamp.
    pub fn decode(
        &self,
        query: &dyn RawInputQuery,
        handle: RawInputHandle,
        message_time: u32,
    ) -> Result<InputSample, DecodeError> {
        let bytes = read_packet(query, handle)?;
        self.parse(&bytes, message_time)
    }

    /// Decode a packet that has already been copied out of the OS.
    pub fn parse(&self, bytes: &[u8], message_time: u32) -> Result<InputSample, DecodeError> {
        let header_size = self.layout.header_size();
        require(bytes, header_size)?;

        let device_type = read_u32(bytes, 0);
        let device = read_handle(bytes, 8, self.layout.handle_size);
        let device_is_synthetic = device == 0;
        let body = &bytes[header_size..];

        match device_type {
            RIM_TYPEKEYBOARD => {
                require(body, RAW_KEYBOARD_SIZE).map_err(|_| self.truncated(bytes, true))?;
                let flags = read_u16(body, 2);
                Ok(InputSample::Keyboard(KeyboardSample {
                    virtual_key: read_u16(body, 6),
                    is_key_up: flags & RI_KEY_BREAK != 0,
                    device_is_synthetic,
                    timestamp: message_time,
                }))
            }
            RIM_TYPEMOUSE => {
                require(body, RAW_MOUSE_SIZE).map_err(|_| self.truncated(bytes, false))?;
                Ok(InputSample::Pointer(PointerSample {
                    button_flags: read_u16(body, 4),
                    // usButtonData is declared unsigned but holds a signed wheel delta.
                    wheel_delta: read_u16(body, 6) as i16,
                    delta_x: read_u32(body, 12) as i32,
                    delta_y: read_u32(body, 16) as i32,
                    device_is_synthetic,
                }))
            }
            other => Err(DecodeError::UnsupportedDevice(other)),
        }
    }

    fn truncated(&self, bytes: &[u8], keyboard: bool) -> DecodeError {
        let expected = if keyboard {
            self.layout.keyboard_packet_size()
        } else {
            self.layout.mouse_packet_size()
        };
        DecodeError::Truncated {
            expected,
            actual: bytes.len(),
        }
    }
}

/// Two-step read: ask for the size, then fill a buffer of exactly that size.
pub fn read_packet(
    query: &dyn RawInputQuery,
    handle: RawInputHandle,
) -> Result<Vec<u8>, DecodeError> {
    let size = query
        .required_size(handle)
        .map_err(|os_error| DecodeError::Query {
            stage: QueryStage::Size,
            os_error,
        })?;

    let mut buffer = vec![0u8; size];
    let written = query
        .fill(handle, &mut buffer)
        .map_err(|os_error| DecodeError::Query {
            stage: QueryStage::Fill,
            os_error,
        })?;

    if written < size {
        return Err(DecodeError::Truncated {
            expected: size,
            actual: written,
        });
    }
    Ok(buffer)
}

fn require(bytes: &[u8], len: usize) -> Result<(), DecodeError> {
    if bytes.len() < len {
        return Err(DecodeError::Truncated {
            expected: len,
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

fn read_handle(bytes: &[u8], offset: usize, size: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw[..size].copy_from_slice(&bytes[offset..offset + size]);
    u64::from_le_bytes(raw)
}
