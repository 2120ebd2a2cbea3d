// ── Outbound frames ──

use bytes::{BufMut, BytesMut};

use super::{Action, BUSINESS_COMMAND, FrameError, PROTOCOL_VERSION, varlen};

/// Bytes between the length prefix and the action payload:
/// flag (1) + command (2) + sequence (4) + action (1).
const HEADER_LEN: usize = 8;

/// A sub-device management request sent to a center-control device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Ask for the full sub-device list.
    GetSubDeviceList,
    /// Start an add. An empty `macs` list requests an unfiltered add.
    AddSubDevices { macs: Vec<String> },
    /// Delete one sub-device by its numeric wire handle.
    DeleteSubDevice { sub_did: u32 },
}

impl Request {
    pub fn action(&self) -> Action {
        match self {
            Self::GetSubDeviceList => Action::GetSubDeviceList,
            Self::AddSubDevices { .. } => Action::AddSubDevice,
            Self::DeleteSubDevice { .. } => Action::DeleteSubDevice,
        }
    }

    /// Encode the complete frame, version tag and length prefix included.
    pub fn encode(&self, sequence: u32) -> Result<Vec<u8>, FrameError> {
        let mut body = BytesMut::with_capacity(HEADER_LEN + 16);
        body.put_u8(0x00);
        body.put_u16(BUSINESS_COMMAND);
        body.put_u32(sequence);
        body.put_u8(self.action().code());
        self.put_payload(&mut body)?;

        let prefix = varlen::encode(body.len());
        let mut frame = Vec::with_capacity(PROTOCOL_VERSION.len() + prefix.len() + body.len());
        frame.extend_from_slice(&PROTOCOL_VERSION);
        frame.extend_from_slice(&prefix);
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    fn put_payload(&self, buf: &mut BytesMut) -> Result<(), FrameError> {
        match self {
            Self::GetSubDeviceList => {}
            Self::AddSubDevices { macs } => {
                let count = u16::try_from(macs.len()).map_err(|_| FrameError::FieldTooLong {
                    field: "sub-device count",
                    len: macs.len(),
                    max: usize::from(u16::MAX),
                })?;
                buf.put_u16(count);
                for mac in macs {
                    let len = u8::try_from(mac.len()).map_err(|_| FrameError::FieldTooLong {
                        field: "mac",
                        len: mac.len(),
                        max: usize::from(u8::MAX),
                    })?;
                    buf.put_u8(len);
                    buf.put_slice(mac.as_bytes());
                }
            }
            Self::DeleteSubDevice { sub_did } => buf.put_u32(*sub_did),
        }
        Ok(())
    }
}
