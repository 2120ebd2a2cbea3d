// ── Inbound frames ──
//
// The remaining-length prefix has no fixed width, so it is decoded rather
// than skipped, and the declared length is checked against what arrived.

use super::{Action, BUSINESS_COMMAND, FrameError, LEN_DID, LEN_PRODUCT_KEY, varlen};

/// Header fields of one inbound frame plus a view of its action payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    pub version: [u8; 4],
    pub command: u16,
    /// Present only on [`BUSINESS_COMMAND`] frames.
    pub sequence: Option<u32>,
    pub action: u8,
    pub payload: &'a [u8],
}

/// Split a raw frame into header fields and action payload.
pub fn parse_frame(raw: &[u8]) -> Result<Frame<'_>, FrameError> {
    let mut reader = Reader::new(raw);
    let version = reader.array::<4>()?;

    let (declared, consumed) = varlen::decode(reader.rest())?;
    reader.skip(consumed)?;
    let actual = reader.rest().len();
    if declared > actual {
        return Err(FrameError::LengthMismatch { declared, actual });
    }
    if declared < actual {
        tracing::debug!(declared, actual, "ignoring bytes past declared frame length");
    }

    let body = reader.take(declared)?;
    let mut reader = Reader::new(body);
    let _flag = reader.u8()?;
    let command = reader.u16()?;
    let sequence = if command == BUSINESS_COMMAND {
        Some(reader.u32()?)
    } else {
        None
    };
    let action = reader.u8()?;

    Ok(Frame {
        version,
        command,
        sequence,
        action,
        payload: reader.rest(),
    })
}

/// One sub-device entry from a full-list frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubDeviceRecord {
    pub product_key: String,
    pub sub_did: u32,
    pub online: bool,
    pub mac: String,
    pub did: String,
}

/// Decoded meaning of an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// A single sub-device changed online state.
    SubDeviceStatus { sub_did: u32, online: bool },
    /// Complete sub-device list (solicited or unsolicited).
    SubDeviceList { records: Vec<SubDeviceRecord> },
    /// Add acknowledgement; `status == 0` is success.
    AddAck { status: u8 },
    /// Delete acknowledgement; `status == 0` is success.
    DeleteAck { status: u8 },
    /// Anything else; the caller treats the frame as opaque raw data.
    Other { action: u8 },
}

impl Report {
    pub fn decode(frame: &Frame<'_>) -> Result<Self, FrameError> {
        let mut reader = Reader::new(frame.payload);
        match Action::try_from(frame.action) {
            Ok(Action::SubDeviceStatus) => Ok(Self::SubDeviceStatus {
                sub_did: reader.u32()?,
                online: reader.u8()? != 0,
            }),
            Ok(Action::SubDeviceList | Action::SubDeviceListReport) => Ok(Self::SubDeviceList {
                records: decode_list(&mut reader)?,
            }),
            Ok(Action::AddSubDeviceAck) => Ok(Self::AddAck {
                status: reader.u8()?,
            }),
            Ok(Action::DeleteSubDeviceAck) => Ok(Self::DeleteAck {
                status: reader.u8()?,
            }),
            // Requests we send are never expected back; pass them through.
            Ok(Action::AddSubDevice | Action::DeleteSubDevice | Action::GetSubDeviceList) => {
                Ok(Self::Other {
                    action: frame.action,
                })
            }
            Err(action) => Ok(Self::Other { action }),
        }
    }
}

fn decode_list(reader: &mut Reader<'_>) -> Result<Vec<SubDeviceRecord>, FrameError> {
    let products = reader.u16()?;
    let mut records = Vec::new();
    for _ in 0..products {
        let product_key = reader.ascii(LEN_PRODUCT_KEY)?;
        let count = reader.u16()?;
        for _ in 0..count {
            let sub_did = reader.u32()?;
            let online = reader.u8()? != 0;
            let mac_len = usize::from(reader.u8()?);
            let mac = reader.ascii(mac_len)?;
            let did = reader.ascii(LEN_DID)?;
            records.push(SubDeviceRecord {
                product_key: product_key.clone(),
                sub_did,
                online,
                mac,
                did,
            });
        }
    }
    Ok(records)
}

// ── Bounds-checked big-endian reader ─────────────────────────────────

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn rest(&self) -> &'a [u8] {
        self.buf.get(self.pos..).unwrap_or_default()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FrameError> {
        let slice = self
            .pos
            .checked_add(n)
            .and_then(|end| self.buf.get(self.pos..end))
            .ok_or(FrameError::Truncated {
                offset: self.pos,
                needed: n,
                available: self.buf.len().saturating_sub(self.pos),
            })?;
        self.pos += n;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<(), FrameError> {
        self.take(n).map(|_| ())
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], FrameError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, FrameError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, FrameError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32, FrameError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    /// Fixed-width identifier; each byte maps to the char with that code.
    fn ascii(&mut self, n: usize) -> Result<String, FrameError> {
        Ok(self.take(n)?.iter().copied().map(char::from).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::frame::{PROTOCOL_VERSION, Request};

    /// Wrap an action payload in a business-command frame.
    fn business_frame(action: u8, payload: &[u8]) -> Vec<u8> {
        let mut body = vec![0x00, 0x00, 0x93, 0x00, 0x00, 0x00, 0x2A, action];
        body.extend_from_slice(payload);
        let mut raw = PROTOCOL_VERSION.to_vec();
        raw.extend(varlen::encode(body.len()));
        raw.extend(body);
        raw
    }

    fn list_payload(product_key: &str, subs: &[(u32, bool, &str, &str)]) -> Vec<u8> {
        let mut p = vec![0x00, 0x01];
        p.extend_from_slice(product_key.as_bytes());
        p.extend_from_slice(&u16::try_from(subs.len()).unwrap().to_be_bytes());
        for (sub_did, online, mac, did) in subs {
            p.extend_from_slice(&sub_did.to_be_bytes());
            p.push(u8::from(*online));
            p.push(u8::try_from(mac.len()).unwrap());
            p.extend_from_slice(mac.as_bytes());
            p.extend_from_slice(did.as_bytes());
        }
        p
    }

    const PK: &str = "0123456789abcdef0123456789abcdef";
    const DID_A: &str = "AAAAAAAAAAAAAAAAAAAAAA";
    const DID_B: &str = "BBBBBBBBBBBBBBBBBBBBBB";

    #[test]
    fn parses_business_header() {
        let raw = business_frame(0x10, &[0, 0, 0, 5, 1]);
        let frame = parse_frame(&raw).unwrap();
        assert_eq!(frame.command, BUSINESS_COMMAND);
        assert_eq!(frame.sequence, Some(42));
        assert_eq!(frame.action, 0x10);
        assert_eq!(frame.payload, &[0, 0, 0, 5, 1]);
    }

    #[test]
    fn parses_header_without_sequence() {
        let body = [0x00, 0x00, 0x91, 0x04, 0xAB, 0xCD];
        let mut raw = PROTOCOL_VERSION.to_vec();
        raw.extend(varlen::encode(body.len()));
        raw.extend(body);

        let frame = parse_frame(&raw).unwrap();
        assert_eq!(frame.command, 0x0091);
        assert_eq!(frame.sequence, None);
        assert_eq!(frame.action, 0x04);
        assert_eq!(frame.payload, &[0xAB, 0xCD]);
    }

    #[test]
    fn parses_multi_byte_length_prefix() {
        let payload = vec![0xEE; 200];
        let raw = business_frame(0x77, &payload);
        assert_eq!(&raw[4..6], &[0xD0, 0x01]); // 208 = 0x50 | 0x80, 0x01
        let frame = parse_frame(&raw).unwrap();
        assert_eq!(frame.action, 0x77);
        assert_eq!(frame.payload.len(), 200);
    }

    #[test]
    fn outbound_frames_parse_back() {
        let raw = Request::DeleteSubDevice { sub_did: 9 }.encode(3).unwrap();
        let frame = parse_frame(&raw).unwrap();
        assert_eq!(frame.sequence, Some(3));
        assert_eq!(frame.action, 0x58);
        assert_eq!(frame.payload, &[0, 0, 0, 9]);
    }

    #[test]
    fn rejects_frame_shorter_than_declared() {
        let mut raw = business_frame(0x10, &[0, 0, 0, 5, 1]);
        raw.truncate(raw.len() - 2);
        assert!(matches!(
            parse_frame(&raw),
            Err(FrameError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn rejects_tiny_frames() {
        assert!(parse_frame(&[0x00, 0x00]).is_err());
        assert!(parse_frame(&[0x00, 0x00, 0x00, 0x03, 0x01, 0x00]).is_err());
    }

    #[test]
    fn decodes_status_report() {
        let raw = business_frame(0x10, &[0x00, 0x00, 0x01, 0x00, 0x01]);
        let report = Report::decode(&parse_frame(&raw).unwrap()).unwrap();
        assert_eq!(
            report,
            Report::SubDeviceStatus {
                sub_did: 256,
                online: true
            }
        );
    }

    #[test]
    fn decodes_full_list() {
        let payload = list_payload(PK, &[(1, true, "AA", DID_A), (2, false, "B0B1", DID_B)]);
        for action in [0x5B, 0x5C] {
            let raw = business_frame(action, &payload);
            let report = Report::decode(&parse_frame(&raw).unwrap()).unwrap();
            let Report::SubDeviceList { records } = report else {
                panic!("expected list report");
            };
            assert_eq!(records.len(), 2);
            assert_eq!(
                records[0],
                SubDeviceRecord {
                    product_key: PK.into(),
                    sub_did: 1,
                    online: true,
                    mac: "AA".into(),
                    did: DID_A.into(),
                }
            );
            assert_eq!(records[1].mac, "B0B1");
            assert!(!records[1].online);
        }
    }

    #[test]
    fn truncated_list_is_an_error() {
        let mut payload = list_payload(PK, &[(1, true, "AA", DID_A)]);
        payload.truncate(payload.len() - 3);
        let raw = business_frame(0x5B, &payload);
        assert!(matches!(
            Report::decode(&parse_frame(&raw).unwrap()),
            Err(FrameError::Truncated { .. })
        ));
    }

    #[test]
    fn acks_and_unknown_actions() {
        let ack = business_frame(0x57, &[0x00]);
        assert_eq!(
            Report::decode(&parse_frame(&ack).unwrap()).unwrap(),
            Report::AddAck { status: 0 }
        );
        let nack = business_frame(0x59, &[0x01]);
        assert_eq!(
            Report::decode(&parse_frame(&nack).unwrap()).unwrap(),
            Report::DeleteAck { status: 1 }
        );
        let other = business_frame(0x33, &[0xFF]);
        assert_eq!(
            Report::decode(&parse_frame(&other).unwrap()).unwrap(),
            Report::Other { action: 0x33 }
        );
    }
}
