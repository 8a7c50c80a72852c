//! [`S7Client`] – data-block access over S7comm (ISO-on-TCP, port 102).
//!
//! Only what the twin needs is implemented: the ISO connection request,
//! PDU negotiation and single-item `DB` reads / writes.  Requests larger than
//! the negotiated PDU are split into several round trips.
//!
//! # Frame layout
//!
//! ```text
//! TPKT   03 00 LEN(2)
//! COTP   02 F0 80                          (data transfer)
//! S7     32 ROSCTR 00 00 REF(2) PLEN(2) DLEN(2) [ERRCLS ERRCOD]
//! PARAMS FN COUNT 12 0A 10 02 LEN(2) DB(2) 84 BITADDR(3)
//! ```
//!
//! The builders and parsers are free functions so they can be checked
//! against captured bytes without a socket.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use asrs_types::TwinError;
use tracing::{debug, info};

use crate::transport::{PlcEndpoint, PlcTransport};

const TPKT_VERSION: u8 = 0x03;
const TPKT_HEADER_LEN: usize = 4;
/// Start of the S7 header inside a data frame (TPKT + COTP DT).
const S7_OFFSET: usize = 7;
/// Start of the parameter block inside an ack-data frame.
const ACK_PARAM_OFFSET: usize = S7_OFFSET + 12;

const COTP_CONNECT_CONFIRM: u8 = 0xD0;
const COTP_DATA: u8 = 0xF0;
const S7_PROTOCOL_ID: u8 = 0x32;
const ROSCTR_JOB: u8 = 0x01;
const ROSCTR_ACK_DATA: u8 = 0x03;

const FN_SETUP_COMM: u8 = 0xF0;
const FN_READ_VAR: u8 = 0x04;
const FN_WRITE_VAR: u8 = 0x05;
const AREA_DB: u8 = 0x84;
const TS_BYTE: u8 = 0x02;
const DATA_TS_BYTE: u8 = 0x04;
const ITEM_SUCCESS: u8 = 0xFF;

/// PDU size asked for during negotiation; the PLC may grant less.
pub const REQUESTED_PDU: u16 = 480;
const READ_OVERHEAD: u16 = 18;
const WRITE_OVERHEAD: u16 = 28;

// ────────────────────────────────────────────────────────────────────────────
// Frame builders
// ────────────────────────────────────────────────────────────────────────────

fn tpkt(payload: &[u8]) -> Vec<u8> {
    let len = (payload.len() + TPKT_HEADER_LEN) as u16;
    let mut frame = Vec::with_capacity(len as usize);
    frame.extend_from_slice(&[TPKT_VERSION, 0x00]);
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

fn job(pdu_ref: u16, params: &[u8], data: &[u8]) -> Vec<u8> {
    let mut payload = vec![0x02, COTP_DATA, 0x80, S7_PROTOCOL_ID, ROSCTR_JOB, 0x00, 0x00];
    payload.extend_from_slice(&pdu_ref.to_be_bytes());
    payload.extend_from_slice(&(params.len() as u16).to_be_bytes());
    payload.extend_from_slice(&(data.len() as u16).to_be_bytes());
    payload.extend_from_slice(params);
    payload.extend_from_slice(data);
    tpkt(&payload)
}

/// Highest byte offset a 24-bit S7 bit address can reach.
pub const MAX_BYTE_OFFSET: u32 = 0x00FF_FFFF / 8;

fn var_params(function: u8, db: u16, offset: u32, len: u16) -> Result<[u8; 14], TwinError> {
    let operation = if function == FN_WRITE_VAR { "db_write" } else { "db_read" };
    if offset > MAX_BYTE_OFFSET {
        return Err(TwinError::transport(
            operation,
            format!("offset {offset} is beyond the S7 address range (max {MAX_BYTE_OFFSET})"),
        ));
    }
    let bit_addr = offset * 8;
    let [len_hi, len_lo] = len.to_be_bytes();
    let [db_hi, db_lo] = db.to_be_bytes();
    Ok([
        function,
        0x01,
        0x12,
        0x0A,
        0x10,
        TS_BYTE,
        len_hi,
        len_lo,
        db_hi,
        db_lo,
        AREA_DB,
        (bit_addr >> 16) as u8,
        (bit_addr >> 8) as u8,
        bit_addr as u8,
    ])
}

/// COTP connection request addressed to the CPU at `rack` / `slot`.
pub fn connect_request(rack: u16, slot: u16) -> Vec<u8> {
    let remote_tsap = (((rack & 0x07) << 5) | (slot & 0x1F)) as u8;
    tpkt(&[
        0x11, 0xE0, 0x00, 0x00, 0x00, 0x01, 0x00, // CR, dst ref 0, src ref 1
        0xC0, 0x01, 0x0A, // TPDU size 1024
        0xC1, 0x02, 0x01, 0x00, // local TSAP
        0xC2, 0x02, 0x01, remote_tsap,
    ])
}

pub fn setup_request(pdu_ref: u16, pdu_length: u16) -> Vec<u8> {
    let [hi, lo] = pdu_length.to_be_bytes();
    job(pdu_ref, &[FN_SETUP_COMM, 0x00, 0x00, 0x01, 0x00, 0x01, hi, lo], &[])
}

/// # Errors
///
/// [`TwinError::TransportFailure`] when `offset` is beyond [`MAX_BYTE_OFFSET`].
pub fn read_request(pdu_ref: u16, db: u16, offset: u32, len: u16) -> Result<Vec<u8>, TwinError> {
    Ok(job(pdu_ref, &var_params(FN_READ_VAR, db, offset, len)?, &[]))
}

/// # Errors
///
/// [`TwinError::TransportFailure`] when `offset` is beyond
/// [`MAX_BYTE_OFFSET`] or `data` is too long to express its size in bits.
pub fn write_request(
    pdu_ref: u16,
    db: u16,
    offset: u32,
    data: &[u8],
) -> Result<Vec<u8>, TwinError> {
    let (len, bits) = u16::try_from(data.len())
        .ok()
        .and_then(|len| len.checked_mul(8).map(|bits| (len, bits)))
        .ok_or_else(|| {
            TwinError::transport("db_write", format!("{} bytes do not fit one item", data.len()))
        })?;
    let mut item = vec![0x00, DATA_TS_BYTE];
    item.extend_from_slice(&bits.to_be_bytes());
    item.extend_from_slice(data);
    Ok(job(pdu_ref, &var_params(FN_WRITE_VAR, db, offset, len)?, &item))
}

fn chunk_offset(operation: &str, offset: u32, done: usize) -> Result<u32, TwinError> {
    u32::try_from(done)
        .ok()
        .and_then(|done| offset.checked_add(done))
        .ok_or_else(|| TwinError::transport(operation, "offset overflows the address range"))
}

// ────────────────────────────────────────────────────────────────────────────
// Response parsers
// ────────────────────────────────────────────────────────────────────────────

fn short_frame(what: &str, len: usize) -> TwinError {
    TwinError::DecodeFailure(format!("{what} response truncated at {len} bytes"))
}

fn check_ack(frame: &[u8], function: u8, operation: &str) -> Result<(), TwinError> {
    if frame.len() < ACK_PARAM_OFFSET + 2 {
        return Err(short_frame(operation, frame.len()));
    }
    if frame[5] != COTP_DATA || frame[S7_OFFSET] != S7_PROTOCOL_ID {
        return Err(TwinError::transport(operation, "unexpected frame type"));
    }
    if frame[S7_OFFSET + 1] != ROSCTR_ACK_DATA {
        return Err(TwinError::transport(
            operation,
            format!("unexpected ROSCTR {:#04x}", frame[S7_OFFSET + 1]),
        ));
    }
    let (class, code) = (frame[S7_OFFSET + 10], frame[S7_OFFSET + 11]);
    if class != 0 || code != 0 {
        return Err(TwinError::transport(
            operation,
            format!("PLC error class {class:#04x} code {code:#04x}"),
        ));
    }
    if frame[ACK_PARAM_OFFSET] != function {
        return Err(TwinError::transport(operation, "reply to a different function"));
    }
    Ok(())
}

/// Negotiated PDU length from a setup-communication reply.
pub fn parse_setup_response(frame: &[u8]) -> Result<u16, TwinError> {
    check_ack(frame, FN_SETUP_COMM, "setup")?;
    let bytes = frame
        .get(ACK_PARAM_OFFSET + 6..ACK_PARAM_OFFSET + 8)
        .ok_or_else(|| short_frame("setup", frame.len()))?;
    let pdu = u16::from_be_bytes([bytes[0], bytes[1]]);
    if pdu <= WRITE_OVERHEAD {
        return Err(TwinError::transport("setup", format!("PDU length {pdu} too small")));
    }
    Ok(pdu)
}

/// Payload of a single-item read reply; must be exactly `expected` bytes.
pub fn parse_read_response(frame: &[u8], expected: usize) -> Result<Vec<u8>, TwinError> {
    check_ack(frame, FN_READ_VAR, "db_read")?;
    let item = ACK_PARAM_OFFSET + 2;
    let header = frame
        .get(item..item + 4)
        .ok_or_else(|| short_frame("db_read", frame.len()))?;
    if header[0] != ITEM_SUCCESS {
        return Err(TwinError::transport(
            "db_read",
            format!("item return code {:#04x}", header[0]),
        ));
    }
    let raw_len = u16::from_be_bytes([header[2], header[3]]) as usize;
    // Bit, byte and integer transport sizes report their length in bits.
    let len = match header[1] {
        0x03..=0x05 => raw_len.div_ceil(8),
        _ => raw_len,
    };
    if len != expected {
        return Err(TwinError::DecodeFailure(format!(
            "asked for {expected} bytes, PLC returned {len}"
        )));
    }
    frame
        .get(item + 4..item + 4 + len)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| short_frame("db_read", frame.len()))
}

pub fn parse_write_response(frame: &[u8]) -> Result<(), TwinError> {
    check_ack(frame, FN_WRITE_VAR, "db_write")?;
    match frame.get(ACK_PARAM_OFFSET + 2) {
        Some(&ITEM_SUCCESS) => Ok(()),
        Some(code) => Err(TwinError::transport(
            "db_write",
            format!("item return code {code:#04x}"),
        )),
        None => Err(short_frame("db_write", frame.len())),
    }
}

/// Read one TPKT frame, header included.
fn read_frame(stream: &mut impl Read) -> io::Result<Vec<u8>> {
    let mut header = [0u8; TPKT_HEADER_LEN];
    stream.read_exact(&mut header)?;
    if header[0] != TPKT_VERSION {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "not a TPKT frame"));
    }
    let len = u16::from_be_bytes([header[2], header[3]]) as usize;
    if len <= TPKT_HEADER_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "empty TPKT frame"));
    }
    let mut frame = vec![0u8; len];
    frame[..TPKT_HEADER_LEN].copy_from_slice(&header);
    stream.read_exact(&mut frame[TPKT_HEADER_LEN..])?;
    Ok(frame)
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// Blocking S7 client.  One TCP connection per [`connect`][PlcTransport::connect].
#[derive(Debug, Default)]
pub struct S7Client {
    stream: Option<TcpStream>,
    pdu_length: u16,
    pdu_ref: u16,
}

impl S7Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// PDU length granted by the PLC; zero while disconnected.
    pub fn pdu_length(&self) -> u16 {
        self.pdu_length
    }

    fn next_ref(&mut self) -> u16 {
        self.pdu_ref = self.pdu_ref.wrapping_add(1);
        self.pdu_ref
    }

    fn exchange(&mut self, operation: &str, request: &[u8]) -> Result<Vec<u8>, TwinError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| TwinError::transport(operation, "not connected"))?;
        stream
            .write_all(request)
            .map_err(|e| TwinError::transport(operation, e.to_string()))?;
        read_frame(stream).map_err(|e| TwinError::transport(operation, e.to_string()))
    }

    fn chunk_len(&self, overhead: u16, operation: &str) -> Result<usize, TwinError> {
        if self.stream.is_none() {
            return Err(TwinError::transport(operation, "not connected"));
        }
        Ok(usize::from(self.pdu_length.saturating_sub(overhead).max(1)))
    }
}

impl PlcTransport for S7Client {
    fn connect(&mut self, endpoint: &PlcEndpoint) -> Result<(), TwinError> {
        self.disconnect();

        let addr = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(|e| TwinError::transport("connect", e.to_string()))?
            .next()
            .ok_or_else(|| TwinError::transport("connect", format!("{} did not resolve", endpoint.host)))?;
        let stream = TcpStream::connect_timeout(&addr, Duration::from_millis(endpoint.connect_timeout_ms.max(1)))
            .map_err(|e| TwinError::transport("connect", e.to_string()))?;
        let io_timeout = Some(Duration::from_millis(endpoint.io_timeout_ms.max(1)));
        stream
            .set_read_timeout(io_timeout)
            .and_then(|()| stream.set_write_timeout(io_timeout))
            .and_then(|()| stream.set_nodelay(true))
            .map_err(|e| TwinError::transport("connect", e.to_string()))?;
        self.stream = Some(stream);

        let confirm = self.exchange("connect", &connect_request(endpoint.rack, endpoint.slot))?;
        if confirm.get(5) != Some(&COTP_CONNECT_CONFIRM) {
            return Err(TwinError::transport("connect", "ISO connection rejected"));
        }

        let pdu_ref = self.next_ref();
        let reply = self.exchange("connect", &setup_request(pdu_ref, REQUESTED_PDU))?;
        self.pdu_length = parse_setup_response(&reply)?;
        info!(%endpoint, pdu = self.pdu_length, "s7 link up");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn db_read(&mut self, db: u16, offset: u32, len: usize) -> Result<Vec<u8>, TwinError> {
        let chunk = self.chunk_len(READ_OVERHEAD, "db_read")?;
        let mut out = Vec::with_capacity(len);
        while out.len() < len {
            let n = chunk.min(len - out.len());
            let pdu_ref = self.next_ref();
            let at = chunk_offset("db_read", offset, out.len())?;
            let request = read_request(pdu_ref, db, at, n as u16)?;
            let reply = self.exchange("db_read", &request)?;
            out.extend(parse_read_response(&reply, n)?);
        }
        Ok(out)
    }

    fn db_write(&mut self, db: u16, offset: u32, data: &[u8]) -> Result<(), TwinError> {
        let chunk = self.chunk_len(WRITE_OVERHEAD, "db_write")?;
        let mut done = 0usize;
        for part in data.chunks(chunk) {
            let pdu_ref = self.next_ref();
            let at = chunk_offset("db_write", offset, done)?;
            let request = write_request(pdu_ref, db, at, part)?;
            let reply = self.exchange("db_write", &request)?;
            parse_write_response(&reply)?;
            done += part.len();
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                debug!(error = %e, "s7 socket shutdown failed");
            }
            self.pdu_length = 0;
            debug!("s7 link closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    /// Start of the parameter block inside a job frame.
    const JOB_PARAM_OFFSET: usize = S7_OFFSET + 10;

    fn ack(pdu_ref: [u8; 2], params: &[u8], data: &[u8]) -> Vec<u8> {
        let mut payload = vec![0x02, COTP_DATA, 0x80, S7_PROTOCOL_ID, ROSCTR_ACK_DATA, 0, 0];
        payload.extend_from_slice(&pdu_ref);
        payload.extend_from_slice(&(params.len() as u16).to_be_bytes());
        payload.extend_from_slice(&(data.len() as u16).to_be_bytes());
        payload.extend_from_slice(&[0, 0]);
        payload.extend_from_slice(params);
        payload.extend_from_slice(data);
        tpkt(&payload)
    }

    fn read_ack(data: &[u8]) -> Vec<u8> {
        let mut item = vec![ITEM_SUCCESS, DATA_TS_BYTE];
        item.extend_from_slice(&((data.len() * 8) as u16).to_be_bytes());
        item.extend_from_slice(data);
        ack([0, 1], &[FN_READ_VAR, 0x01], &item)
    }

    /// Minimal PLC: answers the handshake and serves one 64-byte data block.
    fn spawn_fake_plc(pdu: u16) -> (u16, thread::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut memory = vec![0u8; 64];
            while let Ok(frame) = read_frame(&mut stream) {
                let reply = if frame[5] == 0xE0 {
                    let mut cc = frame.clone();
                    cc[5] = COTP_CONNECT_CONFIRM;
                    cc
                } else {
                    let pdu_ref = [frame[11], frame[12]];
                    let p = JOB_PARAM_OFFSET;
                    match frame[p] {
                        FN_SETUP_COMM => {
                            let [hi, lo] = pdu.to_be_bytes();
                            ack(pdu_ref, &[FN_SETUP_COMM, 0, 0, 1, 0, 1, hi, lo], &[])
                        }
                        FN_READ_VAR => {
                            let len = u16::from_be_bytes([frame[p + 6], frame[p + 7]]) as usize;
                            let addr = u32::from_be_bytes([0, frame[p + 11], frame[p + 12], frame[p + 13]]);
                            let start = (addr / 8) as usize;
                            read_ack(&memory[start..start + len])
                        }
                        FN_WRITE_VAR => {
                            let addr = u32::from_be_bytes([0, frame[p + 11], frame[p + 12], frame[p + 13]]);
                            let start = (addr / 8) as usize;
                            let data = &frame[p + 18..];
                            memory[start..start + data.len()].copy_from_slice(data);
                            ack(pdu_ref, &[FN_WRITE_VAR, 0x01], &[ITEM_SUCCESS])
                        }
                        _ => break,
                    }
                };
                stream.write_all(&reply).unwrap();
            }
            memory
        });
        (port, handle)
    }

    fn local(port: u16) -> PlcEndpoint {
        PlcEndpoint {
            host: "127.0.0.1".to_string(),
            port,
            ..PlcEndpoint::default()
        }
    }

    #[test]
    fn connect_request_addresses_rack_and_slot() {
        let cr = connect_request(0, 1);
        assert_eq!(cr.len(), 22);
        assert_eq!(&cr[..4], &[0x03, 0x00, 0x00, 0x16]);
        assert_eq!(cr[5], 0xE0);
        assert_eq!(&cr[18..], &[0xC2, 0x02, 0x01, 0x01]);
        assert_eq!(connect_request(1, 3)[21], 0x23);
    }

    #[test]
    fn read_request_layout() {
        let req = read_request(7, 3, 2, 6).unwrap();
        assert_eq!(req.len(), 31);
        assert_eq!(&req[4..7], &[0x02, 0xF0, 0x80]);
        assert_eq!(&req[7..17], &[0x32, 0x01, 0x00, 0x00, 0x00, 0x07, 0x00, 0x0E, 0x00, 0x00]);
        assert_eq!(
            &req[17..],
            &[0x04, 0x01, 0x12, 0x0A, 0x10, 0x02, 0x00, 0x06, 0x00, 0x03, 0x84, 0x00, 0x00, 0x10]
        );
    }

    #[test]
    fn write_request_layout() {
        let req = write_request(1, 1, 2, &[0x2A]).unwrap();
        // 14 bytes of params, 4 item header bytes, 1 data byte.
        assert_eq!(&req[13..17], &[0x00, 0x0E, 0x00, 0x05]);
        assert_eq!(req[17], FN_WRITE_VAR);
        assert_eq!(&req[31..], &[0x00, 0x04, 0x00, 0x08, 0x2A]);
    }

    #[test]
    fn addresses_beyond_s7_range_are_rejected() {
        assert!(read_request(1, 3, MAX_BYTE_OFFSET, 1).is_ok());
        assert!(matches!(
            read_request(1, 3, MAX_BYTE_OFFSET + 1, 1),
            Err(TwinError::TransportFailure { .. })
        ));
        assert!(matches!(
            write_request(1, 1, 0x0100_0000, &[0]),
            Err(TwinError::TransportFailure { .. })
        ));
        assert!(write_request(1, 1, 0, &vec![0u8; 8191]).is_ok());
        assert!(matches!(
            write_request(1, 1, 0, &vec![0u8; 8192]),
            Err(TwinError::TransportFailure { .. })
        ));
        assert!(chunk_offset("db_read", u32::MAX, 1).is_err());
    }

    #[test]
    fn parses_read_reply() {
        let frame = read_ack(&[1, 2, 3]);
        assert_eq!(parse_read_response(&frame, 3).unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            parse_read_response(&frame, 4),
            Err(TwinError::DecodeFailure(_))
        ));
        assert!(matches!(
            parse_read_response(&frame[..22], 3),
            Err(TwinError::DecodeFailure(_))
        ));
    }

    #[test]
    fn item_error_is_a_transport_failure() {
        let frame = ack([0, 1], &[FN_READ_VAR, 0x01], &[0x0A, 0x00, 0x00, 0x00]);
        assert!(matches!(
            parse_read_response(&frame, 1),
            Err(TwinError::TransportFailure { .. })
        ));
        let frame = ack([0, 1], &[FN_WRITE_VAR, 0x01], &[0x05]);
        assert!(parse_write_response(&frame).is_err());
    }

    #[test]
    fn header_error_class_is_reported() {
        let mut frame = ack([0, 1], &[FN_SETUP_COMM, 0, 0, 1, 0, 1, 0x00, 0xF0], &[]);
        frame[S7_OFFSET + 10] = 0x81;
        let err = parse_setup_response(&frame).unwrap_err();
        assert!(err.to_string().contains("0x81"));
    }

    #[test]
    fn io_without_a_link_fails() {
        let mut client = S7Client::new();
        assert!(!client.is_connected());
        assert!(client.db_read(1, 0, 1).is_err());
        assert!(client.db_write(1, 0, &[0]).is_err());
        client.disconnect();
    }

    #[test]
    fn refused_tcp_connect_fails() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut client = S7Client::new();
        assert!(client.connect(&local(port)).is_err());
        assert!(!client.is_connected());
    }

    #[test]
    fn round_trip_against_fake_plc_in_chunks() {
        // PDU 32 leaves 14-byte reads and 4-byte writes.
        let (port, server) = spawn_fake_plc(32);
        let mut client = S7Client::new();
        client.connect(&local(port)).unwrap();
        assert!(client.is_connected());
        assert_eq!(client.pdu_length(), 32);

        let payload: Vec<u8> = (1..=10).collect();
        client.db_write(1, 4, &payload).unwrap();
        let back = client.db_read(1, 0, 20).unwrap();
        assert_eq!(&back[..4], &[0, 0, 0, 0]);
        assert_eq!(&back[4..14], payload.as_slice());
        assert_eq!(&back[14..], &[0; 6]);

        client.disconnect();
        assert!(!client.is_connected());
        let memory = server.join().unwrap();
        assert_eq!(&memory[4..14], payload.as_slice());
    }
}
