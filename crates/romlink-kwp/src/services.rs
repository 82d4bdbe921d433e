//! KWP2000 service layer
//!
//! Frame builders plus a thin request/response wrapper around one
//! [`Connection`]. Every method awaits its response before returning, so at
//! most one request is ever in flight.

use std::time::Duration;

use romlink_core::{Connection, ProtocolError, ProtocolResult, TransportError};
use tracing::{debug, warn};

use crate::nrc::NegativeResponseCode;
use crate::security::SEED_LEN;

/// KWP2000 service identifiers
pub mod service_id {
    pub const START_DIAGNOSTIC_SESSION: u8 = 0x10;
    pub const READ_MEMORY_BY_ADDRESS: u8 = 0x23;
    pub const SECURITY_ACCESS: u8 = 0x27;
    pub const START_ROUTINE_BY_LOCAL_ID: u8 = 0x31;
    pub const REQUEST_DOWNLOAD: u8 = 0x34;
    pub const TRANSFER_DATA: u8 = 0x36;
    pub const REQUEST_TRANSFER_EXIT: u8 = 0x37;
    pub const NEGATIVE_RESPONSE: u8 = 0x7F;

    /// Positive responses echo the service id with this bit set
    pub const POSITIVE_RESPONSE_OFFSET: u8 = 0x40;

    pub const fn positive(sid: u8) -> u8 {
        sid.wrapping_add(POSITIVE_RESPONSE_OFFSET)
    }
}

/// Sub-function and parameter bytes
pub mod sub_function {
    /// Start diagnostic session: programming mode
    pub const PROGRAMMING_SESSION: u8 = 0x85;
    /// Security access: request seed
    pub const REQUEST_SEED: u8 = 0x03;
    /// Security access: send key
    pub const SEND_KEY: u8 = 0x04;
    /// Routine 0x01: erase memory
    pub const ERASE_MEMORY: u8 = 0x01;
    /// Request download: uncompressed, unencrypted
    pub const DATA_FORMAT_RAW: u8 = 0x00;
}

/// Delay before re-issuing a request answered with response-pending
const RESPONSE_PENDING_DELAY: Duration = Duration::from_millis(100);

/// Upper bound on consecutive response-pending answers for one request
const MAX_RESPONSE_PENDING: u32 = 50;

// =============================================================================
// Frame builders
// =============================================================================

fn push_u24(frame: &mut Vec<u8>, value: u32) {
    frame.extend_from_slice(&value.to_be_bytes()[1..]);
}

pub fn start_session_frame() -> Vec<u8> {
    vec![
        service_id::START_DIAGNOSTIC_SESSION,
        sub_function::PROGRAMMING_SESSION,
    ]
}

pub fn request_seed_frame() -> Vec<u8> {
    vec![service_id::SECURITY_ACCESS, sub_function::REQUEST_SEED]
}

pub fn send_key_frame(key: &[u8]) -> Vec<u8> {
    let mut frame = vec![service_id::SECURITY_ACCESS, sub_function::SEND_KEY];
    frame.extend_from_slice(key);
    frame
}

/// `23 AH AM AL LEN`
pub fn read_memory_frame(address: u32, length: u8) -> Vec<u8> {
    let mut frame = vec![service_id::READ_MEMORY_BY_ADDRESS];
    push_u24(&mut frame, address);
    frame.push(length);
    frame
}

/// `31 01 AH AM AL SH SM SL`
pub fn erase_frame(address: u32, size: u32) -> Vec<u8> {
    let mut frame = vec![
        service_id::START_ROUTINE_BY_LOCAL_ID,
        sub_function::ERASE_MEMORY,
    ];
    push_u24(&mut frame, address);
    push_u24(&mut frame, size);
    frame
}

/// `34 00 AH AM AL SH SM SL`
pub fn request_download_frame(address: u32, size: u32) -> Vec<u8> {
    let mut frame = vec![service_id::REQUEST_DOWNLOAD, sub_function::DATA_FORMAT_RAW];
    push_u24(&mut frame, address);
    push_u24(&mut frame, size);
    frame
}

/// `36 SEQ <data..>`
pub fn transfer_data_frame(sequence: u8, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(2 + data.len());
    frame.push(service_id::TRANSFER_DATA);
    frame.push(sequence);
    frame.extend_from_slice(data);
    frame
}

pub fn transfer_exit_frame() -> Vec<u8> {
    vec![service_id::REQUEST_TRANSFER_EXIT]
}

// =============================================================================
// Service layer
// =============================================================================

/// Request/response wrapper around one connection
pub struct KwpService<'a> {
    connection: &'a dyn Connection,
}

impl<'a> KwpService<'a> {
    pub fn new(connection: &'a dyn Connection) -> Self {
        Self { connection }
    }

    /// Send a request, re-issuing it while the ECU answers response-pending
    ///
    /// Other negative responses are returned as-is.
    pub async fn exchange(&self, request: &[u8]) -> ProtocolResult<Vec<u8>> {
        let mut pending = 0;
        loop {
            debug!(request = %hex::encode(request), "KWP request");
            let response = self.connection.send_frame(request).await?;
            debug!(response = %hex::encode(&response), "KWP response");

            let is_pending = response.len() >= 3
                && response[0] == service_id::NEGATIVE_RESPONSE
                && NegativeResponseCode::from(response[2]) == NegativeResponseCode::ResponsePending;
            if !is_pending {
                return Ok(response);
            }

            pending += 1;
            if pending > MAX_RESPONSE_PENDING {
                warn!(
                    request = %hex::encode(request),
                    pending,
                    "ECU kept answering response-pending"
                );
                return Err(TransportError::Timeout(format!(
                    "no final response after {} response-pending answers",
                    MAX_RESPONSE_PENDING
                ))
                .into());
            }
            tokio::time::sleep(RESPONSE_PENDING_DELAY).await;
        }
    }

    /// Exchange a request and require a positive response for its service
    pub async fn send_request(&self, request: &[u8]) -> ProtocolResult<Vec<u8>> {
        let service = request.first().copied().unwrap_or_default();
        let response = self.exchange(request).await?;

        match response.first() {
            Some(&service_id::NEGATIVE_RESPONSE) => {
                if response.len() < 3 {
                    return Err(ProtocolError::InvalidResponse(
                        "negative response too short".to_string(),
                    ));
                }
                let nrc = NegativeResponseCode::from(response[2]);
                Err(ProtocolError::NegativeResponse {
                    service: response[1],
                    nrc: nrc.into(),
                    message: nrc.to_string(),
                })
            }
            Some(&sid) if sid == service_id::positive(service) => Ok(response),
            Some(&sid) => Err(ProtocolError::InvalidResponse(format!(
                "expected response 0x{:02X} to service 0x{:02X}, got 0x{:02X}",
                service_id::positive(service),
                service,
                sid
            ))),
            None => Err(ProtocolError::InvalidResponse(format!(
                "empty response to service 0x{:02X}",
                service
            ))),
        }
    }

    /// Start the programming session; the response is not validated
    pub async fn start_programming_session(&self) -> ProtocolResult<Vec<u8>> {
        self.exchange(&start_session_frame()).await
    }

    /// Request a seed; returns the 2 bytes following the `67 03` header
    ///
    /// Bytes after the seed are ignored. A response too short to carry a
    /// full seed yields whatever follows the header, which key derivation
    /// then rejects.
    pub async fn request_seed(&self) -> ProtocolResult<Vec<u8>> {
        let response = self.send_request(&request_seed_frame()).await?;
        let seed = response
            .get(2..2 + SEED_LEN)
            .unwrap_or_else(|| response.get(2..).unwrap_or_default());
        Ok(seed.to_vec())
    }

    /// Send a key; returns the raw response for the caller to judge
    pub async fn send_key(&self, key: &[u8]) -> ProtocolResult<Vec<u8>> {
        self.exchange(&send_key_frame(key)).await
    }

    /// Read `length` bytes at `address`, without the response status byte
    pub async fn read_memory(&self, address: u32, length: u8) -> ProtocolResult<Vec<u8>> {
        let response = self
            .send_request(&read_memory_frame(address, length))
            .await?;
        let data = &response[1..];
        if data.len() != length as usize {
            return Err(ProtocolError::InvalidResponse(format!(
                "read at 0x{:06X} returned {} bytes, expected {}",
                address,
                data.len(),
                length
            )));
        }
        Ok(data.to_vec())
    }

    pub async fn erase(&self, address: u32, size: u32) -> ProtocolResult<()> {
        self.send_request(&erase_frame(address, size)).await?;
        Ok(())
    }

    pub async fn request_download(&self, address: u32, size: u32) -> ProtocolResult<()> {
        self.send_request(&request_download_frame(address, size))
            .await?;
        Ok(())
    }

    pub async fn transfer_data(&self, sequence: u8, data: &[u8]) -> ProtocolResult<()> {
        self.send_request(&transfer_data_frame(sequence, data))
            .await?;
        Ok(())
    }

    pub async fn transfer_exit(&self) -> ProtocolResult<()> {
        self.send_request(&transfer_exit_frame()).await?;
        Ok(())
    }
}
