//! Virtual ECU answering KWP2000 frames from an in-memory ROM

use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use romlink_core::{Connection, StreamFrame, TransportError};
use tokio::sync::broadcast;
use tracing::debug;

use crate::nrc::NegativeResponseCode;
use crate::protocol::ROM_GEOMETRY;
use crate::security::derive_key;
use crate::services::{service_id, sub_function};

/// Mutable ECU state, guarded as one unit
struct EcuState {
    rom: Vec<u8>,
    frames: Vec<Vec<u8>>,
    unlocked: bool,
    /// 0-based index of the frame that fails with a transport error
    fail_at: Option<usize>,
    /// Remaining response-pending answers per service id
    pending: HashMap<u8, u32>,
    download: Option<DownloadState>,
}

/// Active request-download window
struct DownloadState {
    cursor: usize,
    end: usize,
    next_sequence: u8,
}

/// One virtual ECU
///
/// Implements [`Connection`] directly; `SimulatedTransport::connect` hands
/// out shared references to the same ECU.
pub struct SimulatedEcu {
    device_id: String,
    name: String,
    transport_name: String,
    seed: [u8; 2],
    latency: Duration,
    open: AtomicBool,
    streaming: AtomicBool,
    stream_tx: broadcast::Sender<StreamFrame>,
    state: Mutex<EcuState>,
}

impl SimulatedEcu {
    pub fn new(
        device_id: String,
        name: String,
        transport_name: String,
        seed: [u8; 2],
        fill: u8,
        latency: Duration,
    ) -> Self {
        let (stream_tx, _) = broadcast::channel(256);
        Self {
            device_id,
            name,
            transport_name,
            seed,
            latency,
            open: AtomicBool::new(false),
            streaming: AtomicBool::new(false),
            stream_tx,
            state: Mutex::new(EcuState {
                rom: vec![fill; ROM_GEOMETRY.rom_size],
                frames: Vec::new(),
                unlocked: false,
                fail_at: None,
                pending: HashMap::new(),
                download: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub(crate) fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    /// Every frame received so far, in order
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.state.lock().frames.clone()
    }

    pub fn clear_frames(&self) {
        self.state.lock().frames.clear();
    }

    /// Current ROM contents
    pub fn rom(&self) -> Vec<u8> {
        self.state.lock().rom.clone()
    }

    /// Overwrite the start of the ROM with `image`
    pub fn load_rom(&self, image: &[u8]) {
        let mut state = self.state.lock();
        let len = image.len().min(state.rom.len());
        state.rom[..len].copy_from_slice(&image[..len]);
    }

    /// Fail the `index`-th frame (0-based, counted over the ECU's lifetime)
    pub fn fail_on_frame(&self, index: usize) {
        self.state.lock().fail_at = Some(index);
    }

    /// Answer the next `count` requests for `service` with response-pending
    pub fn respond_pending(&self, service: u8, count: u32) {
        self.state.lock().pending.insert(service, count);
    }

    /// Whether security access has been granted on this ECU
    pub fn is_unlocked(&self) -> bool {
        self.state.lock().unlocked
    }

    /// Publish a telemetry frame to stream subscribers
    pub fn inject_stream_frame(&self, data: Vec<u8>) {
        let frame = StreamFrame {
            timestamp: Instant::now(),
            data,
        };
        let _ = self.stream_tx.send(frame);
    }

    fn handle(&self, state: &mut EcuState, frame: &[u8]) -> Vec<u8> {
        let Some(&sid) = frame.first() else {
            return negative(0x00, NegativeResponseCode::GeneralReject);
        };

        if let Some(remaining) = state.pending.get_mut(&sid) {
            if *remaining > 0 {
                *remaining -= 1;
                return negative(sid, NegativeResponseCode::ResponsePending);
            }
        }

        match sid {
            service_id::START_DIAGNOSTIC_SESSION => {
                vec![service_id::positive(sid), frame.get(1).copied().unwrap_or(0)]
            }
            service_id::SECURITY_ACCESS => self.security_access(state, frame),
            service_id::READ_MEMORY_BY_ADDRESS => guarded(state, sid, |state| {
                let address = read_u24(frame, 1)?;
                let length = *frame.get(4)? as usize;
                let range = rom_range(state, address, length)?;
                let mut response = vec![service_id::positive(sid)];
                response.extend_from_slice(&state.rom[range]);
                Some(response)
            }),
            service_id::START_ROUTINE_BY_LOCAL_ID
                if frame.get(1) == Some(&sub_function::ERASE_MEMORY) =>
            {
                guarded(state, sid, |state| {
                    let address = read_u24(frame, 2)?;
                    let size = read_u24(frame, 5)?;
                    let range = rom_range(state, address, size)?;
                    state.rom[range].fill(0xFF);
                    Some(vec![service_id::positive(sid), sub_function::ERASE_MEMORY])
                })
            }
            service_id::REQUEST_DOWNLOAD => guarded(state, sid, |state| {
                let address = read_u24(frame, 2)?;
                let size = read_u24(frame, 5)?;
                let range = rom_range(state, address, size)?;
                state.download = Some(DownloadState {
                    cursor: range.start,
                    end: range.end,
                    next_sequence: 1,
                });
                Some(vec![service_id::positive(sid), 0x20, 0x0F, 0xFA])
            }),
            service_id::TRANSFER_DATA => self.transfer_data(state, frame),
            service_id::REQUEST_TRANSFER_EXIT => {
                if state.download.take().is_none() {
                    return negative(sid, NegativeResponseCode::RequestSequenceError);
                }
                vec![service_id::positive(sid)]
            }
            _ => {
                let mut response = vec![service_id::positive(sid)];
                response.extend(frame.get(1).copied());
                response
            }
        }
    }

    fn security_access(&self, state: &mut EcuState, frame: &[u8]) -> Vec<u8> {
        let sid = service_id::SECURITY_ACCESS;
        match frame.get(1).copied() {
            Some(sub_function::REQUEST_SEED) => {
                let mut response = vec![service_id::positive(sid), sub_function::REQUEST_SEED];
                response.extend_from_slice(&self.seed);
                response
            }
            Some(sub_function::SEND_KEY) => {
                let expected = derive_key(&self.seed).ok();
                let key = frame.get(2..);
                if expected.as_ref().map(|k| &k[..]) == key {
                    state.unlocked = true;
                    vec![service_id::positive(sid), sub_function::SEND_KEY]
                } else {
                    negative(sid, NegativeResponseCode::InvalidKey)
                }
            }
            _ => negative(sid, NegativeResponseCode::SubFunctionNotSupported),
        }
    }

    fn transfer_data(&self, state: &mut EcuState, frame: &[u8]) -> Vec<u8> {
        let sid = service_id::TRANSFER_DATA;
        if !state.unlocked {
            return negative(sid, NegativeResponseCode::SecurityAccessDenied);
        }
        let (Some(download), Some(&sequence)) = (state.download.as_mut(), frame.get(1)) else {
            return negative(sid, NegativeResponseCode::RequestSequenceError);
        };
        if sequence != download.next_sequence {
            return negative(sid, NegativeResponseCode::WrongBlockSequenceCounter);
        }

        let data = &frame[2..];
        let start = download.cursor;
        let end = start + data.len();
        if end > download.end {
            return negative(sid, NegativeResponseCode::TransferDataSuspended);
        }
        download.cursor = end;
        download.next_sequence = download.next_sequence.wrapping_add(1);
        state.rom[start..end].copy_from_slice(data);

        vec![service_id::positive(sid), sequence]
    }
}

fn negative(sid: u8, nrc: NegativeResponseCode) -> Vec<u8> {
    vec![service_id::NEGATIVE_RESPONSE, sid, nrc.into()]
}

/// Run a privileged handler; malformed requests map to requestOutOfRange
fn guarded(
    state: &mut EcuState,
    sid: u8,
    handler: impl FnOnce(&mut EcuState) -> Option<Vec<u8>>,
) -> Vec<u8> {
    if !state.unlocked {
        return negative(sid, NegativeResponseCode::SecurityAccessDenied);
    }
    handler(state).unwrap_or_else(|| negative(sid, NegativeResponseCode::RequestOutOfRange))
}

fn read_u24(frame: &[u8], at: usize) -> Option<usize> {
    let bytes = frame.get(at..at + 3)?;
    Some(((bytes[0] as usize) << 16) | ((bytes[1] as usize) << 8) | bytes[2] as usize)
}

fn rom_range(state: &EcuState, address: usize, length: usize) -> Option<Range<usize>> {
    let end = address.checked_add(length)?;
    (end <= state.rom.len()).then_some(address..end)
}

#[async_trait]
impl Connection for SimulatedEcu {
    fn transport_name(&self) -> &str {
        &self.transport_name
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn send_frame(&self, frame: &[u8]) -> Result<Vec<u8>, TransportError> {
        if !self.is_open() {
            return Err(TransportError::ConnectionClosed);
        }
        if self.streaming.load(Ordering::SeqCst) {
            return Err(TransportError::StreamActive);
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let mut state = self.state.lock();
        let index = state.frames.len();
        state.frames.push(frame.to_vec());
        if state.fail_at == Some(index) {
            return Err(TransportError::SendFailed(format!(
                "injected failure at frame {}",
                index
            )));
        }

        let response = self.handle(&mut state, frame);
        debug!(
            device = %self.device_id,
            request = %hex::encode(frame),
            response = %hex::encode(&response),
            "Simulated ECU exchange"
        );
        Ok(response)
    }

    async fn start_stream(&self) -> Result<broadcast::Receiver<StreamFrame>, TransportError> {
        if !self.is_open() {
            return Err(TransportError::ConnectionClosed);
        }
        self.streaming.store(true, Ordering::SeqCst);
        Ok(self.stream_tx.subscribe())
    }

    async fn stop_stream(&self) -> Result<(), TransportError> {
        self.streaming.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.streaming.store(false, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
        let mut state = self.state.lock();
        state.unlocked = false;
        state.download = None;
        Ok(())
    }
}
