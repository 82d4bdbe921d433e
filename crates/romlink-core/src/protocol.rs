//! EcuProtocol trait - one implementation per ECU family

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProtocolResult;
use crate::models::{EcuEvent, PidDescriptor, RomProgress, WriteOptions};
use crate::transport::Connection;

/// Progress callback, invoked synchronously after each unit of work
pub type ProgressCallback = Arc<dyn Fn(RomProgress) + Send + Sync>;

/// Milestone callback, invoked synchronously as milestones are reached
pub type EventCallback = Arc<dyn Fn(EcuEvent) + Send + Sync>;

/// Optional observers for long-running ROM operations
///
/// Both callbacks are fire-and-continue: the protocol never waits on them.
#[derive(Clone, Default)]
pub struct RomCallbacks {
    pub on_progress: Option<ProgressCallback>,
    pub on_event: Option<EventCallback>,
}

impl RomCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, f: impl Fn(RomProgress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub fn with_event(mut self, f: impl Fn(EcuEvent) + Send + Sync + 'static) -> Self {
        self.on_event = Some(Arc::new(f));
        self
    }

    pub fn progress(&self, progress: RomProgress) {
        if let Some(cb) = &self.on_progress {
            cb(progress);
        }
    }

    pub fn event(&self, event: EcuEvent) {
        if let Some(cb) = &self.on_event {
            cb(event);
        }
    }
}

impl std::fmt::Debug for RomCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RomCallbacks")
            .field("on_progress", &self.on_progress.is_some())
            .field("on_event", &self.on_event.is_some())
            .finish()
    }
}

/// Vendor protocol capable of reading and reprogramming an ECU's ROM
///
/// Implementations hold no per-connection state: every operation receives
/// the connection it should drive.
#[async_trait]
pub trait EcuProtocol: Send + Sync {
    /// Protocol name, used in logs and error messages
    fn name(&self) -> &str;

    /// Whether this protocol can drive the given connection
    async fn can_handle(&self, connection: &dyn Connection) -> ProtocolResult<bool>;

    /// Read the full ROM image
    ///
    /// Returns only after every block has been read.
    async fn read_rom(
        &self,
        connection: &dyn Connection,
        callbacks: &RomCallbacks,
    ) -> ProtocolResult<Vec<u8>>;

    /// Write a full ROM image
    async fn write_rom(
        &self,
        connection: &dyn Connection,
        rom: &[u8],
        options: WriteOptions<'_>,
        callbacks: &RomCallbacks,
    ) -> ProtocolResult<()>;

    /// Telemetry parameters this protocol can decode
    async fn get_supported_pids(
        &self,
        connection: &dyn Connection,
    ) -> ProtocolResult<Vec<PidDescriptor>>;
}
