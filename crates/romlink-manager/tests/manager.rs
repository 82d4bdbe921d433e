//! Device manager behaviour against in-memory transports and protocols

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use romlink_core::{
    Connection, DeviceInfo, EcuProtocol, PidDescriptor, ProtocolError, ProtocolResult,
    RomCallbacks, Transport, TransportError, WriteOptions,
};
use romlink_manager::{
    ConnectionEvent, DeclineSelector, DeviceManager, DeviceSelector, FirstDeviceSelector,
    ManagerError,
};

// =============================================================================
// Fakes
// =============================================================================

struct FakeConnection {
    transport: String,
    device: String,
    closed: AtomicBool,
    fail_close: bool,
}

#[async_trait]
impl Connection for FakeConnection {
    fn transport_name(&self) -> &str {
        &self.transport
    }

    fn device_id(&self) -> &str {
        &self.device
    }

    async fn send_frame(&self, frame: &[u8]) -> Result<Vec<u8>, TransportError> {
        Ok(frame.to_vec())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        if self.fail_close {
            return Err(TransportError::SendFailed("bus off".into()));
        }
        Ok(())
    }
}

struct FakeTransport {
    name: String,
    devices: Vec<(String, String)>,
    fail_listing: bool,
    fail_close: bool,
    connects: AtomicUsize,
    opened: parking_lot::Mutex<Vec<Arc<FakeConnection>>>,
}

impl FakeTransport {
    fn new(name: &str, devices: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            devices: devices
                .iter()
                .map(|(id, n)| (id.to_string(), n.to_string()))
                .collect(),
            fail_listing: false,
            fail_close: false,
            connects: AtomicUsize::new(0),
            opened: parking_lot::Mutex::new(Vec::new()),
        })
    }

    /// Devices whose connections report an error on close
    fn failing_close(name: &str, devices: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            devices: devices
                .iter()
                .map(|(id, n)| (id.to_string(), n.to_string()))
                .collect(),
            fail_listing: false,
            fail_close: true,
            connects: AtomicUsize::new(0),
            opened: parking_lot::Mutex::new(Vec::new()),
        })
    }

    fn broken(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            devices: Vec::new(),
            fail_listing: true,
            fail_close: false,
            connects: AtomicUsize::new(0),
            opened: parking_lot::Mutex::new(Vec::new()),
        })
    }

    fn last_opened(&self) -> Option<Arc<FakeConnection>> {
        self.opened.lock().last().cloned()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, TransportError> {
        if self.fail_listing {
            return Err(TransportError::DeviceNotFound("adapter unplugged".into()));
        }
        Ok(self
            .devices
            .iter()
            .map(|(id, name)| DeviceInfo {
                id: id.clone(),
                name: name.clone(),
                transport_name: self.name.clone(),
                connected: false,
            })
            .collect())
    }

    async fn connect(&self, device_id: &str) -> Result<Arc<dyn Connection>, TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let conn = Arc::new(FakeConnection {
            transport: self.name.clone(),
            device: device_id.to_string(),
            closed: AtomicBool::new(false),
            fail_close: self.fail_close,
        });
        self.opened.lock().push(conn.clone());
        Ok(conn as Arc<dyn Connection>)
    }
}

#[derive(Clone, Copy)]
enum Verdict {
    Accept,
    Decline,
    Fail,
}

struct FakeProtocol {
    name: String,
    verdict: Verdict,
    checks: AtomicUsize,
}

impl FakeProtocol {
    fn new(name: &str, verdict: Verdict) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            verdict,
            checks: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl EcuProtocol for FakeProtocol {
    fn name(&self) -> &str {
        &self.name
    }

    async fn can_handle(&self, _connection: &dyn Connection) -> ProtocolResult<bool> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        match self.verdict {
            Verdict::Accept => Ok(true),
            Verdict::Decline => Ok(false),
            Verdict::Fail => Err(ProtocolError::InvalidResponse("identification blew up".into())),
        }
    }

    async fn read_rom(
        &self,
        _connection: &dyn Connection,
        _callbacks: &RomCallbacks,
    ) -> ProtocolResult<Vec<u8>> {
        Ok(vec![0xAA; 4])
    }

    async fn write_rom(
        &self,
        _connection: &dyn Connection,
        _rom: &[u8],
        _options: WriteOptions<'_>,
        _callbacks: &RomCallbacks,
    ) -> ProtocolResult<()> {
        Ok(())
    }

    async fn get_supported_pids(
        &self,
        _connection: &dyn Connection,
    ) -> ProtocolResult<Vec<PidDescriptor>> {
        Ok(Vec::new())
    }
}

/// Picks a fixed index and counts how often it was asked
struct CountingSelector {
    pick: Option<usize>,
    calls: AtomicUsize,
    seen: parking_lot::Mutex<Vec<String>>,
}

impl CountingSelector {
    fn new(pick: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            pick,
            calls: AtomicUsize::new(0),
            seen: parking_lot::Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl DeviceSelector for CountingSelector {
    async fn select(&self, candidates: &[String]) -> Option<usize> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.seen.lock() = candidates.to_vec();
        self.pick
    }
}

fn two_device_manager(selector: Arc<dyn DeviceSelector>) -> (DeviceManager, Arc<FakeTransport>) {
    let manager = DeviceManager::new(selector);
    let transport = FakeTransport::new("bench-can", &[("a", "Left ECU"), ("b", "Right ECU")]);
    manager.register_transport("bench-can", transport.clone());
    manager.register_protocol(FakeProtocol::new("Fake", Verdict::Accept));
    (manager, transport)
}

// =============================================================================
// Discovery
// =============================================================================

#[tokio::test]
async fn test_failing_transport_is_skipped() {
    let manager = DeviceManager::default();
    manager.register_transport("broken", FakeTransport::broken("broken"));
    manager.register_transport("bench-can", FakeTransport::new("bench-can", &[("a", "ECU")]));

    let devices = manager.list_all_devices().await;
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].label(), "ECU (bench-can)");
}

#[tokio::test]
async fn test_no_devices() {
    let manager = DeviceManager::default();
    manager.register_transport("empty", FakeTransport::new("empty", &[]));
    manager.register_protocol(FakeProtocol::new("Fake", Verdict::Accept));

    assert!(matches!(
        manager.connect().await,
        Err(ManagerError::NoDevicesFound)
    ));
}

#[tokio::test]
async fn test_register_transport_replaces_same_id() {
    let manager = DeviceManager::default();
    manager.register_transport("can", FakeTransport::new("can", &[("a", "First")]));
    manager.register_transport("kline", FakeTransport::new("kline", &[]));
    manager.register_transport("can", FakeTransport::new("can", &[("b", "Second")]));

    assert_eq!(manager.transport_ids(), vec!["can", "kline"]);
    let devices = manager.list_all_devices().await;
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].name, "Second");
}

// =============================================================================
// Selection
// =============================================================================

#[tokio::test]
async fn test_single_device_skips_selector() {
    let selector = CountingSelector::new(None);
    let manager = DeviceManager::new(selector.clone());
    manager.register_transport("bench-can", FakeTransport::new("bench-can", &[("a", "ECU")]));
    manager.register_protocol(FakeProtocol::new("Fake", Verdict::Accept));

    let active = manager.connect().await.expect("connect");
    assert_eq!(active.device_name, "ECU");
    assert_eq!(selector.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_selector_sees_labels_and_picks() {
    let selector = CountingSelector::new(Some(1));
    let (manager, _transport) = two_device_manager(selector.clone());

    let active = manager.connect().await.expect("connect");
    assert_eq!(active.device_name, "Right ECU");
    assert_eq!(active.connection.device_id(), "b");
    assert_eq!(
        *selector.seen.lock(),
        vec!["Left ECU (bench-can)", "Right ECU (bench-can)"]
    );
}

#[tokio::test]
async fn test_declined_selection() {
    let (manager, transport) = two_device_manager(Arc::new(DeclineSelector));

    assert!(matches!(
        manager.connect().await,
        Err(ManagerError::SelectionCancelled)
    ));
    assert_eq!(transport.connects.load(Ordering::SeqCst), 0);
    assert!(!manager.is_connected().await);
}

#[tokio::test]
async fn test_out_of_range_selection_is_cancelled() {
    let (manager, _transport) = two_device_manager(CountingSelector::new(Some(7)));
    assert!(matches!(
        manager.connect().await,
        Err(ManagerError::SelectionCancelled)
    ));
}

#[tokio::test]
async fn test_device_on_unregistered_transport() {
    /// Reports devices that claim to live on another transport
    struct Impostor;

    #[async_trait]
    impl Transport for Impostor {
        fn name(&self) -> &str {
            "impostor"
        }

        async fn list_devices(&self) -> Result<Vec<DeviceInfo>, TransportError> {
            Ok(vec![DeviceInfo {
                id: "x".into(),
                name: "Ghost".into(),
                transport_name: "nowhere".into(),
                connected: false,
            }])
        }

        async fn connect(&self, id: &str) -> Result<Arc<dyn Connection>, TransportError> {
            Err(TransportError::DeviceNotFound(id.to_string()))
        }
    }

    let manager = DeviceManager::default();
    manager.register_transport("impostor", Arc::new(Impostor));

    match manager.connect().await {
        Err(ManagerError::TransportNotRegistered(name)) => assert_eq!(name, "nowhere"),
        other => panic!("unexpected result: {other:?}"),
    }
}

// =============================================================================
// Protocol matching
// =============================================================================

#[tokio::test]
async fn test_first_matching_protocol_wins() {
    let manager = DeviceManager::default();
    manager.register_transport("bench-can", FakeTransport::new("bench-can", &[("a", "ECU")]));
    let declines = FakeProtocol::new("Declines", Verdict::Decline);
    let first = FakeProtocol::new("First", Verdict::Accept);
    let second = FakeProtocol::new("Second", Verdict::Accept);
    manager.register_protocol(declines.clone());
    manager.register_protocol(first.clone());
    manager.register_protocol(second.clone());

    let active = manager.connect().await.expect("connect");
    assert_eq!(active.protocol.name(), "First");
    assert_eq!(declines.checks.load(Ordering::SeqCst), 1);
    assert_eq!(second.checks.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failing_protocol_check_counts_as_no_match() {
    let manager = DeviceManager::default();
    manager.register_transport("bench-can", FakeTransport::new("bench-can", &[("a", "ECU")]));
    manager.register_protocol(FakeProtocol::new("Flaky", Verdict::Fail));
    manager.register_protocol(FakeProtocol::new("Solid", Verdict::Accept));

    let active = manager.connect().await.expect("connect");
    assert_eq!(active.protocol.name(), "Solid");
}

#[tokio::test]
async fn test_no_matching_protocol_closes_connection() {
    let manager = DeviceManager::default();
    let transport = FakeTransport::new("bench-can", &[("a", "ECU")]);
    manager.register_transport("bench-can", transport.clone());
    manager.register_protocol(FakeProtocol::new("Alpha", Verdict::Decline));
    manager.register_protocol(FakeProtocol::new("Beta", Verdict::Fail));

    let err = manager.connect().await.expect_err("no protocol should match");
    match &err {
        ManagerError::NoMatchingProtocol { device, tried } => {
            assert_eq!(device, "ECU (bench-can)");
            assert_eq!(tried, &vec!["Alpha".to_string(), "Beta".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("Alpha, Beta"));

    let conn = transport.last_opened().expect("connection was opened");
    assert!(conn.closed.load(Ordering::SeqCst));
    assert!(!manager.is_connected().await);
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_connect_is_idempotent() {
    let selector = CountingSelector::new(Some(0));
    let (manager, transport) = two_device_manager(selector.clone());

    let first = manager.connect().await.expect("connect");
    let second = manager.connect().await.expect("connect again");

    assert!(Arc::ptr_eq(&first.connection, &second.connection));
    assert_eq!(selector.calls.load(Ordering::SeqCst), 1);
    assert_eq!(transport.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_disconnect_then_connect_selects_again() {
    let selector = CountingSelector::new(Some(0));
    let (manager, transport) = two_device_manager(selector.clone());

    manager.connect().await.expect("connect");
    let opened = transport.last_opened().expect("opened");
    manager.disconnect().await;

    assert!(opened.closed.load(Ordering::SeqCst));
    assert!(!manager.is_connected().await);

    manager.connect().await.expect("reconnect");
    assert_eq!(selector.calls.load(Ordering::SeqCst), 2);
    assert_eq!(transport.connects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_connection_events() {
    let (manager, _transport) = two_device_manager(Arc::new(FirstDeviceSelector));
    let mut events = manager.subscribe();

    manager.connect().await.expect("connect");
    manager.connect().await.expect("connect again");
    manager.disconnect().await;
    manager.disconnect().await;

    assert_eq!(
        events.recv().await.expect("event"),
        ConnectionEvent::Connected {
            device: "Left ECU".to_string(),
            protocol: "Fake".to_string(),
        }
    );
    assert_eq!(
        events.recv().await.expect("event"),
        ConnectionEvent::Disconnected
    );
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_operations_route_to_active_protocol() {
    let (manager, _transport) = two_device_manager(Arc::new(FirstDeviceSelector));
    manager.connect().await.expect("connect");

    let rom = manager.read_rom(&RomCallbacks::new()).await.expect("read");
    assert_eq!(rom, vec![0xAA; 4]);
    manager
        .write_rom(&rom, WriteOptions::dry_run(), &RomCallbacks::new())
        .await
        .expect("write");
    assert!(manager.supported_pids().await.expect("pids").is_empty());
}

#[tokio::test]
async fn test_dispose_clears_everything() {
    let (manager, transport) = two_device_manager(Arc::new(FirstDeviceSelector));
    manager.connect().await.expect("connect");

    manager.dispose().await;

    assert!(!manager.is_connected().await);
    assert!(manager.transport_ids().is_empty());
    assert!(manager.protocol_names().is_empty());
    assert!(transport
        .last_opened()
        .expect("opened")
        .closed
        .load(Ordering::SeqCst));
}

// =============================================================================
// Close failures
// =============================================================================

fn failing_close_manager() -> (DeviceManager, Arc<FakeTransport>) {
    let manager = DeviceManager::default();
    let transport = FakeTransport::failing_close("bench-can", &[("a", "ECU")]);
    manager.register_transport("bench-can", transport.clone());
    manager.register_protocol(FakeProtocol::new("Fake", Verdict::Accept));
    (manager, transport)
}

#[tokio::test]
async fn test_disconnect_survives_close_error() {
    let (manager, transport) = failing_close_manager();
    let mut events = manager.subscribe();
    manager.connect().await.expect("connect");

    manager.disconnect().await;

    assert!(!manager.is_connected().await);
    assert!(manager.active().await.is_none());
    assert!(transport
        .last_opened()
        .expect("opened")
        .closed
        .load(Ordering::SeqCst));
    assert!(matches!(
        events.recv().await.expect("event"),
        ConnectionEvent::Connected { .. }
    ));
    assert_eq!(
        events.recv().await.expect("event"),
        ConnectionEvent::Disconnected
    );
}

#[tokio::test]
async fn test_dispose_survives_close_error() {
    let (manager, _transport) = failing_close_manager();
    manager.connect().await.expect("connect");

    manager.dispose().await;

    assert!(!manager.is_connected().await);
    assert!(manager.transport_ids().is_empty());
    assert!(manager.protocol_names().is_empty());
}

#[tokio::test]
async fn test_no_matching_protocol_despite_close_error() {
    let manager = DeviceManager::default();
    let transport = FakeTransport::failing_close("bench-can", &[("a", "ECU")]);
    manager.register_transport("bench-can", transport.clone());
    manager.register_protocol(FakeProtocol::new("Alpha", Verdict::Decline));

    match manager.connect().await {
        Err(ManagerError::NoMatchingProtocol { device, tried }) => {
            assert_eq!(device, "ECU (bench-can)");
            assert_eq!(tried, vec!["Alpha".to_string()]);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(transport
        .last_opened()
        .expect("opened")
        .closed
        .load(Ordering::SeqCst));
    assert!(!manager.is_connected().await);
}
