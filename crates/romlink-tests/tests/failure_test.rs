//! Injected faults, response-pending and the streaming guard

use pretty_assertions::assert_eq;
use romlink_core::{ProtocolError, RomCallbacks, TransportError, WriteOptions};
use romlink_manager::ManagerError;
use romlink_tests::{frames_for, SimBench};
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_mid_write_failure_stops_the_write() {
    let bench = SimBench::single();
    let ecu = bench.ecu(0);
    bench.manager.connect().await.unwrap();

    // session, seed, key, erase, download, then the sixth transfer
    ecu.fail_on_frame(10);
    let image = vec![0x5A; romlink_kwp::ROM_GEOMETRY.rom_size];
    let err = assert_err!(
        bench
            .manager
            .write_rom(&image, WriteOptions::default(), &RomCallbacks::new())
            .await
    );

    assert!(matches!(
        err,
        ManagerError::Protocol(ProtocolError::Transport(TransportError::SendFailed(_)))
    ));
    assert_eq!(ecu.frames().len(), 11);
    assert!(frames_for(&ecu, 0x37).is_empty());
    // the connection survives the failed operation
    assert!(bench.manager.is_connected().await);
}

#[tokio::test]
async fn test_erase_response_pending_is_awaited() {
    let bench = SimBench::single();
    let ecu = bench.ecu(0);
    bench.manager.connect().await.unwrap();

    let original = ecu.rom();
    let mut modified = original.clone();
    modified[0] = 0x00;
    ecu.respond_pending(0x31, 3);

    bench
        .manager
        .write_rom(
            &modified,
            WriteOptions::diffed_against(&original),
            &RomCallbacks::new(),
        )
        .await
        .unwrap();

    assert_eq!(frames_for(&ecu, 0x31).len(), 4);
    assert_eq!(ecu.rom()[0], 0x00);
}

#[tokio::test]
async fn test_active_stream_blocks_rom_operations() {
    let bench = SimBench::single();
    let ecu = bench.ecu(0);
    let active = assert_ok!(bench.manager.connect().await);

    let mut stream = active.connection.start_stream().await.unwrap();
    let err = assert_err!(bench.manager.read_rom(&RomCallbacks::new()).await);
    assert!(matches!(
        err,
        ManagerError::Protocol(ProtocolError::Transport(TransportError::StreamActive))
    ));
    assert!(ecu.frames().is_empty());

    ecu.inject_stream_frame(vec![0x0F, 0xA0]);
    assert_eq!(stream.recv().await.unwrap().data, vec![0x0F, 0xA0]);

    active.connection.stop_stream().await.unwrap();
    let rom = assert_ok!(bench.manager.read_rom(&RomCallbacks::new()).await);
    assert_eq!(rom.len(), romlink_kwp::ROM_GEOMETRY.rom_size);
}
