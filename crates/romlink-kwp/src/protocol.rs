//! KWP2000-over-CAN ROM protocol

use async_trait::async_trait;
use romlink_core::{
    Connection, EcuEvent, EcuEventKind, EcuProtocol, PidDescriptor, ProtocolError, ProtocolResult,
    RomCallbacks, RomPhase, RomProgress, WriteOptions,
};
use romlink_params::ParameterRegistry;
use serde_json::json;
use tracing::{debug, info};

use crate::geometry::RomGeometry;
use crate::security::derive_key;
use crate::services::{service_id, sub_function, KwpService};

/// 1 MiB ROM, read in 128-byte blocks, erased in 64 KiB sectors
pub const ROM_GEOMETRY: RomGeometry = RomGeometry::new(0x10_0000, 0x80, 0x1_0000);

/// Transport names this protocol drives
pub const SUPPORTED_TRANSPORTS: &[&str] = &["openport-can", "sim-can"];

/// Reference KWP2000 protocol over a CAN adapter
///
/// Holds no per-connection state; every operation runs the full
/// programming-mode handshake on the connection it is given.
#[derive(Debug, Clone, Copy, Default)]
pub struct Kwp2000CanProtocol;

impl Kwp2000CanProtocol {
    pub fn new() -> Self {
        Self
    }

    pub fn geometry(&self) -> RomGeometry {
        ROM_GEOMETRY
    }

    /// Enter programming mode and pass security access
    async fn handshake(
        &self,
        kwp: &KwpService<'_>,
        callbacks: &RomCallbacks,
    ) -> ProtocolResult<()> {
        let session = kwp.start_programming_session().await?;
        debug!(response = %hex::encode(&session), "Programming session requested");

        callbacks.event(EcuEvent::new(EcuEventKind::SecurityAccessRequested));
        info!("Requesting security access");

        let seed = kwp.request_seed().await?;
        let key = derive_key(&seed)?;
        debug!(seed = %hex::encode(&seed), key = %hex::encode(key), "Derived security key");

        let response = kwp.send_key(&key).await?;
        let expected = [
            service_id::positive(service_id::SECURITY_ACCESS),
            sub_function::SEND_KEY,
        ];
        if response.get(..2) != Some(&expected[..]) {
            return Err(ProtocolError::SecurityAccessDenied {
                expected: hex::encode(expected),
                actual: hex::encode(&response[..response.len().min(2)]),
            });
        }

        callbacks.event(EcuEvent::new(EcuEventKind::SecurityAccessGranted));
        info!("Security access granted");
        Ok(())
    }

    async fn write_sector(
        &self,
        kwp: &KwpService<'_>,
        rom: &[u8],
        sector: usize,
        written: &mut usize,
        total: usize,
        callbacks: &RomCallbacks,
    ) -> ProtocolResult<()> {
        let geometry = ROM_GEOMETRY;
        let range = geometry.sector_range(sector);
        let address = range.start as u32;
        let size = geometry.sector_size as u32;
        let sector_data = json!({ "sector": sector, "address": format!("0x{:06X}", address) });

        callbacks.event(
            EcuEvent::new(EcuEventKind::SectorEraseStarted).with_data(sector_data.clone()),
        );
        callbacks.progress(
            RomProgress::new(RomPhase::Erasing, *written, total)
                .with_message(format!("Erasing sector {}", sector)),
        );
        info!(sector, address = %format!("0x{:06X}", address), "Erasing sector");
        kwp.erase(address, size).await?;
        callbacks.event(EcuEvent::new(EcuEventKind::SectorEraseComplete).with_data(sector_data));

        kwp.request_download(address, size).await?;

        for (i, block) in rom[range].chunks(geometry.block_size).enumerate() {
            // 1-based per sector, wrapping like the transfer-data counter
            let sequence = (i + 1) as u8;
            kwp.transfer_data(sequence, block).await?;
            *written += block.len();
            callbacks.progress(RomProgress::new(RomPhase::Writing, *written, total));
        }

        kwp.transfer_exit().await?;
        debug!(sector, "Sector programmed");
        Ok(())
    }
}

#[async_trait]
impl EcuProtocol for Kwp2000CanProtocol {
    fn name(&self) -> &str {
        "KWP2000 CAN"
    }

    async fn can_handle(&self, connection: &dyn Connection) -> ProtocolResult<bool> {
        Ok(SUPPORTED_TRANSPORTS.contains(&connection.transport_name()))
    }

    async fn read_rom(
        &self,
        connection: &dyn Connection,
        callbacks: &RomCallbacks,
    ) -> ProtocolResult<Vec<u8>> {
        let geometry = ROM_GEOMETRY;
        let kwp = KwpService::new(connection);
        self.handshake(&kwp, callbacks).await?;

        info!(
            device = %connection.device_id(),
            size = geometry.rom_size,
            blocks = geometry.block_count(),
            "Reading ROM"
        );

        let mut rom = vec![0u8; geometry.rom_size];
        for (i, chunk) in rom.chunks_mut(geometry.block_size).enumerate() {
            let address = i * geometry.block_size;
            let data = kwp
                .read_memory(address as u32, geometry.block_size as u8)
                .await?;
            chunk.copy_from_slice(&data);

            callbacks.progress(RomProgress::new(
                RomPhase::Reading,
                address + geometry.block_size,
                geometry.rom_size,
            ));
        }

        info!(size = rom.len(), "ROM read complete");
        Ok(rom)
    }

    async fn write_rom(
        &self,
        connection: &dyn Connection,
        rom: &[u8],
        options: WriteOptions<'_>,
        callbacks: &RomCallbacks,
    ) -> ProtocolResult<()> {
        let geometry = ROM_GEOMETRY;
        if rom.len() != geometry.rom_size {
            return Err(ProtocolError::InvalidRomSize {
                expected: geometry.rom_size,
                actual: rom.len(),
            });
        }
        if let (false, Some(original)) = (options.dry_run, options.original_rom) {
            if original.len() != geometry.rom_size {
                return Err(ProtocolError::InvalidRomSize {
                    expected: geometry.rom_size,
                    actual: original.len(),
                });
            }
        }

        let kwp = KwpService::new(connection);
        self.handshake(&kwp, callbacks).await?;

        if options.dry_run {
            info!("Dry run, skipping erase and programming");
            callbacks.progress(
                RomProgress::new(RomPhase::Writing, geometry.rom_size, geometry.rom_size)
                    .with_message("Dry run complete"),
            );
            return Ok(());
        }

        let sectors = match options.original_rom {
            Some(original) => geometry.changed_sectors(original, rom).ok_or(
                ProtocolError::InvalidRomSize {
                    expected: geometry.rom_size,
                    actual: original.len(),
                },
            )?,
            None => (0..geometry.sector_count()).collect(),
        };
        let total = sectors.len() * geometry.sector_size;
        info!(
            device = %connection.device_id(),
            sectors = sectors.len(),
            total_sectors = geometry.sector_count(),
            diffed = options.original_rom.is_some(),
            "Writing ROM"
        );

        let mut written = 0;
        for &sector in &sectors {
            self.write_sector(&kwp, rom, sector, &mut written, total, callbacks)
                .await?;
        }

        callbacks.progress(
            RomProgress::new(RomPhase::Verifying, total, total).with_message("Write complete"),
        );
        info!(bytes = written, "ROM write complete");
        Ok(())
    }

    async fn get_supported_pids(
        &self,
        _connection: &dyn Connection,
    ) -> ProtocolResult<Vec<PidDescriptor>> {
        Ok(ParameterRegistry::standard().pid_descriptors())
    }
}
