//! Cartridge identity and save-RAM persistence

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::checksum::{crc32, storage_key};
use crate::rpc::{RpcChannel, RpcError};
use crate::save_store::KeyValueStore;

/// Period of the background save-RAM flush
pub const AUTOSAVE_PERIOD: Duration = Duration::from_secs(10);

/// Tracks the loaded cartridge and moves its save-RAM to and from storage
pub struct CartridgeManager {
    rpc: RpcChannel,
    store: Box<dyn KeyValueStore + Send>,
    checksum: Option<u32>,
}

impl CartridgeManager {
    pub fn new(rpc: RpcChannel, store: Box<dyn KeyValueStore + Send>) -> Self {
        Self {
            rpc,
            store,
            checksum: None,
        }
    }

    /// CRC32 of the loaded cartridge, if any
    pub fn checksum(&self) -> Option<u32> {
        self.checksum
    }

    /// Load a new cartridge, restoring its persisted save-RAM.
    ///
    /// Save-RAM of the previous cartridge is flushed first; failures there
    /// are logged and do not block the load.
    pub async fn load_cartridge(&mut self, cart_data: Vec<u8>) -> Result<u32, RpcError> {
        if let Err(e) = self.save_sram().await {
            warn!(error = %e, "could not save previous cartridge's sram");
        }

        let checksum = crc32(&cart_data);
        let len = cart_data.len();
        self.rpc.load_cartridge(cart_data).await?;
        self.checksum = Some(checksum);
        info!(checksum, len, "cartridge loaded");

        self.load_sram().await?;
        Ok(checksum)
    }

    /// Persist the current save-RAM under the cartridge checksum.
    ///
    /// Does nothing when no cartridge is loaded or it has no save-RAM.
    pub async fn save_sram(&mut self) -> Result<(), RpcError> {
        let Some(checksum) = self.checksum else {
            return Ok(());
        };
        if !self.rpc.has_sram().await? {
            return Ok(());
        }

        let sram = self.rpc.get_sram().await?;
        let key = storage_key(checksum);
        match self.store.put_bytes(&key, &sram) {
            Ok(()) => debug!(key, len = sram.len(), "sram saved"),
            Err(e) => warn!(key, error = %e, "sram saving unavailable"),
        }
        Ok(())
    }

    /// Restore persisted save-RAM for the current cartridge, if any was saved
    pub async fn load_sram(&mut self) -> Result<(), RpcError> {
        let Some(checksum) = self.checksum else {
            return Ok(());
        };
        if !self.rpc.has_sram().await? {
            return Ok(());
        }

        let key = storage_key(checksum);
        match self.store.get_bytes(&key) {
            Ok(Some(sram)) => {
                let len = sram.len();
                self.rpc.set_sram(sram).await?;
                debug!(key, len, "sram loaded");
            }
            Ok(None) => debug!(key, "no saved sram"),
            Err(e) => warn!(key, error = %e, "sram loading unavailable"),
        }
        Ok(())
    }
}

/// Flush save-RAM every `period` until the returned task is aborted
pub fn spawn_autosave(manager: Arc<Mutex<CartridgeManager>>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = manager.lock().await.save_sram().await {
                warn!(error = %e, "periodic sram save failed");
            }
        }
    })
}
