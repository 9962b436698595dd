//! Registers card readers to shops and reports on their status.
//!
//! A shop moves from having no reader to having one, and never back: there is no unbind operation. Registration is
//! idempotent in the sense that a shop that already has a reader keeps it, and the caller is told which one it is.
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{BindResult, ShopAccount, ShopAddress, ShopId, TerminalBinding, TerminalStatus},
    helpers::normalize_registration_code,
    simulator::{is_simulated_id, TestModeSimulator},
    tpe_api::{
        errors::TerminalError,
        payment_objects::PaymentMode,
        terminal_objects::{RegisteredTerminal, TerminalStatusReport},
    },
    traits::{PaymentProcessor, ShopAccountManagement},
};

pub struct TerminalApi<B, P> {
    db: B,
    processor: P,
    simulator: TestModeSimulator,
}

impl<B, P> Debug for TerminalApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TerminalApi")
    }
}

impl<B, P> TerminalApi<B, P>
where
    B: ShopAccountManagement,
    P: PaymentProcessor,
{
    pub fn new(db: B, processor: P) -> Self {
        Self { db, processor, simulator: TestModeSimulator::new() }
    }

    async fn fetch_shop(&self, shop_id: &ShopId) -> Result<ShopAccount, TerminalError> {
        self.db.fetch_shop(shop_id).await?.ok_or_else(|| TerminalError::ShopNotFound(shop_id.clone()))
    }

    /// Registers a reader to the shop.
    ///
    /// The registration code is validated first (`XXXXX-XXXXX`, case-insensitive). If the shop already has a reader,
    /// [`TerminalError::AlreadyRegistered`] carries its id and nothing else happens. Otherwise a location is created
    /// from the shop's address, the first available reader in the processor's inventory is assigned to it, and the
    /// binding is stored. The final write only succeeds if the shop is still unbound, so concurrent registrations
    /// cannot produce two bindings.
    pub async fn register(
        &self,
        shop_id: &ShopId,
        registration_code: &str,
        mode: PaymentMode,
    ) -> Result<RegisteredTerminal, TerminalError> {
        let code = normalize_registration_code(registration_code)
            .map_err(|e| TerminalError::InvalidRegistrationCode(e.to_string()))?;
        let shop = self.fetch_shop(shop_id).await?;
        if let Some(terminal_id) = shop.terminal_id.clone() {
            info!("📟️ Shop {shop_id} tried to register {code}, but already has reader {terminal_id}");
            return Err(TerminalError::AlreadyRegistered { shop_id: shop_id.clone(), terminal_id });
        }
        debug!("📟️ Registering a reader for shop {shop_id} with code {code}");
        let registered = with_processor!(self, mode, p => self.register_with(p, &shop).await)?;
        let binding = TerminalBinding {
            terminal_id: registered.reader.id.clone(),
            serial: registered.reader.serial.clone(),
            model: registered.reader.model.clone(),
            status: registered.reader.status,
            location_id: registered.location.id.clone(),
        };
        match self.db.bind_terminal_if_unbound(shop_id, &binding).await? {
            BindResult::Bound(_) => {
                info!("📟️ Reader {} ({}) registered to shop {shop_id}", binding.terminal_id, binding.serial);
                Ok(registered)
            },
            BindResult::AlreadyBound(terminal_id) => {
                warn!(
                    "📟️ Shop {shop_id} was bound to {terminal_id} by a concurrent registration. Reader {} was assigned \
                     at the processor but is not bound to the shop",
                    binding.terminal_id
                );
                Err(TerminalError::AlreadyRegistered { shop_id: shop_id.clone(), terminal_id })
            },
        }
    }

    async fn register_with<Q: PaymentProcessor>(
        &self,
        processor: &Q,
        shop: &ShopAccount,
    ) -> Result<RegisteredTerminal, TerminalError> {
        let shop_id = &shop.shop_id;
        let address = shop.address().unwrap_or_else(|| {
            warn!("📟️ Shop {shop_id} has no address on file. Using a placeholder address for its reader location");
            ShopAddress::placeholder()
        });
        let location = processor.create_location(&shop.display_name(), &address).await.map_err(|e| {
            if e.is_unavailable() {
                TerminalError::from_processor(shop_id, e)
            } else {
                TerminalError::LocationCreationFailed { shop_id: shop_id.clone(), reason: e.to_string() }
            }
        })?;
        trace!("📟️ Location {} created for shop {shop_id}", location.id);
        let devices = processor.list_devices().await.map_err(|e| TerminalError::from_processor(shop_id, e))?;
        let mut candidate = None;
        for device in devices.into_iter().filter(|d| d.is_available()) {
            // A reader that is offline may still be bound to another shop here
            if self.db.fetch_shop_for_terminal(&device.id).await?.is_none() {
                candidate = Some(device);
                break;
            }
        }
        let device = candidate.ok_or_else(|| TerminalError::NoAvailableDevice(shop_id.clone()))?;
        let reader = processor
            .assign_device(&device.id, &location.id, shop_id)
            .await
            .map_err(|e| TerminalError::from_processor(shop_id, e))?;
        Ok(RegisteredTerminal { reader, location })
    }

    /// Reports the status of the shop's reader.
    ///
    /// In live mode the processor is asked for the reader's current state and the cached status is refreshed. A reader
    /// the processor no longer knows about is reported, and cached, as offline. If the processor cannot be reached the
    /// cached status is returned. Simulated readers only ever report their cached status.
    pub async fn get_status(&self, shop_id: &ShopId, mode: PaymentMode) -> Result<TerminalStatusReport, TerminalError> {
        let shop = self.fetch_shop(shop_id).await?;
        let Some(terminal_id) = shop.terminal_id.clone() else {
            return Ok(TerminalStatusReport::not_registered());
        };
        let cached = TerminalStatusReport::from_cache(&shop);
        if mode.is_test() || is_simulated_id(&terminal_id) {
            return Ok(cached);
        }
        match self.processor.fetch_device(&terminal_id).await {
            Ok(Some(device)) => {
                if shop.terminal_status != Some(device.status) {
                    debug!("📟️ Reader {terminal_id} for shop {shop_id} is now {}", device.status);
                    self.db.update_terminal_status(shop_id, device.status).await?;
                }
                Ok(TerminalStatusReport::from_device(&device))
            },
            Ok(None) => {
                warn!("📟️ Reader {terminal_id} for shop {shop_id} is no longer known to the processor. Marking it offline");
                self.db.update_terminal_status(shop_id, TerminalStatus::Offline).await?;
                Ok(TerminalStatusReport { status: TerminalStatus::Offline, ..cached })
            },
            Err(e) => {
                warn!("📟️ Could not refresh the status of reader {terminal_id} for shop {shop_id}. Using the cache. {e}");
                Ok(cached)
            },
        }
    }
}
