use serde::{Deserialize, Serialize};

use crate::{
    db_types::{ShopAccount, TerminalStatus},
    traits::{DeviceLocation, TerminalDevice},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredTerminal {
    pub reader: TerminalDevice,
    pub location: DeviceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalStatusReport {
    pub status: TerminalStatus,
    pub device_type: Option<String>,
    pub label: Option<String>,
    pub model: Option<String>,
    pub serial: Option<String>,
    pub terminal_id: Option<String>,
    pub action: Option<String>,
}

impl TerminalStatusReport {
    pub fn not_registered() -> Self {
        Self {
            status: TerminalStatus::NotRegistered,
            device_type: None,
            label: None,
            model: None,
            serial: None,
            terminal_id: None,
            action: None,
        }
    }

    /// Builds the report from the shop's cached binding.
    pub fn from_cache(shop: &ShopAccount) -> Self {
        Self {
            status: shop.terminal_status(),
            device_type: shop.terminal_model.clone(),
            label: Some(shop.display_name()),
            model: shop.terminal_model.clone(),
            serial: shop.terminal_serial.clone(),
            terminal_id: shop.terminal_id.clone(),
            action: None,
        }
    }

    /// Builds the report from a fresh answer from the processor.
    pub fn from_device(device: &TerminalDevice) -> Self {
        Self {
            status: device.status,
            device_type: Some(device.model.clone()),
            label: device.label.clone(),
            model: Some(device.model.clone()),
            serial: Some(device.serial.clone()),
            terminal_id: Some(device.id.clone()),
            action: device.current_action.clone(),
        }
    }
}
