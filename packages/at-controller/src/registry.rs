//! The connected devices and the current one.

use std::{fmt::Display, sync::Arc};

use thiserror::Error;
use tracing::info;

use crate::Device;

/// Selects a registered device by position or by [`Device::uuid`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceId {
    Index(usize),
    Uuid(String),
}

impl From<usize> for DeviceId {
    fn from(value: usize) -> Self {
        Self::Index(value)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self::Uuid(value.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(value: String) -> Self {
        Self::Uuid(value)
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceId::Index(idx) => write!(f, "{idx}"),
            DeviceId::Uuid(uuid) => f.write_str(uuid),
        }
    }
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("device {id} not found in: {uuids:?} or 0..{len}")]
    NotFound {
        id: String,
        uuids: Vec<String>,
        len: usize,
    },
}

/// Owns every initialized device; at most one of them is current.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: Vec<Arc<dyn Device>>,
    current: Option<usize>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `device` and make it the current one.
    pub fn add_device(&mut self, device: Arc<dyn Device>) -> Arc<dyn Device> {
        info!("[DeviceRegistry]: add device {}", device.uuid());
        self.devices.push(device.clone());
        self.current = Some(self.devices.len() - 1);
        device
    }

    /// Switch the current device, looking `id` up by uuid first and by index second.
    pub fn set_current(
        &mut self,
        id: impl Into<DeviceId>,
    ) -> Result<Arc<dyn Device>, RegistryError> {
        let id = id.into();
        let found = match &id {
            DeviceId::Uuid(uuid) => self.devices.iter().position(|d| &d.uuid() == uuid),
            DeviceId::Index(idx) => self
                .devices
                .iter()
                .position(|d| d.uuid() == idx.to_string())
                .or((*idx < self.devices.len()).then_some(*idx)),
        };
        let idx = found.ok_or_else(|| RegistryError::NotFound {
            id: id.to_string(),
            uuids: self.devices.iter().map(|d| d.uuid()).collect(),
            len: self.devices.len(),
        })?;
        self.current = Some(idx);
        Ok(self.devices[idx].clone())
    }

    pub fn current(&self) -> Option<Arc<dyn Device>> {
        self.current.map(|idx| self.devices[idx].clone())
    }

    pub fn devices(&self) -> &[Arc<dyn Device>] {
        &self.devices
    }
}
