use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{info, warn};

use super::Channel;
use crate::core::models::ChannelType;

/// Process-wide lookup from channel type to adapter.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: RwLock<HashMap<ChannelType, Arc<dyn Channel>>>,
}

impl ChannelRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ChannelType, Arc<dyn Channel>>> {
        self.channels.read().unwrap_or_else(|poisoned| {
            warn!("Channel registry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ChannelType, Arc<dyn Channel>>> {
        self.channels.write().unwrap_or_else(|poisoned| {
            warn!("Channel registry lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Register an adapter under its own type. Replaces any previous one.
    pub fn register(&self, channel: Arc<dyn Channel>) {
        let channel_type = channel.channel_type();
        if self.write().insert(channel_type, channel).is_some() {
            warn!(channel_type = %channel_type, "Replaced existing channel adapter");
        } else {
            info!(channel_type = %channel_type, "Registered channel adapter");
        }
    }

    #[must_use]
    pub fn get(&self, channel_type: ChannelType) -> Option<Arc<dyn Channel>> {
        self.read().get(&channel_type).cloned()
    }

    /// Snapshot of every registered adapter.
    #[must_use]
    pub fn all(&self) -> HashMap<ChannelType, Arc<dyn Channel>> {
        self.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
