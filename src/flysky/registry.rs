//! # Engine Registry
//!
//! Owns one [`ModuleLinkEngine`] per slot configured with a FlySky module.

use std::collections::HashMap;

use tracing::info;

use super::engine::{ByteSource, LinkTiming, ModuleLinkEngine};
use crate::capabilities::{ModuleDescriptor, ModuleSlot};

#[derive(Debug, Default)]
pub struct ModuleRegistry {
    engines: HashMap<ModuleSlot, ModuleLinkEngine>,
    timing: LinkTiming,
}

impl ModuleRegistry {
    pub fn new(timing: LinkTiming) -> Self {
        Self {
            engines: HashMap::new(),
            timing,
        }
    }

    /// Apply a slot's module configuration
    ///
    /// A FlySky slot keeps its existing engine or gets a fresh one; any other
    /// module type drops the slot's engine.
    pub fn configure(&mut self, descriptor: &ModuleDescriptor) -> Option<&mut ModuleLinkEngine> {
        if !descriptor.is_flysky() {
            if self.engines.remove(&descriptor.slot).is_some() {
                info!("Removed FlySky link from {:?} slot", descriptor.slot);
            }
            return None;
        }

        let timing = self.timing;
        let engine = self.engines.entry(descriptor.slot).or_insert_with(|| {
            info!("Created FlySky link on {:?} slot", descriptor.slot);
            ModuleLinkEngine::with_timing(timing)
        });
        Some(engine)
    }

    pub fn get(&self, slot: ModuleSlot) -> Option<&ModuleLinkEngine> {
        self.engines.get(&slot)
    }

    pub fn get_mut(&mut self, slot: ModuleSlot) -> Option<&mut ModuleLinkEngine> {
        self.engines.get_mut(&slot)
    }

    /// Tick the slot's engine; `None` when the slot has no FlySky link
    pub fn tick<S: ByteSource + ?Sized>(&mut self, slot: ModuleSlot, inbound: &mut S) -> Option<&[u8]> {
        self.engines.get_mut(&slot).map(|engine| engine.tick(inbound))
    }

    pub fn slots(&self) -> impl Iterator<Item = ModuleSlot> + '_ {
        self.engines.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::ModuleType;
    use crate::flysky::session::SessionState;

    fn flysky(slot: ModuleSlot) -> ModuleDescriptor {
        ModuleDescriptor::new(slot, ModuleType::Flysky)
    }

    #[test]
    fn test_engine_created_only_for_flysky() {
        let mut registry = ModuleRegistry::default();

        assert!(registry.configure(&flysky(ModuleSlot::Internal)).is_some());
        assert!(registry
            .configure(&ModuleDescriptor::new(ModuleSlot::External, ModuleType::Ppm))
            .is_none());

        assert_eq!(registry.len(), 1);
        assert!(registry.get(ModuleSlot::Internal).is_some());
        assert!(registry.get(ModuleSlot::External).is_none());
    }

    #[test]
    fn test_reconfigure_keeps_engine() {
        let mut registry = ModuleRegistry::default();
        registry.configure(&flysky(ModuleSlot::Internal));
        if let Some(engine) = registry.get_mut(ModuleSlot::Internal) {
            engine.restore_state(SessionState::Default.as_u8());
        }

        registry.configure(&flysky(ModuleSlot::Internal));
        assert_eq!(
            registry.get(ModuleSlot::Internal).map(|engine| engine.state()),
            Some(SessionState::Default)
        );
    }

    #[test]
    fn test_reconfigure_to_other_type_drops_engine() {
        let mut registry = ModuleRegistry::default();
        registry.configure(&flysky(ModuleSlot::Internal));
        registry.configure(&ModuleDescriptor::new(ModuleSlot::Internal, ModuleType::None));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_tick_routes_to_slot() {
        let mut registry = ModuleRegistry::new(LinkTiming { period_ms: 155, module_timeout_ms: 155 });
        registry.configure(&flysky(ModuleSlot::Internal));

        let mut nothing: &[u8] = &[];
        let frame = registry.tick(ModuleSlot::Internal, &mut nothing).map(|frame| frame.to_vec());
        assert!(matches!(frame, Some(ref bytes) if !bytes.is_empty()));

        let mut nothing: &[u8] = &[];
        assert!(registry.tick(ModuleSlot::External, &mut nothing).is_none());
    }

    #[test]
    fn test_ports_are_independent() {
        let mut registry = ModuleRegistry::default();
        registry.configure(&flysky(ModuleSlot::Internal));
        registry.configure(&flysky(ModuleSlot::External));

        if let Some(engine) = registry.get_mut(ModuleSlot::External) {
            engine.bind_receiver();
        }

        assert_eq!(registry.get(ModuleSlot::Internal).map(|e| e.is_binding()), Some(false));
        assert_eq!(registry.get(ModuleSlot::External).map(|e| e.is_binding()), Some(true));
        assert_eq!(registry.slots().count(), 2);
    }
}
