//! Lookup surface for component references and resources

use pfx_shared::ResourceId;
use tracing::debug;

use crate::component::EffectRef;
use crate::factory::keyword_of;

/// Resource type of effect maps (`mapEmit`, `mapCollide`, ...)
pub const MAP_RESOURCE: u16 = 0;
/// Resource type of materials
pub const MATERIAL_RESOURCE: u16 = 1;

/// Resolves between component names and the indices stored in binary
/// records.
///
/// [`EffectUnit`](crate::EffectUnit) implements this for a parsed script;
/// editors and packers supply their own.
pub trait EffectDirectory {
    /// The component at `index` among those of `type_code`, if it exists
    fn effect(&self, type_code: u16, index: i32) -> Option<EffectRef> {
        self.effect_name(type_code, index)
            .map(|_| EffectRef::new(type_code, index))
    }

    fn index_of(&self, type_code: u16, name: &str) -> Option<i32>;

    fn effect_name(&self, type_code: u16, index: i32) -> Option<&str>;

    /// Display name of a resource, if the directory knows it
    fn resource(&self, type_code: u16, id: ResourceId) -> Option<String>;
}

/// Name to write for `reference`. Unknown references get a placeholder
/// built from the type keyword and index.
pub fn reference_name(directory: &dyn EffectDirectory, reference: EffectRef) -> String {
    match directory.effect_name(reference.type_code, reference.index) {
        Some(name) => name.to_string(),
        None => {
            debug!(?reference, "reference not found in directory");
            format!("{}_{}", keyword_of(reference.type_code), reference.index)
        }
    }
}

/// Name to write for a resource id
pub fn resource_name(directory: &dyn EffectDirectory, type_code: u16, id: ResourceId) -> String {
    directory
        .resource(type_code, id)
        .unwrap_or_else(|| id.to_string())
}

/// Name to write for a map resource; the zero id is `terrain`
pub fn map_name(directory: &dyn EffectDirectory, id: ResourceId) -> String {
    if id.is_zero() {
        "terrain".to_string()
    } else {
        resource_name(directory, MAP_RESOURCE, id)
    }
}
