//! What a component keyword handler sees while parsing

use std::ops::{Deref, DerefMut};

use pfx_argscript::{Arguments, Line, StreamState};
use pfx_shared::ResourceId;

use crate::component::{EffectRef, HYPERLINK_IMPORT};
use crate::factory::{VISUAL_EFFECT, keyword_of};
use crate::unit::{EffectUnit, IMPORT_INDEX_FLAG};

/// Stream state plus read access to the unit being built, so references to
/// earlier components can be resolved by name.
///
/// Dereferences to [`StreamState`] for the coercion helpers.
pub struct ParseContext<'a> {
    state: &'a mut StreamState,
    unit: &'a EffectUnit,
}

impl<'a> ParseContext<'a> {
    pub fn new(state: &'a mut StreamState, unit: &'a EffectUnit) -> Self {
        Self { state, unit }
    }

    pub fn unit(&self) -> &EffectUnit {
        self.unit
    }

    /// Resolve argument `index` as the name of a component of `type_code`.
    ///
    /// Unknown names and type mismatches are reported and yield `None`.
    pub fn parse_effect(&mut self, args: Arguments<'_>, index: usize, type_code: u16) -> Option<EffectRef> {
        let name = args.get(index);
        match self.unit.resolve(name, type_code) {
            Ok(reference) => {
                let kind = if reference.type_code == VISUAL_EFFECT && reference.index & IMPORT_INDEX_FLAG != 0 {
                    HYPERLINK_IMPORT
                } else {
                    keyword_of(reference.type_code)
                };
                self.state.add_hyperlink(kind, name, args.span(index));
                Some(reference)
            }
            Err(error) => {
                self.state.error(args.span(index), error.to_string());
                None
            }
        }
    }

    /// The single float of option `name`, if present and valid
    pub fn option_float(&mut self, line: &Line, name: &str) -> Option<f32> {
        let args = line.option_arguments(self.state, name, 1)?;
        self.state.parse_float(args, 0)
    }

    /// A resource id, with a hyperlink of `kind`
    pub fn parse_resource(&mut self, args: Arguments<'_>, index: usize, kind: &'static str) -> Option<ResourceId> {
        let id = self.state.parse_resource_id(args, index)?;
        self.state.add_hyperlink(kind, args.get(index), args.span(index));
        Some(id)
    }

    /// Like [`parse_resource`](Self::parse_resource), also accepting
    /// `terrain` and `water`
    pub fn parse_special_resource(
        &mut self,
        args: Arguments<'_>,
        index: usize,
        kind: &'static str,
    ) -> Option<ResourceId> {
        let id = self.state.parse_special_resource_id(args, index)?;
        if !id.is_zero() && id != ResourceId::water() {
            self.state.add_hyperlink(kind, args.get(index), args.span(index));
        }
        Some(id)
    }
}

impl Deref for ParseContext<'_> {
    type Target = StreamState;

    fn deref(&self) -> &StreamState {
        self.state
    }
}

impl DerefMut for ParseContext<'_> {
    fn deref_mut(&mut self) -> &mut StreamState {
        self.state
    }
}
