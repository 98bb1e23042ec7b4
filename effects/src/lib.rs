//! PFX effect components: binary schemas, script grammars and the effect unit.
//!
//! Every component kind pairs a [`Structure`](pfx_struct::Structure) that
//! reads and writes its binary record with an ArgScript grammar that fills
//! the same record from a `.pfx` script. Writing a component back to script
//! skips every line whose fields still hold their defaults.
//!
//! # Key Features
//!
//! - **Components**: `particles`, `shake`, `light`, `distribute` and `ribbon`,
//!   each with its version range and type code in the [`factory`] table
//! - **Effect units**: [`EffectUnit`] parses a whole script, resolves
//!   references between components by name and writes the script back
//! - **Sub-records**: texture slots, collision surfaces and transforms shared
//!   between components
//! - **Configuration**: `pfx.toml` with registry files and parsing settings
//!
//! # Usage
//!
//! ```
//! use pfx_effects::{Component, EffectUnit};
//!
//! let (unit, diagnostics) = EffectUnit::parse("shake rumble\n\tlength 2\nend");
//! assert!(diagnostics.is_empty());
//!
//! let rumble = unit.component("rumble").unwrap();
//! let bytes = rumble.encode().unwrap();
//! let decoded = Component::decode("shake", rumble.version(), &bytes).unwrap();
//! assert_eq!(&decoded, rumble);
//! assert_eq!(unit.to_argscript(), "shake rumble\n\tlength 2\nend");
//! ```

pub mod component;
pub mod config;
pub mod context;
pub mod directory;
pub mod distribute;
pub mod factory;
pub mod light;
pub mod particles;
pub mod ribbon;
pub mod shake;
pub mod surface;
pub mod texture;
pub mod transform;
pub mod unit;

pub use component::{Component, EffectComponent, EffectError, EffectRef, UsedElement};
pub use config::PfxConfig;
pub use context::ParseContext;
pub use directory::EffectDirectory;
pub use distribute::DistributeEffect;
pub use factory::{ComponentFactory, factories, factory_by_keyword, factory_by_type};
pub use light::LightEffect;
pub use particles::ParticleEffect;
pub use ribbon::RibbonEffect;
pub use shake::ShakeEffect;
pub use surface::Surface;
pub use texture::TextureSlot;
pub use transform::Transform;
pub use unit::{EffectUnit, Export, UnitError};
