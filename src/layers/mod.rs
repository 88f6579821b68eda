mod descriptor;
mod factory;
mod layer;
mod shape;

pub use descriptor::LayerDescriptor;
pub use factory::create_layer;
pub use layer::{Layer, LayerKind};
pub use shape::{NDim, Shape};

/// Identifies a layer inside a graph's arena. Ids are stable across clones.
pub type LayerId = usize;
