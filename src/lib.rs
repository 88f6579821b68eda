//! Network morphism: structural mutations over neural network descriptors.
//!
//! A [`Graph`] describes a network as layer descriptors chained from input to output, plus
//! additive or concatenative skip connections. The [`transform`] module samples widening,
//! deepening and skip connection operators to produce neighbour graphs for an architecture search.

pub mod builder;
pub mod config;
pub mod error;
pub mod graph;
pub mod layers;
pub mod specs;
pub mod transform;

pub use error::{MorphErr, Result};
pub use graph::{Graph, SkipConnection, SkipKind};
pub use layers::{Layer, LayerDescriptor, LayerId, LayerKind, NDim, Shape};
