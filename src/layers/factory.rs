use rand::{seq::IndexedRandom, Rng};

use super::{Layer, LayerKind, NDim, Shape};
use crate::{config::TransformConfig, MorphErr, Result};

/// Instantiates a layer of the given kind that fits right after a tensor shaped `input_shape`.
///
/// Dense layers keep the incoming width, dropout uses the configured dense rate and pooling samples
/// its kernel from the configured sizes.
///
/// # Arguments
/// * `kind` - The kind of layer to create.
/// * `input_shape` - The shape the new layer will receive.
/// * `n_dim` - The spatial dimensionality of the network.
/// * `config` - The transform configuration.
/// * `rng` - The random source for sampled parameters.
///
/// # Returns
/// The new layer or an error if `input_shape` is unresolved.
pub fn create_layer<R: Rng>(
    kind: LayerKind,
    input_shape: &Shape,
    n_dim: NDim,
    config: &TransformConfig,
    rng: &mut R,
) -> Result<Layer> {
    let width = match input_shape.last() {
        Some(width) if input_shape.is_resolved() => width,
        _ => {
            return Err(MorphErr::InvalidShape {
                what: "new layer input",
                shape: input_shape.clone(),
            });
        }
    };

    let layer = match kind {
        LayerKind::Dense => Layer::dense(width),
        LayerKind::ReLU => Layer::relu(),
        LayerKind::Dropout => Layer::dropout(config.dense_dropout_rate, n_dim),
        LayerKind::BatchNorm => Layer::batch_norm(n_dim),
        LayerKind::Pooling => {
            let kernel_size = config.pooling_kernel_sizes.choose(rng).ok_or_else(|| {
                MorphErr::InvalidConfig("pooling_kernel_sizes must not be empty".into())
            })?;
            Layer::pooling(*kernel_size, n_dim)
        }
        LayerKind::Flatten => Layer::flatten(),
    };

    Ok(layer)
}
