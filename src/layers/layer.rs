use std::fmt::{self, Display};

use super::{NDim, Shape};
use crate::{MorphErr, Result};

/// The tag of a layer, used to decide what operators may do around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Dense,
    ReLU,
    Dropout,
    BatchNorm,
    Pooling,
    Flatten,
}

impl Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LayerKind::Dense => "dense",
            LayerKind::ReLU => "relu",
            LayerKind::Dropout => "dropout",
            LayerKind::BatchNorm => "batch_norm",
            LayerKind::Pooling => "pooling",
            LayerKind::Flatten => "flatten",
        };

        write!(f, "{s}")
    }
}

/// A computational layer together with the parameters that affect its output shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Layer {
    Dense { units: usize },
    ReLU,
    Dropout { rate: f32, n_dim: NDim },
    BatchNorm { n_dim: NDim },
    Pooling { kernel_size: usize, n_dim: NDim },
    Flatten,
}
use Layer::*;

impl Layer {
    pub fn dense(units: usize) -> Self {
        Dense { units }
    }

    pub fn relu() -> Self {
        ReLU
    }

    pub fn dropout(rate: f32, n_dim: NDim) -> Self {
        Dropout { rate, n_dim }
    }

    pub fn batch_norm(n_dim: NDim) -> Self {
        BatchNorm { n_dim }
    }

    pub fn pooling(kernel_size: usize, n_dim: NDim) -> Self {
        Pooling { kernel_size, n_dim }
    }

    pub fn flatten() -> Self {
        Flatten
    }

    pub fn kind(&self) -> LayerKind {
        match self {
            Dense { .. } => LayerKind::Dense,
            ReLU => LayerKind::ReLU,
            Dropout { .. } => LayerKind::Dropout,
            BatchNorm { .. } => LayerKind::BatchNorm,
            Pooling { .. } => LayerKind::Pooling,
            Flatten => LayerKind::Flatten,
        }
    }

    /// Whether this layer outputs exactly the shape it receives.
    pub fn preserves_shape(&self) -> bool {
        matches!(self, ReLU | Dropout { .. } | BatchNorm { .. })
    }

    /// Infers the output shape of this layer given its input shape.
    ///
    /// # Arguments
    /// * `input` - The shape this layer receives.
    ///
    /// # Returns
    /// The output shape or an error if this layer cannot accept `input`.
    pub fn output_shape(&self, input: &Shape) -> Result<Shape> {
        if !input.is_resolved() {
            return Err(MorphErr::InvalidShape {
                what: "unresolved input",
                shape: input.clone(),
            });
        }

        match *self {
            Dense { units: 0 } => Err(MorphErr::InvalidShape {
                what: "dense output",
                shape: input.with_last(0),
            }),
            Dense { units } => {
                let width = input.last().unwrap_or(0);
                match width.checked_add(1).and_then(|w| w.checked_mul(units)) {
                    Some(_) => Ok(input.with_last(units)),
                    None => Err(MorphErr::InvalidShape {
                        what: "oversized dense output",
                        shape: input.with_last(units),
                    }),
                }
            }
            ReLU | Dropout { .. } | BatchNorm { .. } => Ok(input.clone()),
            Pooling { kernel_size, n_dim } => {
                if kernel_size == 0 || input.rank() != n_dim.spatial() + 1 {
                    return Err(MorphErr::InvalidShape {
                        what: "pooling input",
                        shape: input.clone(),
                    });
                }

                let mut dims: Vec<usize> =
                    input.leading().iter().map(|d| d / kernel_size).collect();
                dims.extend(input.last());

                let output = Shape::new(dims);
                if !output.is_resolved() {
                    return Err(MorphErr::InvalidShape {
                        what: "pooling output",
                        shape: output,
                    });
                }

                Ok(output)
            }
            Flatten => match input.numel() {
                Some(numel) => Ok(Shape::new([numel])),
                None => Err(MorphErr::InvalidShape {
                    what: "oversized flatten input",
                    shape: input.clone(),
                }),
            },
        }
    }

    /// Returns the amount of learnable parameters this layer holds given its input shape, saturating
    /// at `usize::MAX`.
    pub fn size(&self, input: &Shape) -> usize {
        let width = input.last().unwrap_or(0);

        match self {
            Dense { units } => width.saturating_add(1).saturating_mul(*units),
            BatchNorm { .. } => width.saturating_mul(2),
            _ => 0,
        }
    }
}

impl Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dense { units } => write!(f, "dense({units})"),
            Dropout { rate, .. } => write!(f, "dropout({rate})"),
            Pooling { kernel_size, .. } => write!(f, "pooling({kernel_size})"),
            other => write!(f, "{}", other.kind()),
        }
    }
}
