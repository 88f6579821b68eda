use std::fmt::{self, Display};

use crate::{MorphErr, Result};

/// The shape of a tensor flowing between layers, excluding the batch dimension.
///
/// Shapes are channels-last: the final dimension is the feature (or channel) width and any leading
/// dimensions are spatial.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Shape(Vec<usize>);

impl Shape {
    /// Creates a new `Shape`.
    ///
    /// # Arguments
    /// * `dims` - The dimension sizes, outermost first.
    pub fn new<D: Into<Vec<usize>>>(dims: D) -> Self {
        Self(dims.into())
    }

    pub fn dims(&self) -> &[usize] {
        &self.0
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    /// The feature width of this shape, if it has any dimension at all.
    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }

    /// Every dimension but the last one.
    pub fn leading(&self) -> &[usize] {
        match self.0.split_last() {
            Some((_, leading)) => leading,
            None => &[],
        }
    }

    /// Returns a copy of this shape with its last dimension replaced by `width`.
    pub fn with_last(&self, width: usize) -> Self {
        let mut dims = self.0.clone();
        match dims.last_mut() {
            Some(last) => *last = width,
            None => dims.push(width),
        }

        Self(dims)
    }

    /// The amount of elements a tensor of this shape holds, `None` if it overflows.
    pub fn numel(&self) -> Option<usize> {
        self.0.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
    }

    /// A shape is resolved when it has at least one dimension and none of them is zero.
    pub fn is_resolved(&self) -> bool {
        !self.0.is_empty() && self.0.iter().all(|&d| d > 0)
    }
}

impl From<Vec<usize>> for Shape {
    fn from(value: Vec<usize>) -> Self {
        Self(value)
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(value: [usize; N]) -> Self {
        Self(value.to_vec())
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// The spatial dimensionality of a network, selects between the 1D/2D/3D variants of dropout,
/// batch normalization and pooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NDim {
    One,
    Two,
    Three,
}

impl NDim {
    /// The amount of spatial dimensions.
    pub fn spatial(self) -> usize {
        match self {
            NDim::One => 1,
            NDim::Two => 2,
            NDim::Three => 3,
        }
    }
}

impl TryFrom<usize> for NDim {
    type Error = MorphErr;

    fn try_from(value: usize) -> Result<Self> {
        match value {
            1 => Ok(NDim::One),
            2 => Ok(NDim::Two),
            3 => Ok(NDim::Three),
            other => Err(MorphErr::InvalidConfig(format!(
                "n_dim must be 1, 2 or 3, got {other}"
            ))),
        }
    }
}

impl From<NDim> for usize {
    fn from(value: NDim) -> Self {
        value.spatial()
    }
}
