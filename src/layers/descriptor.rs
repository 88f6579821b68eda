use super::{Layer, LayerKind, Shape};
use crate::Result;

/// An immutable description of one layer: what it computes and the shapes it consumes and
/// produces. Changing anything that affects a shape yields a new descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDescriptor {
    layer: Layer,
    input_shape: Shape,
    output_shape: Shape,
}

impl LayerDescriptor {
    /// Creates a new `LayerDescriptor`, inferring its output shape.
    ///
    /// # Arguments
    /// * `layer` - The layer being described.
    /// * `input_shape` - The shape the layer receives.
    ///
    /// # Returns
    /// The descriptor or an error if `layer` cannot accept `input_shape`.
    pub fn new(layer: Layer, input_shape: Shape) -> Result<Self> {
        let output_shape = layer.output_shape(&input_shape)?;

        Ok(Self {
            layer,
            input_shape,
            output_shape,
        })
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub fn kind(&self) -> LayerKind {
        self.layer.kind()
    }

    pub fn is(&self, kind: LayerKind) -> bool {
        self.kind() == kind
    }

    pub fn input_shape(&self) -> &Shape {
        &self.input_shape
    }

    pub fn output_shape(&self) -> &Shape {
        &self.output_shape
    }

    /// The unit count of a dense layer, `None` for every other kind.
    pub fn units(&self) -> Option<usize> {
        match self.layer {
            Layer::Dense { units } => Some(units),
            _ => None,
        }
    }

    /// Returns the amount of learnable parameters of the described layer.
    pub fn size(&self) -> usize {
        self.layer.size(&self.input_shape)
    }

    /// Describes the same layer fed with a different input shape.
    pub fn with_input(&self, input_shape: Shape) -> Result<Self> {
        Self::new(self.layer, input_shape)
    }

    /// Describes a different layer fed with the same input shape.
    pub fn with_layer(&self, layer: Layer) -> Result<Self> {
        Self::new(layer, self.input_shape.clone())
    }
}
