use std::{collections::HashMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    graph::{Graph, SkipKind},
    layers::Layer,
    Result,
};

/// The specification for the `Layer` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    Dense { units: usize },
    Relu,
    Dropout { rate: f32 },
    BatchNorm,
    Pooling { kernel_size: usize },
    Flatten,
}

/// The specification for a skip connection, its ends being indices into `GraphSpec::layers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipSpec {
    pub source: usize,
    pub sink: usize,
    pub kind: SkipKind,
    /// Whether an additive skip carries a dense projection. Mismatched widths always get one, this
    /// forces it when both ends agree.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub projection: bool,
}

/// The specification for the `Graph` struct.
///
/// Layers are listed in main chain order. Projections of additive skips are flagged on their
/// `SkipSpec`, their units follow from the width of the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    pub input_shape: Vec<usize>,
    #[serde(default = "default_n_dim")]
    pub n_dim: usize,
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub skips: Vec<SkipSpec>,
}

fn default_n_dim() -> usize {
    1
}

impl GraphSpec {
    /// Loads a `GraphSpec` from a JSON file.
    ///
    /// # Arguments
    /// * `path` - The path of the JSON file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl From<&Layer> for LayerSpec {
    fn from(value: &Layer) -> Self {
        match *value {
            Layer::Dense { units } => LayerSpec::Dense { units },
            Layer::ReLU => LayerSpec::Relu,
            Layer::Dropout { rate, .. } => LayerSpec::Dropout { rate },
            Layer::BatchNorm { .. } => LayerSpec::BatchNorm,
            Layer::Pooling { kernel_size, .. } => LayerSpec::Pooling { kernel_size },
            Layer::Flatten => LayerSpec::Flatten,
        }
    }
}

impl Graph {
    /// Exports this graph in main chain order, for a builder that turns it back into a model.
    pub fn to_spec(&self) -> GraphSpec {
        let chain = self.main_chain();
        let positions: HashMap<_, _> = chain.iter().enumerate().map(|(pos, &id)| (id, pos)).collect();

        let layers = chain
            .iter()
            .filter_map(|&id| self.layer(id))
            .map(|desc| LayerSpec::from(desc.layer()))
            .collect();

        let skips = self
            .skips()
            .iter()
            .filter_map(|skip| {
                Some(SkipSpec {
                    source: *positions.get(&skip.source)?,
                    sink: *positions.get(&skip.sink)?,
                    kind: skip.kind,
                    projection: self.projection(skip).is_some(),
                })
            })
            .collect();

        GraphSpec {
            input_shape: self.input_shape().dims().to_vec(),
            n_dim: self.n_dim().spatial(),
            layers,
            skips,
        }
    }
}
