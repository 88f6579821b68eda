use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{MorphErr, Result};

/// The search constraints of a transform round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Deepening is refused once a graph has this many deep-eligible layers.
    pub max_layers: usize,
    /// Neighbours whose size exceeds this budget are discarded.
    pub max_model_size: usize,
    /// The amount of neighbours to generate per parent.
    pub n_neighbours: usize,
    pub dense_dropout_rate: f32,
    /// Kernel sizes `create_layer` samples from when asked for a pooling layer. The deepen operator
    /// never inserts pooling, so only direct factory callers read this.
    pub pooling_kernel_sizes: Vec<usize>,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            max_layers: 500,
            max_model_size: 1 << 25,
            n_neighbours: 8,
            dense_dropout_rate: 0.5,
            pooling_kernel_sizes: vec![1, 3, 5],
        }
    }
}

impl TransformConfig {
    /// Loads a `TransformConfig` from a JSON file, missing fields take their default value.
    ///
    /// # Arguments
    /// * `path` - The path of the JSON file.
    ///
    /// # Returns
    /// The validated config or an error if the file cannot be read, parsed or is invalid.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every constraint is usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_layers == 0 {
            return Err(MorphErr::InvalidConfig(
                "max_layers must be greater than 0".into(),
            ));
        }

        if self.max_model_size == 0 {
            return Err(MorphErr::InvalidConfig(
                "max_model_size must be greater than 0".into(),
            ));
        }

        if self.n_neighbours == 0 {
            return Err(MorphErr::InvalidConfig(
                "n_neighbours must be greater than 0".into(),
            ));
        }

        if !(0.0..1.0).contains(&self.dense_dropout_rate) {
            return Err(MorphErr::InvalidConfig(format!(
                "dense_dropout_rate ({}) must be within [0, 1)",
                self.dense_dropout_rate
            )));
        }

        if self.pooling_kernel_sizes.is_empty() || self.pooling_kernel_sizes.contains(&0) {
            return Err(MorphErr::InvalidConfig(
                "pooling_kernel_sizes must be non-empty and contain no zeros".into(),
            ));
        }

        Ok(())
    }
}
