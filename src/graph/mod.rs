mod ops;
mod shapes;
mod skip;

use std::{
    collections::HashMap,
    fmt::{self, Display},
};

pub use skip::{SkipConnection, SkipKind};

use crate::{
    layers::{Layer, LayerDescriptor, LayerId, LayerKind, NDim, Shape},
    MorphErr, Result,
};

/// A network descriptor: a directed graph over layer descriptors.
///
/// Layers live in an arena indexed by `LayerId`. The main chain is given by `head` and the
/// sequential `next` map, skip connections are kept as explicit id triples and additive skips
/// between layers of different width own a dense projection layer that lives in the arena but off
/// the main chain.
#[derive(Debug, Clone)]
pub struct Graph {
    input_shape: Shape,
    n_dim: NDim,
    layers: Vec<LayerDescriptor>,
    head: Option<LayerId>,
    next: HashMap<LayerId, LayerId>,
    skips: Vec<SkipConnection>,
    projections: HashMap<SkipConnection, LayerId>,
}

impl Graph {
    /// Creates a new empty `Graph`.
    ///
    /// # Arguments
    /// * `input_shape` - The shape of a single input sample.
    /// * `n_dim` - The spatial dimensionality of the network.
    ///
    /// # Returns
    /// The graph or an error if `input_shape` is unresolved.
    pub fn new(input_shape: Shape, n_dim: NDim) -> Result<Self> {
        if !input_shape.is_resolved() {
            return Err(MorphErr::InvalidShape {
                what: "graph input",
                shape: input_shape,
            });
        }

        Ok(Self {
            input_shape,
            n_dim,
            layers: Vec::new(),
            head: None,
            next: HashMap::new(),
            skips: Vec::new(),
            projections: HashMap::new(),
        })
    }

    /// Creates a new `Graph` chaining the given layers in order.
    pub fn sequential<I>(input_shape: Shape, n_dim: NDim, layers: I) -> Result<Self>
    where
        I: IntoIterator<Item = Layer>,
    {
        let mut graph = Self::new(input_shape, n_dim)?;
        for layer in layers {
            graph.push(layer)?;
        }

        Ok(graph)
    }

    /// Appends a layer at the end of the main chain.
    ///
    /// # Returns
    /// The id of the new layer or an error if it cannot receive the current output shape.
    pub fn push(&mut self, layer: Layer) -> Result<LayerId> {
        let tail = self.main_chain().last().copied();
        let input = self.output_shape()?;

        let id = self.layers.len();
        let descriptor =
            LayerDescriptor::new(layer, input.clone()).map_err(|_| MorphErr::InvalidOperation {
                op: "append",
                layer_id: id,
                reason: format!("{layer} cannot receive {input}"),
            })?;

        self.layers.push(descriptor);
        match tail {
            Some(tail) => {
                self.next.insert(tail, id);
            }
            None => self.head = Some(id),
        }

        Ok(id)
    }

    pub fn input_shape(&self) -> &Shape {
        &self.input_shape
    }

    pub fn n_dim(&self) -> NDim {
        self.n_dim
    }

    /// The amount of layers in the arena, projections included.
    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, id: LayerId) -> Option<&LayerDescriptor> {
        self.layers.get(id)
    }

    pub fn skips(&self) -> &[SkipConnection] {
        &self.skips
    }

    pub fn has_skip(&self, skip: &SkipConnection) -> bool {
        self.skips.contains(skip)
    }

    /// The projection layer sitting on an additive skip, if its ends differ in width.
    pub fn projection(&self, skip: &SkipConnection) -> Option<LayerId> {
        self.projections.get(skip).copied()
    }

    /// The layer ids of the main chain, from input to output.
    pub fn main_chain(&self) -> Vec<LayerId> {
        let mut chain = Vec::with_capacity(self.layers.len());
        let mut curr = self.head;

        while let Some(id) = curr {
            chain.push(id);
            curr = self.next.get(&id).copied();
        }

        chain
    }

    /// The shape of the network's output.
    pub fn output_shape(&self) -> Result<Shape> {
        match self.main_chain().last() {
            Some(&tail) => self.merged_output_shape(tail),
            None => Ok(self.input_shape.clone()),
        }
    }

    /// The shape flowing out of a layer once every skip connection sinking into it is merged.
    ///
    /// Additive merges keep the layer's own shape, concatenative merges append the width of each
    /// source.
    pub fn merged_output_shape(&self, id: LayerId) -> Result<Shape> {
        let output = self.descriptor(id)?.output_shape();
        let mut width = output.last().unwrap_or(0);

        for skip in self.skips.iter().filter(|s| s.sink == id) {
            if skip.kind == SkipKind::Concat {
                let source = self.merged_output_shape(skip.source)?.last().unwrap_or(0);
                width = width.checked_add(source).ok_or_else(|| MorphErr::InvalidShape {
                    what: "oversized merged output",
                    shape: output.clone(),
                })?;
            }
        }

        Ok(output.with_last(width))
    }

    /// Returns the total amount of learnable parameters, projections included, saturating at
    /// `usize::MAX`.
    pub fn size(&self) -> usize {
        self.layers
            .iter()
            .fold(0, |acc, layer| acc.saturating_add(layer.size()))
    }

    /// Dense layers that can be widened, in main chain order.
    ///
    /// The last dense layer defines the network's output and is never eligible. A dense layer is
    /// also skipped when its output width is unresolved or when a flatten or pooling layer sits
    /// between it and the next dense layer.
    pub fn wide_layer_ids(&self) -> Vec<LayerId> {
        let chain = self.main_chain();
        let dense: Vec<usize> = chain
            .iter()
            .enumerate()
            .filter(|(_, id)| self.layers[**id].is(LayerKind::Dense))
            .map(|(pos, _)| pos)
            .collect();

        dense
            .windows(2)
            .filter(|w| {
                let output = self.layers[chain[w[0]]].output_shape();
                let passthrough = chain[w[0] + 1..w[1]]
                    .iter()
                    .all(|&id| self.layers[id].layer().preserves_shape());

                output.last().is_some_and(|width| width > 0) && passthrough
            })
            .map(|w| chain[w[0]])
            .collect()
    }

    /// Layers after which a new layer may be inserted: the main chain minus its output layer.
    pub fn deep_layer_ids(&self) -> Vec<LayerId> {
        let mut chain = self.main_chain();
        chain.pop();
        chain
    }

    /// Layers that may be the end of a skip connection, in main chain order.
    ///
    /// Derived from `deep_layer_ids` without its last element, so a skip never sinks into the
    /// output layer nor its predecessor. Pooling and flatten layers, and layers right before a
    /// flatten, are left out since merging across a flatten breaks the shape algebra.
    pub fn skip_connection_layer_ids(&self) -> Vec<LayerId> {
        let mut ids = self.deep_layer_ids();
        ids.pop();

        ids.retain(|id| {
            let before_flatten = self
                .next
                .get(id)
                .is_some_and(|next| self.layers[*next].is(LayerKind::Flatten));
            let kind = self.layers[*id].kind();

            !before_flatten && !matches!(kind, LayerKind::Pooling | LayerKind::Flatten)
        });

        ids
    }

    /// Deep copies this graph, keeping every layer id.
    ///
    /// # Returns
    /// The copy or an allocation error if memory could not be reserved for it.
    pub fn try_clone(&self) -> Result<Self> {
        let mut layers = Vec::new();
        layers.try_reserve_exact(self.layers.len())?;
        layers.extend(self.layers.iter().cloned());

        let mut next = HashMap::new();
        next.try_reserve(self.next.len())?;
        next.extend(self.next.iter().map(|(&a, &b)| (a, b)));

        let mut skips = Vec::new();
        skips.try_reserve_exact(self.skips.len())?;
        skips.extend_from_slice(&self.skips);

        let mut projections = HashMap::new();
        projections.try_reserve(self.projections.len())?;
        projections.extend(self.projections.iter().map(|(&s, &id)| (s, id)));

        Ok(Self {
            input_shape: self.input_shape.clone(),
            n_dim: self.n_dim,
            layers,
            head: self.head,
            next,
            skips,
            projections,
        })
    }

    fn descriptor(&self, id: LayerId) -> Result<&LayerDescriptor> {
        self.layers.get(id).ok_or(MorphErr::UnknownLayer(id))
    }
}

impl Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "graph: input {}, {}D, {} parameters",
            self.input_shape,
            self.n_dim.spatial(),
            self.size()
        )?;

        for id in self.main_chain() {
            let desc = &self.layers[id];
            writeln!(
                f,
                "  {id}: {} {} -> {}",
                desc.layer(),
                desc.input_shape(),
                desc.output_shape()
            )?;
        }

        for skip in &self.skips {
            match self.projection(skip) {
                Some(pid) => writeln!(f, "  skip {skip} through {}", self.layers[pid].layer())?,
                None => writeln!(f, "  skip {skip}")?,
            }
        }

        Ok(())
    }
}
