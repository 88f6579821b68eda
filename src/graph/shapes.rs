use std::collections::{HashMap, HashSet};

use super::{Graph, SkipConnection, SkipKind};
use crate::{
    layers::{Layer, LayerDescriptor, LayerId, Shape},
    MorphErr, Result,
};

/// The descriptors that must change for every shape of a graph to agree with its input.
#[derive(Debug, Default)]
pub(super) struct ShapePlan {
    layers: Vec<(LayerId, LayerDescriptor)>,
    projections: Vec<(SkipConnection, LayerDescriptor)>,
}

impl Graph {
    /// Re-infers every shape from the graph's input without touching the graph.
    ///
    /// Walks the main chain feeding each layer the merged output of its predecessor. Dense layers
    /// adopt whatever width they receive, shape-preserving layers follow along. Additive skips
    /// whose ends differ in width get a projection planned, existing projections are resized.
    pub(super) fn plan_shapes(&self) -> Result<ShapePlan> {
        let mut plan = ShapePlan::default();
        let mut merged: HashMap<LayerId, Shape> = HashMap::with_capacity(self.layers.len());
        let mut prev = self.input_shape.clone();

        for id in self.main_chain() {
            let current = &self.layers[id];
            let output = if current.input_shape() == &prev {
                current.output_shape().clone()
            } else {
                let updated =
                    current
                        .with_input(prev.clone())
                        .map_err(|_| MorphErr::ShapeMismatch {
                            layer_id: id,
                            expected: current.input_shape().clone(),
                            got: prev.clone(),
                        })?;
                let output = updated.output_shape().clone();
                plan.layers.push((id, updated));
                output
            };

            let mut width = output.last().unwrap_or(0);
            for skip in self.skips.iter().filter(|s| s.sink == id) {
                let incompatible = |reason: &'static str| MorphErr::IncompatibleSkip {
                    source: skip.source,
                    sink: skip.sink,
                    kind: skip.kind,
                    reason,
                };

                let source = merged
                    .get(&skip.source)
                    .ok_or_else(|| incompatible("the source does not precede the sink"))?;

                if source.leading() != output.leading() {
                    return Err(incompatible("leading dimensions differ"));
                }

                match skip.kind {
                    SkipKind::Add => self.plan_projection(*skip, source, &output, &mut plan)?,
                    SkipKind::Concat => {
                        width = width
                            .checked_add(source.last().unwrap_or(0))
                            .ok_or_else(|| MorphErr::InvalidShape {
                                what: "oversized merged output",
                                shape: output.clone(),
                            })?;
                    }
                }
            }

            let shape = output.with_last(width);
            merged.insert(id, shape.clone());
            prev = shape;
        }

        Ok(plan)
    }

    fn plan_projection(
        &self,
        skip: SkipConnection,
        source: &Shape,
        sink: &Shape,
        plan: &mut ShapePlan,
    ) -> Result<()> {
        let existing = self.projection(&skip).map(|pid| &self.layers[pid]);
        if existing.is_none() && source == sink {
            return Ok(());
        }

        let units = sink.last().unwrap_or(0);
        let projection = LayerDescriptor::new(Layer::dense(units), source.clone())?;
        if existing != Some(&projection) {
            plan.projections.push((skip, projection));
        }

        Ok(())
    }

    /// Applies a shape plan, making every declared shape consistent again.
    pub(super) fn propagate_shapes(&mut self) -> Result<()> {
        let plan = self.plan_shapes()?;

        for (id, descriptor) in plan.layers {
            self.layers[id] = descriptor;
        }

        for (skip, descriptor) in plan.projections {
            match self.projections.get(&skip) {
                Some(&pid) => self.layers[pid] = descriptor,
                None => {
                    let pid = self.layers.len();
                    self.layers.push(descriptor);
                    self.projections.insert(skip, pid);
                }
            }
        }

        Ok(())
    }

    /// Checks every structural and shape invariant of the graph.
    ///
    /// # Returns
    /// An error describing the first broken invariant found.
    pub fn validate(&self) -> Result<()> {
        let chain = self.main_chain();
        if chain.len() + self.projections.len() != self.layers.len() {
            return Err(MorphErr::InvalidGraph(format!(
                "{} layers in the arena but {} on the main chain and {} projections",
                self.layers.len(),
                chain.len(),
                self.projections.len()
            )));
        }

        let positions: HashMap<LayerId, usize> =
            chain.iter().enumerate().map(|(pos, &id)| (id, pos)).collect();

        let mut seen = HashSet::with_capacity(self.skips.len());
        for skip in &self.skips {
            if !seen.insert(*skip) {
                return Err(MorphErr::InvalidGraph(format!("skip {skip} is duplicated")));
            }

            match (positions.get(&skip.source), positions.get(&skip.sink)) {
                (Some(a), Some(b)) if a < b && b + 1 < chain.len() => {}
                _ => {
                    return Err(MorphErr::InvalidGraph(format!(
                        "skip {skip} does not go forward between hidden layers of the main chain"
                    )));
                }
            }
        }

        for (skip, pid) in &self.projections {
            if skip.kind != SkipKind::Add || !seen.contains(skip) || positions.contains_key(pid) {
                return Err(MorphErr::InvalidGraph(format!(
                    "layer {pid} is a dangling projection for {skip}"
                )));
            }
        }

        let plan = self.plan_shapes()?;
        if let Some((id, updated)) = plan.layers.first() {
            return Err(MorphErr::ShapeMismatch {
                layer_id: *id,
                expected: self.layers[*id].input_shape().clone(),
                got: updated.input_shape().clone(),
            });
        }

        if let Some((skip, _)) = plan.projections.first() {
            return Err(MorphErr::IncompatibleSkip {
                source: skip.source,
                sink: skip.sink,
                kind: skip.kind,
                reason: "the projection does not match the merged shapes",
            });
        }

        Ok(())
    }
}
