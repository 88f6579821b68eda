use super::{Graph, SkipConnection, SkipKind};
use crate::{
    layers::{Layer, LayerDescriptor, LayerId},
    MorphErr, Result,
};

// Every operator stages its change on a copy and only commits it once the shapes of the whole
// graph agree again, so a failed operator leaves the graph untouched.
impl Graph {
    /// Widens a dense layer and propagates the new width to every downstream consumer.
    ///
    /// # Arguments
    /// * `layer_id` - The dense layer to widen, must be one of `wide_layer_ids`.
    /// * `n_add` - The amount of units to add.
    ///
    /// # Returns
    /// An `InvalidOperation` error if the layer cannot be widened.
    pub fn to_wider_model(&mut self, layer_id: LayerId, n_add: usize) -> Result<()> {
        let descriptor = self.descriptor(layer_id)?;
        let invalid = |reason: &str| MorphErr::InvalidOperation {
            op: "widen",
            layer_id,
            reason: reason.to_string(),
        };

        let units = descriptor
            .units()
            .ok_or_else(|| invalid("only dense layers can be widened"))?;

        if n_add == 0 {
            return Err(invalid("the amount of units to add must be positive"));
        }

        if !self.wide_layer_ids().contains(&layer_id) {
            return Err(invalid("the layer is not eligible for widening"));
        }

        let widened_units = units
            .checked_add(n_add)
            .ok_or_else(|| MorphErr::InvalidShape {
                what: "oversized widened output",
                shape: descriptor.output_shape().clone(),
            })?;
        let widened = descriptor.with_layer(Layer::dense(widened_units))?;

        let mut staged = self.try_clone()?;
        staged.layers[layer_id] = widened;
        staged.propagate_shapes()?;
        *self = staged;

        Ok(())
    }

    /// Inserts a new layer right after `layer_id` on the main chain.
    ///
    /// The new layer receives the merged output of `layer_id` and the former successor is rewired
    /// to follow it.
    ///
    /// # Arguments
    /// * `layer_id` - A layer on the main chain.
    /// * `new_layer` - The layer to insert.
    ///
    /// # Returns
    /// The id of the inserted layer or an error if it doesn't fit there.
    pub fn to_deeper_model(&mut self, layer_id: LayerId, new_layer: Layer) -> Result<LayerId> {
        self.descriptor(layer_id)?;
        let invalid = |reason: String| MorphErr::InvalidOperation {
            op: "deepen",
            layer_id,
            reason,
        };

        if !self.main_chain().contains(&layer_id) {
            return Err(invalid("the layer is not on the main chain".into()));
        }

        let input = self.merged_output_shape(layer_id)?;
        let descriptor = LayerDescriptor::new(new_layer, input.clone())
            .map_err(|_| invalid(format!("{new_layer} cannot receive {input}")))?;

        let mut staged = self.try_clone()?;
        let new_id = staged.layers.len();
        staged.layers.push(descriptor);

        if let Some(successor) = staged.next.insert(layer_id, new_id) {
            staged.next.insert(new_id, successor);
        }

        staged.propagate_shapes()?;
        *self = staged;

        Ok(new_id)
    }

    /// Registers an additive skip connection from `a_id` to `b_id`.
    ///
    /// A dense projection is inserted on the skip when both ends differ in width.
    pub fn to_add_skip_model(&mut self, a_id: LayerId, b_id: LayerId) -> Result<()> {
        self.add_skip_connection(SkipConnection::new(a_id, b_id, SkipKind::Add))
    }

    /// Registers a concatenative skip connection from `a_id` to `b_id`, the merged width of `b_id`
    /// becomes the sum of both widths.
    pub fn to_concat_skip_model(&mut self, a_id: LayerId, b_id: LayerId) -> Result<()> {
        self.add_skip_connection(SkipConnection::new(a_id, b_id, SkipKind::Concat))
    }

    /// Registers a skip connection of any kind.
    ///
    /// # Returns
    /// An `IncompatibleSkip` error if `check_skip` rejects it.
    pub fn add_skip_connection(&mut self, skip: SkipConnection) -> Result<()> {
        self.check_skip(&skip)?;

        let mut staged = self.try_clone()?;
        staged.skips.push(skip);
        staged.propagate_shapes()?;
        *self = staged;

        Ok(())
    }

    /// Registers an additive skip connection that carries a dense projection even when both ends
    /// agree in width.
    ///
    /// A projection outlives the width mismatch that created it, so rebuilding an exported graph
    /// needs this to restore it.
    pub fn add_projected_skip(&mut self, skip: SkipConnection) -> Result<()> {
        self.check_skip(&skip)?;
        if skip.kind != SkipKind::Add {
            return Err(MorphErr::IncompatibleSkip {
                source: skip.source,
                sink: skip.sink,
                kind: skip.kind,
                reason: "only additive skips carry a projection",
            });
        }

        let input = self.merged_output_shape(skip.source)?;
        let units = self.descriptor(skip.sink)?.output_shape().last().unwrap_or(0);
        let projection = LayerDescriptor::new(Layer::dense(units), input)?;

        let mut staged = self.try_clone()?;
        let pid = staged.layers.len();
        staged.layers.push(projection);
        staged.projections.insert(skip, pid);
        staged.skips.push(skip);
        staged.propagate_shapes()?;
        *self = staged;

        Ok(())
    }

    /// Checks whether a skip connection could be added to this graph.
    ///
    /// Both ends must be distinct layers of the main chain, the source must strictly precede the
    /// sink, the sink cannot be the output layer, the connection must be new and both ends must
    /// agree on every dimension but the last one.
    pub fn check_skip(&self, skip: &SkipConnection) -> Result<()> {
        let SkipConnection { source, sink, kind } = *skip;
        let incompatible = |reason: &'static str| -> Result<()> {
            Err(MorphErr::IncompatibleSkip {
                source,
                sink,
                kind,
                reason,
            })
        };

        self.descriptor(source)?;
        let sink_output = self.descriptor(sink)?.output_shape();

        if source == sink {
            return incompatible("source and sink must be distinct");
        }

        let chain = self.main_chain();
        let position = |id| chain.iter().position(|&c| c == id);
        let (Some(a), Some(b)) = (position(source), position(sink)) else {
            return incompatible("both ends must lie on the main chain");
        };

        if a >= b {
            return incompatible("the source must precede the sink");
        }

        if b + 1 == chain.len() {
            return incompatible("the sink is the output layer");
        }

        if self.has_skip(skip) {
            return incompatible("the connection already exists");
        }

        if self.merged_output_shape(source)?.leading() != sink_output.leading() {
            return incompatible("leading dimensions differ");
        }

        Ok(())
    }
}
