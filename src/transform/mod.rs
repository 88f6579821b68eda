mod operators;
mod transformer;

pub use operators::{
    create_new_layer, to_deeper_graph, to_skip_connection_graph, to_wider_graph,
    valid_connections, Operator,
};
pub use transformer::{transform, transform_many, Transformer};
