pub mod dot;
mod graphviz;

pub use dot::render_dot;
pub use graphviz::GraphvizBuilder;
