pub mod gradients;
pub mod network;
pub mod spec;

pub use gradients::{batch_gradients, BatchGradients, Gradients};
pub use network::{ForwardCache, Network};
pub use spec::Architecture;
