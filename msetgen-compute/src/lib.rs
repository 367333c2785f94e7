pub mod block_state;
pub mod cancellation;
pub mod generator;
pub mod iterator;
pub mod lanes;
pub mod limb_buffer;
pub mod vector_math;

pub use block_state::{BlockIterationState, RowCursor};
pub use cancellation::{CancelAfterPolls, CancellationFlag, CancellationSignal, NeverCancel};
pub use generator::MapSectionGenerator;
pub use iterator::SamplePointIterator;
pub use limb_buffer::{LimbBuffer, WideLimbBuffer};
pub use vector_math::VectorFixedPointMath;

// Re-export core types for convenience
pub use msetgen_core::*;
