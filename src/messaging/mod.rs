mod frame;
mod router;

pub use frame::{Frame, FrameType};
pub use router::{FrameHandler, MessageRouter};
