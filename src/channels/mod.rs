pub mod flows;
pub mod stdio;
pub mod traits;

pub use flows::FlowRouter;
pub use stdio::StdioTransport;
pub use traits::{ChannelTransport, InboundEvent, MediaKind, MediaRef};
