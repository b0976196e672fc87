pub mod payload;
pub mod pipeline;

pub use payload::{render, RenderedMessage, DEFAULT_BODY};
pub use pipeline::{DeliveryOutcome, NotificationPipeline};
