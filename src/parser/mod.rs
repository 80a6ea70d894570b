pub mod html;
pub mod metrics;
pub mod post;

pub use html::HistoryParser;
pub use metrics::{MetricParser, ReactionParser};
pub use post::{PostRecord, PostType, MEDIA_PLACEHOLDER};
