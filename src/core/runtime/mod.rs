pub mod queue;
pub mod runner;

pub use queue::LatestQueue;
pub use runner::{
    ChannelSink, DetectionRunner, FrameSource, OcrTeamTracker, ResultEvent, ResultSink,
    RuntimeConfig, TeamTracker,
};
