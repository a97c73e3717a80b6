mod manual;
mod task;
mod timeline;

pub use manual::ManualTimeline;
pub use task::{ScopedTask, TaskState};
pub use timeline::{DeferredBody, ThreadTimeline, Timeline};
