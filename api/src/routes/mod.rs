pub mod comments;
pub mod directory;
pub mod jobs;
