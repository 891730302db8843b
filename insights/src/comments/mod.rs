//! Review-comment submission: idempotent record store + batch submitter.

pub mod store;
pub mod submit;

pub use store::{AttemptOutcome, CommentKey, CommentStore, ReviewCommentRecord, content_hash};
pub use submit::{
    CandidateComment, CommentResult, PrContext, SubmitReport, posted_hashes, submit_comments,
};
