pub mod comment_status_route;
pub mod submit_comments_route;
