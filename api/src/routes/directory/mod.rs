pub mod detach_attachment_route;
pub mod upsert_attachment_route;
pub mod upsert_connection_route;
