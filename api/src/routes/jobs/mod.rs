pub mod cancel_job_route;
pub mod job_status_route;
pub mod start_job_route;
