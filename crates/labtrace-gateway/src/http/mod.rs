pub mod admin;
pub mod health;
pub mod ingest;
pub mod insight;
pub mod jobs;
pub mod sessions;
