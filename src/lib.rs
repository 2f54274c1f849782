pub mod config {
    pub mod env_loader;
    pub mod model;
}

pub mod events {
    pub mod api;
    pub mod dto;
    pub mod feed;
    pub mod model;
    pub mod processor;
}

pub mod tracing;
