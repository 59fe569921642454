pub mod config {
    pub mod env_loader;
    pub mod model;
}
pub mod email {
    pub mod message;
    pub mod notifier;
    pub mod smtp;
}
pub mod ida {
    pub mod api;
    pub mod dto;
    pub mod extractor;
    pub mod model;
}
pub mod logging;
pub mod retry;
pub mod seen_store;
pub mod watcher;
