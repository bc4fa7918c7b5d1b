pub mod bad_images;
pub mod config;
pub mod error;
pub mod events;
pub mod layout;
pub mod list;
pub mod meta;
pub mod orientation;
pub mod settings;
pub mod source;
pub mod tasks {
    pub mod controller;
    pub mod loader;
    pub mod preload;
    pub mod viewer;
}
