pub mod app;
pub mod config;
pub mod editor;
pub mod error;
pub mod logging;
pub mod markup;
pub mod migrate;
pub mod model;
pub mod nav;
pub mod render;
pub mod search;
pub mod storage;
pub mod timeline;
pub mod ui;
