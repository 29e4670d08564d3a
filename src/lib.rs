pub mod api;
pub mod app;
pub mod config;
pub mod gallery;
pub mod intake;
pub mod ui;
pub mod util;

pub use api::{ConvertedFile, ConverterClient};
pub use app::App;
pub use config::AppConfig;
pub use gallery::GalleryState;
pub use intake::PendingUploads;
pub use util::format_bytes;
