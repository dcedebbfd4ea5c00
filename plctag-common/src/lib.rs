pub mod error;
pub mod logger;
pub mod settings;

pub use error::{CommonError, CommonResult};
pub use logger::Logger;
pub use settings::{DeviceSettings, LogSettings, Settings};
