pub mod background;
pub mod frames;
pub mod outputs;
pub mod registry;
pub mod uploads;
pub mod video;
pub mod worker;
