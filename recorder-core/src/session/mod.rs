pub mod protocol;
pub mod recorder;
pub mod worker;
