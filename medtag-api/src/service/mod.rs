pub mod gateway;
pub mod ops_alert;

pub use gateway::*;
pub use ops_alert::*;
