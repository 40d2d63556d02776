pub mod gateway;

pub use gateway::{GatewayService, HealthReport, HistoryPage};
