pub mod imu;
pub mod mux;
