pub mod ports;
pub mod publish_use_case;
