pub mod opts;
pub mod probe;
pub mod publish;
pub mod relay;
