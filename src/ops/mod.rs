pub mod recap_ops;
pub mod sample;
pub mod task_ops;
