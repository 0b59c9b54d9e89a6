// Domain layer - Pure collector types and state machines, no I/O
pub mod report;
pub mod sample;
pub mod spike;
pub mod window;
