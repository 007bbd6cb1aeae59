// HTTP handlers, one module per resource

pub mod agents;
pub mod system;
pub mod workflows;
