// Integrations with systems outside the engine

pub mod pose;
