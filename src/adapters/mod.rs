// Adapters layer: concrete implementations of the domain ports (http classifier, terminal map)
// plus the command script front end.

pub mod http;
pub mod script;
pub mod terminal;
