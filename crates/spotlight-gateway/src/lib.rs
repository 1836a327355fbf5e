mod controller;
mod frame;
mod routes;
mod server;
mod state;

pub use controller::{EventStreamController, Termination};
pub use frame::{WireFrame, KEEPALIVE_FRAME};
pub use server::GatewayServer;
