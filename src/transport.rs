pub use villa_ws_tokio_transport::TokioWebSocketTransportFactory;
pub use villacore::net::{Transport, TransportEvent, TransportFactory};
