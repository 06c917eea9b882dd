pub mod inbound;
pub mod outbound;
pub mod tls;
pub mod ws;
