pub mod common;
pub mod http;
pub mod socks5;
pub mod transport;
pub mod utils;
