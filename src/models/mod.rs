pub mod proxy_endpoint;
