pub mod async_balancer;
pub mod balancer;
pub mod loader;
