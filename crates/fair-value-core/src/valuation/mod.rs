pub mod aggregate;
pub mod comps;
pub mod dcf;
pub mod methods;
pub mod metrics;
pub mod sensitivity;
