pub mod payment_service;

pub use payment_service::{PaymentCollaborators, PaymentOptions, PaymentService};
