pub mod event;
pub mod invoice;
pub mod pagination;
pub mod payment;
pub mod payment_history;

pub use event::*;
pub use invoice::*;
pub use pagination::*;
pub use payment::*;
pub use payment_history::*;
