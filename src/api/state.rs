use std::sync::Arc;
use crate::{
    config::Settings,
    service::PaymentService,
};

#[derive(Clone)]
pub struct AppState {
    pub payment_service: Arc<PaymentService>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(payment_service: Arc<PaymentService>, settings: Arc<Settings>) -> Self {
        Self {
            payment_service,
            settings,
        }
    }
}
