use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    NewOfferEvent,
    OfferDecidedEvent,
    PaymentRefundedEvent,
    PaymentReleasedEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub new_offer_producer: Vec<EventProducer<NewOfferEvent>>,
    pub offer_decided_producer: Vec<EventProducer<OfferDecidedEvent>>,
    pub payment_released_producer: Vec<EventProducer<PaymentReleasedEvent>>,
    pub payment_refunded_producer: Vec<EventProducer<PaymentRefundedEvent>>,
}

pub struct EventHandlers {
    pub on_new_offer: Option<EventHandler<NewOfferEvent>>,
    pub on_offer_decided: Option<EventHandler<OfferDecidedEvent>>,
    pub on_payment_released: Option<EventHandler<PaymentReleasedEvent>>,
    pub on_payment_refunded: Option<EventHandler<PaymentRefundedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_new_offer = hooks.on_new_offer.map(|f| EventHandler::new(buffer_size, f));
        let on_offer_decided = hooks.on_offer_decided.map(|f| EventHandler::new(buffer_size, f));
        let on_payment_released = hooks.on_payment_released.map(|f| EventHandler::new(buffer_size, f));
        let on_payment_refunded = hooks.on_payment_refunded.map(|f| EventHandler::new(buffer_size, f));
        Self { on_new_offer, on_offer_decided, on_payment_released, on_payment_refunded }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_new_offer {
            result.new_offer_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_offer_decided {
            result.offer_decided_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_released {
            result.payment_released_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_refunded {
            result.payment_refunded_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_new_offer {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_offer_decided {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_payment_released {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_payment_refunded {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_new_offer: Option<Handler<NewOfferEvent>>,
    pub on_offer_decided: Option<Handler<OfferDecidedEvent>>,
    pub on_payment_released: Option<Handler<PaymentReleasedEvent>>,
    pub on_payment_refunded: Option<Handler<PaymentRefundedEvent>>,
}

impl EventHooks {
    pub fn on_new_offer<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(NewOfferEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_new_offer = Some(Arc::new(f));
        self
    }

    pub fn on_offer_decided<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OfferDecidedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_offer_decided = Some(Arc::new(f));
        self
    }

    pub fn on_payment_released<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentReleasedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_released = Some(Arc::new(f));
        self
    }

    pub fn on_payment_refunded<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentRefundedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_refunded = Some(Arc::new(f));
        self
    }
}
