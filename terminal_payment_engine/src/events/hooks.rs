use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, IntentOrphanedEvent, InvoicePaidEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub invoice_paid_producer: Vec<EventProducer<InvoicePaidEvent>>,
    pub intent_orphaned_producer: Vec<EventProducer<IntentOrphanedEvent>>,
}

impl EventProducers {
    pub async fn publish_invoice_paid(&self, event: InvoicePaidEvent) {
        for emitter in &self.invoice_paid_producer {
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_intent_orphaned(&self, event: IntentOrphanedEvent) {
        for emitter in &self.intent_orphaned_producer {
            emitter.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_invoice_paid: Option<EventHandler<InvoicePaidEvent>>,
    pub on_intent_orphaned: Option<EventHandler<IntentOrphanedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_invoice_paid = hooks.on_invoice_paid.map(|f| EventHandler::new(buffer_size, f));
        let on_intent_orphaned = hooks.on_intent_orphaned.map(|f| EventHandler::new(buffer_size, f));
        Self { on_invoice_paid, on_intent_orphaned }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_invoice_paid {
            result.invoice_paid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_intent_orphaned {
            result.intent_orphaned_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_invoice_paid {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_intent_orphaned {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_invoice_paid: Option<Handler<InvoicePaidEvent>>,
    pub on_intent_orphaned: Option<Handler<IntentOrphanedEvent>>,
}

impl EventHooks {
    pub fn on_invoice_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(InvoicePaidEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_invoice_paid = Some(Arc::new(f));
        self
    }

    pub fn on_intent_orphaned<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(IntentOrphanedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_intent_orphaned = Some(Arc::new(f));
        self
    }
}
