pub mod dispatcher;
pub mod inbound;
pub mod registry;
pub mod signing;

pub use dispatcher::{
    DispatcherConfig, WebhookDispatcher, EVENT_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
pub use inbound::{InboundError, InboundEvent, InboundOutcome, InboundWebhookHandler, PriceChange};
pub use registry::{InMemorySubscriptionStore, RegistryError, SubscriptionStore, WebhookRegistry};
pub use signing::{sign_payload, verify_signature, SigningError};
