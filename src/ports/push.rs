use crate::error::DeliveryError;
use crate::types::push::PushSubscription;

pub trait PushSender: Clone + Send + Sync + 'static {
    type Fut<'a>: Future<Output = Result<(), DeliveryError>> + Send + 'a
    where
        Self: 'a;

    fn send<'a>(&'a self, subscription: &'a PushSubscription, payload: &'a [u8]) -> Self::Fut<'a>;
}
