use {
    super::error::ProviderError,
    super::id::ExternalOrderId,
    super::order::OrderStatus,
    std::{future::Future, pin::Pin},
};

/// Reads an order's status from the fulfillment provider. Implementations
/// return only `Pending`, `Processing`, `Completed` or `Cancelled`.
pub trait StatusProvider: Send + Sync {
    fn fetch_status(
        &self,
        id: &ExternalOrderId,
    ) -> Pin<Box<dyn Future<Output = Result<OrderStatus, ProviderError>> + Send + '_>>;
}
