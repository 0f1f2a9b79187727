use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use homebuyer::config::NotificationConfig;
use homebuyer::workflows::buyer::{
    BuyerWorkflowService, EmailNotifier, InMemoryBuyerStore, MailTransport, ViewCacheRegistry,
};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type BuyerService<T> =
    BuyerWorkflowService<InMemoryBuyerStore, EmailNotifier<T>, ViewCacheRegistry>;

/// Handles kept alongside the service so callers can inspect side effects.
pub(crate) struct BuyerStack<T> {
    pub(crate) service: Arc<BuyerService<T>>,
    pub(crate) store: Arc<InMemoryBuyerStore>,
    pub(crate) notifier: Arc<EmailNotifier<T>>,
    pub(crate) views: Arc<ViewCacheRegistry>,
}

pub(crate) fn buyer_stack<T>(transport: T, config: &NotificationConfig) -> BuyerStack<T>
where
    T: MailTransport + 'static,
{
    let store = Arc::new(InMemoryBuyerStore::default());
    let notifier = Arc::new(EmailNotifier::new(transport, config));
    let views = Arc::new(ViewCacheRegistry::default());
    let service = Arc::new(BuyerWorkflowService::new(
        store.clone(),
        notifier.clone(),
        views.clone(),
    ));

    BuyerStack {
        service,
        store,
        notifier,
        views,
    }
}
