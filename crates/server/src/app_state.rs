use cms::SqliteCms;
use site_api::ApiContext;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    /// Set when content lives in the local store; `/healthz` probes it.
    pub(crate) store: Option<SqliteCms>,
}
