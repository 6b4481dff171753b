use axum::{body::Body, extract::Request, middleware::Next, response::Response};
use futures::StreamExt;
use site_api::DeferredWork;

/// Hands the queued work to the runtime once the response body is gone,
/// either fully written or abandoned by the client.
struct SpawnOnDrop(DeferredWork);

impl Drop for SpawnOnDrop {
    fn drop(&mut self) {
        self.0.spawn_all();
    }
}

/// Gives the handler a [`DeferredWork`] queue as a request extension and
/// runs whatever it scheduled only after the body has been delivered.
pub(crate) async fn run_after_response(mut request: Request, next: Next) -> Response {
    let deferred = DeferredWork::new();
    request.extensions_mut().insert(deferred.clone());

    let response = next.run(request).await;
    let guard = SpawnOnDrop(deferred);
    let (parts, body) = response.into_parts();
    let body = Body::from_stream(body.into_data_stream().map(move |chunk| {
        let _guard = &guard;
        chunk
    }));
    Response::from_parts(parts, body)
}
