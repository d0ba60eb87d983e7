//! Test helpers shared by the unit tests.

use http::{Request, Response};
use kube::client::Body;
use kube::Client;

/// A client over a mock service that never reaches a cluster.
///
/// Wiring-only tests need a `Client` to construct managers and callbacks;
/// no request is ever issued through it.
pub(crate) fn client() -> Client {
    let (service, _handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
    Client::new(service, "default")
}
