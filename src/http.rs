//! HTTP client helper with native-tls support.
//!
//! The remote backend talks to its terminal API through an agent built
//! here. native-tls uses the system's TLS library, which behaves better in
//! VM environments where ring/rustls may have issues.

use std::time::Duration;
use ureq::Agent;
use ureq::tls::{RootCerts, TlsConfig, TlsProvider};

/// Create an HTTP agent configured with native-tls and a whole-request timeout.
///
/// Uses PlatformVerifier for the system's built-in root certificates.
pub fn agent(timeout: Duration) -> Agent {
    let tls_config = TlsConfig::builder()
        .provider(TlsProvider::NativeTls)
        .root_certs(RootCerts::PlatformVerifier)
        .build();

    Agent::config_builder()
        .tls_config(tls_config)
        .timeout_global(Some(timeout))
        .build()
        .into()
}
