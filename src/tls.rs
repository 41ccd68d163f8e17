//! TLS configuration for outbound exchange connections.
//!
//! Builds a [`rustls::ClientConfig`] whose root store is the webpki CA
//! bundle. The exchange host is operator-configurable (production or
//! testnet), so the full bundle is used rather than a pinned root.

use rustls::ClientConfig;

/// Builds a [`ClientConfig`] trusting the webpki root CA bundle.
pub fn build_tls_config() -> ClientConfig {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}
