//! JavaScript rewriting.
//!
//! Static JS rewriting is intentionally the identity transform: URLs that
//! only exist at execution time cannot be found by scanning source text, so
//! the injected client runtime intercepts them instead. The dispatcher
//! still routes JS bodies through here (buffered, Content-Length dropped)
//! so a real transform can be slotted in without touching the proxy flow.

/// Rewrite a JavaScript source body. Currently returns the input unchanged.
pub fn rewrite_js(_proxy_origin: &str, _base_url: &str, js: &str) -> String {
    js.to_string()
}
