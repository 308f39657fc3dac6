//! # picserve
//!
//! On-demand image resolution: stored originals are served through
//! caller-requested transformations (resize, crop, format conversion,
//! effects), and every transformed variant is cached so repeated requests
//! skip the work.
//!
//! # Architecture: Two Paths, Two Stores
//!
//! ```text
//! upload:  bytes → validate → normalize → hash → storage.set(hash)
//! get:     (id, query) → cache ─hit─────────────────────────────► bytes
//!                          └miss→ storage ─absent─► placeholder
//!                                   └present→ transform → cache.set → bytes
//! ```
//!
//! The cache and the durable storage are two independently configured
//! instances of the same [`store::Store`] trait, so either role can be
//! backed by memory or the filesystem.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`resolve`] | The read path: cache-aside lookup, transformation, placeholder fallback |
//! | [`upload`] | The write path: size and type checks, normalization, content addressing |
//! | [`params`] | `TransformParams`: query parsing, validation, preset expansion, canonical form |
//! | [`cache_key`] | `identifier ++ hash(canonical params)` |
//! | [`hasher`] | Pluggable content digests (SHA-256, BLAKE3) |
//! | [`store`] | Key → bytes storage: in-memory and flat-file backends, TTL sweep |
//! | [`imaging`] | Transformation capability: option resolution, dimension math, pure-Rust backend |
//! | [`slug`] | `<identifier>.<ext>` extraction from retrieval paths |
//! | [`config`] | `picserve.toml` loading, validation, and merging |
//!
//! # Design Decisions
//!
//! ## A Missing Original Is Not an Error
//!
//! A durable-store miss yields a light-gray PNG sized to the request. Pages
//! that reference a not-yet-uploaded image render with a correctly sized
//! hole instead of a broken-image icon. Placeholders are never cached.
//!
//! ## The Cache Is Best Effort
//!
//! A failed cache write is logged and the transformed bytes are served
//! anyway. A failed cache *read* other than "not found" aborts the request:
//! it signals a broken back end, and silently bypassing it would hide that.
//!
//! ## Web Defaults for Bare Requests
//!
//! A request with no transformation parameters is not served verbatim.
//! It is capped at 2048px on the longest edge and re-encoded as WebP with
//! metadata stripped, because originals are often camera files far larger
//! than any page needs. The resolved quality is 85, but the pure-Rust WebP
//! encoder is lossless, so that value does not affect WebP output.
//!
//! ## Animated Uploads Keep Their Frames
//!
//! Upload normalization decodes a single frame. Animated GIF and WebP
//! uploads skip it and are stored byte for byte.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate (Lanczos3 resampling) and
//! `rav1e` (AVIF encoding), both pure Rust. No system libraries are needed.

pub mod cache_key;
pub mod config;
pub mod hasher;
pub mod imaging;
pub mod params;
pub mod resolve;
pub mod slug;
pub mod store;
pub mod upload;
