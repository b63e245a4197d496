//! Authentication flows and token storage.
//!
//! Provides:
//! - `BotAuthenticator` - Service account sessions (RSA or certificate)
//! - `OboAuthenticator` - Sessions impersonating a user of an extension app
//! - `ExtensionAppAuthenticator` - App token exchange and validation
//! - Token repository implementations (memory)

pub mod bot;
pub mod credential;
pub mod extension_app;
pub mod model;
pub mod obo;
pub mod storage;

pub use bot::{BotAuthenticator, BotAuthenticatorService};
pub use credential::{Credential, JwtSigner};
pub use extension_app::{ExtensionAppAuthenticator, ExtensionAppAuthenticatorCert};
pub use model::PodCertificate;
pub use obo::{OboAuthenticator, OboAuthenticatorService};
