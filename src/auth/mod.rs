//! Authorization-code login: request, callback listener, exchange, storage.

pub mod browser;
pub mod callback;
pub mod exchange;
pub mod flow;
pub mod request;
pub mod store;
pub mod token;

pub use browser::{BrowserLauncher, SystemBrowser};
pub use callback::{AuthorizationCode, CallbackListener, CallbackServer, ListenerState};
pub use exchange::TokenExchanger;
pub use flow::{LoginEvent, LoginEventSink, LoginFlow};
pub use request::{AuthorizationRequest, Pkce};
pub use store::{FileTokenStore, TokenStore};
pub use token::Token;
