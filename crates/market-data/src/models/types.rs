use std::borrow::Cow;
use std::sync::Arc;

/// Provider identifier - mostly static constants
pub type ProviderId = Cow<'static, str>;

/// Provider-canonical coin identifier discovered at runtime (e.g. "bitcoin")
pub type CoinId = Arc<str>;
