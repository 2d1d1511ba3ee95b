mod authenticate;
mod sync_portfolio;

pub use authenticate::{AuthenticateAccountUseCase, CachedAttempt, DEFAULT_AUTH_TIMEOUT};
pub use sync_portfolio::{SyncPortfolioUseCase, SyncReport};
