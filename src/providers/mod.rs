pub mod aurora;
pub mod login_page;
pub mod moonboard;
pub mod twelve_climb;
pub mod user_agent;

pub use aurora::{ApiRequest, AuroraClient, RetryPolicy};
pub use login_page::{CsrfTokens, LoginPageParser, RegexLoginPageParser};
pub use moonboard::{LoginStage, MoonboardClient, RequestOptions, SessionSnapshot};
pub use twelve_climb::TwelveClimbClient;
pub use user_agent::random_mobile_user_agent;
