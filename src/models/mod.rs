pub mod board;
pub mod login;
pub mod pin;
pub mod user;

pub use board::{BoardProtocol, BoardType};
pub use login::{Login, LoginRecord, LoginRequest, LoginUser};
pub use pin::{AuroraPin, MoonboardPin, PinWithWalls, PinsFile, PinsResponse, TwelveClimbPin};
pub use user::{Gym, Social, User, UserResponse, Wall};
