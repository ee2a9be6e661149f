pub mod hashing;
pub mod jwt;

pub use hashing::PasswordHasher;
pub use jwt::TokenService;
