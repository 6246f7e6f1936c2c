pub mod email;
pub mod error;
pub mod weather;

pub use email::{EmailMessage, Mailer, SmtpConfig, SmtpMailer};
pub use error::AdapterError;
pub use weather::{Weather, WeatherClient, WeatherConfig};
