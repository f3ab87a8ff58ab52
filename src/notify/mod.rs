mod message;
mod notifier;
mod transport;

pub use notifier::Notifier;
pub use transport::{LogTransport, TelegramTransport, Transport};

#[cfg(test)]
pub use notifier::RecipientDirectory;
#[cfg(test)]
pub use transport::DeliveryError;
