mod connection;
pub use connection::Connection;

mod transport;
pub use transport::Transport;

mod logging;
pub use logging::Logging;

mod config;
pub use config::Config;

mod parser;
pub use parser::Parser;
